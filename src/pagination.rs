/// Every feed shows this many posts per page.
pub const POSTS_PER_PAGE: i64 = 10;

/// Splits a post count into pages and resolves `?page=` values to a valid
/// page number. Malformed, zero, or negative values clamp to the first page;
/// values past the end clamp to the last.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    total: i64,
    per_page: i64,
}

impl Paginator {
    pub fn new(total: i64, per_page: i64) -> Self {
        Self {
            total: total.max(0),
            per_page: per_page.max(1),
        }
    }

    /// An empty feed still has one (empty) page.
    pub fn num_pages(&self) -> i64 {
        ((self.total + self.per_page - 1) / self.per_page).max(1)
    }

    pub fn page_number(&self, requested: Option<&str>) -> i64 {
        let requested = requested
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(1);
        requested.clamp(1, self.num_pages())
    }

    pub fn offset(&self, page: i64) -> i64 {
        (page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// One resolved page of items plus the numbers the paginator partial needs.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, number: i64, num_pages: i64) -> Self {
        Self {
            items,
            number,
            num_pages,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn previous_page_number(&self) -> i64 {
        self.number - 1
    }

    pub fn next_page_number(&self) -> i64 {
        self.number + 1
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirteen_posts_make_two_pages() {
        let paginator = Paginator::new(13, POSTS_PER_PAGE);
        assert_eq!(paginator.num_pages(), 2);
        assert_eq!(paginator.page_number(Some("1")), 1);
        assert_eq!(paginator.page_number(Some("2")), 2);
        assert_eq!(paginator.offset(2), 10);
    }

    #[test]
    fn empty_feed_still_has_one_page() {
        let paginator = Paginator::new(0, POSTS_PER_PAGE);
        assert_eq!(paginator.num_pages(), 1);
        assert_eq!(paginator.page_number(None), 1);
    }

    #[test]
    fn bad_page_values_clamp() {
        let paginator = Paginator::new(13, POSTS_PER_PAGE);
        assert_eq!(paginator.page_number(None), 1);
        assert_eq!(paginator.page_number(Some("not-a-number")), 1);
        assert_eq!(paginator.page_number(Some("0")), 1);
        assert_eq!(paginator.page_number(Some("-3")), 1);
        assert_eq!(paginator.page_number(Some("99")), 2);
    }

    #[test]
    fn exact_multiple_has_no_trailing_page() {
        let paginator = Paginator::new(20, POSTS_PER_PAGE);
        assert_eq!(paginator.num_pages(), 2);
    }

    #[test]
    fn page_neighbour_numbers() {
        let page: Page<i64> = Page::new(vec![1, 2, 3], 2, 3);
        assert!(page.has_previous());
        assert!(page.has_next());
        assert_eq!(page.previous_page_number(), 1);
        assert_eq!(page.next_page_number(), 3);

        let last: Page<i64> = Page::new(vec![4], 3, 3);
        assert!(!last.has_next());
    }
}

use askama::Template;
use axum::response::Html;

use crate::error::AppResult;
use crate::models::{CommentCard, Group, PostCard, User};
use crate::pagination::Page;

/// Navigation context shared by every page that extends `base.html`.
#[derive(Debug, Clone, Default)]
pub struct PageChrome {
    pub username: Option<String>,
}

impl PageChrome {
    pub fn for_viewer(viewer: Option<&User>) -> Self {
        Self {
            username: viewer.map(|user| user.username.clone()),
        }
    }
}

pub fn render<T: Template>(template: T) -> AppResult<Html<String>> {
    Ok(Html(template.render()?))
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub chrome: PageChrome,
    pub page: Page<PostCard>,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupListTemplate {
    pub chrome: PageChrome,
    pub group: Group,
    pub page: Page<PostCard>,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub chrome: PageChrome,
    pub author: String,
    pub posts_count: i64,
    pub following: bool,
    /// Follow/unfollow buttons only make sense for a logged-in viewer looking
    /// at somebody else's profile.
    pub show_follow_toggle: bool,
    pub page: Page<PostCard>,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub chrome: PageChrome,
    pub post: PostCard,
    pub posts_count: i64,
    pub comments: Vec<CommentCard>,
    pub can_edit: bool,
    pub can_comment: bool,
    pub csrf_token: String,
}

/// State of the post form after a failed or initial render. `selected_group`
/// is zero when no group is chosen.
#[derive(Debug, Clone, Default)]
pub struct PostFormState {
    pub text: String,
    pub selected_group: i64,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub chrome: PageChrome,
    pub groups: Vec<Group>,
    pub form: PostFormState,
    pub is_edit: bool,
    pub post_id: i64,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowIndexTemplate {
    pub chrome: PageChrome,
    pub page: Page<PostCard>,
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub chrome: PageChrome,
    pub username: String,
    pub error: Option<String>,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub chrome: PageChrome,
    pub username: String,
    pub next: String,
    pub error: Option<String>,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "auth/logged_out.html")]
pub struct LoggedOutTemplate {
    pub chrome: PageChrome,
}

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AboutAuthorTemplate {
    pub chrome: PageChrome,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct AboutTechTemplate {
    pub chrome: PageChrome,
}

// The error pages deliberately do not extend `base.html`; they must render
// even when no viewer context is available.

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate<'a> {
    pub path: &'a str,
}

#[derive(Template)]
#[template(path = "core/403.html")]
pub struct ForbiddenTemplate;

#[derive(Template)]
#[template(path = "core/403csrf.html")]
pub struct CsrfFailureTemplate;

#[derive(Template)]
#[template(path = "core/500.html")]
pub struct ServerErrorTemplate;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_card(text: &str) -> PostCard {
        PostCard {
            id: 7,
            text: text.to_owned(),
            pub_date: Utc::now(),
            image: None,
            author_id: 1,
            author_username: "author".to_owned(),
            group_title: Some("Writers".to_owned()),
            group_slug: Some("writers".to_owned()),
        }
    }

    #[test]
    fn index_lists_post_previews() {
        let template = IndexTemplate {
            chrome: PageChrome::default(),
            page: Page::new(
                vec![sample_card("Attack of the clowns, part two")],
                1,
                1,
            ),
        };
        let html = template.render().unwrap();
        assert!(html.contains("Attack of the c"));
        assert!(!html.contains("Attack of the clowns"));
        assert!(html.contains("/profile/author"));
        assert!(html.contains("/group/writers"));
    }

    #[test]
    fn nav_reflects_login_state() {
        let anonymous = IndexTemplate {
            chrome: PageChrome::default(),
            page: Page::new(vec![], 1, 1),
        }
        .render()
        .unwrap();
        assert!(anonymous.contains("/auth/login"));
        assert!(!anonymous.contains("/auth/logout"));

        let logged_in = IndexTemplate {
            chrome: PageChrome {
                username: Some("leo".to_owned()),
            },
            page: Page::new(vec![], 1, 1),
        }
        .render()
        .unwrap();
        assert!(logged_in.contains("/auth/logout"));
        assert!(logged_in.contains("leo"));
    }

    #[test]
    fn post_form_switches_between_create_and_edit() {
        let create = PostFormTemplate {
            chrome: PageChrome::default(),
            groups: vec![],
            form: PostFormState::default(),
            is_edit: false,
            post_id: 0,
            csrf_token: "tok".to_owned(),
        }
        .render()
        .unwrap();
        assert!(create.contains("action=\"/create\""));

        let edit = PostFormTemplate {
            chrome: PageChrome::default(),
            groups: vec![],
            form: PostFormState {
                text: "old text".to_owned(),
                selected_group: 0,
                error: None,
            },
            is_edit: true,
            post_id: 5,
            csrf_token: "tok".to_owned(),
        }
        .render()
        .unwrap();
        assert!(edit.contains("action=\"/posts/5/edit\""));
        assert!(edit.contains("old text"));
    }

    #[test]
    fn not_found_page_shows_request_path() {
        let html = NotFoundTemplate {
            path: "/unexisting_page/",
        }
        .render()
        .unwrap();
        assert!(html.contains("/unexisting_page/"));
    }

    #[test]
    fn pagination_links_appear_for_multiple_pages() {
        let cards: Vec<PostCard> = (0..10).map(|i| sample_card(&format!("post {i}"))).collect();
        let html = IndexTemplate {
            chrome: PageChrome::default(),
            page: Page::new(cards, 1, 2),
        }
        .render()
        .unwrap();
        assert!(html.contains("?page=2"));
    }
}

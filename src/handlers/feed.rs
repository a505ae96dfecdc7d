// The three public feeds: index, group and profile.

use askama::Template;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::response::{Html, IntoResponse, Response};

use crate::app_state::AppState;
use crate::auth::OptionalUser;
use crate::error::{AppError, AppResult};
use crate::handlers::{request_path, PageQuery};
use crate::pagination::{Page, Paginator, POSTS_PER_PAGE};
use crate::templates::{self, GroupListTemplate, IndexTemplate, PageChrome, ProfileTemplate};

/// Index feed. The rendered page is cached for a short TTL keyed by the full
/// request URL; deletes and new posts become visible when the entry expires,
/// not before.
pub async fn index_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    OptionalUser(viewer): OptionalUser,
    Query(params): Query<PageQuery>,
) -> AppResult<Response> {
    let cache_key = request_path(&uri);
    if let Some(html) = state.page_cache.get(&cache_key).await {
        return Ok(Html(html).into_response());
    }

    let total = state.db.count_posts().await?;
    let paginator = Paginator::new(total, POSTS_PER_PAGE);
    let number = paginator.page_number(params.page.as_deref());
    let items = state
        .db
        .recent_posts(paginator.limit(), paginator.offset(number))
        .await?;

    let template = IndexTemplate {
        chrome: PageChrome::for_viewer(viewer.as_ref()),
        page: Page::new(items, number, paginator.num_pages()),
    };
    let html = template.render().map_err(AppError::from)?;
    state.page_cache.put(cache_key, html.clone()).await;
    Ok(Html(html).into_response())
}

pub async fn group_posts_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    OptionalUser(viewer): OptionalUser,
    Path(slug): Path<String>,
    Query(params): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let group = state
        .db
        .group_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::not_found(request_path(&uri)))?;

    let total = state.db.count_group_posts(group.id).await?;
    let paginator = Paginator::new(total, POSTS_PER_PAGE);
    let number = paginator.page_number(params.page.as_deref());
    let items = state
        .db
        .group_posts(group.id, paginator.limit(), paginator.offset(number))
        .await?;

    templates::render(GroupListTemplate {
        chrome: PageChrome::for_viewer(viewer.as_ref()),
        group,
        page: Page::new(items, number, paginator.num_pages()),
    })
}

pub async fn profile_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    OptionalUser(viewer): OptionalUser,
    Path(username): Path<String>,
    Query(params): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let author = state
        .db
        .user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::not_found(request_path(&uri)))?;

    let total = state.db.count_author_posts(author.id).await?;
    let paginator = Paginator::new(total, POSTS_PER_PAGE);
    let number = paginator.page_number(params.page.as_deref());
    let items = state
        .db
        .author_posts(author.id, paginator.limit(), paginator.offset(number))
        .await?;

    let (following, show_follow_toggle) = match &viewer {
        Some(user) if user.id != author.id => {
            (state.db.is_following(user.id, author.id).await?, true)
        }
        _ => (false, false),
    };

    templates::render(ProfileTemplate {
        chrome: PageChrome::for_viewer(viewer.as_ref()),
        author: author.username,
        posts_count: total,
        following,
        show_follow_toggle,
        page: Page::new(items, number, paginator.num_pages()),
    })
}

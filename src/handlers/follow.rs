// The follow feed and the follow/unfollow actions. Both actions are plain
// GET links on the profile page and are idempotent; repeating one changes
// nothing.

use axum::extract::{OriginalUri, Path, Query, State};
use axum::response::{Html, Redirect};

use crate::app_state::AppState;
use crate::auth::CurrentUser;
use crate::error::{AppError, AppResult};
use crate::handlers::{request_path, PageQuery};
use crate::pagination::{Page, Paginator, POSTS_PER_PAGE};
use crate::templates::{self, FollowIndexTemplate, PageChrome};

pub async fn follow_index_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let total = state.db.count_followed_posts(user.id).await?;
    let paginator = Paginator::new(total, POSTS_PER_PAGE);
    let number = paginator.page_number(params.page.as_deref());
    let items = state
        .db
        .followed_posts(user.id, paginator.limit(), paginator.offset(number))
        .await?;

    templates::render(FollowIndexTemplate {
        chrome: PageChrome::for_viewer(Some(&user)),
        page: Page::new(items, number, paginator.num_pages()),
    })
}

pub async fn profile_follow_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    let author = state
        .db
        .user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::not_found(request_path(&uri)))?;

    // Following yourself is silently ignored.
    if author.id != user.id {
        state.db.follow(user.id, author.id).await?;
    }
    Ok(Redirect::to(&format!("/profile/{username}")))
}

pub async fn profile_unfollow_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    let author = state
        .db
        .user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::not_found(request_path(&uri)))?;

    state.db.unfollow(user.id, author.id).await?;
    Ok(Redirect::to(&format!("/profile/{username}")))
}

// Post authoring: detail page, create and edit forms, comments.
//
// Create and edit submit as multipart because of the optional image upload.
// Validation failures re-render the form with a message instead of erroring,
// so nothing the author typed is lost.

use std::path::Path as FsPath;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, OriginalUri, Path, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::{CurrentUser, OptionalUser};
use crate::csrf::{self, CsrfToken, CSRF_FIELD};
use crate::error::{AppError, AppResult};
use crate::handlers::request_path;
use crate::media::{self, ImageError};
use crate::models::User;
use crate::templates::{self, PageChrome, PostDetailTemplate, PostFormState, PostFormTemplate};

pub async fn post_detail_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    OptionalUser(viewer): OptionalUser,
    CsrfToken(csrf_token): CsrfToken,
    Path(id): Path<i64>,
) -> AppResult<Html<String>> {
    let post = state
        .db
        .post_card(id)
        .await?
        .ok_or_else(|| AppError::not_found(request_path(&uri)))?;

    let posts_count = state.db.count_author_posts(post.author_id).await?;
    let comments = state.db.post_comments(id).await?;
    let can_edit = viewer.as_ref().is_some_and(|user| user.id == post.author_id);

    templates::render(PostDetailTemplate {
        chrome: PageChrome::for_viewer(viewer.as_ref()),
        post,
        posts_count,
        comments,
        can_edit,
        can_comment: viewer.is_some(),
        csrf_token,
    })
}

pub async fn post_create_form_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CsrfToken(csrf_token): CsrfToken,
) -> AppResult<Html<String>> {
    let groups = state.db.all_groups().await?;
    templates::render(PostFormTemplate {
        chrome: PageChrome::for_viewer(Some(&user)),
        groups,
        form: PostFormState::default(),
        is_edit: false,
        post_id: 0,
        csrf_token,
    })
}

pub async fn post_create_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CsrfToken(csrf_token): CsrfToken,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let form = read_post_form(&mut multipart).await?;
    csrf::verify(&headers, &form.csrf_token)?;

    match save_post(&state, &user, &form, None).await? {
        Saved::Post(_) => Ok(Redirect::to(&format!("/profile/{}", user.username)).into_response()),
        Saved::FormError(message) => {
            rerender_form(&state, &user, &form, message, None, csrf_token).await
        }
    }
}

pub async fn post_edit_form_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    CurrentUser(user): CurrentUser,
    CsrfToken(csrf_token): CsrfToken,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let post = state
        .db
        .post_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(request_path(&uri)))?;

    // Only the author may edit; everyone else is sent back to the post.
    if post.author_id != user.id {
        return Ok(Redirect::to(&format!("/posts/{id}")).into_response());
    }

    let template = PostFormTemplate {
        chrome: PageChrome::for_viewer(Some(&user)),
        groups: state.db.all_groups().await?,
        form: PostFormState {
            text: post.text,
            selected_group: post.group_id.unwrap_or(0),
            error: None,
        },
        is_edit: true,
        post_id: id,
        csrf_token,
    };
    Ok(templates::render(template)?.into_response())
}

pub async fn post_edit_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    CurrentUser(user): CurrentUser,
    CsrfToken(csrf_token): CsrfToken,
    Path(id): Path<i64>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let post = state
        .db
        .post_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(request_path(&uri)))?;

    // The author check comes before the form is even looked at, so a
    // non-author POST can never mutate anything.
    if post.author_id != user.id {
        return Ok(Redirect::to(&format!("/posts/{id}")).into_response());
    }

    let form = read_post_form(&mut multipart).await?;
    csrf::verify(&headers, &form.csrf_token)?;

    match save_post(&state, &user, &form, Some(id)).await? {
        Saved::Post(post_id) => Ok(Redirect::to(&format!("/posts/{post_id}")).into_response()),
        Saved::FormError(message) => {
            rerender_form(&state, &user, &form, message, Some(id), csrf_token).await
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    text: String,
    csrf_token: String,
}

/// Empty comments are dropped silently; either way the client lands back on
/// the post page.
pub async fn add_comment_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Form(form): Form<CommentForm>,
) -> AppResult<Redirect> {
    csrf::verify(&headers, &form.csrf_token)?;

    let post = state
        .db
        .post_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(request_path(&uri)))?;

    let text = form.text.trim();
    if !text.is_empty() {
        state.db.create_comment(post.id, user.id, text).await?;
    }
    Ok(Redirect::to(&format!("/posts/{id}")))
}

// Form plumbing

#[derive(Debug, Default)]
struct PostSubmission {
    text: String,
    group: Option<i64>,
    image: Option<(String, Vec<u8>)>,
    csrf_token: String,
}

enum Saved {
    Post(i64),
    FormError(String),
}

async fn read_post_form(multipart: &mut Multipart) -> AppResult<PostSubmission> {
    let mut form = PostSubmission::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        // `text()`/`bytes()` consume the field, so the name is copied first.
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("text") => form.text = field.text().await.map_err(bad_form)?,
            Some("group") => {
                let raw = field.text().await.map_err(bad_form)?;
                form.group = raw.trim().parse::<i64>().ok().filter(|id| *id > 0);
            }
            Some("image") => {
                let file_name = field.file_name().map(str::to_owned);
                let bytes = field.bytes().await.map_err(bad_form)?;
                if let Some(file_name) = file_name {
                    if !bytes.is_empty() {
                        form.image = Some((file_name, bytes.to_vec()));
                    }
                }
            }
            Some(name) if name == CSRF_FIELD => {
                form.csrf_token = field.text().await.map_err(bad_form)?;
            }
            _ => {}
        }
    }
    Ok(form)
}

fn bad_form(err: MultipartError) -> AppError {
    AppError::BadRequest(format!("malformed form submission: {err}"))
}

/// Validates and persists a submission. `existing` switches between insert
/// and update; updates never touch `pub_date` and keep the old image when no
/// new one was uploaded.
async fn save_post(
    state: &AppState,
    user: &User,
    form: &PostSubmission,
    existing: Option<i64>,
) -> AppResult<Saved> {
    let text = form.text.trim();
    if text.is_empty() {
        return Ok(Saved::FormError("post text cannot be empty".to_owned()));
    }
    if let Some(group_id) = form.group {
        if state.db.group_by_id(group_id).await?.is_none() {
            return Ok(Saved::FormError("pick an existing group".to_owned()));
        }
    }

    let image_path = match &form.image {
        Some((name, bytes)) => {
            let media_root = FsPath::new(&state.config.media.root);
            match media::store_post_image(media_root, name, bytes).await {
                Ok(path) => Some(path),
                Err(ImageError::Io(err)) => return Err(err.into()),
                Err(err) => return Ok(Saved::FormError(err.to_string())),
            }
        }
        None => None,
    };

    match existing {
        Some(id) => {
            state
                .db
                .update_post(id, text, form.group, image_path.as_deref())
                .await?;
            Ok(Saved::Post(id))
        }
        None => {
            let post = state
                .db
                .create_post(user.id, text, form.group, image_path.as_deref())
                .await?;
            Ok(Saved::Post(post.id))
        }
    }
}

async fn rerender_form(
    state: &AppState,
    user: &User,
    form: &PostSubmission,
    error: String,
    editing: Option<i64>,
    csrf_token: String,
) -> AppResult<Response> {
    let template = PostFormTemplate {
        chrome: PageChrome::for_viewer(Some(user)),
        groups: state.db.all_groups().await?,
        form: PostFormState {
            text: form.text.clone(),
            selected_group: form.group.unwrap_or(0),
            error: Some(error),
        },
        is_edit: editing.is_some(),
        post_id: editing.unwrap_or(0),
        csrf_token,
    };
    Ok(templates::render(template)?.into_response())
}

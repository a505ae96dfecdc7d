// HTTP handlers, grouped by page family. Every handler returns
// `AppResult<...>`; the error type renders the right error page (or login
// redirect) on its own.

pub mod about;
pub mod auth;
pub mod feed;
pub mod follow;
pub mod posts;

use axum::extract::OriginalUri;
use axum::http::Uri;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;

/// `?page=` arrives as text on purpose: junk values fall back to page one
/// instead of rejecting the request.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

pub(crate) fn request_path(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| uri.path().to_owned())
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "emberlog",
    }))
}

/// Router fallback for unknown paths.
pub async fn not_found_handler(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::not_found(request_path(&uri))
}

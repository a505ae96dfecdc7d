use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use std::fmt;

use crate::templates::{CsrfFailureTemplate, ForbiddenTemplate, NotFoundTemplate, ServerErrorTemplate};

#[derive(Debug)]
pub enum AppError {
    Database(sqlx::Error),
    Template(askama::Error),
    Io(std::io::Error),
    Internal(String),
    BadRequest(String),
    /// Request for something that does not exist; carries the request path
    /// so the 404 page can show it.
    NotFound(String),
    Forbidden,
    CsrfRejected,
    /// Anonymous request to an authenticated-only page; carries the path to
    /// return to after login.
    LoginRequired(String),
}

impl AppError {
    pub fn not_found(path: impl Into<String>) -> Self {
        AppError::NotFound(path.into())
    }

    pub fn login_required(next: impl Into<String>) -> Self {
        AppError::LoginRequired(next.into())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(err) => write!(f, "Database error: {}", err),
            AppError::Template(err) => write!(f, "Template error: {}", err),
            AppError::Io(err) => write!(f, "I/O error: {}", err),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(path) => write!(f, "Not found: {}", path),
            AppError::Forbidden => write!(f, "Forbidden"),
            AppError::CsrfRejected => write!(f, "CSRF check failed"),
            AppError::LoginRequired(next) => write!(f, "Login required to reach {}", next),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Database(err) => {
                tracing::error!("database error: {}", err);
                server_error_page()
            }
            AppError::Template(err) => {
                tracing::error!("template rendering failed: {}", err);
                server_error_page()
            }
            AppError::Io(err) => {
                tracing::error!("i/o error: {}", err);
                server_error_page()
            }
            AppError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                server_error_page()
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::NotFound(path) => {
                let page = NotFoundTemplate { path: &path };
                render_error_page(StatusCode::NOT_FOUND, page.render())
            }
            AppError::Forbidden => {
                render_error_page(StatusCode::FORBIDDEN, ForbiddenTemplate.render())
            }
            AppError::CsrfRejected => {
                render_error_page(StatusCode::FORBIDDEN, CsrfFailureTemplate.render())
            }
            // The login page reads `next` back out of the query string;
            // paths go in raw, slashes and all.
            AppError::LoginRequired(next) => {
                Redirect::to(&format!("/auth/login?next={}", next)).into_response()
            }
        }
    }
}

/// Renders the static 500 page; used for every internal failure variant and
/// by the panic-catching layer.
pub fn server_error_page() -> Response {
    render_error_page(StatusCode::INTERNAL_SERVER_ERROR, ServerErrorTemplate.render())
}

fn render_error_page(status: StatusCode, body: Result<String, askama::Error>) -> Response {
    match body {
        Ok(html) => (status, Html(html)).into_response(),
        // The error pages are static except for the 404 path; if one of them
        // fails to render there is nothing better to fall back to.
        Err(err) => {
            tracing::error!("error page rendering failed: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<askama::Error> for AppError {
    fn from(err: askama::Error) -> Self {
        AppError::Template(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;

    #[test]
    fn variants_map_to_the_right_status() {
        assert_eq!(
            AppError::not_found("/missing").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::CsrfRejected.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Internal("boom".to_owned()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn login_required_redirects_with_next() {
        let response = AppError::login_required("/create").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
            Some("/auth/login?next=/create")
        );
    }
}

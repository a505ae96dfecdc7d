// Double-submit CSRF protection. Every response is guaranteed a `csrftoken`
// cookie; forms embed the same value in a hidden field and POST handlers
// require the two to match. Cross-site forms cannot read the cookie, so they
// cannot produce a matching field.

use axum::extract::{FromRequestParts, Request};
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

use crate::auth::sessions::cookie_value;
use crate::error::{AppError, AppResult};

pub const CSRF_COOKIE: &str = "csrftoken";
/// Name of the hidden form field carrying the token.
pub const CSRF_FIELD: &str = "csrf_token";

const TOKEN_BYTES: usize = 32;

pub fn issue_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The token templates should embed in forms. Inserted into request
/// extensions by [`csrf_middleware`].
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .extensions
            .get::<CsrfToken>()
            .cloned()
            .unwrap_or_else(|| CsrfToken(issue_token()));
        Ok(token)
    }
}

/// Reuses the browser's existing token or mints one, and makes sure the
/// cookie rides out on the response when it was missing.
pub async fn csrf_middleware(mut request: Request, next: Next) -> Response {
    let existing = cookie_value(request.headers(), CSRF_COOKIE);
    let needs_cookie = existing.is_none();
    let token = existing.unwrap_or_else(issue_token);

    request.extensions_mut().insert(CsrfToken(token.clone()));
    let mut response = next.run(request).await;

    if needs_cookie {
        let cookie = format!("{CSRF_COOKIE}={token}; Path=/; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

/// Checks a submitted form token against the cookie. POST handlers call this
/// before mutating anything.
pub fn verify(headers: &HeaderMap, submitted: &str) -> AppResult<()> {
    let cookie = cookie_value(headers, CSRF_COOKIE).ok_or(AppError::CsrfRejected)?;
    if submitted.is_empty() || cookie != submitted {
        return Err(AppError::CsrfRejected);
    }
    Ok(())
}

// Session plumbing. A logged-in browser carries a `sessionid` cookie holding
// `{session_id}.{signature}`; the signature is HMAC-SHA256 over the session id
// so a forged cookie is rejected before we ever touch the database. The
// session row itself lives in SQLite and caps the lifetime server-side.

use axum::extract::{FromRequestParts, OriginalUri, Request, State};
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Uri};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::models::User;

pub const SESSION_COOKIE: &str = "sessionid";

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies the opaque session ids we hand to browsers.
pub struct SessionTokens {
    secret: Vec<u8>,
}

impl SessionTokens {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }

    /// `{session_id}.{base64url(hmac)}`, the value stored in the cookie.
    pub fn sign(&self, session_id: &str) -> String {
        let mut mac = self.mac();
        mac.update(session_id.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{session_id}.{signature}")
    }

    /// Returns the session id if the signature checks out.
    pub fn verify(&self, token: &str) -> Option<String> {
        let (session_id, signature) = token.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac();
        mac.update(session_id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(session_id.to_owned())
    }
}

/// Reads a single cookie out of however many `Cookie` headers the client sent.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        for pair in raw.split(';') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            if key.trim() == name {
                return Some(value.trim().to_owned());
            }
        }
    }
    None
}

pub fn session_cookie(token: &str, ttl_days: i64) -> String {
    let max_age = ttl_days.max(0) * 24 * 60 * 60;
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}")
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Resolves the session cookie to a user and parks it in request extensions
/// for the extractors below. Anonymous requests pass straight through.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(user) = resolve_user(&state, request.headers()).await {
        request.extensions_mut().insert(CurrentUser(user));
    }
    next.run(request).await
}

async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = cookie_value(headers, SESSION_COOKIE)?;
    let session_id = state.sessions.verify(&token)?;
    let session = match state.db.session_by_id(&session_id).await {
        Ok(session) => session?,
        Err(err) => {
            tracing::warn!("session lookup failed: {}", err);
            return None;
        }
    };
    if !session.is_valid() {
        return None;
    }
    match state.db.user_by_id(session.user_id).await {
        Ok(user) => user,
        Err(err) => {
            tracing::warn!("user lookup for session failed: {}", err);
            None
        }
    }
}

fn full_path(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| uri.path().to_owned())
}

/// Extractor for pages that require a login. Missing or invalid sessions
/// bounce to the login form with the requested path in `?next=`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }
        let next = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| full_path(&original.0))
            .unwrap_or_else(|| full_path(&parts.uri));
        Err(AppError::login_required(next))
    }
}

/// Extractor for pages that render differently for guests but never reject.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<User>);

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts.extensions.get::<CurrentUser>().map(|u| u.0.clone());
        Ok(OptionalUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn tokens() -> SessionTokens {
        SessionTokens::new("unit-test-secret")
    }

    #[test]
    fn sign_verify_roundtrip() {
        let tokens = tokens();
        let signed = tokens.sign("abc-123");
        assert_eq!(tokens.verify(&signed), Some("abc-123".to_owned()));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let tokens = tokens();
        let signed = tokens.sign("abc-123");
        let forged = signed.replace("abc-123", "abc-124");
        assert_eq!(tokens.verify(&forged), None);
        assert_eq!(tokens.verify("abc-123"), None);
        assert_eq!(tokens.verify("abc-123."), None);
        assert_eq!(tokens.verify(""), None);
    }

    #[test]
    fn different_secret_is_rejected() {
        let signed = tokens().sign("abc-123");
        let other = SessionTokens::new("another-secret");
        assert_eq!(other.verify(&signed), None);
    }

    #[test]
    fn cookie_value_picks_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("csrftoken=zzz; sessionid=abc.def; theme=dark"),
        );
        assert_eq!(
            cookie_value(&headers, SESSION_COOKIE),
            Some("abc.def".to_owned())
        );
        assert_eq!(cookie_value(&headers, "theme"), Some("dark".to_owned()));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn cookie_value_scans_all_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1"));
        headers.append(COOKIE, HeaderValue::from_static("sessionid=tok.sig"));
        assert_eq!(
            cookie_value(&headers, SESSION_COOKIE),
            Some("tok.sig".to_owned())
        );
    }

    #[test]
    fn cookie_builders() {
        let set = session_cookie("tok.sig", 14);
        assert!(set.starts_with("sessionid=tok.sig;"));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("Max-Age=1209600"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}

// Account pages. Signup creates the account and lands the visitor back on
// the index, still signed out; logging in is a separate step. Login exchanges
// credentials for a DB session and sets the signed cookie; logout deletes
// the session row so the cookie dies server-side too.

use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::sessions::{self, cookie_value};
use crate::auth::{password, OptionalUser, SESSION_COOKIE};
use crate::csrf::{self, CsrfToken};
use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::templates::{self, LoggedOutTemplate, LoginTemplate, PageChrome, SignupTemplate};

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    username: String,
    password: String,
    password2: String,
    csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
    #[serde(default)]
    next: String,
    csrf_token: String,
}

pub async fn signup_form_handler(
    OptionalUser(viewer): OptionalUser,
    CsrfToken(csrf_token): CsrfToken,
) -> AppResult<Html<String>> {
    templates::render(SignupTemplate {
        chrome: PageChrome::for_viewer(viewer.as_ref()),
        username: String::new(),
        error: None,
        csrf_token,
    })
}

pub async fn signup_handler(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    CsrfToken(csrf_token): CsrfToken,
    headers: HeaderMap,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    csrf::verify(&headers, &form.csrf_token)?;

    let username = form.username.trim().to_owned();
    let error = validate_signup(&state, &username, &form).await?;
    if let Some(message) = error {
        return signup_error(viewer.as_ref(), username, message, csrf_token);
    }

    let hash = password::hash_password(&form.password)?;
    match state.db.create_user(&username, &hash).await {
        Ok(user) => {
            tracing::info!("new user '{}' signed up", user.username);
            Ok(Redirect::to("/").into_response())
        }
        // Lost a race against a concurrent signup for the same name.
        Err(sqlx::Error::Database(db_err))
            if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
        {
            signup_error(
                viewer.as_ref(),
                username,
                "this username is already taken".to_owned(),
                csrf_token,
            )
        }
        Err(err) => Err(err.into()),
    }
}

async fn validate_signup(
    state: &AppState,
    username: &str,
    form: &SignupForm,
) -> AppResult<Option<String>> {
    if let Err(message) = password::validate_username(username) {
        return Ok(Some(message.to_owned()));
    }
    if let Err(message) = password::validate_password(&form.password) {
        return Ok(Some(message.to_owned()));
    }
    if form.password != form.password2 {
        return Ok(Some("the two passwords do not match".to_owned()));
    }
    if state.db.user_by_username(username).await?.is_some() {
        return Ok(Some("this username is already taken".to_owned()));
    }
    Ok(None)
}

fn signup_error(
    viewer: Option<&User>,
    username: String,
    message: String,
    csrf_token: String,
) -> AppResult<Response> {
    let template = SignupTemplate {
        chrome: PageChrome::for_viewer(viewer),
        username,
        error: Some(message),
        csrf_token,
    };
    Ok(templates::render(template)?.into_response())
}

pub async fn login_form_handler(
    OptionalUser(viewer): OptionalUser,
    CsrfToken(csrf_token): CsrfToken,
    Query(params): Query<LoginQuery>,
) -> AppResult<Html<String>> {
    templates::render(LoginTemplate {
        chrome: PageChrome::for_viewer(viewer.as_ref()),
        username: String::new(),
        next: params.next.unwrap_or_default(),
        error: None,
        csrf_token,
    })
}

pub async fn login_handler(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    CsrfToken(csrf_token): CsrfToken,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    csrf::verify(&headers, &form.csrf_token)?;

    let user = match state.db.user_by_username(form.username.trim()).await? {
        Some(user) if password::verify_password(&user.password_hash, &form.password) => user,
        // Same message for a missing user and a wrong password.
        _ => {
            let template = LoginTemplate {
                chrome: PageChrome::for_viewer(viewer.as_ref()),
                username: form.username.trim().to_owned(),
                next: form.next,
                error: Some("invalid username or password".to_owned()),
                csrf_token,
            };
            return Ok(templates::render(template)?.into_response());
        }
    };

    let ttl_days = state.config.auth.session_ttl_days;
    let session = state.db.create_session(user.id, ttl_days).await?;
    let token = state.sessions.sign(&session.id);
    tracing::info!("user '{}' logged in", user.username);

    let mut response = Redirect::to(safe_next(&form.next)).into_response();
    append_cookie(&mut response, &sessions::session_cookie(&token, ttl_days))?;
    Ok(response)
}

pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Response> {
    if let Some(token) = cookie_value(&headers, SESSION_COOKIE) {
        if let Some(session_id) = state.sessions.verify(&token) {
            state.db.delete_session(&session_id).await?;
        }
    }

    let page = templates::render(LoggedOutTemplate {
        chrome: PageChrome::default(),
    })?;
    let mut response = page.into_response();
    append_cookie(&mut response, &sessions::clear_session_cookie())?;
    Ok(response)
}

/// Only same-site absolute paths are honored; anything else falls back to
/// the index so the login form cannot be used as an open redirect.
fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") {
        next
    } else {
        "/"
    }
}

fn append_cookie(response: &mut Response, cookie: &str) -> AppResult<()> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|_| AppError::Internal("session cookie contains invalid bytes".to_owned()))?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(())
}

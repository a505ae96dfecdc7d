use std::any::Any;

use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::auth::sessions::session_middleware;
use crate::csrf::csrf_middleware;
use crate::error::server_error_page;
use crate::handlers::{self, about, auth, feed, follow, posts};
use crate::media::MAX_IMAGE_BYTES;

pub fn build_router(state: AppState) -> Router {
    let media_dir = ServeDir::new(&state.config.media.root);

    Router::new()
        // Feeds
        .route("/", get(feed::index_handler))
        .route("/group/{slug}", get(feed::group_posts_handler))
        .route("/profile/{username}", get(feed::profile_handler))
        // Following
        .route("/follow", get(follow::follow_index_handler))
        .route("/profile/{username}/follow", get(follow::profile_follow_handler))
        .route(
            "/profile/{username}/unfollow",
            get(follow::profile_unfollow_handler),
        )
        // Posts and comments
        .route(
            "/create",
            get(posts::post_create_form_handler).post(posts::post_create_handler),
        )
        .route("/posts/{id}", get(posts::post_detail_handler))
        .route(
            "/posts/{id}/edit",
            get(posts::post_edit_form_handler).post(posts::post_edit_handler),
        )
        .route("/posts/{id}/comment", post(posts::add_comment_handler))
        // Accounts
        .route(
            "/auth/signup",
            get(auth::signup_form_handler).post(auth::signup_handler),
        )
        .route(
            "/auth/login",
            get(auth::login_form_handler).post(auth::login_handler),
        )
        .route("/auth/logout", get(auth::logout_handler))
        // Static pages and assets
        .route("/about/author", get(about::about_author_handler))
        .route("/about/tech", get(about::about_tech_handler))
        .route("/healthz", get(handlers::health_handler))
        .nest_service("/static", ServeDir::new("static"))
        .nest_service("/media", media_dir)
        .fallback(handlers::not_found_handler)
        // Executed outermost-last: panics and tracing wrap everything, the
        // session and csrf middleware run before any handler.
        .layer(from_fn(csrf_middleware))
        .layer(from_fn_with_state(state.clone(), session_middleware))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| err.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "opaque panic payload".to_owned());
    tracing::error!("handler panicked: {}", detail);
    server_error_page()
}

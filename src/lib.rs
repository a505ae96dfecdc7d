// Emberlog - server-rendered community blog

// HTTP surface - handlers, router assembly, template structs
pub mod handlers;
pub mod routes;
pub mod templates;

// Storage - schema, queries, row types
pub mod database;
pub mod models;

// Request plumbing - sessions, CSRF double-submit, uploaded media
pub mod auth;
pub mod csrf;
pub mod media;

// Feed assembly
pub mod pagination;

// Rendered-page cache
pub mod cache;

// Common utilities
pub mod app_state;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use app_state::AppState;
pub use error::{AppError, AppResult};

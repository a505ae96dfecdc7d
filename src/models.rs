use chrono::{DateTime, Utc};
use std::fmt;

/// Post summaries show this many characters of the text.
pub const PREVIEW_CHARS: usize = 15;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub text: String,
    /// Set once at creation; edits never touch it.
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub group_id: Option<i64>,
    /// Path relative to the media root, e.g. `posts/small.gif`.
    pub image: Option<String>,
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&preview(&self.text))
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Follow {
    pub id: i64,
    /// The subscriber.
    pub user_id: i64,
    /// The author being followed.
    pub author_id: i64,
}

/// A post joined with its author and group for feed and detail rendering.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub image: Option<String>,
    pub author_id: i64,
    pub author_username: String,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
}

impl PostCard {
    pub fn preview(&self) -> String {
        preview(&self.text)
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

/// A comment joined with its author for the detail page.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentCard {
    pub id: i64,
    pub text: String,
    pub created: DateTime<Utc>,
    pub author_username: String,
}

/// First [`PREVIEW_CHARS`] characters of a text, on a character boundary.
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

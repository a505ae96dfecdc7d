use chrono::{Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{Comment, CommentCard, Follow, Group, Post, PostCard, Session, User};

type Result<T> = std::result::Result<T, sqlx::Error>;

/// Shape shared by every feed query: posts joined with their author and
/// (optional) group, newest first.
const POST_CARD_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.image, p.author_id, \
     u.username AS author_username, g.title AS group_title, g.slug AS group_slug \
     FROM posts p \
     JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id";

// Async blog database over a SQLx connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Cascade and SET NULL rules live in the schema; SQLite only honors
        // them with foreign_keys switched on per connection.
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Database { pool })
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                joined_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // Posts keep living when their group goes away; they die with their
        // author.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                pub_date TEXT NOT NULL,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                group_id INTEGER REFERENCES groups(id) ON DELETE SET NULL,
                image TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text TEXT NOT NULL,
                created TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // One edge per (subscriber, author) pair makes following idempotent.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS follows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                UNIQUE(user_id, author_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        // Feed-query indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_pub_date ON posts(pub_date DESC, id DESC)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_group ON posts(group_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_follows_user ON follows(user_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // Users

    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let joined_at = Utc::now();
        let result = sqlx::query("INSERT INTO users (username, password_hash, joined_at) VALUES (?, ?, ?)")
            .bind(username)
            .bind(password_hash)
            .bind(joined_at)
            .execute(&self.pool)
            .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            joined_at,
        })
    }

    pub async fn user_by_id(&self, id: i64) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT id, username, password_hash, joined_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, joined_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    /// Account removal; posts, comments, sessions, and follow edges cascade.
    pub async fn delete_user(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Sessions

    pub async fn create_session(&self, user_id: i64, ttl_days: i64) -> Result<Session> {
        let created_at = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            created_at,
            expires_at: created_at + Duration::days(ttl_days),
        };

        sqlx::query("INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
            .bind(&session.id)
            .bind(session.user_id)
            .bind(session.created_at)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await?;

        Ok(session)
    }

    pub async fn session_by_id(&self, id: &str) -> Result<Option<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete_session(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Groups

    pub async fn create_group(&self, title: &str, slug: &str, description: &str) -> Result<Group> {
        let result = sqlx::query("INSERT INTO groups (title, slug, description) VALUES (?, ?, ?)")
            .bind(title)
            .bind(slug)
            .bind(description)
            .execute(&self.pool)
            .await?;

        Ok(Group {
            id: result.last_insert_rowid(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: description.to_string(),
        })
    }

    pub async fn group_by_id(&self, id: i64) -> Result<Option<Group>> {
        sqlx::query_as::<_, Group>("SELECT id, title, slug, description FROM groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        sqlx::query_as::<_, Group>("SELECT id, title, slug, description FROM groups WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
    }

    /// All groups, for the post form's group picker.
    pub async fn all_groups(&self) -> Result<Vec<Group>> {
        sqlx::query_as::<_, Group>("SELECT id, title, slug, description FROM groups ORDER BY title")
            .fetch_all(&self.pool)
            .await
    }

    /// Removing a group detaches its posts (group set to NULL), never
    /// deletes them.
    pub async fn delete_group(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM groups WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Posts

    pub async fn create_post(
        &self,
        author_id: i64,
        text: &str,
        group_id: Option<i64>,
        image: Option<&str>,
    ) -> Result<Post> {
        let pub_date = Utc::now();
        let result =
            sqlx::query("INSERT INTO posts (text, pub_date, author_id, group_id, image) VALUES (?, ?, ?, ?, ?)")
                .bind(text)
                .bind(pub_date)
                .bind(author_id)
                .bind(group_id)
                .bind(image)
                .execute(&self.pool)
                .await?;

        Ok(Post {
            id: result.last_insert_rowid(),
            text: text.to_string(),
            pub_date,
            author_id,
            group_id,
            image: image.map(str::to_string),
        })
    }

    pub async fn post_by_id(&self, id: i64) -> Result<Option<Post>> {
        sqlx::query_as::<_, Post>(
            "SELECT id, text, pub_date, author_id, group_id, image FROM posts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn post_card(&self, id: i64) -> Result<Option<PostCard>> {
        sqlx::query_as::<_, PostCard>(&format!("{} WHERE p.id = ?", POST_CARD_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Edits replace text and group; the image is only replaced when a new
    /// one was uploaded. `pub_date` and the author are immutable.
    pub async fn update_post(
        &self,
        id: i64,
        text: &str,
        group_id: Option<i64>,
        image: Option<&str>,
    ) -> Result<()> {
        match image {
            Some(image) => {
                sqlx::query("UPDATE posts SET text = ?, group_id = ?, image = ? WHERE id = ?")
                    .bind(text)
                    .bind(group_id)
                    .bind(image)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                sqlx::query("UPDATE posts SET text = ?, group_id = ? WHERE id = ?")
                    .bind(text)
                    .bind(group_id)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn delete_post(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Feeds - all newest-first, id as tiebreak for same-instant posts

    pub async fn count_posts(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
    }

    pub async fn recent_posts(&self, limit: i64, offset: i64) -> Result<Vec<PostCard>> {
        sqlx::query_as::<_, PostCard>(&format!(
            "{} ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?",
            POST_CARD_SELECT
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn count_group_posts(&self, group_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE group_id = ?")
            .bind(group_id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn group_posts(&self, group_id: i64, limit: i64, offset: i64) -> Result<Vec<PostCard>> {
        sqlx::query_as::<_, PostCard>(&format!(
            "{} WHERE p.group_id = ? ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?",
            POST_CARD_SELECT
        ))
        .bind(group_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn count_author_posts(&self, author_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = ?")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn author_posts(&self, author_id: i64, limit: i64, offset: i64) -> Result<Vec<PostCard>> {
        sqlx::query_as::<_, PostCard>(&format!(
            "{} WHERE p.author_id = ? ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?",
            POST_CARD_SELECT
        ))
        .bind(author_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn count_followed_posts(&self, user_id: i64) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM posts p \
             JOIN follows f ON f.author_id = p.author_id \
             WHERE f.user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Posts by every author the user follows.
    pub async fn followed_posts(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<PostCard>> {
        sqlx::query_as::<_, PostCard>(&format!(
            "{} JOIN follows f ON f.author_id = p.author_id \
             WHERE f.user_id = ? ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?",
            POST_CARD_SELECT
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    // Comments

    pub async fn create_comment(&self, post_id: i64, author_id: i64, text: &str) -> Result<Comment> {
        let created = Utc::now();
        let result = sqlx::query("INSERT INTO comments (post_id, author_id, text, created) VALUES (?, ?, ?, ?)")
            .bind(post_id)
            .bind(author_id)
            .bind(text)
            .bind(created)
            .execute(&self.pool)
            .await?;

        Ok(Comment {
            id: result.last_insert_rowid(),
            post_id,
            author_id,
            text: text.to_string(),
            created,
        })
    }

    pub async fn post_comments(&self, post_id: i64) -> Result<Vec<CommentCard>> {
        sqlx::query_as::<_, CommentCard>(
            "SELECT c.id, c.text, c.created, u.username AS author_username \
             FROM comments c \
             JOIN users u ON u.id = c.author_id \
             WHERE c.post_id = ? \
             ORDER BY c.created ASC, c.id ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn count_comments(&self, post_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await
    }

    // Follows

    /// Idempotent: the unique (user, author) index swallows repeats.
    pub async fn follow(&self, user_id: i64, author_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// No-op when no edge exists.
    pub async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE user_id = ? AND author_id = ?")
                .bind(user_id)
                .bind(author_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn count_follows(&self, user_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn follows_of(&self, user_id: i64) -> Result<Vec<Follow>> {
        sqlx::query_as::<_, Follow>("SELECT id, user_id, author_id FROM follows WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
    }
}

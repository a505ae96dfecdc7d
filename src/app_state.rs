use std::sync::Arc;
use std::time::Duration;

use crate::auth::SessionTokens;
use crate::cache::PageCache;
use crate::config::Config;
use crate::database::Database;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub page_cache: Arc<PageCache>,
    pub sessions: Arc<SessionTokens>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // The media root must exist before the first upload and before
        // ServeDir starts answering for /media.
        tokio::fs::create_dir_all(&config.media.root).await?;
        if let Some(dir) = sqlite_parent_dir(&config.database.url) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let db = Database::new(&config.database.url).await?;
        db.init().await?;

        let page_cache = PageCache::new(
            config.cache.capacity,
            Duration::from_secs(config.cache.ttl_secs),
        );
        let sessions = SessionTokens::new(&config.auth.session_secret);

        Ok(Self {
            db: Arc::new(db),
            page_cache: Arc::new(page_cache),
            sessions: Arc::new(sessions),
            config,
        })
    }
}

/// `sqlite:data/emberlog.db` keeps its file under `data/`; that directory is
/// not created by sqlx even with `create_if_missing`.
fn sqlite_parent_dir(database_url: &str) -> Option<&std::path::Path> {
    let path = database_url.strip_prefix("sqlite:")?;
    if path.starts_with(":memory:") || path.is_empty() {
        return None;
    }
    let parent = std::path::Path::new(path).parent()?;
    if parent.as_os_str().is_empty() {
        return None;
    }
    Some(parent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_parent_dir_extraction() {
        assert_eq!(
            sqlite_parent_dir("sqlite:data/emberlog.db"),
            Some(std::path::Path::new("data"))
        );
        assert_eq!(sqlite_parent_dir("sqlite:emberlog.db"), None);
        assert_eq!(sqlite_parent_dir("sqlite::memory:"), None);
        assert_eq!(sqlite_parent_dir("postgres://elsewhere"), None);
    }
}

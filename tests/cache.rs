// Index cache behavior: responses are reused byte-for-byte until the TTL
// runs out or the cache is cleared; writes do not invalidate.

mod common;

use std::time::Duration;

use common::{body_text, TestApp};

#[tokio::test]
async fn index_serves_the_cached_page_until_cleared() {
    let app = TestApp::spawn().await;
    let author = app.state.db.create_user("poet", "x").await.unwrap();
    let post = app
        .state
        .db
        .create_post(author.id, "soon to vanish", None, None)
        .await
        .unwrap();

    let first = body_text(app.get("/").await).await;
    assert!(first.contains("soon to vanish"));

    app.state.db.delete_post(post.id).await.unwrap();

    // The deletion is invisible while the cached copy lives.
    let second = body_text(app.get("/").await).await;
    assert_eq!(first, second, "cached page must be identical bytes");

    app.state.page_cache.clear().await;
    let third = body_text(app.get("/").await).await;
    assert!(!third.contains("soon to vanish"));
    assert!(third.contains("Nothing has been published yet."));
}

#[tokio::test]
async fn cache_entries_are_keyed_by_the_full_url() {
    let app = TestApp::spawn().await;
    let author = app.state.db.create_user("poet", "x").await.unwrap();
    let post = app
        .state
        .db
        .create_post(author.id, "soon to vanish", None, None)
        .await
        .unwrap();

    let plain = body_text(app.get("/").await).await;
    assert!(plain.contains("soon to vanish"));

    app.state.db.delete_post(post.id).await.unwrap();

    // A different query string is a different cache entry, rendered fresh.
    let with_query = body_text(app.get("/?page=1").await).await;
    assert!(!with_query.contains("soon to vanish"));

    // The original entry is still being served.
    let plain_again = body_text(app.get("/").await).await;
    assert!(plain_again.contains("soon to vanish"));
}

#[tokio::test]
async fn cache_expires_after_the_ttl() {
    let app = TestApp::spawn_with_ttl(1).await;
    let author = app.state.db.create_user("poet", "x").await.unwrap();
    let post = app
        .state
        .db
        .create_post(author.id, "short lived", None, None)
        .await
        .unwrap();

    let warm = body_text(app.get("/").await).await;
    assert!(warm.contains("short lived"));

    app.state.db.delete_post(post.id).await.unwrap();
    let still_cached = body_text(app.get("/").await).await;
    assert!(still_cached.contains("short lived"));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let expired = body_text(app.get("/").await).await;
    assert!(!expired.contains("short lived"));
}

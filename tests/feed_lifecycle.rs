//! Integration tests for the storage lifecycle: register, add feeds, collect posts, reset.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use gator::storage::{Database, DatabaseError, FeedStore, NewPost};

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn post(feed_id: i64, slug: &str, published_at: Option<i64>) -> NewPost {
    NewPost {
        feed_id,
        title: format!("Title {}", slug),
        url: format!("https://example.com/{}", slug),
        description: Some("Test summary".to_string()),
        published_at,
        created_at: 1_700_000_000_000,
    }
}

// ============================================================================
// Users
// ============================================================================

#[tokio::test]
async fn test_duplicate_user_rejected() {
    let db = test_db().await;
    db.create_user("alice").await.unwrap();

    let err = db.create_user("alice").await.unwrap_err();
    assert!(matches!(err, DatabaseError::AlreadyExists(_)));
    assert_eq!(db.get_users().await.unwrap().len(), 1);
}

// ============================================================================
// Feeds and follows
// ============================================================================

#[tokio::test]
async fn test_feed_url_is_unique_across_users() {
    let db = test_db().await;
    let alice = db.create_user("alice").await.unwrap();
    let bob = db.create_user("bob").await.unwrap();

    db.add_feed_for_user("Blog", "https://example.com/rss", alice.id)
        .await
        .unwrap();
    let err = db
        .add_feed_for_user("Same blog", "https://example.com/rss", bob.id)
        .await
        .unwrap_err();

    assert!(matches!(err, DatabaseError::AlreadyExists(_)));
    let feeds = db.get_feeds().await.unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].owner_name, "alice");
}

#[tokio::test]
async fn test_browse_only_sees_followed_feeds() {
    let db = test_db().await;
    let alice = db.create_user("alice").await.unwrap();
    let bob = db.create_user("bob").await.unwrap();
    let a_feed = db
        .add_feed_for_user("A", "https://a.example.com/rss", alice.id)
        .await
        .unwrap();
    let b_feed = db
        .add_feed_for_user("B", "https://b.example.com/rss", bob.id)
        .await
        .unwrap();

    db.insert_post_if_absent(&post(a_feed.id, "a", Some(1)))
        .await
        .unwrap();
    db.insert_post_if_absent(&post(b_feed.id, "b", Some(2)))
        .await
        .unwrap();

    let alice_posts = db.get_posts_for_user(alice.id, 10).await.unwrap();
    assert_eq!(alice_posts.len(), 1);
    assert_eq!(alice_posts[0].feed_name, "A");
}

#[tokio::test]
async fn test_browse_orders_newest_first_undated_last() {
    let db = test_db().await;
    let user = db.create_user("alice").await.unwrap();
    let feed = db
        .add_feed_for_user("Blog", "https://example.com/rss", user.id)
        .await
        .unwrap();

    for (slug, at) in [("mid", Some(2_000)), ("undated", None), ("new", Some(3_000)), ("old", Some(1_000))] {
        db.insert_post_if_absent(&post(feed.id, slug, at))
            .await
            .unwrap();
    }

    let titles: Vec<String> = db
        .get_posts_for_user(user.id, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.title)
        .collect();
    assert_eq!(
        titles,
        vec!["Title new", "Title mid", "Title old", "Title undated"]
    );

    assert_eq!(db.get_posts_for_user(user.id, 2).await.unwrap().len(), 2);
}

// ============================================================================
// Posts
// ============================================================================

#[tokio::test]
async fn test_same_link_in_different_feeds_is_not_a_duplicate() {
    let db = test_db().await;
    let user = db.create_user("alice").await.unwrap();
    let f1 = db
        .add_feed_for_user("One", "https://one.example.com/rss", user.id)
        .await
        .unwrap();
    let f2 = db
        .add_feed_for_user("Two", "https://two.example.com/rss", user.id)
        .await
        .unwrap();

    assert!(db.insert_post_if_absent(&post(f1.id, "shared", None)).await.unwrap());
    assert!(db.insert_post_if_absent(&post(f2.id, "shared", None)).await.unwrap());
    assert!(!db.insert_post_if_absent(&post(f1.id, "shared", None)).await.unwrap());
}

#[tokio::test]
async fn test_post_for_missing_feed_is_an_error() {
    let db = test_db().await;
    assert!(db.insert_post_if_absent(&post(999, "x", None)).await.is_err());
}

// ============================================================================
// Reset
// ============================================================================

#[tokio::test]
async fn test_reset_cascades_to_everything() {
    let db = test_db().await;
    let user = db.create_user("alice").await.unwrap();
    let feed = db
        .add_feed_for_user("Blog", "https://example.com/rss", user.id)
        .await
        .unwrap();
    db.insert_post_if_absent(&post(feed.id, "a", None))
        .await
        .unwrap();

    assert_eq!(db.reset().await.unwrap(), 1);

    assert!(db.get_users().await.unwrap().is_empty());
    assert!(db.get_feeds().await.unwrap().is_empty());
    assert!(db.get_posts_for_feed(feed.id).await.unwrap().is_empty());
    assert!(db.claim_next_feed(0).await.unwrap().is_none());

    // Names are free again
    db.create_user("alice").await.unwrap();
}

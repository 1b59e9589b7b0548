use async_trait::async_trait;

use super::schema::Database;
use super::types::{DatabaseError, Feed, NewPost};

/// The storage contract the poller needs, and nothing more.
///
/// Implementations must make `insert_post_if_absent` idempotent on the
/// `(feed_id, url)` key: a duplicate returns `Ok(false)`, never an error.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Atomically pick the feed with the oldest `last_fetched_at` (never-fetched
    /// first, ties by creation order) and set its `last_fetched_at` to `now`.
    /// `None` if there are no feeds at all.
    ///
    /// Concurrent callers sharing one database must never receive the same
    /// feed for the same round.
    async fn claim_next_feed(&self, now: i64) -> Result<Option<Feed>, DatabaseError>;

    /// Unconditionally set the feed's `last_fetched_at` to `at` (epoch millis).
    async fn mark_fetched(&self, feed_id: i64, at: i64) -> Result<(), DatabaseError>;

    /// Store the post unless its dedup key already exists. Returns whether a row was inserted.
    async fn insert_post_if_absent(&self, post: &NewPost) -> Result<bool, DatabaseError>;
}

#[async_trait]
impl FeedStore for Database {
    async fn claim_next_feed(&self, now: i64) -> Result<Option<Feed>, DatabaseError> {
        self.claim_next_feed_to_fetch(now).await
    }

    async fn mark_fetched(&self, feed_id: i64, at: i64) -> Result<(), DatabaseError> {
        self.mark_feed_fetched(feed_id, at).await
    }

    async fn insert_post_if_absent(&self, post: &NewPost) -> Result<bool, DatabaseError> {
        self.create_post(post).await
    }
}

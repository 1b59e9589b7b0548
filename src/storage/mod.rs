mod feeds;
mod posts;
mod schema;
mod store;
mod types;
mod users;

pub use schema::Database;
pub use store::FeedStore;
pub use types::{DatabaseError, Feed, FeedWithOwner, NewPost, Post, PostWithFeed, User};

/// Current time as Unix epoch milliseconds, the unit of every `*_at` column
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

use super::schema::Database;
use super::types::{DatabaseError, NewPost, Post, PostWithFeed};

/// Maximum number of posts any single `browse` query returns (OOM protection)
const MAX_POSTS: i64 = 2000;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post unless one with the same `(feed_id, url)` already exists.
    ///
    /// Returns `true` if a row was inserted, `false` if the post was a duplicate.
    /// A duplicate is not an error: the UNIQUE index absorbs it via `ON CONFLICT DO NOTHING`.
    pub async fn create_post(&self, post: &NewPost) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            INSERT INTO posts (feed_id, title, url, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_id, url) DO NOTHING
        "#,
        )
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(post.created_at)
        .bind(post.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All posts of one feed, in insertion order
    pub async fn get_posts_for_feed(&self, feed_id: i64) -> Result<Vec<Post>, DatabaseError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, feed_id, title, url, description, published_at, created_at, updated_at
            FROM posts
            WHERE feed_id = ?
            ORDER BY id
        "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    /// Newest posts from the feeds a user follows.
    ///
    /// Posts without a publish date sort after dated ones.
    pub async fn get_posts_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<PostWithFeed>, DatabaseError> {
        let limit = limit.clamp(0, MAX_POSTS);
        let posts = sqlx::query_as::<_, PostWithFeed>(
            r#"
            SELECT p.id, p.title, p.url, p.description, p.published_at, f.name AS feed_name
            FROM posts p
            JOIN feeds f ON f.id = p.feed_id
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC NULLS LAST, p.id DESC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }
}

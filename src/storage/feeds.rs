use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedWithOwner};

const FEED_COLUMNS: &str = "id, name, url, user_id, created_at, updated_at, last_fetched_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Look up a feed by its URL
    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// All feeds with the name of the user who added them, in creation order
    pub async fn get_feeds(&self) -> Result<Vec<FeedWithOwner>, DatabaseError> {
        let feeds = sqlx::query_as::<_, FeedWithOwner>(
            r#"
                SELECT f.id, f.name, f.url, u.name AS owner_name, f.last_fetched_at
                FROM feeds f
                JOIN users u ON u.id = f.user_id
                ORDER BY f.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// Claim the feed due next and stamp it fetched at `now`, in one statement.
    ///
    /// Due next means oldest `last_fetched_at` first, never-fetched feeds
    /// before all others, ties broken by creation order. The select and the
    /// update share a single write statement, so two pollers on the same
    /// database file never claim the same feed for the same round.
    pub async fn claim_next_feed_to_fetch(&self, now: i64) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            "UPDATE feeds SET last_fetched_at = ?, updated_at = ?
             WHERE id = (
                 SELECT id FROM feeds
                 ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
                 LIMIT 1
             )
             RETURNING {FEED_COLUMNS}"
        ))
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Set `last_fetched_at` unconditionally.
    ///
    /// # Errors
    ///
    /// `DatabaseError::NotFound` if no feed has this ID.
    pub async fn mark_feed_fetched(&self, feed_id: i64, at: i64) -> Result<(), DatabaseError> {
        let result =
            sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
                .bind(at)
                .bind(at)
                .bind(feed_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Feed {}", feed_id)));
        }
        Ok(())
    }

    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Create a feed and have its owner follow it, in one transaction
    pub async fn add_feed_for_user(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
    ) -> Result<Feed, DatabaseError> {
        let now = super::now_millis();
        let mut tx = self.pool.begin().await?;

        let feed = sqlx::query_as::<_, Feed>(&format!(
            "INSERT INTO feeds (name, url, user_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {FEED_COLUMNS}"
        ))
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DatabaseError::unique_or(e, format!("Feed '{}'", url)))?;

        sqlx::query(
            "INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(feed.id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(feed)
    }
}

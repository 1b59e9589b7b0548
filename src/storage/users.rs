use super::schema::Database;
use super::types::{DatabaseError, User};

impl Database {
    // ========================================================================
    // User Operations
    // ========================================================================

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// `DatabaseError::AlreadyExists` if the name is taken.
    pub async fn create_user(&self, name: &str) -> Result<User, DatabaseError> {
        let now = super::now_millis();
        sqlx::query_as::<_, User>(
            "INSERT INTO users (name, created_at, updated_at) VALUES (?, ?, ?)
             RETURNING id, name, created_at, updated_at",
        )
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::unique_or(e, format!("User '{}'", name)))
    }

    /// Look up a user by name
    pub async fn get_user(&self, name: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, created_at, updated_at FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// All users, in registration order
    pub async fn get_users(&self) -> Result<Vec<User>, DatabaseError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, name, created_at, updated_at FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Delete every user. Feeds, follows, and posts go with them (ON DELETE CASCADE).
    ///
    /// Returns the number of users removed.
    pub async fn reset(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

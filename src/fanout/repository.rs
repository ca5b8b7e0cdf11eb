//! Shared-store repositories for the fanout pipeline.

use chrono::{DateTime, Utc};

use crate::db::{parse_datetime, DbPool};
use crate::{FeedwatchError, Result};

/// An article row for the shared store.
#[derive(Debug, Clone)]
pub struct ArticleRecord {
    /// Content-addressed key (hash of the stable feed identifier).
    pub content_hash: String,
    /// Stable feed identifier (guid or link).
    pub guid: String,
    /// Article title.
    pub title: String,
    /// Article body.
    pub body: Option<String>,
    /// Link to the original article.
    pub link: Option<String>,
    /// When the article was published.
    pub published_at: Option<DateTime<Utc>>,
    /// Locator of the source the article came from.
    pub source_locator: String,
}

/// Repository for the content-addressed article store.
pub struct ArticleRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ArticleRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Existence check for a content key — the fanout dedup test.
    pub async fn exists(&self, content_hash: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM articles WHERE content_hash = $1)")
                .bind(content_hash)
                .fetch_one(self.pool)
                .await
                .map_err(|e| FeedwatchError::Database(e.to_string()))?;
        Ok(exists)
    }

    /// Insert an article unless its content key is already present.
    ///
    /// Returns whether a row was inserted.
    pub async fn insert_if_absent(&self, record: &ArticleRecord) -> Result<bool> {
        let published_at = record.published_at.map(|dt| dt.to_rfc3339());

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO articles
                (content_hash, guid, title, body, link, published_at, source_locator)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.content_hash)
        .bind(&record.guid)
        .bind(&record.title)
        .bind(&record.body)
        .bind(&record.link)
        .bind(&published_at)
        .bind(&record.source_locator)
        .execute(self.pool)
        .await
        .map_err(|e| FeedwatchError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

/// Repository for subscriptions and device tokens.
pub struct SubscriptionRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Subscribe a user to a source.
    pub async fn subscribe(&self, user_id: i64, source_locator: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO subscriptions (user_id, source_locator) VALUES ($1, $2)")
            .bind(user_id)
            .bind(source_locator)
            .execute(self.pool)
            .await
            .map_err(|e| FeedwatchError::Database(e.to_string()))?;
        Ok(())
    }

    /// Remove a user's subscription to a source.
    pub async fn unsubscribe(&self, user_id: i64, source_locator: &str) -> Result<()> {
        sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND source_locator = $2")
            .bind(user_id)
            .bind(source_locator)
            .execute(self.pool)
            .await
            .map_err(|e| FeedwatchError::Database(e.to_string()))?;
        Ok(())
    }

    /// All users subscribed to a source.
    pub async fn subscribers_of(&self, source_locator: &str) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT user_id FROM subscriptions WHERE source_locator = $1 ORDER BY user_id",
        )
        .bind(source_locator)
        .fetch_all(self.pool)
        .await
        .map_err(|e| FeedwatchError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Register a device token for a user.
    pub async fn add_device_token(&self, user_id: i64, token: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO device_tokens (user_id, token) VALUES ($1, $2)")
            .bind(user_id)
            .bind(token)
            .execute(self.pool)
            .await
            .map_err(|e| FeedwatchError::Database(e.to_string()))?;
        Ok(())
    }

    /// Collect device tokens for a set of users.
    pub async fn tokens_for_users(&self, user_ids: &[i64]) -> Result<Vec<String>> {
        let mut tokens = Vec::new();
        for user_id in user_ids {
            let rows: Vec<(String,)> =
                sqlx::query_as("SELECT token FROM device_tokens WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_all(self.pool)
                    .await
                    .map_err(|e| FeedwatchError::Database(e.to_string()))?;
            tokens.extend(rows.into_iter().map(|(t,)| t));
        }
        Ok(tokens)
    }
}

/// A per-user notification row.
#[derive(Debug, Clone)]
pub struct UserNotification {
    /// Record id.
    pub id: String,
    /// Owning user.
    pub user_id: i64,
    /// Content key of the underlying article.
    pub article_hash: String,
    /// Notification title.
    pub title: String,
    /// Notification message.
    pub message: Option<String>,
    /// Source display name.
    pub source_name: String,
    /// Display category.
    pub category: String,
    /// Whether the user has read it.
    pub is_read: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// Row type for a user notification from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct UserNotificationRow {
    id: String,
    user_id: i64,
    article_hash: String,
    title: String,
    message: Option<String>,
    source_name: String,
    category: String,
    is_read: bool,
    created_at: String,
}

impl From<UserNotificationRow> for UserNotification {
    fn from(row: UserNotificationRow) -> Self {
        UserNotification {
            id: row.id,
            user_id: row.user_id,
            article_hash: row.article_hash,
            title: row.title,
            message: row.message,
            source_name: row.source_name,
            category: row.category,
            is_read: row.is_read,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Repository for per-user notification records.
pub struct UserNotificationRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> UserNotificationRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Append a notification record for one user.
    pub async fn append(
        &self,
        id: &str,
        user_id: i64,
        article_hash: &str,
        title: &str,
        message: Option<&str>,
        source_name: &str,
        category: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_notifications
                (id, user_id, article_hash, title, message, source_name, category)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(article_hash)
        .bind(title)
        .bind(message)
        .bind(source_name)
        .bind(category)
        .execute(self.pool)
        .await
        .map_err(|e| FeedwatchError::Database(e.to_string()))?;
        Ok(())
    }

    /// List a user's notifications, newest first.
    pub async fn list_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<UserNotification>> {
        let rows = sqlx::query_as::<_, UserNotificationRow>(
            r#"
            SELECT id, user_id, article_hash, title, message, source_name, category,
                   is_read, created_at
            FROM user_notifications
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(self.pool)
        .await
        .map_err(|e| FeedwatchError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(UserNotification::from).collect())
    }

    /// Mark a notification read.
    pub async fn mark_read(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE user_notifications SET is_read = 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| FeedwatchError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Unread count for a user.
    pub async fn unread_count(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_notifications WHERE user_id = $1 AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| FeedwatchError::Database(e.to_string()))?;
        Ok(count)
    }
}

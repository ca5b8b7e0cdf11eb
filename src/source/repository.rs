//! Source repository for feedwatch.

use chrono::Utc;

use super::types::{NewSource, Source, SourceKind};
use crate::db::{parse_datetime, DbPool, SQL_FALSE, SQL_TRUE};
use crate::{FeedwatchError, Result};

/// Row type for a source from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SourceRow {
    id: i64,
    display_name: String,
    kind: String,
    locator: String,
    is_active: bool,
    created_at: String,
}

impl From<SourceRow> for Source {
    fn from(row: SourceRow) -> Self {
        Source {
            id: row.id,
            display_name: row.display_name,
            kind: SourceKind::parse(&row.kind).unwrap_or(SourceKind::Feed),
            locator: row.locator,
            is_active: row.is_active,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Repository for subscribed sources.
pub struct SourceRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SourceRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new source.
    pub async fn create(&self, source: &NewSource) -> Result<Source> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sources (display_name, kind, locator)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&source.display_name)
        .bind(source.kind.as_str())
        .bind(&source.locator)
        .fetch_one(self.pool)
        .await
        .map_err(|e| FeedwatchError::Database(e.to_string()))?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| FeedwatchError::NotFound("source".into()))
    }

    /// Get a source by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, display_name, kind, locator, is_active, created_at
            FROM sources
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| FeedwatchError::Database(e.to_string()))?;

        Ok(row.map(Source::from))
    }

    /// Get a source by locator.
    pub async fn get_by_locator(&self, locator: &str) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, display_name, kind, locator, is_active, created_at
            FROM sources
            WHERE locator = $1
            "#,
        )
        .bind(locator)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| FeedwatchError::Database(e.to_string()))?;

        Ok(row.map(Source::from))
    }

    /// List all active sources (in subscription order).
    pub async fn list_active(&self) -> Result<Vec<Source>> {
        let query = format!(
            r#"
            SELECT id, display_name, kind, locator, is_active, created_at
            FROM sources
            WHERE is_active = {}
            ORDER BY id ASC
            "#,
            SQL_TRUE
        );

        let rows = sqlx::query_as::<_, SourceRow>(&query)
            .fetch_all(self.pool)
            .await
            .map_err(|e| FeedwatchError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Source::from).collect())
    }

    /// Deactivate a source (it is no longer polled; its watermark is kept).
    pub async fn deactivate(&self, id: i64) -> Result<()> {
        let query = format!("UPDATE sources SET is_active = {} WHERE id = $1", SQL_FALSE);
        sqlx::query(&query)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| FeedwatchError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a source and its watermark.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let source = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| FeedwatchError::NotFound("source".into()))?;

        sqlx::query("DELETE FROM watermarks WHERE source_key = $1")
            .bind(&source.locator)
            .execute(self.pool)
            .await
            .map_err(|e| FeedwatchError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM sources WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| FeedwatchError::Database(e.to_string()))?;

        Ok(())
    }
}

//! Watermark persistence for feedwatch.

use chrono::Utc;

use super::{Cursor, Watermark};
use crate::db::{parse_datetime, DbPool};
use crate::source::SourceKind;
use crate::{FeedwatchError, Result};

/// Row type for a watermark from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct WatermarkRow {
    source_key: String,
    kind: String,
    cursor: String,
    updated_at: String,
}

impl WatermarkRow {
    fn into_watermark(self) -> Option<Watermark> {
        let kind = SourceKind::parse(&self.kind)?;
        let cursor = Cursor::decode(kind, &self.cursor)?;
        Some(Watermark {
            source_key: self.source_key,
            kind,
            cursor,
            updated_at: parse_datetime(&self.updated_at).unwrap_or_else(Utc::now),
        })
    }
}

/// Repository for per-source watermarks.
///
/// Callers never mutate cursors directly; [`advance`](Self::advance)
/// enforces the monotonic non-decreasing invariant.
pub struct WatermarkRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> WatermarkRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Get the watermark for a source, if one exists.
    pub async fn get(&self, source_key: &str) -> Result<Option<Watermark>> {
        let row = sqlx::query_as::<_, WatermarkRow>(
            r#"
            SELECT source_key, kind, cursor, updated_at
            FROM watermarks
            WHERE source_key = $1
            "#,
        )
        .bind(source_key)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| FeedwatchError::Database(e.to_string()))?;

        Ok(row.and_then(WatermarkRow::into_watermark))
    }

    /// Advance the watermark for a source.
    ///
    /// Creates the row on first call. A cursor that is not strictly after
    /// the stored one is ignored, keeping the cursor monotonically
    /// non-decreasing. Returns whether the cursor moved.
    pub async fn advance(
        &self,
        source_key: &str,
        kind: SourceKind,
        cursor: &Cursor,
    ) -> Result<bool> {
        // Per-source updates are serialized by the pass, so read-modify-write
        // is race-free here.
        if let Some(existing) = self.get(source_key).await? {
            if !cursor.is_after(&existing.cursor) {
                return Ok(false);
            }
        }

        sqlx::query(
            r#"
            INSERT INTO watermarks (source_key, kind, cursor, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (source_key) DO UPDATE
            SET cursor = excluded.cursor, updated_at = excluded.updated_at
            "#,
        )
        .bind(source_key)
        .bind(kind.as_str())
        .bind(cursor.encode())
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool)
        .await
        .map_err(|e| FeedwatchError::Database(e.to_string()))?;

        Ok(true)
    }

    /// Delete the watermark for a source (used when unsubscribing).
    pub async fn delete(&self, source_key: &str) -> Result<()> {
        sqlx::query("DELETE FROM watermarks WHERE source_key = $1")
            .bind(source_key)
            .execute(self.pool)
            .await
            .map_err(|e| FeedwatchError::Database(e.to_string()))?;
        Ok(())
    }
}

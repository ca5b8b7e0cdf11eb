//! Persisted scheduler state.
//!
//! The only state that must survive across independently scheduled runs.
//! It is carried as explicit input to each run rather than held in process
//! memory, because the process may not persist between runs.

use crate::config::PollConfig;
use crate::db::DbPool;
use crate::{FeedwatchError, Result};

/// State carried across scheduled runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySchedulerState {
    /// Consecutive failed attempts so far.
    pub attempt_count: u32,
    /// Normal polling cadence in minutes.
    pub base_interval_mins: u64,
}

impl RetrySchedulerState {
    /// Fresh state at the given cadence.
    pub fn new(base_interval_mins: u64) -> Self {
        Self {
            attempt_count: 0,
            base_interval_mins,
        }
    }
}

/// Compute the state for the next run and the delay until it, in minutes.
///
/// - Success (no fetch errors, new items or not): attempts reset, base
///   cadence.
/// - Failure under the attempt cap: backoff delay for the current attempt,
///   attempts incremented.
/// - Failure at the cap: attempts reset and base cadence anyway; the chain
///   never gives up permanently.
pub fn next_state(
    success: bool,
    state: RetrySchedulerState,
    config: &PollConfig,
) -> (RetrySchedulerState, u64) {
    if success {
        return (
            RetrySchedulerState {
                attempt_count: 0,
                ..state
            },
            state.base_interval_mins,
        );
    }

    if state.attempt_count < config.effective_max_attempts() {
        let delay = config.backoff_for_attempt(state.attempt_count);
        (
            RetrySchedulerState {
                attempt_count: state.attempt_count + 1,
                ..state
            },
            delay,
        )
    } else {
        (
            RetrySchedulerState {
                attempt_count: 0,
                ..state
            },
            state.base_interval_mins,
        )
    }
}

/// Repository for the single-row scheduler state.
pub struct SchedulerStateRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SchedulerStateRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Load the persisted state, if any.
    pub async fn load(&self) -> Result<Option<RetrySchedulerState>> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT attempt_count, base_interval_mins FROM scheduler_state WHERE id = 1",
        )
        .fetch_optional(self.pool)
        .await
        .map_err(|e| FeedwatchError::Database(e.to_string()))?;

        Ok(row.map(|(attempts, base)| RetrySchedulerState {
            attempt_count: attempts.max(0) as u32,
            base_interval_mins: base.max(1) as u64,
        }))
    }

    /// Persist the state for the next run.
    pub async fn save(&self, state: RetrySchedulerState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduler_state (id, attempt_count, base_interval_mins, updated_at)
            VALUES (1, $1, $2, datetime('now'))
            ON CONFLICT (id) DO UPDATE
            SET attempt_count = excluded.attempt_count,
                base_interval_mins = excluded.base_interval_mins,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(state.attempt_count as i64)
        .bind(state.base_interval_mins as i64)
        .execute(self.pool)
        .await
        .map_err(|e| FeedwatchError::Database(e.to_string()))?;
        Ok(())
    }
}

//! Self-rescheduling retry/backoff scheduler for feedwatch.
//!
//! The host's recurring-task primitives cannot express a short cadence, so
//! the scheduler owns its own: a single deferred task that, on completion,
//! schedules its own successor. Success re-arms at the base interval;
//! failures walk the backoff schedule and then return to base. State that
//! must survive process death travels through [`SchedulerStateRepository`],
//! not process memory.

mod state;

pub use state::{next_state, RetrySchedulerState, SchedulerStateRepository};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::db::Database;
use crate::poll::{PassOutcome, PollService};
use crate::Result;

/// Externally visible scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    /// Not started, or stopped.
    Idle,
    /// A fetch pass is in flight.
    Running,
    /// Armed; the next run fires at the given time.
    Armed(DateTime<Utc>),
}

/// Chain bookkeeping guarded by a sync mutex (never held across await).
#[derive(Default)]
struct ChainState {
    /// Bumped on every re-arm and on stop; stale tasks see the mismatch
    /// and step aside (single-flight).
    generation: u64,
    running: bool,
    next_run_at: Option<DateTime<Utc>>,
    pending: Option<JoinHandle<()>>,
}

struct SchedulerInner {
    db: Arc<Database>,
    service: Arc<PollService>,
    config: PollConfig,
    chain: Mutex<ChainState>,
}

/// The polling scheduler.
pub struct PollScheduler {
    inner: Arc<SchedulerInner>,
}

impl PollScheduler {
    /// Create a scheduler over the given poll service.
    pub fn new(db: Arc<Database>, service: Arc<PollService>, config: PollConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                db,
                service,
                config,
                chain: Mutex::new(ChainState::default()),
            }),
        }
    }

    /// Start the chain at the given base interval.
    ///
    /// The first pass runs immediately. A persisted attempt count from a
    /// previous process survives the restart.
    pub async fn start(&self, interval_mins: u64) -> Result<()> {
        let repo = SchedulerStateRepository::new(self.inner.db.pool());
        let attempt_count = repo
            .load()
            .await?
            .map(|s| s.attempt_count)
            .unwrap_or(0);
        let state = RetrySchedulerState {
            attempt_count,
            base_interval_mins: interval_mins.max(1),
        };
        repo.save(state).await?;

        info!(
            "Scheduler started (base interval {} minute(s), {} carried attempt(s))",
            state.base_interval_mins, state.attempt_count
        );
        self.inner.arm(Duration::ZERO, None);
        Ok(())
    }

    /// Stop the chain and cancel any pending successor.
    pub fn stop(&self) {
        let mut chain = self.inner.chain.lock().expect("chain lock poisoned");
        chain.generation += 1;
        if let Some(pending) = chain.pending.take() {
            pending.abort();
        }
        chain.next_run_at = None;
        info!("Scheduler stopped");
    }

    /// Current scheduler status.
    pub fn status(&self) -> SchedulerStatus {
        let chain = self.inner.chain.lock().expect("chain lock poisoned");
        if chain.running {
            SchedulerStatus::Running
        } else if let Some(eta) = chain.next_run_at {
            SchedulerStatus::Armed(eta)
        } else {
            SchedulerStatus::Idle
        }
    }

    /// Run one pass immediately without disturbing the chain's timing.
    ///
    /// Shares the pass lock with the chained run, so watermark updates stay
    /// serialized; the pending successor and the persisted attempt count
    /// are left alone.
    pub async fn trigger_now(&self) -> PassOutcome {
        info!("Manual poll triggered");
        self.inner.service.run_pass().await
    }
}

impl SchedulerInner {
    /// Queue the next unit of work, replacing any pending successor.
    ///
    /// With `expected` set, the re-arm only happens if the chain generation
    /// is still the caller's — a stop or restart that landed in the
    /// meantime wins.
    fn arm(self: &Arc<Self>, delay: Duration, expected: Option<u64>) {
        let mut chain = self.chain.lock().expect("chain lock poisoned");
        if let Some(expected) = expected {
            if chain.generation != expected {
                return;
            }
        }
        chain.generation += 1;
        let generation = chain.generation;

        // Single-flight: at most one pending instance of this job
        if let Some(pending) = chain.pending.take() {
            pending.abort();
        }

        let eta = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        chain.next_run_at = Some(eta);

        let inner = Arc::clone(self);
        chain.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.run_chained(generation).await;
        }));

        debug!("Re-armed; next run at {}", eta.to_rfc3339());
    }

    /// One chained unit: run a pass, persist the carried state, re-arm.
    async fn run_chained(self: Arc<Self>, generation: u64) {
        {
            let mut chain = self.chain.lock().expect("chain lock poisoned");
            if chain.generation != generation {
                return; // replaced before we started
            }
            chain.pending = None;
            chain.running = true;
            chain.next_run_at = None;
        }

        let repo = SchedulerStateRepository::new(self.db.pool());
        let state = match repo.load().await {
            Ok(Some(state)) => state,
            Ok(None) => RetrySchedulerState::new(self.config.base_interval_mins),
            Err(e) => {
                warn!("Failed to load scheduler state: {}", e);
                RetrySchedulerState::new(self.config.base_interval_mins)
            }
        };

        let outcome = self.service.run_pass().await;

        let (next, delay_mins) = next_state(outcome.is_success(), state, &self.config);
        if let Err(e) = repo.save(next).await {
            warn!("Failed to persist scheduler state: {}", e);
        }

        if outcome.is_success() {
            debug!("Pass succeeded; next run in {} minute(s)", delay_mins);
        } else {
            warn!(
                "Pass had {} fetch failure(s); next run in {} minute(s) (attempt {})",
                outcome.failures.len(),
                delay_mins,
                next.attempt_count
            );
        }

        {
            let mut chain = self.chain.lock().expect("chain lock poisoned");
            chain.running = false;
        }

        // A stop or restart that happened mid-pass wins over the re-arm
        self.arm(Duration::from_secs(delay_mins * 60), Some(generation));
    }
}

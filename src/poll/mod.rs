//! One fetch pass over all subscribed sources.
//!
//! The pass walks every active source: fetch → normalize → dedup against
//! the watermark → categorize → sink (and fanout when enabled) → commit the
//! watermark. Per-source failures are isolated; the pass always completes.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::dedup::{filter_new, WatermarkRepository};
use crate::fanout::FanoutService;
use crate::fetch::Dispatcher;
use crate::notify::{NotificationHistory, NotificationSink};
use crate::source::{Source, SourceKind, SourceRepository};
use crate::Result;

/// A per-source failure recorded during a pass.
#[derive(Debug, Clone)]
pub struct PassFailure {
    /// Locator of the failing source.
    pub locator: String,
    /// Error description.
    pub error: String,
}

/// Outcome of one fetch pass.
#[derive(Debug, Default)]
pub struct PassOutcome {
    /// Sources actually polled.
    pub sources_polled: usize,
    /// Notifications accepted across all sources.
    pub new_items: usize,
    /// Transient fetch/network failures (drive the backoff chain).
    pub failures: Vec<PassFailure>,
    /// Sources whose payload was malformed (recoverable, no backoff).
    pub parse_errors: usize,
}

impl PassOutcome {
    /// A pass without fetch errors counts as succeeded, regardless of
    /// whether new items were found.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs fetch passes over the subscribed sources.
pub struct PollService {
    db: Arc<Database>,
    dispatcher: Dispatcher,
    sink: NotificationSink,
    fanout: Option<FanoutService>,
    first_run_limit: usize,
    concurrency: usize,
    // Serializes passes so per-source watermark updates never interleave,
    // even when trigger-now overlaps the chained run.
    pass_lock: tokio::sync::Mutex<()>,
}

impl PollService {
    /// Build the service from configuration.
    pub fn new(
        db: Arc<Database>,
        config: &Config,
        history: Arc<NotificationHistory>,
    ) -> Result<Self> {
        let dispatcher = Dispatcher::new(&config.fetch, &config.timeline, &config.notify)?;
        let sink = NotificationSink::new(history, config.notify.max_message_length);
        let fanout = if config.push.enabled {
            Some(FanoutService::new(db.clone(), &config.fetch, &config.push)?)
        } else {
            None
        };

        Ok(Self {
            db,
            dispatcher,
            sink,
            fanout,
            first_run_limit: config.notify.first_run_limit,
            concurrency: config.poll.concurrency.max(1),
            pass_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Run one full fetch pass over all active sources.
    pub async fn run_pass(&self) -> PassOutcome {
        let _guard = self.pass_lock.lock().await;

        let sources = match SourceRepository::new(self.db.pool()).list_active().await {
            Ok(sources) => sources,
            Err(e) => {
                warn!("Failed to list sources: {}", e);
                return PassOutcome {
                    failures: vec![PassFailure {
                        locator: "<sources>".to_string(),
                        error: e.to_string(),
                    }],
                    ..PassOutcome::default()
                };
            }
        };

        if sources.is_empty() {
            debug!("No active sources to poll");
            return PassOutcome::default();
        }

        // Configuration absence: timeline sources are skipped for the run,
        // logged once.
        let timeline_ok = self.dispatcher.timeline_configured();
        if !timeline_ok && sources.iter().any(|s| s.kind == SourceKind::Timeline) {
            info!("No timeline credential configured; skipping timeline sources this run");
        }
        let eligible: Vec<Source> = sources
            .into_iter()
            .filter(|s| s.kind == SourceKind::Feed || timeline_ok)
            .collect();

        info!("Polling {} source(s)", eligible.len());

        let results: Vec<SourceResult> = if self.concurrency <= 1 {
            let mut results = Vec::with_capacity(eligible.len());
            for source in &eligible {
                results.push(self.poll_source(source).await);
            }
            results
        } else {
            let futures: Vec<
                std::pin::Pin<Box<dyn std::future::Future<Output = SourceResult> + Send + '_>>,
            > = eligible
                .iter()
                .map(|source| Box::pin(self.poll_source(source)) as _)
                .collect();
            stream::iter(futures)
                .buffer_unordered(self.concurrency)
                .collect()
                .await
        };

        let mut outcome = PassOutcome {
            sources_polled: eligible.len(),
            ..PassOutcome::default()
        };
        for result in results {
            match result {
                SourceResult::NewItems(count) => outcome.new_items += count,
                SourceResult::ParseError => outcome.parse_errors += 1,
                SourceResult::FetchFailure(failure) => outcome.failures.push(failure),
            }
        }

        info!(
            "Pass complete: {} source(s), {} new item(s), {} failure(s)",
            outcome.sources_polled,
            outcome.new_items,
            outcome.failures.len()
        );

        outcome
    }

    /// Poll one source; errors are folded into the result, never propagated.
    async fn poll_source(&self, source: &Source) -> SourceResult {
        match self.poll_source_inner(source).await {
            Ok(count) => {
                if count > 0 {
                    info!("{}: {} new item(s)", source.display_name, count);
                } else {
                    debug!("{}: no new items", source.display_name);
                }
                SourceResult::NewItems(count)
            }
            Err(e) if e.is_fetch_failure() => {
                warn!("Failed to fetch {}: {}", source.locator, e);
                SourceResult::FetchFailure(PassFailure {
                    locator: source.locator.clone(),
                    error: e.to_string(),
                })
            }
            Err(e) => {
                // Malformed payload or storage trouble: diagnostic only, the
                // source yields nothing this run
                warn!("Skipping {} this run: {}", source.locator, e);
                SourceResult::ParseError
            }
        }
    }

    /// Fetch, dedup, deliver, then commit the watermark.
    ///
    /// The watermark is committed after delivery: a run cancelled in
    /// between re-fetches and re-emits (at-least-once), and insertion
    /// idempotence absorbs the duplicates.
    async fn poll_source_inner(&self, source: &Source) -> crate::Result<usize> {
        let articles = self.dispatcher.fetch_source(source).await?;

        let watermark_repo = WatermarkRepository::new(self.db.pool());
        let watermark = watermark_repo.get(&source.locator).await?;

        let outcome = filter_new(
            articles,
            source.kind,
            watermark.as_ref().map(|w| &w.cursor),
            self.first_run_limit,
        );

        let accepted = self.sink.deliver(&source.locator, &outcome.new_articles);

        if let Some(fanout) = &self.fanout {
            // Best effort; fanout failures never block the watermark
            fanout
                .process_articles(&source.locator, &outcome.new_articles)
                .await;
        }

        if let Some(cursor) = outcome.advanced_cursor {
            watermark_repo
                .advance(&source.locator, source.kind, &cursor)
                .await?;
        }

        Ok(accepted)
    }
}

/// Result of polling one source.
enum SourceResult {
    NewItems(usize),
    ParseError,
    FetchFailure(PassFailure),
}

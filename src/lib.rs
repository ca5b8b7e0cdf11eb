//! feedwatch - feed and timeline polling pipeline
//!
//! Polls subscribed content sources on a self-managed cadence, filters
//! already-seen items with per-source watermarks, and delivers the rest as
//! notifications — device-local or fanned out to subscribed users.

pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod fanout;
pub mod fetch;
pub mod logging;
pub mod notify;
pub mod parser;
pub mod poll;
pub mod sched;
pub mod source;

pub use config::Config;
pub use db::Database;
pub use dedup::{filter_new, Cursor, FilterOutcome, Watermark, WatermarkRepository};
pub use error::{FeedwatchError, Result};
pub use fanout::{content_hash, FanoutService};
pub use fetch::{Dispatcher, FeedFetcher, TimelineClient};
pub use notify::{
    classify, notification_id, Category, HistoryEvent, Notification, NotificationHistory,
    NotificationSink,
};
pub use parser::{derive_source_name, strip_markup, Article, FeedParser};
pub use poll::{PassOutcome, PollService};
pub use sched::{PollScheduler, RetrySchedulerState, SchedulerStatus};
pub use source::{NewSource, Source, SourceKind, SourceRepository};

//! Notification pipeline stage for feedwatch.

mod categorize;
mod history;
mod sink;
mod types;

pub use categorize::classify;
pub use history::{HistoryEvent, NotificationHistory};
pub use sink::{notification_id, NotificationSink};
pub use types::{Category, Notification};

//! Notification sink for feedwatch.
//!
//! Converts new articles into notification records and inserts them into
//! the bounded history. Delivery to the platform is the subscriber's job;
//! the sink only decides that and what to deliver.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::categorize::classify;
use super::history::NotificationHistory;
use super::types::Notification;
use crate::parser::Article;

/// Deterministic notification id for an item of a source.
///
/// Content-derived so that re-delivery of the same item under at-least-once
/// semantics maps to the same id and is dropped at insertion.
pub fn notification_id(source_key: &str, external_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_key.as_bytes());
    hasher.update(b"\n");
    hasher.update(external_id.as_bytes());
    let digest = hasher.finalize();
    // 16 bytes of the digest is plenty for an id
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

/// Converts new articles into history entries.
pub struct NotificationSink {
    history: Arc<NotificationHistory>,
    max_message_length: usize,
}

impl NotificationSink {
    /// Create a sink writing to the given history.
    pub fn new(history: Arc<NotificationHistory>, max_message_length: usize) -> Self {
        Self {
            history,
            max_message_length,
        }
    }

    /// Convert and insert new articles for a source.
    ///
    /// Returns how many notifications were accepted (duplicates are dropped
    /// by the history).
    pub fn deliver(&self, source_key: &str, articles: &[Article]) -> usize {
        let mut accepted = 0;
        for article in articles {
            let notification = self.build(source_key, article);
            if self.history.insert(notification) {
                accepted += 1;
            } else {
                debug!(
                    "Duplicate notification for {} from {}, dropped",
                    article.external_id, source_key
                );
            }
        }
        accepted
    }

    /// Build the notification record for one article.
    fn build(&self, source_key: &str, article: &Article) -> Notification {
        let message = if article.body.is_empty() {
            article.title.clone()
        } else {
            truncate(&article.body, self.max_message_length)
        };

        Notification {
            id: notification_id(source_key, &article.external_id),
            title: article.title.clone(),
            message,
            source_name: article.source_display_name.clone(),
            timestamp: article.published_at,
            is_read: false,
            is_saved: false,
            is_breaking: article.is_breaking,
            category: classify(&article.source_display_name, article.is_breaking),
        }
    }
}

/// Truncate text to a maximum number of characters.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

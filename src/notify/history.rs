//! Bounded notification history for feedwatch.
//!
//! Newest-first, capped collection with oldest-first eviction. Mutations go
//! through explicit operations only, and every accepted mutation is
//! published on a broadcast channel for external collaborators (the UI, a
//! platform notifier). Publishing never blocks on subscriber presence.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::broadcast;

use super::types::Notification;

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A change to the notification history.
#[derive(Debug, Clone)]
pub enum HistoryEvent {
    /// A new notification was accepted.
    Inserted(Notification),
    /// A notification was marked read.
    Read(String),
    /// A notification was marked saved.
    Saved(String),
    /// A notification was deleted.
    Deleted(String),
    /// The history was cleared.
    Cleared,
}

/// Bounded, newest-first notification history.
pub struct NotificationHistory {
    cap: usize,
    inner: Mutex<VecDeque<Notification>>,
    events: broadcast::Sender<HistoryEvent>,
}

impl NotificationHistory {
    /// Create a history with the given capacity.
    pub fn new(cap: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            cap: cap.max(1),
            inner: Mutex::new(VecDeque::new()),
            events,
        }
    }

    /// Subscribe to history change events.
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    /// Insert a notification at the front.
    ///
    /// Inserting an id that already exists is a no-op (idempotent under
    /// at-least-once re-delivery). Returns whether the notification was
    /// accepted. When the cap is exceeded the oldest entry is evicted.
    pub fn insert(&self, notification: Notification) -> bool {
        {
            let mut inner = self.inner.lock().expect("history lock poisoned");
            if inner.iter().any(|n| n.id == notification.id) {
                return false;
            }
            inner.push_front(notification.clone());
            while inner.len() > self.cap {
                inner.pop_back();
            }
        }
        self.publish(HistoryEvent::Inserted(notification));
        true
    }

    /// Snapshot of the history, newest first.
    pub fn snapshot(&self) -> Vec<Notification> {
        let inner = self.inner.lock().expect("history lock poisoned");
        inner.iter().cloned().collect()
    }

    /// Number of retained notifications.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("history lock poisoned").len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of unread notifications.
    pub fn unread_count(&self) -> usize {
        let inner = self.inner.lock().expect("history lock poisoned");
        inner.iter().filter(|n| !n.is_read).count()
    }

    /// Mark a notification read. Returns whether it existed.
    pub fn mark_read(&self, id: &str) -> bool {
        let found = {
            let mut inner = self.inner.lock().expect("history lock poisoned");
            match inner.iter_mut().find(|n| n.id == id) {
                Some(n) => {
                    n.is_read = true;
                    true
                }
                None => false,
            }
        };
        if found {
            self.publish(HistoryEvent::Read(id.to_string()));
        }
        found
    }

    /// Mark a notification saved. Returns whether it existed.
    pub fn mark_saved(&self, id: &str) -> bool {
        let found = {
            let mut inner = self.inner.lock().expect("history lock poisoned");
            match inner.iter_mut().find(|n| n.id == id) {
                Some(n) => {
                    n.is_saved = true;
                    true
                }
                None => false,
            }
        };
        if found {
            self.publish(HistoryEvent::Saved(id.to_string()));
        }
        found
    }

    /// Delete a notification. Returns whether it existed.
    pub fn delete(&self, id: &str) -> bool {
        let found = {
            let mut inner = self.inner.lock().expect("history lock poisoned");
            let before = inner.len();
            inner.retain(|n| n.id != id);
            inner.len() != before
        };
        if found {
            self.publish(HistoryEvent::Deleted(id.to_string()));
        }
        found
    }

    /// Remove all notifications.
    pub fn clear_all(&self) {
        {
            let mut inner = self.inner.lock().expect("history lock poisoned");
            inner.clear();
        }
        self.publish(HistoryEvent::Cleared);
    }

    /// Publish an event; a missing subscriber is not an error.
    fn publish(&self, event: HistoryEvent) {
        let _ = self.events.send(event);
    }
}

//! Notification types for feedwatch.

use chrono::{DateTime, Utc};

/// Display category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Breaking news (explicit flag).
    Breaking,
    /// Financial sources.
    Financial,
    /// Social / timeline sources.
    Social,
    /// General news sources.
    News,
    /// Everything else.
    Other,
}

impl Category {
    /// String form stored in the database and shown to collaborators.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Breaking => "breaking",
            Category::Financial => "financial",
            Category::Social => "social",
            Category::News => "news",
            Category::Other => "other",
        }
    }

    /// Parse from the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "breaking" => Some(Category::Breaking),
            "financial" => Some(Category::Financial),
            "social" => Some(Category::Social),
            "news" => Some(Category::News),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivered notification.
///
/// `id` is unique and immutable; the read/saved flags are mutated only via
/// the history's explicit operations.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Unique, immutable identifier (content-derived, so re-delivery of the
    /// same item produces the same id).
    pub id: String,
    /// Notification title.
    pub title: String,
    /// Notification message body.
    pub message: String,
    /// Display name of the originating source.
    pub source_name: String,
    /// Publish time of the underlying item.
    pub timestamp: DateTime<Utc>,
    /// Whether the user has read the notification.
    pub is_read: bool,
    /// Whether the user has saved the notification.
    pub is_saved: bool,
    /// Whether the item looked like breaking news.
    pub is_breaking: bool,
    /// Display category.
    pub category: Category,
}

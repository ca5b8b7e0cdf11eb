//! Source types for feedwatch.

use chrono::{DateTime, Utc};

/// Kind of a content source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Syndication feed fetched by URL.
    Feed,
    /// Social-timeline endpoint fetched by handle.
    Timeline,
}

impl SourceKind {
    /// String form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Feed => "feed",
            SourceKind::Timeline => "timeline",
        }
    }

    /// Parse from the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "feed" => Some(SourceKind::Feed),
            "timeline" => Some(SourceKind::Timeline),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscribed content source.
///
/// Owned by the subscription collaborator; the pipeline treats it as
/// read-only input per run.
#[derive(Debug, Clone)]
pub struct Source {
    /// Source ID.
    pub id: i64,
    /// Display name shown on notifications.
    pub display_name: String,
    /// Source kind.
    pub kind: SourceKind,
    /// Feed URL or timeline handle.
    pub locator: String,
    /// Whether the source is polled.
    pub is_active: bool,
    /// When the source was subscribed.
    pub created_at: DateTime<Utc>,
}

/// New source for creation.
#[derive(Debug, Clone)]
pub struct NewSource {
    /// Display name.
    pub display_name: String,
    /// Source kind.
    pub kind: SourceKind,
    /// Feed URL or timeline handle.
    pub locator: String,
}

impl NewSource {
    /// Create a new feed source.
    pub fn feed(display_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            kind: SourceKind::Feed,
            locator: url.into(),
        }
    }

    /// Create a new timeline source.
    pub fn timeline(display_name: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            kind: SourceKind::Timeline,
            locator: handle.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_roundtrip() {
        assert_eq!(SourceKind::parse("feed"), Some(SourceKind::Feed));
        assert_eq!(SourceKind::parse("timeline"), Some(SourceKind::Timeline));
        assert_eq!(SourceKind::parse("other"), None);
        assert_eq!(SourceKind::Feed.as_str(), "feed");
        assert_eq!(SourceKind::Timeline.as_str(), "timeline");
    }

    #[test]
    fn test_new_source_feed() {
        let source = NewSource::feed("Example News", "https://example.com/feed.xml");
        assert_eq!(source.display_name, "Example News");
        assert_eq!(source.kind, SourceKind::Feed);
        assert_eq!(source.locator, "https://example.com/feed.xml");
    }

    #[test]
    fn test_new_source_timeline() {
        let source = NewSource::timeline("Example Account", "example_handle");
        assert_eq!(source.kind, SourceKind::Timeline);
        assert_eq!(source.locator, "example_handle");
    }
}

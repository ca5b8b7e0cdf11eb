//! Watermark-based dedup engine for feedwatch.
//!
//! A watermark is the persisted cursor marking the newest item already
//! processed for a source. Items strictly newer than the cursor are "new";
//! ties are already seen. A quiet run leaves the cursor untouched.

mod repository;

pub use repository::WatermarkRepository;

use chrono::{DateTime, Utc};

use crate::parser::Article;
use crate::source::SourceKind;

/// Position cursor for one source.
///
/// Feed sources order by publish timestamp; timeline sources order by their
/// native identifier, compared numerically when both sides are numeric
/// (snowflake-style ids) and lexicographically otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Publish-time cursor for feed sources.
    Timestamp(DateTime<Utc>),
    /// Opaque last-seen identifier for timeline sources.
    External(String),
}

impl Cursor {
    /// Strictly-greater comparison. Mixed cursor kinds never compare as after.
    pub fn is_after(&self, other: &Cursor) -> bool {
        match (self, other) {
            (Cursor::Timestamp(a), Cursor::Timestamp(b)) => a > b,
            (Cursor::External(a), Cursor::External(b)) => {
                match (a.parse::<u128>(), b.parse::<u128>()) {
                    (Ok(na), Ok(nb)) => na > nb,
                    _ => a > b,
                }
            }
            _ => false,
        }
    }

    /// String form stored in the watermarks table.
    pub fn encode(&self) -> String {
        match self {
            Cursor::Timestamp(dt) => dt.to_rfc3339(),
            Cursor::External(id) => id.clone(),
        }
    }

    /// Decode the stored string form for the given source kind.
    pub fn decode(kind: SourceKind, s: &str) -> Option<Cursor> {
        match kind {
            SourceKind::Feed => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| Cursor::Timestamp(dt.with_timezone(&Utc))),
            SourceKind::Timeline => Some(Cursor::External(s.to_string())),
        }
    }
}

/// A persisted watermark row.
#[derive(Debug, Clone)]
pub struct Watermark {
    /// Source locator the cursor belongs to.
    pub source_key: String,
    /// Source kind, determining the cursor type.
    pub kind: SourceKind,
    /// Newest already-processed position.
    pub cursor: Cursor,
    /// When the cursor last advanced.
    pub updated_at: DateTime<Utc>,
}

/// The cursor position of one article under a source's native ordering.
pub fn cursor_for(article: &Article, kind: SourceKind) -> Cursor {
    match kind {
        SourceKind::Feed => Cursor::Timestamp(article.published_at),
        SourceKind::Timeline => Cursor::External(article.external_id.clone()),
    }
}

/// Result of filtering a fetched batch against a watermark.
#[derive(Debug)]
pub struct FilterOutcome {
    /// Articles not yet seen, in fetch order.
    pub new_articles: Vec<Article>,
    /// Cursor to persist, if the watermark should advance.
    pub advanced_cursor: Option<Cursor>,
}

/// Filter a fetched batch against the current watermark.
///
/// With a watermark present, items strictly after the cursor are new, and
/// the cursor advances only when at least one item passed. On a source's
/// first-ever fetch only the `first_run_limit` most recent items are
/// emitted, but the cursor is set to the maximum over the ENTIRE batch so
/// suppressed backlog items are never re-emitted later.
pub fn filter_new(
    articles: Vec<Article>,
    kind: SourceKind,
    current: Option<&Cursor>,
    first_run_limit: usize,
) -> FilterOutcome {
    if articles.is_empty() {
        return FilterOutcome {
            new_articles: Vec::new(),
            advanced_cursor: None,
        };
    }

    let batch_max = articles
        .iter()
        .map(|a| cursor_for(a, kind))
        .reduce(|max, c| if c.is_after(&max) { c } else { max });

    match current {
        Some(cursor) => {
            let new_articles: Vec<Article> = articles
                .into_iter()
                .filter(|a| cursor_for(a, kind).is_after(cursor))
                .collect();

            let advanced_cursor = if new_articles.is_empty() {
                None
            } else {
                batch_max
            };

            FilterOutcome {
                new_articles,
                advanced_cursor,
            }
        }
        None => {
            // First-ever fetch: most recent bounded subset only, so a feed's
            // entire backlog doesn't flood the first run.
            let mut sorted = articles;
            sorted.sort_by(|a, b| {
                let ca = cursor_for(a, kind);
                let cb = cursor_for(b, kind);
                if ca.is_after(&cb) {
                    std::cmp::Ordering::Less
                } else if cb.is_after(&ca) {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            });
            sorted.truncate(first_run_limit);

            FilterOutcome {
                new_articles: sorted,
                advanced_cursor: batch_max,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(id: &str, published_at: DateTime<Utc>) -> Article {
        Article {
            external_id: id.to_string(),
            title: format!("Article {id}"),
            body: String::new(),
            link: None,
            published_at,
            source_display_name: "Test".to_string(),
            is_breaking: false,
        }
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_filter_returns_strictly_newer_items() {
        // Watermark at T0; batch holds T-1, T1, T2
        let cursor = Cursor::Timestamp(ts(0));
        let batch = vec![
            article("a", ts(-10)),
            article("b", ts(10)),
            article("c", ts(20)),
        ];

        let outcome = filter_new(batch, SourceKind::Feed, Some(&cursor), 5);

        let ids: Vec<&str> = outcome
            .new_articles
            .iter()
            .map(|a| a.external_id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(outcome.advanced_cursor, Some(Cursor::Timestamp(ts(20))));
    }

    #[test]
    fn test_equal_cursor_is_already_seen() {
        let cursor = Cursor::Timestamp(ts(0));
        let batch = vec![article("a", ts(0))];

        let outcome = filter_new(batch, SourceKind::Feed, Some(&cursor), 5);

        assert!(outcome.new_articles.is_empty());
        assert!(outcome.advanced_cursor.is_none());
    }

    #[test]
    fn test_quiet_source_leaves_watermark_untouched() {
        let cursor = Cursor::Timestamp(ts(100));
        let batch = vec![article("a", ts(10)), article("b", ts(50))];

        let outcome = filter_new(batch, SourceKind::Feed, Some(&cursor), 5);

        assert!(outcome.new_articles.is_empty());
        assert!(outcome.advanced_cursor.is_none());
    }

    #[test]
    fn test_first_fetch_takes_bounded_recent_subset() {
        // 10 items, first run limit 5: exactly the 5 most recent emitted,
        // watermark set to the max over all 10
        let batch: Vec<Article> = (0..10).map(|i| article(&format!("a{i}"), ts(i))).collect();

        let outcome = filter_new(batch, SourceKind::Feed, None, 5);

        assert_eq!(outcome.new_articles.len(), 5);
        let ids: Vec<&str> = outcome
            .new_articles
            .iter()
            .map(|a| a.external_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a9", "a8", "a7", "a6", "a5"]);
        assert_eq!(outcome.advanced_cursor, Some(Cursor::Timestamp(ts(9))));
    }

    #[test]
    fn test_first_fetch_smaller_than_limit() {
        let batch = vec![article("a", ts(1)), article("b", ts(2))];

        let outcome = filter_new(batch, SourceKind::Feed, None, 5);

        assert_eq!(outcome.new_articles.len(), 2);
        assert_eq!(outcome.advanced_cursor, Some(Cursor::Timestamp(ts(2))));
    }

    #[test]
    fn test_empty_batch_no_advance() {
        let outcome = filter_new(Vec::new(), SourceKind::Feed, None, 5);
        assert!(outcome.new_articles.is_empty());
        assert!(outcome.advanced_cursor.is_none());
    }

    #[test]
    fn test_timeline_numeric_ordering() {
        // "9" < "10" numerically, although "9" > "10" lexicographically
        let cursor = Cursor::External("9".to_string());
        let batch = vec![article("10", ts(0)), article("8", ts(0))];

        let outcome = filter_new(batch, SourceKind::Timeline, Some(&cursor), 5);

        assert_eq!(outcome.new_articles.len(), 1);
        assert_eq!(outcome.new_articles[0].external_id, "10");
        assert_eq!(
            outcome.advanced_cursor,
            Some(Cursor::External("10".to_string()))
        );
    }

    #[test]
    fn test_external_lexicographic_fallback() {
        let a = Cursor::External("abc".to_string());
        let b = Cursor::External("abd".to_string());
        assert!(b.is_after(&a));
        assert!(!a.is_after(&b));
        assert!(!a.is_after(&a));
    }

    #[test]
    fn test_mixed_cursor_kinds_never_after() {
        let t = Cursor::Timestamp(ts(0));
        let e = Cursor::External("1".to_string());
        assert!(!t.is_after(&e));
        assert!(!e.is_after(&t));
    }

    #[test]
    fn test_cursor_encode_decode_roundtrip() {
        let t = Cursor::Timestamp(ts(42));
        let decoded = Cursor::decode(SourceKind::Feed, &t.encode()).unwrap();
        assert_eq!(decoded, t);

        let e = Cursor::External("12345".to_string());
        let decoded = Cursor::decode(SourceKind::Timeline, &e.encode()).unwrap();
        assert_eq!(decoded, e);
    }

    #[test]
    fn test_cursor_decode_bad_timestamp() {
        assert!(Cursor::decode(SourceKind::Feed, "not a timestamp").is_none());
    }
}

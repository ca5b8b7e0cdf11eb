//! Tolerant streaming feed parser for feedwatch.
//!
//! Converts raw syndication markup into normalized [`Article`] records with
//! a single forward scan (no backtracking, no document tree). Malformed
//! input degrades to a recoverable error, never a panic: a structural error
//! aborts the parse and the source yields no items this run.

mod text;

pub use text::strip_markup;

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::warn;
use url::Url;

use crate::{FeedwatchError, Result};

/// A normalized content item produced by the parser or the timeline client.
///
/// `external_id` is the best available stable identifier (feed GUID, or
/// link, or a generated identifier if both are absent). It is only used
/// within a single run and is not persisted as-is.
#[derive(Debug, Clone)]
pub struct Article {
    /// Stable identifier within this run.
    pub external_id: String,
    /// Item title.
    pub title: String,
    /// Item body with markup stripped.
    pub body: String,
    /// Link to the original item.
    pub link: Option<String>,
    /// When the item was published.
    pub published_at: DateTime<Utc>,
    /// Display name of the originating source.
    pub source_display_name: String,
    /// Whether the item looks like breaking news.
    ///
    /// Derived from an optional non-standard marker element or a title
    /// keyword heuristic; feeds do not reliably provide this.
    pub is_breaking: bool,
}

/// Recognized per-item fields during the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Body,
    Date,
    Link,
    Guid,
    Breaking,
    ChannelTitle,
}

/// Per-item accumulator, reset on entering an item context.
#[derive(Debug, Default)]
struct ItemAccumulator {
    title: String,
    body: String,
    date: String,
    link: String,
    guid: String,
    breaking: String,
}

/// Streaming feed parser.
pub struct FeedParser {
    breaking_keywords: Vec<String>,
}

impl FeedParser {
    /// Create a parser with the given breaking-news title keywords.
    pub fn new(breaking_keywords: &[String]) -> Self {
        Self {
            breaking_keywords: breaking_keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Parse raw feed markup into an ordered list of articles.
    ///
    /// `locator` is the source URL, used to derive a display name when the
    /// feed header carries no title. Any structural markup error aborts the
    /// parse with a recoverable [`FeedwatchError::Parse`].
    pub fn parse(&self, bytes: &[u8], locator: &str) -> Result<Vec<Article>> {
        let mut reader = Reader::from_reader(bytes);
        {
            let config = reader.config_mut();
            config.trim_text(true);
            // Mismatched end tags are common in the wild; keep scanning.
            config.check_end_names = false;
        }

        let mut buf = Vec::new();
        let mut items: Vec<RawItem> = Vec::new();
        let mut channel_title = String::new();
        let mut in_item = false;
        let mut field: Option<Field> = None;
        let mut acc = ItemAccumulator::default();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let name = local_name(e.name().as_ref());
                    if !in_item && (name == "item" || name == "entry") {
                        in_item = true;
                        field = None;
                        acc = ItemAccumulator::default();
                    } else if in_item {
                        field = recognize_field(&name);
                        if name == "link" {
                            // Atom carries the link as an attribute.
                            if let Some(href) = href_attribute(&e) {
                                if acc.link.is_empty() {
                                    acc.link = href;
                                }
                                field = None;
                            }
                        }
                    } else if name == "title" {
                        field = Some(Field::ChannelTitle);
                    } else {
                        field = None;
                    }
                }
                Ok(Event::Empty(e)) => {
                    let name = local_name(e.name().as_ref());
                    if in_item && name == "link" && acc.link.is_empty() {
                        if let Some(href) = href_attribute(&e) {
                            acc.link = href;
                        }
                    }
                }
                Ok(Event::Text(t)) => {
                    if let Some(f) = field {
                        // Undecodable entities are kept raw rather than rejected.
                        let text = t
                            .unescape()
                            .map(|s| s.into_owned())
                            .unwrap_or_else(|_| String::from_utf8_lossy(t.as_ref()).into_owned());
                        append_field(f, &text, &mut acc, &mut channel_title, in_item);
                    }
                }
                Ok(Event::CData(t)) => {
                    if let Some(f) = field {
                        let text = String::from_utf8_lossy(t.as_ref()).into_owned();
                        append_field(f, &text, &mut acc, &mut channel_title, in_item);
                    }
                }
                Ok(Event::End(e)) => {
                    let name = local_name(e.name().as_ref());
                    if in_item && (name == "item" || name == "entry") {
                        in_item = false;
                        field = None;
                        // An item without a title is skipped, not an error.
                        if !acc.title.trim().is_empty() {
                            items.push(RawItem::from(std::mem::take(&mut acc)));
                        }
                    } else {
                        field = None;
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(FeedwatchError::Parse(format!(
                        "malformed feed markup: {e}"
                    )));
                }
            }
            buf.clear();
        }

        let source_name = if channel_title.trim().is_empty() {
            derive_source_name(locator)
        } else {
            channel_title.trim().to_string()
        };

        Ok(items
            .into_iter()
            .enumerate()
            .map(|(i, raw)| self.finish_item(raw, i, locator, &source_name))
            .collect())
    }

    /// Resolve accumulated raw fields into a normalized article.
    fn finish_item(&self, raw: RawItem, index: usize, locator: &str, source_name: &str) -> Article {
        let title = strip_markup(&raw.title);
        let body = strip_markup(&raw.body);

        let link = if raw.link.trim().is_empty() {
            None
        } else {
            Some(raw.link.trim().to_string())
        };

        let external_id = if !raw.guid.trim().is_empty() {
            raw.guid.trim().to_string()
        } else if let Some(l) = &link {
            l.clone()
        } else {
            format!("{locator}#{index}")
        };

        let published_at = parse_published(&raw.date).unwrap_or_else(|| {
            if !raw.date.trim().is_empty() {
                warn!("unparseable publish date {:?}, using current time", raw.date);
            }
            Utc::now()
        });

        let is_breaking = marker_is_true(&raw.breaking) || self.title_is_breaking(&title);

        Article {
            external_id,
            title,
            body,
            link,
            published_at,
            source_display_name: source_name.to_string(),
            is_breaking,
        }
    }

    /// Case-insensitive keyword match against the title.
    fn title_is_breaking(&self, title: &str) -> bool {
        let lower = title.to_lowercase();
        self.breaking_keywords.iter().any(|k| lower.contains(k))
    }
}

/// Raw accumulated fields of one item.
#[derive(Debug)]
struct RawItem {
    title: String,
    body: String,
    date: String,
    link: String,
    guid: String,
    breaking: String,
}

impl From<ItemAccumulator> for RawItem {
    fn from(acc: ItemAccumulator) -> Self {
        RawItem {
            title: acc.title,
            body: acc.body,
            date: acc.date,
            link: acc.link,
            guid: acc.guid,
            breaking: acc.breaking,
        }
    }
}

/// Strip a namespace prefix and lowercase an element name.
fn local_name(name: &[u8]) -> String {
    let name = String::from_utf8_lossy(name);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_lowercase(),
        None => name.to_lowercase(),
    }
}

/// Map an in-item element name to a recognized field.
///
/// Unrecognized fields are ignored, not rejected.
fn recognize_field(name: &str) -> Option<Field> {
    match name {
        "title" => Some(Field::Title),
        "description" | "summary" => Some(Field::Body),
        "pubdate" | "published" | "updated" | "date" => Some(Field::Date),
        "link" => Some(Field::Link),
        "guid" | "id" => Some(Field::Guid),
        "breaking" | "isbreaking" => Some(Field::Breaking),
        _ => None,
    }
}

/// Append decoded text to the field it belongs to.
fn append_field(
    field: Field,
    text: &str,
    acc: &mut ItemAccumulator,
    channel_title: &mut String,
    in_item: bool,
) {
    if !in_item {
        if field == Field::ChannelTitle && channel_title.is_empty() {
            channel_title.push_str(text);
        }
        return;
    }
    let target = match field {
        Field::Title => &mut acc.title,
        Field::Body => &mut acc.body,
        Field::Date => &mut acc.date,
        Field::Link => &mut acc.link,
        Field::Guid => &mut acc.guid,
        Field::Breaking => &mut acc.breaking,
        Field::ChannelTitle => return,
    };
    target.push_str(text);
}

/// Extract an Atom-style href attribute, honoring rel="alternate".
fn href_attribute(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    let mut href = None;
    let mut rel_alternate = true;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"href" => {
                href = Some(String::from_utf8_lossy(&attr.value).into_owned());
            }
            b"rel" => {
                rel_alternate = attr.value.as_ref() == b"alternate";
            }
            _ => {}
        }
    }
    if rel_alternate {
        href
    } else {
        None
    }
}

/// Parse a publish date through the fallback chain: RFC-822/1123, then
/// ISO-8601. Returns None when both fail.
fn parse_published(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    None
}

/// Interpret a boolean-like marker element value.
fn marker_is_true(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Well-known domains mapped to display names.
const KNOWN_DOMAINS: &[(&str, &str)] = &[
    ("apnews.com", "AP News"),
    ("bbc.co.uk", "BBC News"),
    ("bbc.com", "BBC News"),
    ("cnn.com", "CNN"),
    ("npr.org", "NPR"),
    ("nytimes.com", "New York Times"),
    ("reuters.com", "Reuters"),
    ("theguardian.com", "The Guardian"),
];

/// Derive a display name from a source locator's domain.
pub fn derive_source_name(locator: &str) -> String {
    let host = match Url::parse(locator) {
        Ok(url) => match url.host_str() {
            Some(h) => h.to_lowercase(),
            None => return locator.to_string(),
        },
        Err(_) => return locator.to_string(),
    };
    let host = host.strip_prefix("www.").unwrap_or(&host);

    for (domain, name) in KNOWN_DOMAINS {
        if host == *domain || host.ends_with(&format!(".{domain}")) {
            return (*name).to_string();
        }
    }

    // Fall back to a titleized domain fragment
    let fragment = host.split('.').next().unwrap_or(host);
    let mut chars = fragment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => locator.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> FeedParser {
        FeedParser::new(&[
            "breaking".to_string(),
            "urgent".to_string(),
            "alert".to_string(),
        ])
    }

    const LOCATOR: &str = "https://example.com/feed.xml";

    #[test]
    fn test_parse_rss_basic() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <item>
      <title>First Article</title>
      <link>https://example.com/1</link>
      <guid>guid-1</guid>
      <description>&lt;p&gt;Some description&lt;/p&gt;</description>
      <pubDate>Wed, 01 Jan 2025 12:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Second Article</title>
      <link>https://example.com/2</link>
      <guid>guid-2</guid>
      <pubDate>Thu, 02 Jan 2025 12:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

        let articles = parser().parse(rss.as_bytes(), LOCATOR).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "First Article");
        assert_eq!(articles[0].external_id, "guid-1");
        assert_eq!(articles[0].body, "Some description");
        assert_eq!(articles[0].link, Some("https://example.com/1".to_string()));
        assert_eq!(articles[0].source_display_name, "Test Feed");
        assert_eq!(
            articles[0].published_at,
            DateTime::parse_from_rfc2822("Wed, 01 Jan 2025 12:00:00 GMT")
                .unwrap()
                .with_timezone(&Utc)
        );
        assert!(!articles[0].is_breaking);
    }

    #[test]
    fn test_parse_atom_entry() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <entry>
    <id>urn:uuid:1</id>
    <title>Atom Entry</title>
    <link href="https://example.com/entry" rel="alternate"/>
    <summary>Entry summary</summary>
    <updated>2025-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

        let articles = parser().parse(atom.as_bytes(), LOCATOR).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].external_id, "urn:uuid:1");
        assert_eq!(articles[0].link, Some("https://example.com/entry".to_string()));
        assert_eq!(articles[0].body, "Entry summary");
        assert_eq!(
            articles[0].published_at,
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc)
        );
    }

    #[test]
    fn test_parse_malformed_aborts_with_error() {
        // An unclosed comment is a structural error at EOF
        let broken = "<rss><channel><item><title>x</title><!-- never closed";

        let result = parser().parse(broken.as_bytes(), LOCATOR);
        assert!(matches!(result, Err(crate::FeedwatchError::Parse(_))));
    }

    #[test]
    fn test_parse_malformed_is_deterministic() {
        let broken = "<rss><channel><item><title>x</title><!-- never closed";
        let a = parser().parse(broken.as_bytes(), LOCATOR).err().map(|e| e.to_string());
        let b = parser().parse(broken.as_bytes(), LOCATOR).err().map(|e| e.to_string());
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn test_unrecognized_fields_ignored() {
        let rss = r#"<rss><channel><title>T</title>
          <item>
            <title>Item</title>
            <guid>g</guid>
            <enclosure url="https://example.com/a.mp3"/>
            <somecustom>ignored</somecustom>
          </item>
        </channel></rss>"#;

        let articles = parser().parse(rss.as_bytes(), LOCATOR).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Item");
        assert!(articles[0].body.is_empty());
    }

    #[test]
    fn test_item_without_title_skipped() {
        let rss = r#"<rss><channel><title>T</title>
          <item><guid>only-guid</guid></item>
          <item><title>Has title</title><guid>g2</guid></item>
        </channel></rss>"#;

        let articles = parser().parse(rss.as_bytes(), LOCATOR).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].external_id, "g2");
    }

    #[test]
    fn test_external_id_fallback_chain() {
        let rss = r#"<rss><channel><title>T</title>
          <item><title>With guid</title><guid>g1</guid><link>https://example.com/1</link></item>
          <item><title>With link</title><link>https://example.com/2</link></item>
          <item><title>With neither</title></item>
        </channel></rss>"#;

        let articles = parser().parse(rss.as_bytes(), LOCATOR).unwrap();
        assert_eq!(articles[0].external_id, "g1");
        assert_eq!(articles[1].external_id, "https://example.com/2");
        assert_eq!(articles[2].external_id, format!("{LOCATOR}#2"));
    }

    #[test]
    fn test_date_fallback_to_now() {
        let rss = r#"<rss><channel><title>T</title>
          <item><title>Bad date</title><guid>g</guid><pubDate>not a date</pubDate></item>
        </channel></rss>"#;

        let before = Utc::now();
        let articles = parser().parse(rss.as_bytes(), LOCATOR).unwrap();
        let after = Utc::now();

        assert!(articles[0].published_at >= before);
        assert!(articles[0].published_at <= after);
    }

    #[test]
    fn test_breaking_marker_element() {
        let rss = r#"<rss><channel><title>T</title>
          <item><title>Calm headline</title><guid>g</guid><breaking>true</breaking></item>
          <item><title>Also calm</title><guid>g2</guid><breaking>false</breaking></item>
        </channel></rss>"#;

        let articles = parser().parse(rss.as_bytes(), LOCATOR).unwrap();
        assert!(articles[0].is_breaking);
        assert!(!articles[1].is_breaking);
    }

    #[test]
    fn test_breaking_keyword_heuristic() {
        let rss = r#"<rss><channel><title>T</title>
          <item><title>BREAKING: something happened</title><guid>g</guid></item>
          <item><title>Urgent recall issued</title><guid>g2</guid></item>
          <item><title>Quiet afternoon</title><guid>g3</guid></item>
        </channel></rss>"#;

        let articles = parser().parse(rss.as_bytes(), LOCATOR).unwrap();
        assert!(articles[0].is_breaking);
        assert!(articles[1].is_breaking);
        assert!(!articles[2].is_breaking);
    }

    #[test]
    fn test_cdata_body() {
        let rss = r#"<rss><channel><title>T</title>
          <item><title>Item</title><guid>g</guid>
            <description><![CDATA[<b>Bold</b> content & more]]></description>
          </item>
        </channel></rss>"#;

        let articles = parser().parse(rss.as_bytes(), LOCATOR).unwrap();
        assert_eq!(articles[0].body, "Bold content & more");
    }

    #[test]
    fn test_channel_title_missing_derives_from_domain() {
        let rss = r#"<rss><channel>
          <item><title>Item</title><guid>g</guid></item>
        </channel></rss>"#;

        let articles = parser()
            .parse(rss.as_bytes(), "https://www.bbc.co.uk/news/rss.xml")
            .unwrap();
        assert_eq!(articles[0].source_display_name, "BBC News");
    }

    #[test]
    fn test_derive_source_name_known_domains() {
        assert_eq!(derive_source_name("https://www.cnn.com/rss.xml"), "CNN");
        assert_eq!(derive_source_name("https://feeds.npr.org/1001/rss.xml"), "NPR");
        assert_eq!(
            derive_source_name("https://rss.nytimes.com/svc/xml/rss.xml"),
            "New York Times"
        );
    }

    #[test]
    fn test_derive_source_name_titleized_fallback() {
        assert_eq!(derive_source_name("https://example.com/feed.xml"), "Example");
        assert_eq!(derive_source_name("https://www.somesite.org/rss"), "Somesite");
    }

    #[test]
    fn test_derive_source_name_not_a_url() {
        assert_eq!(derive_source_name("some_handle"), "some_handle");
    }

    #[test]
    fn test_parse_published_chain() {
        assert!(parse_published("Wed, 01 Jan 2025 12:00:00 GMT").is_some());
        assert!(parse_published("2025-01-01T12:00:00Z").is_some());
        assert!(parse_published("January 1st, 2025").is_none());
        assert!(parse_published("").is_none());
    }

    #[test]
    fn test_namespaced_elements() {
        let rss = r#"<rss xmlns:dc="http://purl.org/dc/elements/1.1/"><channel><title>T</title>
          <item><title>Item</title><guid>g</guid><dc:date>2025-01-01T00:00:00Z</dc:date></item>
        </channel></rss>"#;

        let articles = parser().parse(rss.as_bytes(), LOCATOR).unwrap();
        assert_eq!(
            articles[0].published_at,
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc)
        );
    }

    #[test]
    fn test_empty_input_yields_no_items() {
        let articles = parser().parse(b"", LOCATOR).unwrap();
        assert!(articles.is_empty());
    }
}

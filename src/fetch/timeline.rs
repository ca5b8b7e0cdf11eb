//! Timeline client for feedwatch.
//!
//! Social-timeline sources are fetched in two steps: resolve a stable
//! account id from a handle, then page that account's recent items.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::config::{FetchConfig, TimelineConfig};
use crate::parser::Article;
use crate::{FeedwatchError, Result};

/// Account lookup response.
#[derive(Debug, Deserialize)]
struct AccountResponse {
    id: String,
}

/// One item from a timeline page.
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineItem {
    /// Item identifier (numeric for most backends).
    pub id: String,
    /// Item text.
    pub text: String,
    /// Creation timestamp, RFC3339.
    pub created_at: Option<String>,
    /// Link to the item, if the backend provides one.
    pub url: Option<String>,
}

/// Timeline page response.
#[derive(Debug, Deserialize)]
struct TimelinePage {
    items: Vec<TimelineItem>,
}

/// Maximum characters of item text used as the notification title.
const TITLE_PREVIEW_LENGTH: usize = 80;

/// Client for timeline-style sources.
pub struct TimelineClient {
    client: Client,
    api_base: String,
    bearer_token: String,
    page_size: usize,
    breaking_keywords: Vec<String>,
}

impl TimelineClient {
    /// Create a client from configuration.
    pub fn new(
        fetch: &FetchConfig,
        timeline: &TimelineConfig,
        breaking_keywords: &[String],
    ) -> Result<Self> {
        Ok(Self {
            client: super::build_client(fetch)?,
            api_base: timeline.api_base.trim_end_matches('/').to_string(),
            bearer_token: timeline.bearer_token.clone(),
            page_size: timeline.page_size,
            breaking_keywords: breaking_keywords.iter().map(|k| k.to_lowercase()).collect(),
        })
    }

    /// Whether a credential is configured.
    ///
    /// Without one, timeline sources are skipped for the run.
    pub fn configured(&self) -> bool {
        !self.bearer_token.is_empty()
    }

    /// Resolve a stable account id from a handle.
    pub async fn resolve_account(&self, handle: &str) -> Result<String> {
        let url = format!("{}/users/lookup", self.api_base);
        let response = self
            .client
            .get(&url)
            .query(&[("handle", handle)])
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| FeedwatchError::Timeline(format!("lookup failed for {handle}: {e}")))?;

        if !response.status().is_success() {
            return Err(FeedwatchError::Timeline(format!(
                "lookup HTTP error for {handle}: {}",
                response.status()
            )));
        }

        let account: AccountResponse = response
            .json()
            .await
            .map_err(|e| FeedwatchError::Timeline(format!("bad lookup response: {e}")))?;

        Ok(account.id)
    }

    /// Fetch the most recent items for a handle, normalized into articles.
    pub async fn fetch_recent(&self, handle: &str, display_name: &str) -> Result<Vec<Article>> {
        if !self.configured() {
            return Err(FeedwatchError::Config(
                "no timeline credential configured".to_string(),
            ));
        }

        let account_id = self.resolve_account(handle).await?;

        let url = format!("{}/users/{}/items", self.api_base, account_id);
        let response = self
            .client
            .get(&url)
            .query(&[("limit", self.page_size.to_string())])
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| FeedwatchError::Timeline(format!("timeline fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(FeedwatchError::Timeline(format!(
                "timeline HTTP error for {handle}: {}",
                response.status()
            )));
        }

        let page: TimelinePage = response
            .json()
            .await
            .map_err(|e| FeedwatchError::Timeline(format!("bad timeline response: {e}")))?;

        Ok(page
            .items
            .into_iter()
            .map(|item| normalize_item(item, display_name, &self.breaking_keywords))
            .collect())
    }
}

/// Normalize one timeline item into an article.
///
/// Timeline items carry no title; a preview of the text stands in.
pub(crate) fn normalize_item(
    item: TimelineItem,
    display_name: &str,
    breaking_keywords: &[String],
) -> Article {
    let title = preview(&item.text);

    let published_at = item
        .created_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let lower = item.text.to_lowercase();
    let is_breaking = breaking_keywords.iter().any(|k| lower.contains(k));

    Article {
        external_id: item.id,
        title,
        body: item.text,
        link: item.url,
        published_at,
        source_display_name: display_name.to_string(),
        is_breaking,
    }
}

/// First line of the text, truncated for use as a title.
fn preview(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    if first_line.chars().count() <= TITLE_PREVIEW_LENGTH {
        first_line.to_string()
    } else {
        let truncated: String = first_line.chars().take(TITLE_PREVIEW_LENGTH).collect();
        format!("{truncated}…")
    }
}

//! Network fetch layer for feedwatch.
//!
//! One fetch per source per pass; feed sources are routed to the streaming
//! parser, timeline sources to the timeline client. Per-source failures are
//! reported to the caller and never abort the pass.

mod timeline;

pub use timeline::{TimelineClient, TimelineItem};

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::config::{FetchConfig, NotifyConfig, TimelineConfig};
use crate::parser::{Article, FeedParser};
use crate::source::{Source, SourceKind};
use crate::{FeedwatchError, Result};

/// User agent string for outbound requests.
const USER_AGENT: &str = "feedwatch/0.1 (feed poller)";

/// Build the shared HTTP client from fetch configuration.
pub fn build_client(config: &FetchConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .read_timeout(Duration::from_secs(config.read_timeout_secs))
        .timeout(Duration::from_secs(config.total_timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FeedwatchError::Fetch(format!("failed to create HTTP client: {e}")))
}

/// Feed fetcher enforcing URL validation and resource limits.
pub struct FeedFetcher {
    client: Client,
    max_body_size: u64,
}

impl FeedFetcher {
    /// Create a fetcher from configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            max_body_size: config.max_body_size_bytes,
        })
    }

    /// Fetch raw feed bytes from the given URL.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        validate_url(url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedwatchError::Fetch(format!("failed to fetch {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(FeedwatchError::Fetch(format!(
                "HTTP error from {url}: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_body_size {
                return Err(FeedwatchError::Fetch(format!(
                    "response too large: {} bytes (max {} bytes)",
                    content_length, self.max_body_size
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FeedwatchError::Fetch(format!("failed to read response: {e}")))?;

        if bytes.len() as u64 > self.max_body_size {
            return Err(FeedwatchError::Fetch(format!(
                "response too large: {} bytes (max {} bytes)",
                bytes.len(),
                self.max_body_size
            )));
        }

        if bytes.is_empty() {
            return Err(FeedwatchError::Fetch(format!("empty body from {url}")));
        }

        Ok(bytes.to_vec())
    }
}

/// Validate a source URL before fetching.
///
/// Only http/https with a non-local host are accepted.
pub fn validate_url(url: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| FeedwatchError::Fetch(format!("invalid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(FeedwatchError::Fetch(format!(
                "unsupported URL scheme: {scheme}"
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| FeedwatchError::Fetch("URL has no host".to_string()))?;

    match host {
        url::Host::Domain(domain) => {
            let lower = domain.to_lowercase();
            if lower == "localhost"
                || lower.ends_with(".local")
                || lower.ends_with(".localhost")
                || lower.ends_with(".internal")
            {
                return Err(FeedwatchError::Fetch(format!("forbidden host: {domain}")));
            }
        }
        url::Host::Ipv4(ip) => {
            if ip.is_loopback() || ip.is_unspecified() {
                return Err(FeedwatchError::Fetch(format!(
                    "loopback address not allowed: {ip}"
                )));
            }
        }
        url::Host::Ipv6(ip) => {
            if ip.is_loopback() || ip.is_unspecified() {
                return Err(FeedwatchError::Fetch(format!(
                    "loopback address not allowed: {ip}"
                )));
            }
        }
    }

    Ok(())
}

/// Routes one source's fetch to the matching parser or client.
pub struct Dispatcher {
    fetcher: FeedFetcher,
    timeline: TimelineClient,
    parser: FeedParser,
}

impl Dispatcher {
    /// Create a dispatcher from configuration.
    pub fn new(
        fetch: &FetchConfig,
        timeline: &TimelineConfig,
        notify: &NotifyConfig,
    ) -> Result<Self> {
        Ok(Self {
            fetcher: FeedFetcher::new(fetch)?,
            timeline: TimelineClient::new(fetch, timeline, &notify.breaking_keywords)?,
            parser: FeedParser::new(&notify.breaking_keywords),
        })
    }

    /// Whether timeline sources can be fetched (credential configured).
    pub fn timeline_configured(&self) -> bool {
        self.timeline.configured()
    }

    /// Fetch one source and normalize its payload into articles.
    pub async fn fetch_source(&self, source: &Source) -> Result<Vec<Article>> {
        debug!("Fetching source {} ({})", source.display_name, source.locator);

        match source.kind {
            SourceKind::Feed => {
                let bytes = self.fetcher.fetch_bytes(&source.locator).await?;
                // The feed header names the source; the locator is the
                // fallback when it doesn't
                self.parser.parse(&bytes, &source.locator)
            }
            SourceKind::Timeline => {
                self.timeline
                    .fetch_recent(&source.locator, &source.display_name)
                    .await
            }
        }
    }
}

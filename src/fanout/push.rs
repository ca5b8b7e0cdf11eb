//! Best-effort multicast push delivery.

use reqwest::Client;
use serde::Serialize;

use crate::config::{FetchConfig, PushConfig};
use crate::{FeedwatchError, Result};

/// Payload delivered to the push gateway.
#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// Structured data carried alongside the notification.
    pub data: PushData,
}

/// Structured payload data.
#[derive(Debug, Clone, Serialize)]
pub struct PushData {
    /// Link to the underlying item.
    pub url: Option<String>,
}

/// Wire format of one multicast request.
#[derive(Debug, Serialize)]
struct MulticastRequest<'a> {
    tokens: &'a [String],
    #[serde(flatten)]
    payload: &'a PushPayload,
}

/// Client for the push gateway.
pub struct PushClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl PushClient {
    /// Create a client from configuration.
    pub fn new(fetch: &FetchConfig, push: &PushConfig) -> Result<Self> {
        if push.endpoint.is_empty() {
            return Err(FeedwatchError::Config(
                "push.endpoint is not set".to_string(),
            ));
        }
        Ok(Self {
            client: crate::fetch::build_client(fetch)?,
            endpoint: push.endpoint.clone(),
            api_key: push.api_key.clone(),
        })
    }

    /// Send one multicast push to a set of opaque device tokens.
    pub async fn send_multicast(&self, tokens: &[String], payload: &PushPayload) -> Result<()> {
        if tokens.is_empty() {
            return Ok(());
        }

        let request = MulticastRequest { tokens, payload };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| FeedwatchError::Push(format!("push send failed: {e}")))?;

        if !response.status().is_success() {
            return Err(FeedwatchError::Push(format!(
                "push gateway returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

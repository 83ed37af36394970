//! A2A client for posting messages to peer agents

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::protocol::A2AMessage;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A known peer agent: its routing name and exchange endpoint
#[derive(Debug, Clone)]
pub struct PeerAgentConfig {
    pub name: String,
    pub url: String,
}

/// HTTP client for exchanging A2A messages with peer agents
#[derive(Clone)]
pub struct A2aClient {
    http: Client,
}

impl A2aClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http })
    }

    /// POST `message` to `url` and decode the reply.
    ///
    /// A reply that fails validation is an error, as is any non-2xx status.
    /// No retries.
    pub async fn exchange(&self, url: &str, message: &A2AMessage) -> Result<A2AMessage> {
        debug!(
            "Sending A2A message {} ({} turns) to {}",
            message.message_id,
            message.turns.len(),
            url
        );

        let body = message.to_json().context("Failed to encode A2A message")?;
        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to connect to agent at {}", url))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read reply from {}", url))?;

        if !status.is_success() {
            return Err(anyhow!("A2A exchange failed: HTTP {}: {}", status, body));
        }

        let reply = A2AMessage::from_json(&body).context("Invalid A2A reply")?;

        info!(
            "Received A2A reply {} ({} turns, conversation {})",
            reply.message_id,
            reply.turns.len(),
            reply.conversation_id
        );
        Ok(reply)
    }
}

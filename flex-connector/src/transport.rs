//! HTTP Node Transports
//!
//! JSON-over-HTTP implementations of the node transport traits for remote
//! deployments. Commit notifications are delivered through a long-poll
//! loop that feeds the listener's channel; when a poll fails the stream
//! is dropped and the listener's reconnect logic takes over.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{ConnectorError, ConnectorResult};
use crate::message::{
    BroadcastAck, CommitNotification, ProposalResponse, SignedProposal, TransactionEnvelope,
};
use crate::node::{CommitEventSource, EndorsingNode, OrderingNode};

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Long-poll wait in seconds for the commit event feed
    pub event_poll_secs: u64,
    /// Commit event channel capacity
    pub event_buffer: usize,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            event_poll_secs: 25,
            event_buffer: 256,
        }
    }
}

fn build_client(timeout_secs: u64) -> ConnectorResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ConnectorError::Init(format!("Failed to build HTTP client: {}", e)))
}

/// HTTP endorsing node
pub struct HttpEndorsingNode {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpEndorsingNode {
    /// Create a new HTTP endorsing node
    pub fn new(name: &str, base_url: &str, config: &HttpTransportConfig) -> ConnectorResult<Self> {
        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(config.request_timeout_secs)?,
        })
    }
}

#[async_trait]
impl EndorsingNode for HttpEndorsingNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn endorse(&self, proposal: &SignedProposal) -> ConnectorResult<ProposalResponse> {
        let url = format!("{}/api/v1/proposals", self.base_url);
        let response = self.client.post(&url).json(proposal).send().await.map_err(|e| {
            ConnectorError::Transport(format!("{}: proposal request failed: {}", self.name, e))
        })?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Transport(format!(
                "{}: proposal endpoint returned status {}: {}",
                self.name, status, error_text
            )));
        }
        // Endorsement rejections travel inside the body with HTTP 200;
        // the profile name wins over whatever the node reports.
        let mut result: ProposalResponse = response.json().await.map_err(|e| {
            ConnectorError::Transport(format!("{}: proposal response parse error: {}", self.name, e))
        })?;
        result.node = self.name.clone();
        Ok(result)
    }
}

/// HTTP ordering node
pub struct HttpOrderingNode {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpOrderingNode {
    /// Create a new HTTP ordering node
    pub fn new(name: &str, base_url: &str, config: &HttpTransportConfig) -> ConnectorResult<Self> {
        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(config.request_timeout_secs)?,
        })
    }
}

#[async_trait]
impl OrderingNode for HttpOrderingNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn broadcast(&self, envelope: &TransactionEnvelope) -> ConnectorResult<BroadcastAck> {
        let url = format!("{}/api/v1/transactions", self.base_url);
        let response = self.client.post(&url).json(envelope).send().await.map_err(|e| {
            ConnectorError::Transport(format!("{}: broadcast request failed: {}", self.name, e))
        })?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Transport(format!(
                "{}: broadcast endpoint returned status {}: {}",
                self.name, status, error_text
            )));
        }
        response.json().await.map_err(|e| {
            ConnectorError::Transport(format!("{}: broadcast ack parse error: {}", self.name, e))
        })
    }
}

/// One long-poll page of the commit event feed
#[derive(Debug, Deserialize)]
struct EventBatch {
    events: Vec<CommitNotification>,
    cursor: u64,
}

/// HTTP commit event source (long-poll)
#[derive(Clone)]
pub struct HttpCommitEventSource {
    name: String,
    base_url: String,
    client: reqwest::Client,
    config: HttpTransportConfig,
}

impl HttpCommitEventSource {
    /// Create a new HTTP commit event source
    pub fn new(name: &str, base_url: &str, config: &HttpTransportConfig) -> ConnectorResult<Self> {
        // The request deadline must outlive the long-poll wait.
        let client = build_client(config.request_timeout_secs + config.event_poll_secs)?;
        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            config: config.clone(),
        })
    }

    async fn poll(&self, channel_id: &str, cursor: u64) -> ConnectorResult<EventBatch> {
        let url = format!("{}/api/v1/channels/{}/commits", self.base_url, channel_id);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("cursor", cursor.to_string()),
                ("wait_secs", self.config.event_poll_secs.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                ConnectorError::Transport(format!(
                    "{}: commit feed request failed: {}",
                    self.name, e
                ))
            })?;
        if !response.status().is_success() {
            return Err(ConnectorError::Transport(format!(
                "{}: commit feed returned status {}",
                self.name,
                response.status()
            )));
        }
        response.json().await.map_err(|e| {
            ConnectorError::Transport(format!("{}: commit feed parse error: {}", self.name, e))
        })
    }
}

#[async_trait]
impl CommitEventSource for HttpCommitEventSource {
    async fn subscribe(
        &self,
        channel_id: &str,
    ) -> ConnectorResult<mpsc::Receiver<CommitNotification>> {
        // The first poll runs inline so startup and reconnect failures
        // surface to the caller instead of dying inside the feed task.
        let first = self.poll(channel_id, 0).await?;
        let (tx, rx) = mpsc::channel(self.config.event_buffer);
        let source = self.clone();
        let channel = channel_id.to_string();
        tokio::spawn(async move {
            let mut cursor = first.cursor;
            for event in first.events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            loop {
                match source.poll(&channel, cursor).await {
                    Ok(batch) => {
                        cursor = batch.cursor;
                        for event in batch.events {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(node = %source.name, channel = %channel, error = %e, "Commit feed poll failed");
                        // Dropping the sender ends the stream; the
                        // listener re-subscribes with backoff.
                        return;
                    }
                }
            }
        });
        Ok(rx)
    }
}

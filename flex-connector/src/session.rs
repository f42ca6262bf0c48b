//! Channel Sessions
//!
//! A channel session is the long-lived handle bound to one logical
//! partition of the ledger: its endorsing-node set, ordering-node set and
//! commit event listener. Sessions are created once during initialization
//! and never mutated afterwards, so they are safely shared across
//! concurrent calls.

use std::sync::Arc;

use crate::error::{ConnectorError, ConnectorResult};
use crate::listener::CommitListener;
use crate::node::{CommitEventSource, EndorsingNode, OrderingNode};

/// Long-lived handle for one ledger channel
pub struct ChannelSession {
    /// Channel id
    pub channel_id: String,
    /// Contract deployed on the channel
    pub contract_id: String,
    /// Endorsing node set
    pub endorsers: Vec<Arc<dyn EndorsingNode>>,
    /// Ordering node set
    pub orderers: Vec<Arc<dyn OrderingNode>>,
    /// Commit event listener for the channel
    pub listener: CommitListener,
}

impl ChannelSession {
    /// Create a session. The listener is created but not yet subscribed;
    /// call [`open`](Self::open) to establish the commit feed.
    pub fn new(
        channel_id: &str,
        contract_id: &str,
        endorsers: Vec<Arc<dyn EndorsingNode>>,
        orderers: Vec<Arc<dyn OrderingNode>>,
        event_source: Arc<dyn CommitEventSource>,
    ) -> ConnectorResult<Self> {
        if contract_id.is_empty() {
            return Err(ConnectorError::Init(format!(
                "Channel {} has no contract id",
                channel_id
            )));
        }
        if endorsers.is_empty() {
            return Err(ConnectorError::Init(format!(
                "Channel {} has no endorsing nodes",
                channel_id
            )));
        }
        if orderers.is_empty() {
            return Err(ConnectorError::Init(format!(
                "Channel {} has no ordering nodes",
                channel_id
            )));
        }
        Ok(Self {
            channel_id: channel_id.to_string(),
            contract_id: contract_id.to_string(),
            endorsers,
            orderers,
            listener: CommitListener::new(channel_id, event_source),
        })
    }

    /// Open the channel's commit subscription. Fatal on failure: a
    /// channel without a commit feed cannot confirm any transaction.
    pub async fn open(&self) -> ConnectorResult<()> {
        self.listener.start().await
    }
}

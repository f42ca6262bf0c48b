//! Node Transport Traits
//!
//! Interfaces the coordinator uses to reach endorsing nodes, ordering
//! nodes and the commit event feed. This abstraction allows for different
//! implementations:
//! - HTTP client (remote nodes)
//! - Mock transports (testing)

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ConnectorResult;
use crate::message::{
    BroadcastAck, CommitNotification, ProposalResponse, SignedProposal, TransactionEnvelope,
};

/// An endorsing node: simulates transactions and returns signed results
/// without committing them
#[async_trait]
pub trait EndorsingNode: Send + Sync {
    /// Node name from the network profile
    fn name(&self) -> &str;

    /// Simulate the proposal and return the endorsement result
    async fn endorse(&self, proposal: &SignedProposal) -> ConnectorResult<ProposalResponse>;
}

/// An ordering node: sequences endorsed transactions into the ledger
#[async_trait]
pub trait OrderingNode: Send + Sync {
    /// Node name from the network profile
    fn name(&self) -> &str;

    /// Broadcast an endorsed transaction for ordering
    async fn broadcast(&self, envelope: &TransactionEnvelope) -> ConnectorResult<BroadcastAck>;
}

/// Source of asynchronous commit notifications for one channel
#[async_trait]
pub trait CommitEventSource: Send + Sync {
    /// Open a notification stream for the channel.
    ///
    /// Called once at startup and again on every reconnect attempt. The
    /// stream ends (the receiver yields `None`) when the underlying
    /// connection is lost.
    async fn subscribe(
        &self,
        channel_id: &str,
    ) -> ConnectorResult<mpsc::Receiver<CommitNotification>>;
}

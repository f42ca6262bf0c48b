//! Transaction Coordinator
//!
//! Orchestrates the submission protocol: proposal -> endorsement ->
//! broadcast -> commit confirmation for state-changing calls (`invoke`),
//! and direct evaluation for reads (`query`).
//!
//! Every network-facing step carries its own timeout and the coordinator
//! never retries: retry policy is a caller-level decision, informed by
//! [`ConnectorError::is_ambiguous`](crate::error::ConnectorError::is_ambiguous).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use flex_core::constants::{DEFAULT_COMMIT_TIMEOUT_SECS, DEFAULT_PROPOSAL_TIMEOUT_SECS};
use flex_core::types::{CallerContext, CommitStatus, ContractFunction};

use crate::error::{ConnectorError, ConnectorResult};
use crate::identity::SigningIdentity;
use crate::message::{
    BroadcastAck, CommitNotification, ProposalResponse, SignedProposal, TransactionEnvelope,
};
use crate::session::ChannelSession;

/// Supplies the caller's organization identity for every transaction.
///
/// Resolved from the calling request's session, not from the ledger
/// signing identity. A resolver failure fails the call before any network
/// I/O.
pub trait CallerContextResolver: Send + Sync {
    /// Resolve the current caller context
    fn resolve(&self) -> ConnectorResult<CallerContext>;
}

/// Fixed-context resolver for tooling and tests
pub struct StaticContextResolver {
    context: CallerContext,
}

impl StaticContextResolver {
    /// Create a resolver that always returns the given context
    pub fn new(context: CallerContext) -> Self {
        Self { context }
    }
}

impl CallerContextResolver for StaticContextResolver {
    fn resolve(&self) -> ConnectorResult<CallerContext> {
        Ok(self.context.clone())
    }
}

/// Result of a confirmed invoke
#[derive(Debug, Clone)]
pub struct TransactionResult {
    /// Commit validation status
    pub status: CommitStatus,
    /// Detail string from the ordering service
    pub info: String,
    /// Transaction id generated for the call
    pub transaction_id: String,
    /// Parsed endorsement-stage payload
    pub payload: serde_json::Value,
}

/// Per-step timeouts
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorTimeouts {
    /// Bound on proposal dispatch and endorsement collection
    pub proposal: Duration,
    /// Bound on the commit notification wait
    pub commit: Duration,
}

impl Default for CoordinatorTimeouts {
    fn default() -> Self {
        Self {
            proposal: Duration::from_secs(DEFAULT_PROPOSAL_TIMEOUT_SECS),
            commit: Duration::from_secs(DEFAULT_COMMIT_TIMEOUT_SECS),
        }
    }
}

/// The transaction coordinator
pub struct TransactionCoordinator {
    /// Channel sessions, immutable after initialization
    sessions: HashMap<String, Arc<ChannelSession>>,
    /// Connector signing identity
    identity: Arc<SigningIdentity>,
    /// Caller context source
    resolver: Arc<dyn CallerContextResolver>,
    /// Per-step timeouts
    timeouts: CoordinatorTimeouts,
}

impl TransactionCoordinator {
    /// Create a coordinator over the given sessions
    pub fn new(
        sessions: HashMap<String, Arc<ChannelSession>>,
        identity: Arc<SigningIdentity>,
        resolver: Arc<dyn CallerContextResolver>,
        timeouts: CoordinatorTimeouts,
    ) -> Self {
        Self {
            sessions,
            identity,
            resolver,
            timeouts,
        }
    }

    /// Known channel ids
    pub fn channels(&self) -> Vec<&str> {
        self.sessions.keys().map(String::as_str).collect()
    }

    fn session(&self, channel_id: &str) -> ConnectorResult<&Arc<ChannelSession>> {
        self.sessions
            .get(channel_id)
            .ok_or_else(|| ConnectorError::InvalidChannel(channel_id.to_string()))
    }

    /// Submit a state-changing transaction and wait for both the ordering
    /// acknowledgment and the commit notification.
    ///
    /// The resolved caller context is appended as the final wire argument
    /// automatically; callers pass business arguments only.
    pub async fn invoke(
        &self,
        function: &str,
        args: &[serde_json::Value],
        channel_id: &str,
    ) -> ConnectorResult<TransactionResult> {
        let session = self.session(channel_id)?;
        let function = ContractFunction::parse(function)?;
        let context = self.resolver.resolve()?;
        let proposal = SignedProposal::build(
            &self.identity,
            channel_id,
            &session.contract_id,
            &function,
            args,
            &context,
        )?;
        debug!(
            channel = %channel_id,
            function = %function,
            transaction_id = %proposal.transaction_id,
            endorsers = session.endorsers.len(),
            "Dispatching proposal"
        );

        let responses = self.collect_endorsements(session, &proposal).await?;
        let endorsements = validate_endorsements(responses)?;
        let payload_text = endorsed_payload(&endorsements);
        let envelope = TransactionEnvelope::assemble(&self.identity, proposal.clone(), endorsements);

        // Register before broadcasting so a fast commit cannot be missed.
        let commit_rx = session.listener.register(&proposal.transaction_id).await?;

        // Both signals must resolve before the call does: an accepted
        // broadcast without an observed commit (or the reverse) is not
        // success.
        let broadcast = self.broadcast_envelope(session, &envelope);
        let commit = self.await_commit(&proposal.transaction_id, commit_rx);
        match tokio::try_join!(broadcast, commit) {
            Ok((ack, notification)) => {
                info!(
                    channel = %channel_id,
                    function = %function,
                    transaction_id = %proposal.transaction_id,
                    status = %notification.status,
                    "Transaction confirmed"
                );
                Ok(TransactionResult {
                    status: notification.status,
                    info: ack.info,
                    transaction_id: proposal.transaction_id,
                    payload: parse_payload(&payload_text),
                })
            }
            Err(e) => {
                session.listener.unregister(&proposal.transaction_id).await;
                warn!(
                    channel = %channel_id,
                    function = %function,
                    transaction_id = %proposal.transaction_id,
                    error = %e,
                    "Transaction failed"
                );
                Err(e)
            }
        }
    }

    /// Evaluate a read-only contract function against the channel's
    /// endorsing nodes. Never broadcasts and never registers a commit
    /// listener; the first non-empty payload wins.
    pub async fn query(
        &self,
        function: &str,
        args: &[serde_json::Value],
        channel_id: &str,
    ) -> ConnectorResult<serde_json::Value> {
        let session = self.session(channel_id)?;
        let function = ContractFunction::parse(function)?;
        let context = self.resolver.resolve()?;
        let proposal = SignedProposal::build(
            &self.identity,
            channel_id,
            &session.contract_id,
            &function,
            args,
            &context,
        )?;

        let mut last_message = "no endorsing nodes configured".to_string();
        for node in &session.endorsers {
            match timeout(self.timeouts.proposal, node.endorse(&proposal)).await {
                Err(_) => {
                    last_message = format!("{}: evaluation timed out", node.name());
                    warn!(channel = %channel_id, node = node.name(), "Evaluation timed out");
                }
                Ok(Err(e)) => {
                    last_message = format!("{}: {}", node.name(), e);
                    warn!(channel = %channel_id, node = node.name(), error = %e, "Evaluation failed");
                }
                Ok(Ok(response)) if !response.is_success() => {
                    last_message = format!("{}: {}", node.name(), response.message);
                }
                Ok(Ok(response)) => {
                    if response.payload.is_empty() {
                        last_message = format!("{}: empty payload", node.name());
                        continue;
                    }
                    let raw = response.payload;
                    return match serde_json::from_str(&raw) {
                        Ok(value) => Ok(value),
                        Err(e) => Err(ConnectorError::QueryFailure {
                            message: format!("unparseable payload: {}", e),
                            payload: raw,
                        }),
                    };
                }
            }
        }
        Err(ConnectorError::QueryFailure {
            message: last_message,
            payload: String::new(),
        })
    }

    /// Look up a recently observed commit notification. This is the local
    /// reconciliation path after an ambiguous outcome
    /// (`CommitTimeout` / `ListenerDisconnected` / `BroadcastFailure`).
    pub async fn commit_status(
        &self,
        channel_id: &str,
        transaction_id: &str,
    ) -> ConnectorResult<Option<CommitNotification>> {
        let session = self.session(channel_id)?;
        Ok(session.listener.recent_status(transaction_id).await)
    }

    /// Number of in-flight commit registrations for a channel
    pub async fn pending_commits(&self, channel_id: &str) -> ConnectorResult<usize> {
        Ok(self.session(channel_id)?.listener.pending_count().await)
    }

    /// Send the proposal to every endorsing node concurrently, bounded as
    /// a whole by the proposal timeout.
    async fn collect_endorsements(
        &self,
        session: &ChannelSession,
        proposal: &SignedProposal,
    ) -> ConnectorResult<Vec<(String, ConnectorResult<ProposalResponse>)>> {
        let mut tasks = JoinSet::new();
        for node in &session.endorsers {
            let node = Arc::clone(node);
            let proposal = proposal.clone();
            tasks.spawn(async move {
                let result = node.endorse(&proposal).await;
                (node.name().to_string(), result)
            });
        }
        let gather = async {
            let mut responses = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(entry) => responses.push(entry),
                    Err(e) => responses.push((
                        "endorser".to_string(),
                        Err(ConnectorError::Transport(format!(
                            "endorsement task failed: {}",
                            e
                        ))),
                    )),
                }
            }
            responses
        };
        match timeout(self.timeouts.proposal, gather).await {
            Ok(responses) => Ok(responses),
            Err(_) => Err(ConnectorError::ProposalFailure {
                node: "*".to_string(),
                message: format!(
                    "proposal dispatch timed out after {}ms",
                    self.timeouts.proposal.as_millis()
                ),
            }),
        }
    }

    /// Hand the endorsed transaction to the channel's ordering service.
    /// Orderers are tried in profile order; the first acknowledgment wins.
    /// A non-success acknowledgment is authoritative and returned as is.
    async fn broadcast_envelope(
        &self,
        session: &ChannelSession,
        envelope: &TransactionEnvelope,
    ) -> ConnectorResult<BroadcastAck> {
        let mut last_error = "no ordering nodes configured".to_string();
        for orderer in &session.orderers {
            match orderer.broadcast(envelope).await {
                Ok(ack) if ack.status.is_success() => {
                    debug!(
                        orderer = orderer.name(),
                        transaction_id = %envelope.proposal.transaction_id,
                        "Broadcast accepted"
                    );
                    return Ok(ack);
                }
                Ok(ack) => {
                    return Err(ConnectorError::BroadcastFailure {
                        status: ack.status.as_str().to_string(),
                        info: ack.info,
                    });
                }
                Err(e) => {
                    warn!(orderer = orderer.name(), error = %e, "Broadcast attempt failed");
                    last_error = format!("{}: {}", orderer.name(), e);
                }
            }
        }
        Err(ConnectorError::BroadcastFailure {
            status: "UNREACHABLE".to_string(),
            info: last_error,
        })
    }

    /// Wait for the commit notification, bounded by the commit timeout
    async fn await_commit(
        &self,
        transaction_id: &str,
        rx: oneshot::Receiver<ConnectorResult<CommitNotification>>,
    ) -> ConnectorResult<CommitNotification> {
        match timeout(self.timeouts.commit, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ConnectorError::ListenerDisconnected(format!(
                "commit resolver dropped for transaction {}",
                transaction_id
            ))),
            Err(_) => Err(ConnectorError::CommitTimeout {
                transaction_id: transaction_id.to_string(),
                elapsed_ms: self.timeouts.commit.as_millis() as u64,
            }),
        }
    }
}

/// Admission-control gate: require at least one response, and reject the
/// call on any transport error or non-success endorsement so a malformed
/// proposal never reaches the ordering stage.
fn validate_endorsements(
    responses: Vec<(String, ConnectorResult<ProposalResponse>)>,
) -> ConnectorResult<Vec<ProposalResponse>> {
    if responses.is_empty() {
        return Err(ConnectorError::ProposalFailure {
            node: "*".to_string(),
            message: "no endorsing nodes responded".to_string(),
        });
    }
    let mut endorsements = Vec::with_capacity(responses.len());
    for (node, result) in responses {
        match result {
            Err(e) => {
                return Err(ConnectorError::ProposalFailure {
                    node,
                    message: e.to_string(),
                })
            }
            Ok(response) if !response.is_success() => {
                let message = if response.message.is_empty() {
                    format!("endorsement status {}", response.status)
                } else {
                    response.message
                };
                return Err(ConnectorError::ProposalFailure { node, message });
            }
            Ok(response) => endorsements.push(response),
        }
    }
    Ok(endorsements)
}

/// The endorsement-stage return value: first non-empty payload
fn endorsed_payload(endorsements: &[ProposalResponse]) -> String {
    endorsements
        .iter()
        .map(|e| e.payload.as_str())
        .find(|p| !p.is_empty())
        .unwrap_or("")
        .to_string()
}

fn parse_payload(raw: &str) -> serde_json::Value {
    if raw.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(node: &str, status: u32, message: &str, payload: &str) -> ProposalResponse {
        ProposalResponse {
            node: node.to_string(),
            status,
            message: message.to_string(),
            payload: payload.to_string(),
            signature: String::new(),
        }
    }

    #[test]
    fn test_validation_requires_responses() {
        let err = validate_endorsements(Vec::new()).unwrap_err();
        assert!(matches!(err, ConnectorError::ProposalFailure { .. }));
    }

    #[test]
    fn test_validation_propagates_node_message() {
        let responses = vec![
            (
                "endorser-1".to_string(),
                Ok(response("endorser-1", 200, "", "{}")),
            ),
            (
                "endorser-2".to_string(),
                Ok(response("endorser-2", 500, "duplicate id", "")),
            ),
        ];
        match validate_endorsements(responses).unwrap_err() {
            ConnectorError::ProposalFailure { node, message } => {
                assert_eq!(node, "endorser-2");
                assert_eq!(message, "duplicate id");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_validation_rejects_transport_errors() {
        let responses = vec![(
            "endorser-1".to_string(),
            Err(ConnectorError::Transport("connection refused".to_string())),
        )];
        match validate_endorsements(responses).unwrap_err() {
            ConnectorError::ProposalFailure { node, message } => {
                assert_eq!(node, "endorser-1");
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_endorsed_payload_takes_first_non_empty() {
        let endorsements = vec![
            response("endorser-1", 200, "", ""),
            response("endorser-2", 200, "", "{\"id\":\"A1\"}"),
        ];
        assert_eq!(endorsed_payload(&endorsements), "{\"id\":\"A1\"}");
        assert_eq!(endorsed_payload(&[]), "");
    }

    #[test]
    fn test_parse_payload_falls_back_to_text() {
        assert_eq!(parse_payload(""), serde_json::Value::Null);
        assert_eq!(
            parse_payload("{\"id\":\"A1\"}"),
            serde_json::json!({"id": "A1"})
        );
        assert_eq!(
            parse_payload("plain text"),
            serde_json::Value::String("plain text".to_string())
        );
    }
}

//! Transaction Message Types
//!
//! Wire messages exchanged with endorsing and ordering nodes.
//!
//! The argument vector of every proposal carries exactly two slots: the
//! JSON-serialized business argument array and the JSON-serialized caller
//! context. Ledger-resident contract code parses both slots positionally,
//! so this layout must be preserved exactly.

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use flex_core::constants::{ENDORSEMENT_SUCCESS_STATUS, WIRE_ARG_SLOTS};
use flex_core::types::{BlockInfo, CallerContext, CommitStatus, ContractFunction, TransactionId};

use crate::error::ConnectorResult;
use crate::identity::{domain, SigningIdentity};

/// A signed transaction proposal sent to endorsing nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedProposal {
    /// Transaction ID, fresh per call
    pub transaction_id: TransactionId,
    /// Target channel
    pub channel_id: String,
    /// Target contract
    pub contract_id: String,
    /// Contract function (`"<Resource>.<operation>"`)
    pub function: String,
    /// Two-slot argument vector (business args JSON, caller context JSON)
    pub args: Vec<String>,
    /// Creator public key (hex)
    pub creator: String,
    /// Proposal timestamp
    pub timestamp: DateTime<Utc>,
    /// Creator signature over the signing bytes (hex)
    pub signature: String,
}

impl SignedProposal {
    /// Build and sign a proposal with a fresh transaction id
    pub fn build(
        identity: &SigningIdentity,
        channel_id: &str,
        contract_id: &str,
        function: &ContractFunction,
        args: &[serde_json::Value],
        context: &CallerContext,
    ) -> ConnectorResult<Self> {
        let creator = identity.creator();
        let mut proposal = Self {
            transaction_id: generate_transaction_id(&creator),
            channel_id: channel_id.to_string(),
            contract_id: contract_id.to_string(),
            function: function.as_str().to_string(),
            args: build_wire_args(args, context)?,
            creator,
            timestamp: Utc::now(),
            signature: String::new(),
        };
        proposal.signature = identity.sign(domain::PROPOSAL, &proposal.signing_bytes());
        Ok(proposal)
    }

    /// Bytes covered by the proposal signature
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(self.transaction_id.as_bytes());
        data.extend_from_slice(self.channel_id.as_bytes());
        data.extend_from_slice(self.contract_id.as_bytes());
        data.extend_from_slice(self.function.as_bytes());
        for arg in &self.args {
            data.extend_from_slice(arg.as_bytes());
        }
        data.extend_from_slice(self.creator.as_bytes());
        data.extend_from_slice(self.timestamp.to_rfc3339().as_bytes());
        data
    }
}

/// Build the two-slot wire argument vector
pub fn build_wire_args(
    args: &[serde_json::Value],
    context: &CallerContext,
) -> ConnectorResult<Vec<String>> {
    let mut slots = Vec::with_capacity(WIRE_ARG_SLOTS);
    slots.push(serde_json::to_string(args)?);
    slots.push(serde_json::to_string(context)?);
    Ok(slots)
}

/// Generate a fresh transaction id: SHA-256 over a random nonce and the
/// creator key. Scoped to exactly one call, never reused.
pub fn generate_transaction_id(creator: &str) -> TransactionId {
    let mut nonce = [0u8; 16];
    OsRng.fill_bytes(&mut nonce);
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(creator.as_bytes());
    hex::encode(hasher.finalize())
}

/// Response from one endorsing node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalResponse {
    /// Responding node name
    pub node: String,
    /// Endorsement status code (200 = success)
    pub status: u32,
    /// Node message (rejection reason on failure)
    #[serde(default)]
    pub message: String,
    /// Simulation result payload (JSON text)
    #[serde(default)]
    pub payload: String,
    /// Endorsement signature (hex)
    #[serde(default)]
    pub signature: String,
}

impl ProposalResponse {
    /// Whether the node endorsed the proposal
    pub fn is_success(&self) -> bool {
        self.status == ENDORSEMENT_SUCCESS_STATUS
    }
}

/// An endorsed transaction bound for the ordering service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    /// The original signed proposal
    pub proposal: SignedProposal,
    /// Collected endorsements
    pub endorsements: Vec<ProposalResponse>,
    /// Connector signature over the envelope signing bytes (hex)
    pub signature: String,
}

impl TransactionEnvelope {
    /// Assemble a signed envelope from validated endorsements
    pub fn assemble(
        identity: &SigningIdentity,
        proposal: SignedProposal,
        endorsements: Vec<ProposalResponse>,
    ) -> Self {
        let mut envelope = Self {
            proposal,
            endorsements,
            signature: String::new(),
        };
        envelope.signature = identity.sign(domain::ENVELOPE, &envelope.signing_bytes());
        envelope
    }

    /// Bytes covered by the envelope signature
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut data = self.proposal.signing_bytes();
        for endorsement in &self.endorsements {
            data.extend_from_slice(endorsement.node.as_bytes());
            data.extend_from_slice(endorsement.signature.as_bytes());
        }
        data
    }
}

/// Broadcast status reported by the ordering service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastStatus {
    /// Accepted into the ordering queue
    Success,
    /// Rejected before ordering
    BadRequest,
    /// Ordering service unavailable or overloaded
    ServiceUnavailable,
}

impl BroadcastStatus {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::BadRequest => "BAD_REQUEST",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    /// Whether the ordering service accepted the transaction
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Ordering service receipt for a broadcast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastAck {
    /// Broadcast status
    pub status: BroadcastStatus,
    /// Status detail from the ordering node
    #[serde(default)]
    pub info: String,
}

/// Asynchronous notification that an ordered transaction was committed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitNotification {
    /// Transaction id this notification correlates with
    pub transaction_id: TransactionId,
    /// Validation status
    pub status: CommitStatus,
    /// Block the transaction landed in
    #[serde(default)]
    pub block: Option<BlockInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use flex_core::types::OrganizationRole;

    fn context() -> CallerContext {
        CallerContext {
            organization_id: "dso-7".to_string(),
            role: OrganizationRole::DistributionOperator,
        }
    }

    #[test]
    fn test_wire_args_have_two_slots() {
        let args = vec![serde_json::json!({"id": "A1"}), serde_json::json!(42)];
        let slots = build_wire_args(&args, &context()).unwrap();
        assert_eq!(slots.len(), WIRE_ARG_SLOTS);

        let business: Vec<serde_json::Value> = serde_json::from_str(&slots[0]).unwrap();
        assert_eq!(business, args);

        let ctx: serde_json::Value = serde_json::from_str(&slots[1]).unwrap();
        assert_eq!(ctx["organizationId"], "dso-7");
        assert_eq!(ctx["role"], "distribution_operator");
    }

    #[test]
    fn test_transaction_ids_are_unique_hex() {
        let a = generate_transaction_id("creator");
        let b = generate_transaction_id("creator");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_proposal_signature_verifies() {
        let identity = SigningIdentity::generate("connector-1");
        let function = ContractFunction::parse("Asset.create").unwrap();
        let proposal = SignedProposal::build(
            &identity,
            "operations",
            "energy-market",
            &function,
            &[serde_json::json!({"id": "A1"})],
            &context(),
        )
        .unwrap();

        assert!(identity.verify(domain::PROPOSAL, &proposal.signing_bytes(), &proposal.signature));
        assert_eq!(proposal.creator, identity.creator());
        assert_eq!(proposal.function, "Asset.create");
    }

    #[test]
    fn test_envelope_signature_covers_endorsements() {
        let identity = SigningIdentity::generate("connector-1");
        let function = ContractFunction::parse("Asset.create").unwrap();
        let proposal = SignedProposal::build(
            &identity,
            "operations",
            "energy-market",
            &function,
            &[],
            &context(),
        )
        .unwrap();
        let endorsement = ProposalResponse {
            node: "endorser-1".to_string(),
            status: 200,
            message: String::new(),
            payload: "{}".to_string(),
            signature: "abc123".to_string(),
        };

        let envelope =
            TransactionEnvelope::assemble(&identity, proposal.clone(), vec![endorsement]);
        assert!(identity.verify(domain::ENVELOPE, &envelope.signing_bytes(), &envelope.signature));

        let bare = TransactionEnvelope::assemble(&identity, proposal, vec![]);
        assert_ne!(bare.signing_bytes(), envelope.signing_bytes());
    }
}

//! Connector Error Types
//!
//! Failures are split into three classes: clean pre-broadcast rejections
//! (safe to resubmit), ambiguous outcomes (the transaction may or may not
//! have been committed) and fatal initialization errors. The class is
//! encoded in the type so callers can pick a recovery strategy without
//! parsing messages.

use thiserror::Error;

/// Connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Unknown channel requested
    #[error("Unknown channel: {0}")]
    InvalidChannel(String),

    /// Malformed contract function name
    #[error("Invalid contract function: {0}")]
    InvalidFunction(#[from] flex_core::types::FunctionParseError),

    /// Caller context could not be resolved
    #[error("Caller context unavailable: {0}")]
    ContextUnavailable(String),

    /// An endorsing node rejected or errored on the proposal
    #[error("Proposal rejected by {node}: {message}")]
    ProposalFailure { node: String, message: String },

    /// Ordering service reported non-success for an endorsed transaction
    #[error("Broadcast failed with status {status}: {info}")]
    BroadcastFailure { status: String, info: String },

    /// No commit notification arrived within the configured window
    #[error("No commit notification for transaction {transaction_id} within {elapsed_ms}ms")]
    CommitTimeout {
        transaction_id: String,
        elapsed_ms: u64,
    },

    /// Commit event stream lost while registrations were pending
    #[error("Commit event listener disconnected: {0}")]
    ListenerDisconnected(String),

    /// Empty or malformed read response
    #[error("Query failed: {message}")]
    QueryFailure { message: String, payload: String },

    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Fatal initialization failure
    #[error("Initialization failed: {0}")]
    Init(String),
}

/// Result type for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;

impl ConnectorError {
    /// Check if this is an ambiguous outcome: the transaction passed
    /// endorsement and may or may not have been committed. Callers should
    /// confirm (e.g. via `commit_status` or a ledger query) before
    /// resubmitting.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            ConnectorError::BroadcastFailure { .. }
                | ConnectorError::CommitTimeout { .. }
                | ConnectorError::ListenerDisconnected(_)
        )
    }

    /// Check if this error is fatal to the process: a half-initialized
    /// connector cannot safely serve any request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConnectorError::Init(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_classification() {
        assert!(ConnectorError::BroadcastFailure {
            status: "SERVICE_UNAVAILABLE".to_string(),
            info: String::new(),
        }
        .is_ambiguous());
        assert!(ConnectorError::CommitTimeout {
            transaction_id: "tx".to_string(),
            elapsed_ms: 10_000,
        }
        .is_ambiguous());
        assert!(ConnectorError::ListenerDisconnected("lost".to_string()).is_ambiguous());

        assert!(!ConnectorError::InvalidChannel("main".to_string()).is_ambiguous());
        assert!(!ConnectorError::ProposalFailure {
            node: "endorser-1".to_string(),
            message: "duplicate id".to_string(),
        }
        .is_ambiguous());
        assert!(!ConnectorError::QueryFailure {
            message: "empty".to_string(),
            payload: String::new(),
        }
        .is_ambiguous());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ConnectorError::Init("bad profile".to_string()).is_fatal());
        assert!(!ConnectorError::InvalidChannel("main".to_string()).is_fatal());
    }
}

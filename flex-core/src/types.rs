//! Core FlexLedger types
//!
//! Market roles, caller context and the contract function naming
//! convention shared by the connector and its callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transaction identifier (hex-encoded digest)
pub type TransactionId = String;

/// Market-role organization types recognized on the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationRole {
    /// Transmission system operator
    SystemOperator,
    /// Distribution system operator
    DistributionOperator,
    /// Balancing service provider
    BalancingProvider,
    /// Energy producer
    Producer,
}

impl OrganizationRole {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemOperator => "system_operator",
            Self::DistributionOperator => "distribution_operator",
            Self::BalancingProvider => "balancing_provider",
            Self::Producer => "producer",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "system_operator" | "tso" => Some(Self::SystemOperator),
            "distribution_operator" | "dso" => Some(Self::DistributionOperator),
            "balancing_provider" | "bsp" => Some(Self::BalancingProvider),
            "producer" => Some(Self::Producer),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrganizationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Organizational identity on whose behalf a transaction is issued.
///
/// Distinct from the transport-level signing identity: the context is
/// resolved from the calling request's session and appended to every
/// transaction's argument list so ledger-resident permission logic can be
/// context-aware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerContext {
    /// Organization identifier
    pub organization_id: String,
    /// Market role of the organization
    pub role: OrganizationRole,
}

/// Validation status reported by a commit notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitStatus {
    /// Committed and valid
    Success,
    /// Ordered but rejected by validation
    Failure,
}

impl CommitStatus {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }

    /// Whether the transaction was committed as valid
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for CommitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Block placement of a committed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Block number the transaction landed in
    pub block_number: u64,
    /// Position within the block
    #[serde(default)]
    pub transaction_index: Option<u32>,
}

/// Contract function name parse errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FunctionParseError {
    #[error("Function name must be '<Resource>.<operation>': {0}")]
    InvalidFormat(String),

    #[error("Function name contains an empty segment: {0}")]
    EmptySegment(String),

    #[error("Function name contains invalid characters: {0}")]
    InvalidCharacters(String),
}

/// A contract function name following the `"<Resource>.<operation>"`
/// convention (e.g. `"Order.createOrderActivationDocument"`).
///
/// Validated at construction so malformed names are rejected before any
/// network I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractFunction(String);

impl ContractFunction {
    /// Parse and validate a function name
    pub fn parse(name: &str) -> Result<Self, FunctionParseError> {
        let (resource, operation) = name
            .split_once('.')
            .ok_or_else(|| FunctionParseError::InvalidFormat(name.to_string()))?;
        if operation.contains('.') {
            return Err(FunctionParseError::InvalidFormat(name.to_string()));
        }
        if resource.is_empty() || operation.is_empty() {
            return Err(FunctionParseError::EmptySegment(name.to_string()));
        }
        let valid = |s: &str| s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid(resource) || !valid(operation) {
            return Err(FunctionParseError::InvalidCharacters(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// The resource segment (e.g. `"Order"`)
    pub fn resource(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// The operation segment (e.g. `"createOrderActivationDocument"`)
    pub fn operation(&self) -> &str {
        self.0.split('.').nth(1).unwrap_or("")
    }

    /// The full function name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for ContractFunction {
    type Err = FunctionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ContractFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(
            OrganizationRole::from_str("system_operator"),
            Some(OrganizationRole::SystemOperator)
        );
        assert_eq!(
            OrganizationRole::from_str("BSP"),
            Some(OrganizationRole::BalancingProvider)
        );
        assert_eq!(OrganizationRole::from_str("consumer"), None);
    }

    #[test]
    fn test_caller_context_wire_shape() {
        let ctx = CallerContext {
            organization_id: "tso-1".to_string(),
            role: OrganizationRole::SystemOperator,
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["organizationId"], "tso-1");
        assert_eq!(json["role"], "system_operator");
    }

    #[test]
    fn test_commit_status_wire_shape() {
        assert_eq!(
            serde_json::to_string(&CommitStatus::Success).unwrap(),
            "\"SUCCESS\""
        );
        assert_eq!(
            serde_json::from_str::<CommitStatus>("\"FAILURE\"").unwrap(),
            CommitStatus::Failure
        );
    }

    #[test]
    fn test_function_parsing() {
        let f = ContractFunction::parse("Order.createOrderActivationDocument").unwrap();
        assert_eq!(f.resource(), "Order");
        assert_eq!(f.operation(), "createOrderActivationDocument");
        assert_eq!(f.as_str(), "Order.createOrderActivationDocument");
    }

    #[test]
    fn test_function_parsing_rejects_malformed() {
        assert!(matches!(
            ContractFunction::parse("createBid"),
            Err(FunctionParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            ContractFunction::parse("Bid."),
            Err(FunctionParseError::EmptySegment(_))
        ));
        assert!(matches!(
            ContractFunction::parse(".create"),
            Err(FunctionParseError::EmptySegment(_))
        ));
        assert!(matches!(
            ContractFunction::parse("Bid.create.extra"),
            Err(FunctionParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            ContractFunction::parse("Bid.create now"),
            Err(FunctionParseError::InvalidCharacters(_))
        ));
    }
}

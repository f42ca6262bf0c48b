//! Network Profile and Connector Configuration
//!
//! The network profile is the static description of the ledger network:
//! signing identities, known nodes, and per-channel endorser/orderer sets
//! with their contract identifiers. It is loaded once at process start
//! and immutable for the process lifetime.
//!
//! Runtime selection (profile path, node and authority names, timeouts)
//! comes from environment variables with the FLEX_ prefix.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use flex_core::constants::{DEFAULT_COMMIT_TIMEOUT_SECS, DEFAULT_PROPOSAL_TIMEOUT_SECS};

use crate::error::{ConnectorError, ConnectorResult};

/// A network node endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEndpoint {
    /// Endpoint URL
    pub url: String,
    /// Optional TLS CA certificate path
    #[serde(default)]
    pub tls_ca_path: Option<PathBuf>,
}

/// Enrollment material for one signing authority
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityProfile {
    /// Enrollment identifier
    pub enrollment_id: String,
    /// Path to the hex-encoded Ed25519 secret key
    pub key_path: PathBuf,
}

/// Per-channel topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelProfile {
    /// Contract deployed on this channel
    pub contract_id: String,
    /// Names of endorsing nodes (must resolve in `nodes`)
    pub endorsers: Vec<String>,
    /// Names of ordering nodes (must resolve in `nodes`)
    pub orderers: Vec<String>,
    /// Node serving the commit event feed (defaults to the first endorser)
    #[serde(default)]
    pub event_source: Option<String>,
}

/// Static network profile, loaded once at process start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// Profile name
    pub name: String,
    /// Signing authorities (authority name -> enrollment material)
    pub identities: HashMap<String, IdentityProfile>,
    /// Known nodes (node name -> endpoint)
    pub nodes: HashMap<String, NodeEndpoint>,
    /// Channels (channel id -> topology)
    pub channels: HashMap<String, ChannelProfile>,
}

impl NetworkProfile {
    /// Load and validate a profile from a JSON file
    pub fn from_file(path: &Path) -> ConnectorResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConnectorError::Init(format!("Failed to read profile {}: {}", path.display(), e))
        })?;
        let profile: NetworkProfile = serde_json::from_str(&raw).map_err(|e| {
            ConnectorError::Init(format!("Failed to parse profile {}: {}", path.display(), e))
        })?;
        profile.validate()?;
        Ok(profile)
    }

    /// Validate topology constraints: every channel needs a contract id,
    /// at least one endorsing and one ordering node, and every referenced
    /// node name must resolve.
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.identities.is_empty() {
            return Err(ConnectorError::Init(format!(
                "Profile {} names no signing identities",
                self.name
            )));
        }
        if self.channels.is_empty() {
            return Err(ConnectorError::Init(format!(
                "Profile {} names no channels",
                self.name
            )));
        }
        for (channel_id, channel) in &self.channels {
            if channel.contract_id.is_empty() {
                return Err(ConnectorError::Init(format!(
                    "Channel {} has no contract id",
                    channel_id
                )));
            }
            if channel.endorsers.is_empty() {
                return Err(ConnectorError::Init(format!(
                    "Channel {} has no endorsing nodes",
                    channel_id
                )));
            }
            if channel.orderers.is_empty() {
                return Err(ConnectorError::Init(format!(
                    "Channel {} has no ordering nodes",
                    channel_id
                )));
            }
            let referenced = channel
                .endorsers
                .iter()
                .chain(channel.orderers.iter())
                .chain(channel.event_source.iter());
            for name in referenced {
                if !self.nodes.contains_key(name) {
                    return Err(ConnectorError::Init(format!(
                        "Channel {} references unknown node {}",
                        channel_id, name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolve a node endpoint by name
    pub fn endpoint(&self, name: &str) -> ConnectorResult<&NodeEndpoint> {
        self.nodes
            .get(name)
            .ok_or_else(|| ConnectorError::Init(format!("Unknown node: {}", name)))
    }
}

/// Connector runtime configuration
///
/// Environment variables:
/// - FLEX_PROFILE_PATH: network profile path
/// - FLEX_CLIENT_NODE: preferred node for the commit event feed
/// - FLEX_AUTHORITY: signing authority name (required when the profile
///   names more than one identity)
/// - FLEX_PROPOSAL_TIMEOUT_SECS: proposal dispatch timeout
/// - FLEX_COMMIT_TIMEOUT_SECS: commit notification timeout
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Network profile path
    pub profile_path: PathBuf,
    /// Preferred node for the commit event feed
    pub client_node: Option<String>,
    /// Signing authority name
    pub authority: Option<String>,
    /// Proposal dispatch timeout in seconds
    pub proposal_timeout_secs: u64,
    /// Commit notification timeout in seconds
    pub commit_timeout_secs: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            profile_path: PathBuf::from("network-profile.json"),
            client_node: None,
            authority: None,
            proposal_timeout_secs: DEFAULT_PROPOSAL_TIMEOUT_SECS,
            commit_timeout_secs: DEFAULT_COMMIT_TIMEOUT_SECS,
        }
    }
}

impl ConnectorConfig {
    /// Load configuration from environment variables, resolved once at
    /// startup and never re-read per call
    pub fn from_env() -> Self {
        Self {
            profile_path: env::var("FLEX_PROFILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("network-profile.json")),
            client_node: env::var("FLEX_CLIENT_NODE").ok(),
            authority: env::var("FLEX_AUTHORITY").ok(),
            proposal_timeout_secs: env::var("FLEX_PROPOSAL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PROPOSAL_TIMEOUT_SECS),
            commit_timeout_secs: env::var("FLEX_COMMIT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_COMMIT_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> NetworkProfile {
        let mut identities = HashMap::new();
        identities.insert(
            "market-authority".to_string(),
            IdentityProfile {
                enrollment_id: "connector-1".to_string(),
                key_path: PathBuf::from("keys/connector-1.key"),
            },
        );
        let mut nodes = HashMap::new();
        for name in ["endorser-1", "endorser-2", "orderer-1"] {
            nodes.insert(
                name.to_string(),
                NodeEndpoint {
                    url: format!("http://{}:7051", name),
                    tls_ca_path: None,
                },
            );
        }
        let mut channels = HashMap::new();
        channels.insert(
            "operations".to_string(),
            ChannelProfile {
                contract_id: "energy-market".to_string(),
                endorsers: vec!["endorser-1".to_string(), "endorser-2".to_string()],
                orderers: vec!["orderer-1".to_string()],
                event_source: None,
            },
        );
        NetworkProfile {
            name: "test-net".to_string(),
            identities,
            nodes,
            channels,
        }
    }

    #[test]
    fn test_valid_profile_passes() {
        assert!(sample_profile().validate().is_ok());
    }

    #[test]
    fn test_profile_rejects_missing_orderers() {
        let mut profile = sample_profile();
        if let Some(channel) = profile.channels.get_mut("operations") {
            channel.orderers.clear();
        }
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("no ordering nodes"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_profile_rejects_unknown_node_reference() {
        let mut profile = sample_profile();
        if let Some(channel) = profile.channels.get_mut("operations") {
            channel.endorsers.push("ghost".to_string());
        }
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("unknown node ghost"));
    }

    #[test]
    fn test_profile_rejects_empty_contract() {
        let mut profile = sample_profile();
        if let Some(channel) = profile.channels.get_mut("operations") {
            channel.contract_id.clear();
        }
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_profile_roundtrip() {
        let profile = sample_profile();
        let json = serde_json::to_string(&profile).unwrap();
        let parsed: NetworkProfile = serde_json::from_str(&json).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.channels.len(), 1);
    }
}

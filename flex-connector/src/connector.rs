//! Connector Composition Root
//!
//! The `LedgerConnector` owns the channel sessions and their commit
//! listeners. It is constructed explicitly by the composition root (no
//! process-wide singleton) and torn down with [`shutdown`], which closes
//! every listener and fails its pending registrations.
//!
//! [`shutdown`]: LedgerConnector::shutdown

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::coordinator::{
    CallerContextResolver, CoordinatorTimeouts, TransactionCoordinator, TransactionResult,
};
use crate::error::{ConnectorError, ConnectorResult};
use crate::identity::SigningIdentity;
use crate::message::CommitNotification;
use crate::node::{CommitEventSource, EndorsingNode, OrderingNode};
use crate::profile::{ConnectorConfig, NetworkProfile};
use crate::session::ChannelSession;
use crate::transport::{
    HttpCommitEventSource, HttpEndorsingNode, HttpOrderingNode, HttpTransportConfig,
};

/// Resolved wiring for one channel (custom transports, tests, embedded
/// deployments)
pub struct ChannelTopology {
    /// Channel id
    pub channel_id: String,
    /// Contract deployed on the channel
    pub contract_id: String,
    /// Endorsing node set
    pub endorsers: Vec<Arc<dyn EndorsingNode>>,
    /// Ordering node set
    pub orderers: Vec<Arc<dyn OrderingNode>>,
    /// Commit event feed
    pub event_source: Arc<dyn CommitEventSource>,
}

/// The ledger connector: channel sessions, signing identity and the
/// transaction coordinator, initialized once and shared for the process
/// lifetime.
pub struct LedgerConnector {
    coordinator: TransactionCoordinator,
    sessions: Vec<Arc<ChannelSession>>,
}

impl std::fmt::Debug for LedgerConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConnector")
            .field("channels", &self.coordinator.channels())
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl LedgerConnector {
    /// Initialize from runtime configuration and the JSON network
    /// profile, wiring HTTP transports for every node.
    ///
    /// Any failure (unreadable profile or key material, invalid topology,
    /// commit subscription failure) is fatal: there is no
    /// partial-initialization mode, the process should terminate rather
    /// than run degraded.
    pub async fn initialize(
        config: &ConnectorConfig,
        resolver: Arc<dyn CallerContextResolver>,
    ) -> ConnectorResult<Self> {
        let profile = NetworkProfile::from_file(&config.profile_path)?;
        let identity = Arc::new(load_identity(&profile, config)?);
        let http = HttpTransportConfig::default();

        let mut topologies = Vec::new();
        for (channel_id, channel) in &profile.channels {
            let mut endorsers: Vec<Arc<dyn EndorsingNode>> = Vec::new();
            for name in &channel.endorsers {
                let endpoint = profile.endpoint(name)?;
                endorsers.push(Arc::new(HttpEndorsingNode::new(name, &endpoint.url, &http)?));
            }
            let mut orderers: Vec<Arc<dyn OrderingNode>> = Vec::new();
            for name in &channel.orderers {
                let endpoint = profile.endpoint(name)?;
                orderers.push(Arc::new(HttpOrderingNode::new(name, &endpoint.url, &http)?));
            }
            let source_name = config
                .client_node
                .clone()
                .or_else(|| channel.event_source.clone())
                .or_else(|| channel.endorsers.first().cloned())
                .ok_or_else(|| {
                    ConnectorError::Init(format!("Channel {} has no endorsing nodes", channel_id))
                })?;
            let endpoint = profile.endpoint(&source_name)?;
            let event_source: Arc<dyn CommitEventSource> = Arc::new(HttpCommitEventSource::new(
                &source_name,
                &endpoint.url,
                &http,
            )?);
            topologies.push(ChannelTopology {
                channel_id: channel_id.clone(),
                contract_id: channel.contract_id.clone(),
                endorsers,
                orderers,
                event_source,
            });
        }

        let timeouts = CoordinatorTimeouts {
            proposal: Duration::from_secs(config.proposal_timeout_secs),
            commit: Duration::from_secs(config.commit_timeout_secs),
        };
        Self::with_channels(identity, resolver, topologies, timeouts).await
    }

    /// Wire explicitly-provided channel topologies. This is the path for
    /// custom transports; every channel's commit subscription is opened
    /// before the connector is handed out.
    pub async fn with_channels(
        identity: Arc<SigningIdentity>,
        resolver: Arc<dyn CallerContextResolver>,
        topologies: Vec<ChannelTopology>,
        timeouts: CoordinatorTimeouts,
    ) -> ConnectorResult<Self> {
        if topologies.is_empty() {
            return Err(ConnectorError::Init("no channels configured".to_string()));
        }
        let mut sessions = HashMap::new();
        let mut owned = Vec::new();
        for topology in topologies {
            let session = Arc::new(ChannelSession::new(
                &topology.channel_id,
                &topology.contract_id,
                topology.endorsers,
                topology.orderers,
                topology.event_source,
            )?);
            session.open().await?;
            sessions.insert(topology.channel_id.clone(), Arc::clone(&session));
            owned.push(session);
        }
        info!(channels = owned.len(), "Ledger connector initialized");
        Ok(Self {
            coordinator: TransactionCoordinator::new(sessions, identity, resolver, timeouts),
            sessions: owned,
        })
    }

    /// Submit a state-changing transaction and wait for commit
    /// confirmation
    pub async fn invoke(
        &self,
        function: &str,
        args: &[serde_json::Value],
        channel_id: &str,
    ) -> ConnectorResult<TransactionResult> {
        self.coordinator.invoke(function, args, channel_id).await
    }

    /// Evaluate a read-only contract function
    pub async fn query(
        &self,
        function: &str,
        args: &[serde_json::Value],
        channel_id: &str,
    ) -> ConnectorResult<serde_json::Value> {
        self.coordinator.query(function, args, channel_id).await
    }

    /// Look up a recently observed commit notification
    pub async fn commit_status(
        &self,
        channel_id: &str,
        transaction_id: &str,
    ) -> ConnectorResult<Option<CommitNotification>> {
        self.coordinator
            .commit_status(channel_id, transaction_id)
            .await
    }

    /// Number of in-flight commit registrations for a channel
    pub async fn pending_commits(&self, channel_id: &str) -> ConnectorResult<usize> {
        self.coordinator.pending_commits(channel_id).await
    }

    /// Access the transaction coordinator
    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    /// Close every commit listener and fail its pending registrations
    pub async fn shutdown(&self) {
        for session in &self.sessions {
            session.listener.shutdown().await;
        }
        info!("Ledger connector shut down");
    }
}

/// Select and load the signing identity named by the configuration
fn load_identity(
    profile: &NetworkProfile,
    config: &ConnectorConfig,
) -> ConnectorResult<SigningIdentity> {
    let identity_profile = match &config.authority {
        Some(name) => profile
            .identities
            .get(name)
            .ok_or_else(|| ConnectorError::Init(format!("Unknown authority: {}", name)))?,
        None => {
            let mut values = profile.identities.values();
            match (values.next(), values.next()) {
                (Some(only), None) => only,
                _ => {
                    return Err(ConnectorError::Init(
                        "FLEX_AUTHORITY must be set when the profile names multiple identities"
                            .to_string(),
                    ))
                }
            }
        }
    };
    SigningIdentity::from_key_file(&identity_profile.key_path, &identity_profile.enrollment_id)
}

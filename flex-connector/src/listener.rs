//! Commit Event Listener
//!
//! Maintains one persistent commit notification subscription per channel
//! and correlates incoming notifications with pending `invoke` calls by
//! transaction id. Each pending registration resolves exactly once;
//! duplicate deliveries are dropped. On stream loss every pending
//! registration is failed explicitly (no caller is left hanging) and the
//! subscription is re-established with capped exponential backoff.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, error, info, warn};

use flex_core::constants::{
    MAX_RECONNECT_ATTEMPTS, RECENT_COMMIT_CAPACITY, RECONNECT_DELAY_CAP_MS, RECONNECT_DELAY_MS,
};
use flex_core::types::TransactionId;

use crate::error::{ConnectorError, ConnectorResult};
use crate::message::CommitNotification;
use crate::node::CommitEventSource;

/// Listener connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// No active subscription
    Disconnected,
    /// Re-establishing the subscription
    Connecting,
    /// Subscription active, notifications flowing
    Connected,
}

type CommitResolver = oneshot::Sender<ConnectorResult<CommitNotification>>;

/// Per-channel commit event listener
///
/// Cheap to clone; all clones share the same subscription, registry and
/// state.
#[derive(Clone)]
pub struct CommitListener {
    /// Channel this listener serves
    channel_id: String,
    /// Notification source
    source: Arc<dyn CommitEventSource>,
    /// Connection state
    state: Arc<RwLock<ListenerState>>,
    /// Pending registrations (transaction id -> resolver)
    pending: Arc<RwLock<HashMap<TransactionId, CommitResolver>>>,
    /// Recently delivered notifications, newest last
    recent: Arc<RwLock<VecDeque<CommitNotification>>>,
    /// Shutdown signal
    shutdown: Arc<RwLock<bool>>,
}

impl CommitListener {
    /// Create a listener for a channel (not yet subscribed)
    pub fn new(channel_id: &str, source: Arc<dyn CommitEventSource>) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            source,
            state: Arc::new(RwLock::new(ListenerState::Disconnected)),
            pending: Arc::new(RwLock::new(HashMap::new())),
            recent: Arc::new(RwLock::new(VecDeque::new())),
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// Open the subscription and start the dispatch task.
    ///
    /// A failure here is fatal: without a commit feed no invoke can ever
    /// be confirmed on this channel.
    pub async fn start(&self) -> ConnectorResult<()> {
        let rx = self.source.subscribe(&self.channel_id).await.map_err(|e| {
            ConnectorError::Init(format!(
                "Commit subscription for channel {} failed: {}",
                self.channel_id, e
            ))
        })?;
        *self.state.write().await = ListenerState::Connected;
        info!(channel = %self.channel_id, "Commit event listener connected");
        let listener = self.clone();
        tokio::spawn(async move { listener.run(rx).await });
        Ok(())
    }

    /// Current connection state
    pub async fn state(&self) -> ListenerState {
        *self.state.read().await
    }

    /// Register interest in a transaction id. The returned receiver
    /// resolves exactly once: with the commit notification, or with an
    /// error if the subscription is lost first.
    pub async fn register(
        &self,
        transaction_id: &str,
    ) -> ConnectorResult<oneshot::Receiver<ConnectorResult<CommitNotification>>> {
        if *self.state.read().await != ListenerState::Connected {
            return Err(ConnectorError::ListenerDisconnected(format!(
                "channel {} has no active commit subscription",
                self.channel_id
            )));
        }
        let (tx, rx) = oneshot::channel();
        self.pending
            .write()
            .await
            .insert(transaction_id.to_string(), tx);
        Ok(rx)
    }

    /// Remove a pending registration (timeout or failure teardown)
    pub async fn unregister(&self, transaction_id: &str) {
        if self.pending.write().await.remove(transaction_id).is_some() {
            debug!(channel = %self.channel_id, transaction_id, "Commit registration removed");
        }
    }

    /// Whether a transaction id is still registered
    pub async fn is_registered(&self, transaction_id: &str) -> bool {
        self.pending.read().await.contains_key(transaction_id)
    }

    /// Number of pending registrations
    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    /// Look up a recently delivered notification. This is the local
    /// reconciliation path after an ambiguous outcome.
    pub async fn recent_status(&self, transaction_id: &str) -> Option<CommitNotification> {
        self.recent
            .read()
            .await
            .iter()
            .rev()
            .find(|n| n.transaction_id == transaction_id)
            .cloned()
    }

    /// Stop the listener and fail all pending registrations
    pub async fn shutdown(&self) {
        *self.shutdown.write().await = true;
        *self.state.write().await = ListenerState::Disconnected;
        self.fail_pending("listener shut down").await;
        info!(channel = %self.channel_id, "Commit event listener stopped");
    }

    async fn run(self, mut rx: mpsc::Receiver<CommitNotification>) {
        loop {
            while let Some(notification) = rx.recv().await {
                self.dispatch(notification).await;
            }
            // Stream ended: either shutdown or a lost connection.
            if *self.shutdown.read().await {
                break;
            }
            *self.state.write().await = ListenerState::Disconnected;
            warn!(channel = %self.channel_id, "Commit event stream lost");
            self.fail_pending("commit event stream disconnected").await;
            match self.resubscribe().await {
                Some(new_rx) => rx = new_rx,
                None => {
                    error!(channel = %self.channel_id, "Commit event subscription abandoned");
                    break;
                }
            }
        }
    }

    /// Resolve the pending registration exactly once; a notification
    /// without a pending entry (duplicate or unclaimed) is dropped.
    async fn dispatch(&self, notification: CommitNotification) {
        match self
            .pending
            .write()
            .await
            .remove(&notification.transaction_id)
        {
            Some(resolver) => {
                debug!(
                    channel = %self.channel_id,
                    transaction_id = %notification.transaction_id,
                    status = %notification.status,
                    "Commit notification delivered"
                );
                let _ = resolver.send(Ok(notification.clone()));
            }
            None => {
                debug!(
                    channel = %self.channel_id,
                    transaction_id = %notification.transaction_id,
                    "Commit notification without pending registration"
                );
            }
        }
        let mut recent = self.recent.write().await;
        recent.push_back(notification);
        while recent.len() > RECENT_COMMIT_CAPACITY {
            recent.pop_front();
        }
    }

    /// Fail every pending registration explicitly so no invoke caller is
    /// blocked past the stream's lifetime.
    async fn fail_pending(&self, reason: &str) {
        let mut pending = self.pending.write().await;
        if pending.is_empty() {
            return;
        }
        warn!(
            channel = %self.channel_id,
            count = pending.len(),
            reason,
            "Failing pending commit registrations"
        );
        for (transaction_id, resolver) in pending.drain() {
            let _ = resolver.send(Err(ConnectorError::ListenerDisconnected(format!(
                "transaction {}: {}",
                transaction_id, reason
            ))));
        }
    }

    /// Re-establish the subscription with capped exponential backoff
    async fn resubscribe(&self) -> Option<mpsc::Receiver<CommitNotification>> {
        let mut delay = RECONNECT_DELAY_MS;
        for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
            if *self.shutdown.read().await {
                return None;
            }
            *self.state.write().await = ListenerState::Connecting;
            match self.source.subscribe(&self.channel_id).await {
                Ok(rx) => {
                    *self.state.write().await = ListenerState::Connected;
                    info!(channel = %self.channel_id, attempt, "Commit event listener reconnected");
                    return Some(rx);
                }
                Err(e) => {
                    warn!(channel = %self.channel_id, attempt, error = %e, "Commit event reconnect failed");
                }
            }
            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay = (delay * 2).min(RECONNECT_DELAY_CAP_MS);
        }
        *self.state.write().await = ListenerState::Disconnected;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flex_core::types::CommitStatus;
    use tokio::sync::Mutex;

    /// Event source whose subscription rounds are scripted by the test
    struct ScriptedSource {
        feeds: Mutex<Vec<mpsc::Receiver<CommitNotification>>>,
        subscriptions: std::sync::atomic::AtomicU32,
    }

    impl ScriptedSource {
        fn with_rounds(rounds: usize) -> (Arc<Self>, Vec<mpsc::Sender<CommitNotification>>) {
            let mut feeds = Vec::new();
            let mut senders = Vec::new();
            for _ in 0..rounds {
                let (tx, rx) = mpsc::channel(16);
                feeds.push(rx);
                senders.push(tx);
            }
            (
                Arc::new(Self {
                    feeds: Mutex::new(feeds),
                    subscriptions: std::sync::atomic::AtomicU32::new(0),
                }),
                senders,
            )
        }

        fn subscription_count(&self) -> u32 {
            self.subscriptions.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CommitEventSource for ScriptedSource {
        async fn subscribe(
            &self,
            _channel_id: &str,
        ) -> ConnectorResult<mpsc::Receiver<CommitNotification>> {
            let mut feeds = self.feeds.lock().await;
            if feeds.is_empty() {
                return Err(ConnectorError::Transport("feed unavailable".to_string()));
            }
            self.subscriptions
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(feeds.remove(0))
        }
    }

    fn notification(transaction_id: &str) -> CommitNotification {
        CommitNotification {
            transaction_id: transaction_id.to_string(),
            status: CommitStatus::Success,
            block: None,
        }
    }

    async fn wait_for_state(listener: &Arc<CommitListener>, wanted: ListenerState) {
        for _ in 0..200 {
            if listener.state().await == wanted {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("listener never reached {:?}", wanted);
    }

    #[tokio::test]
    async fn test_register_refused_before_start() {
        let (source, _senders) = ScriptedSource::with_rounds(1);
        let listener = Arc::new(CommitListener::new("operations", source));
        let err = listener.register("tx-1").await.unwrap_err();
        assert!(matches!(err, ConnectorError::ListenerDisconnected(_)));
    }

    #[tokio::test]
    async fn test_dispatch_resolves_pending_once() {
        let (source, senders) = ScriptedSource::with_rounds(1);
        let listener = Arc::new(CommitListener::new("operations", source));
        listener.start().await.unwrap();

        let rx = listener.register("tx-1").await.unwrap();
        senders[0].send(notification("tx-1")).await.unwrap();

        let delivered = rx.await.unwrap().unwrap();
        assert_eq!(delivered.transaction_id, "tx-1");
        assert_eq!(listener.pending_count().await, 0);

        // Duplicate delivery: dropped, not redelivered, no panic.
        senders[0].send(notification("tx-1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(listener.pending_count().await, 0);
        assert!(listener.recent_status("tx-1").await.is_some());
    }

    #[tokio::test]
    async fn test_unregister_removes_pending() {
        let (source, _senders) = ScriptedSource::with_rounds(1);
        let listener = Arc::new(CommitListener::new("operations", source));
        listener.start().await.unwrap();

        let _rx = listener.register("tx-1").await.unwrap();
        assert!(listener.is_registered("tx-1").await);
        listener.unregister("tx-1").await;
        assert!(!listener.is_registered("tx-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_loss_fails_pending_explicitly() {
        let (source, senders) = ScriptedSource::with_rounds(1);
        let listener = Arc::new(CommitListener::new("operations", source));
        listener.start().await.unwrap();

        let rx = listener.register("tx-1").await.unwrap();
        drop(senders);

        let outcome = rx.await.unwrap();
        let err = outcome.unwrap_err();
        assert!(matches!(err, ConnectorError::ListenerDisconnected(_)));
        assert!(err.is_ambiguous());
        assert_eq!(listener.pending_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_stream_loss() {
        let (source, mut senders) = ScriptedSource::with_rounds(2);
        let listener = Arc::new(CommitListener::new(
            "operations",
            Arc::clone(&source) as Arc<dyn CommitEventSource>,
        ));
        listener.start().await.unwrap();

        let second = senders.pop().unwrap();
        // Dropping the first round's sender ends the active stream.
        drop(senders.pop().unwrap());

        for _ in 0..200 {
            if source.subscription_count() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(source.subscription_count(), 2);
        wait_for_state(&listener, ListenerState::Connected).await;

        let rx = listener.register("tx-2").await.unwrap();
        second.send(notification("tx-2")).await.unwrap();
        let delivered = rx.await.unwrap().unwrap();
        assert_eq!(delivered.transaction_id, "tx-2");
    }

    #[tokio::test]
    async fn test_shutdown_fails_pending_and_refuses_new() {
        let (source, _senders) = ScriptedSource::with_rounds(1);
        let listener = Arc::new(CommitListener::new("operations", source));
        listener.start().await.unwrap();

        let rx = listener.register("tx-1").await.unwrap();
        listener.shutdown().await;

        assert!(matches!(
            rx.await.unwrap(),
            Err(ConnectorError::ListenerDisconnected(_))
        ));
        assert!(listener.register("tx-2").await.is_err());
        assert_eq!(listener.state().await, ListenerState::Disconnected);
    }
}

//! Consumer-facing handle of the realtime channel client.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::connection::{Command, Session, Settings, Supervisor};
use super::outbox::{Queued, ReplayBuffer};
use super::state::ObservedState;
use super::status::ConnectionStatus;
use super::subscription::SubscriptionSet;
use crate::config::{ClientConfig, MIN_HEARTBEAT};
use crate::error::ClientError;
use crate::protocol::ControlMessage;

/// Reconnecting realtime channel client.
///
/// The client is created idle. [`start`](Self::start) spawns a background
/// task that connects to `<ws_base_url>/<user_id>`, keeps the connection
/// alive with heartbeats, and reconnects with capped exponential backoff.
/// [`stop`](Self::stop) tears everything down; dropping the client aborts
/// the task.
///
/// The subscription set belongs to the client, not the socket: channels
/// added while disconnected are sent in full right after the next
/// successful connection.
///
/// # Example
///
/// ```no_run
/// use dropship_realtime::client::RealtimeClient;
/// use dropship_realtime::config::ClientConfig;
///
/// # async fn demo() -> Result<(), dropship_realtime::error::ClientError> {
/// let mut client = RealtimeClient::new(ClientConfig::default());
/// client.subscribe(&["metrics", "alerts"]);
/// client.start("42").await?;
///
/// let mut updates = client.watch_state();
/// while updates.changed().await.is_ok() {
///     let state = updates.borrow_and_update().clone();
///     println!("{} alerts", state.alerts.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RealtimeClient {
    config: ClientConfig,
    subscriptions: SubscriptionSet,
    outbox: ReplayBuffer,
    state: Arc<watch::Sender<ObservedState>>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    running: Option<Running>,
    last_user: Option<String>,
}

#[derive(Debug)]
struct Running {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<Session>,
}

impl RealtimeClient {
    /// Creates an idle client.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let (state, _) = watch::channel(ObservedState::default());
        let (status, _) = watch::channel(ConnectionStatus::default());
        let outbox = ReplayBuffer::new(config.replay_buffer_capacity);
        Self {
            config,
            subscriptions: SubscriptionSet::new(),
            outbox,
            state: Arc::new(state),
            status: Arc::new(status),
            running: None,
            last_user: None,
        }
    }

    /// Starts connecting as `user_id`. A running client is stopped first.
    ///
    /// Observed state is reset when the identity differs from the previous
    /// run. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingIdentity`] for a blank user id and
    /// [`ClientError::InvalidEndpoint`] for a non-WebSocket base URL.
    pub async fn start(&mut self, user_id: &str) -> Result<(), ClientError> {
        let endpoint = self.config.endpoint_for(user_id)?;
        self.stop().await;

        let user_id = user_id.trim().to_string();
        if self.last_user.as_deref() != Some(user_id.as_str()) {
            self.state.send_replace(ObservedState::default());
        }
        self.last_user = Some(user_id);

        tracing::info!(endpoint = %endpoint, "starting realtime client");
        let settings = Settings {
            endpoint,
            heartbeat: self.config.heartbeat_interval.max(MIN_HEARTBEAT),
            max_attempts: self.config.max_reconnect_attempts,
            backoff: self.config.backoff(),
        };
        let session = Session {
            subscriptions: self.subscriptions.clone(),
            outbox: std::mem::take(&mut self.outbox),
        };
        let (commands, rx) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(
            settings,
            session,
            rx,
            Arc::clone(&self.state),
            Arc::clone(&self.status),
        );

        let task = tokio::spawn(supervisor.run());
        self.running = Some(Running { commands, task });
        Ok(())
    }

    /// Starts with the identity from [`ClientConfig::user_id`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingIdentity`] when no user id is
    /// configured, plus everything [`start`](Self::start) returns.
    pub async fn start_from_config(&mut self) -> Result<(), ClientError> {
        let user_id = self
            .config
            .user_id
            .clone()
            .ok_or(ClientError::MissingIdentity)?;
        self.start(&user_id).await
    }

    /// Stops the client: cancels any pending reconnect, closes the socket and
    /// waits for the background task to finish. Idempotent.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        // The task may already be gone; the join below tells us how.
        let _ = running.commands.send(Command::Shutdown);

        match running.task.await {
            Ok(session) => self.outbox = session.outbox,
            Err(e) => {
                tracing::error!(error = %e, "realtime task ended abnormally; replay buffer lost");
                self.outbox = ReplayBuffer::new(self.config.replay_buffer_capacity);
            }
        }
        self.state.send_modify(|s| s.connected = false);
        self.status.send_replace(ConnectionStatus::default());
    }

    /// Adds channels to the subscription set.
    ///
    /// While connected the server is told immediately; otherwise the full
    /// set goes out on the next successful connection.
    pub fn subscribe<S: AsRef<str>>(&mut self, channels: &[S]) {
        let channels = normalize(channels);
        if channels.is_empty() {
            return;
        }
        self.subscriptions.subscribe(&channels);
        self.forward(Command::Subscribe(channels));
    }

    /// Removes channels from the subscription set, telling the server if
    /// connected.
    pub fn unsubscribe<S: AsRef<str>>(&mut self, channels: &[S]) {
        let channels = normalize(channels);
        if channels.is_empty() {
            return;
        }
        self.subscriptions.unsubscribe(&channels);
        self.forward(Command::Unsubscribe(channels));
    }

    /// Sends an arbitrary JSON payload if the connection is open.
    ///
    /// When not connected the message is dropped, or queued if the replay
    /// buffer is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Encode`] if `message` cannot be serialized.
    pub fn send<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<(), ClientError> {
        let text = serde_json::to_string(message)?;
        if self.running.is_some() {
            self.forward(Command::Send(text));
        } else if self.outbox.push(text) == Queued::Dropped {
            tracing::debug!("client idle; dropping outbound message");
        }
        Ok(())
    }

    /// Asks the server to re-push the latest data of `kind`.
    ///
    /// # Errors
    ///
    /// Propagates [`send`](Self::send) errors.
    pub fn refresh(&mut self, kind: &str) -> Result<(), ClientError> {
        self.send(&ControlMessage::Refresh {
            refresh_type: kind.to_string(),
        })
    }

    /// Snapshot of the observed state.
    #[must_use]
    pub fn state(&self) -> ObservedState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every observed state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ObservedState> {
        self.state.subscribe()
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Receiver notified on every connection status change.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Channels currently in the subscription set, sorted.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.to_vec()
    }

    /// Returns `true` between [`start`](Self::start) and [`stop`](Self::stop).
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running.is_some()
    }

    fn forward(&self, cmd: Command) {
        if let Some(running) = &self.running
            && running.commands.send(cmd).is_err()
        {
            tracing::warn!("realtime task is gone; command discarded");
        }
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.task.abort();
        }
    }
}

fn normalize<S: AsRef<str>>(channels: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(channels.len());
    for channel in channels {
        let channel = channel.as_ref().trim();
        if !channel.is_empty() && !out.iter().any(|c| c == channel) {
            out.push(channel.to_string());
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::client::ConnectionPhase;

    #[test]
    fn idle_subscriptions_net_out() {
        let mut client = RealtimeClient::new(ClientConfig::default());
        client.subscribe(&["metrics", "alerts", "metrics"]);
        client.unsubscribe(&["alerts"]);
        client.subscribe(&["system", " "]);
        assert_eq!(client.subscriptions(), ["metrics", "system"]);
        assert!(!client.is_running());
        assert_eq!(client.status().phase, ConnectionPhase::Idle);
    }

    #[test]
    fn idle_send_is_dropped_without_buffer() {
        let mut client = RealtimeClient::new(ClientConfig::default());
        assert!(client.refresh("metrics").is_ok());
        assert!(client.outbox.is_empty());
    }

    #[test]
    fn idle_send_is_queued_with_buffer() {
        let mut client = RealtimeClient::new(ClientConfig::default().with_replay_buffer(4));
        assert!(client.refresh("metrics").is_ok());
        assert!(client.send(&serde_json::json!({"type": "custom"})).is_ok());
        assert_eq!(client.outbox.len(), 2);
    }

    #[test]
    fn normalize_trims_and_dedups() {
        assert_eq!(normalize(&[" a", "b", "a ", ""]), ["a", "b"]);
    }

    #[tokio::test]
    async fn start_rejects_blank_identity() {
        let mut client = RealtimeClient::new(ClientConfig::default());
        assert!(matches!(
            client.start("   ").await,
            Err(ClientError::MissingIdentity)
        ));
        assert!(!client.is_running());
    }

    #[tokio::test]
    async fn start_from_config_requires_user() {
        let mut client = RealtimeClient::new(ClientConfig::default());
        assert!(matches!(
            client.start_from_config().await,
            Err(ClientError::MissingIdentity)
        ));
    }

    #[tokio::test]
    async fn stop_when_idle_is_noop() {
        let mut client = RealtimeClient::new(ClientConfig::default());
        client.stop().await;
        assert_eq!(client.status(), ConnectionStatus::default());
    }
}

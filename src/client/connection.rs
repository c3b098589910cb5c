//! Background connection task.
//!
//! One [`Supervisor`] runs per started client. It owns the socket, the
//! heartbeat interval and the reconnect timer, and drives the
//! Connecting → Open → Closed cycle until it is told to shut down or runs
//! out of attempts. Commands from the client handle and frames from the
//! server are processed strictly in arrival order.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::backoff::Backoff;
use super::outbox::{Queued, ReplayBuffer};
use super::state::{Applied, ObservedState};
use super::status::{ConnectionPhase, ConnectionStatus};
use super::subscription::SubscriptionSet;
use crate::config::MIN_HEARTBEAT;
use crate::error::{CONNECT_FAILED, CONNECTION_ERROR, ProtocolError};
use crate::protocol::{ControlMessage, ServerEvent};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<Socket, Message>;

/// Requests from the client handle to its task.
#[derive(Debug)]
pub(crate) enum Command {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
    Send(String),
    Shutdown,
}

/// State that outlives a single connection.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub(crate) subscriptions: SubscriptionSet,
    pub(crate) outbox: ReplayBuffer,
}

/// Fixed parameters of one supervisor run.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) endpoint: String,
    pub(crate) heartbeat: Duration,
    pub(crate) max_attempts: u32,
    pub(crate) backoff: Backoff,
}

enum Handshake {
    Opened(Box<Socket>),
    Failed(tungstenite::Error),
    Shutdown,
}

enum Exit {
    Dropped,
    Shutdown,
}

#[derive(Debug)]
pub(crate) struct Supervisor {
    settings: Settings,
    session: Session,
    commands: mpsc::UnboundedReceiver<Command>,
    state: Arc<watch::Sender<ObservedState>>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    failed_attempts: u32,
}

impl Supervisor {
    pub(crate) fn new(
        settings: Settings,
        session: Session,
        commands: mpsc::UnboundedReceiver<Command>,
        state: Arc<watch::Sender<ObservedState>>,
        status: Arc<watch::Sender<ConnectionStatus>>,
    ) -> Self {
        Self {
            settings,
            session,
            commands,
            state,
            status,
            failed_attempts: 0,
        }
    }

    /// Runs until shutdown and hands the session back.
    pub(crate) async fn run(mut self) -> Session {
        loop {
            self.set_status(ConnectionPhase::Connecting, None);

            match self.handshake().await {
                Handshake::Shutdown => break,
                Handshake::Opened(socket) => {
                    if let Exit::Shutdown = self.run_open(*socket).await {
                        break;
                    }
                }
                Handshake::Failed(e) => {
                    tracing::warn!(
                        endpoint = %self.settings.endpoint,
                        attempt = self.failed_attempts + 1,
                        error = %e,
                        "realtime connect failed"
                    );
                    self.record_error(CONNECT_FAILED);
                }
            }

            self.failed_attempts = self.failed_attempts.saturating_add(1);
            if self.failed_attempts >= self.settings.max_attempts {
                tracing::warn!(
                    attempts = self.failed_attempts,
                    "realtime reconnect attempts exhausted"
                );
                self.set_status(ConnectionPhase::Closed, None);
                self.drain_until_shutdown().await;
                break;
            }

            let delay = self
                .settings
                .backoff
                .delay(self.failed_attempts.saturating_sub(1));
            tracing::debug!(
                attempt = self.failed_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "realtime reconnect scheduled"
            );
            self.set_status(ConnectionPhase::Closed, Some(delay));
            if !self.wait_retry(delay).await {
                break;
            }
        }

        self.state.send_modify(|s| s.connected = false);
        self.set_status(ConnectionPhase::Idle, None);
        tracing::info!(endpoint = %self.settings.endpoint, "realtime client stopped");
        self.session
    }

    /// Performs the handshake while still serving commands.
    async fn handshake(&mut self) -> Handshake {
        let connect = tokio_tungstenite::connect_async(self.settings.endpoint.clone());
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return match result {
                        Ok((socket, _response)) => Handshake::Opened(Box::new(socket)),
                        Err(e) => Handshake::Failed(e),
                    };
                }
                cmd = self.commands.recv() => {
                    if !self.handle_offline(cmd) {
                        return Handshake::Shutdown;
                    }
                }
            }
        }
    }

    /// Sleeps for `delay` while serving commands. Returns `false` on shutdown.
    async fn wait_retry(&mut self, delay: Duration) -> bool {
        let timer = tokio::time::sleep(delay);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                () = &mut timer => return true,
                cmd = self.commands.recv() => {
                    if !self.handle_offline(cmd) {
                        return false;
                    }
                }
            }
        }
    }

    async fn drain_until_shutdown(&mut self) {
        loop {
            let cmd = self.commands.recv().await;
            if !self.handle_offline(cmd) {
                return;
            }
        }
    }

    /// Applies a command while no socket is open. Returns `false` on shutdown.
    fn handle_offline(&mut self, cmd: Option<Command>) -> bool {
        match cmd {
            Some(Command::Subscribe(channels)) => {
                self.session.subscriptions.subscribe(&channels);
            }
            Some(Command::Unsubscribe(channels)) => {
                self.session.subscriptions.unsubscribe(&channels);
            }
            Some(Command::Send(text)) => match self.session.outbox.push(text) {
                Queued::Dropped => tracing::debug!("not connected; dropping outbound message"),
                Queued::Evicted => {
                    tracing::debug!("replay buffer full; evicted oldest queued message");
                }
                Queued::Stored => tracing::debug!(
                    queued = self.session.outbox.len(),
                    "not connected; message queued for replay"
                ),
            },
            Some(Command::Shutdown) | None => return false,
        }
        true
    }

    /// Runs the read/write loop for one open socket.
    async fn run_open(&mut self, socket: Socket) -> Exit {
        let (mut sink, mut stream) = socket.split();

        self.failed_attempts = 0;
        self.state.send_modify(|s| {
            s.connected = true;
            s.last_error = None;
        });
        self.set_status(ConnectionPhase::Open, None);
        tracing::info!(
            endpoint = %self.settings.endpoint,
            channels = self.session.subscriptions.count(),
            "realtime connection open"
        );

        if let Err(e) = self.on_open(&mut sink).await {
            let exit = self.lost(&e);
            self.state.send_modify(|s| s.connected = false);
            return exit;
        }

        let period = self.settings.heartbeat.max(MIN_HEARTBEAT);
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.dispatch(ServerEvent::decode(text.as_str())),
                    Some(Ok(Message::Binary(bytes))) => self.dispatch(ServerEvent::decode_bytes(&bytes)),
                    Some(Ok(Message::Close(frame))) => {
                        tracing::warn!(?frame, "realtime connection closed by server");
                        break Exit::Dropped;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break self.lost(&e),
                    None => {
                        tracing::warn!("realtime stream ended");
                        break Exit::Dropped;
                    }
                },
                _ = heartbeat.tick() => {
                    if let Err(e) = send_control(&mut sink, &ControlMessage::Ping).await {
                        break self.lost(&e);
                    }
                }
                cmd = self.commands.recv() => {
                    match self.handle_open(&mut sink, cmd).await {
                        Ok(None) => {}
                        Ok(Some(exit)) => break exit,
                        Err(e) => break self.lost(&e),
                    }
                }
            }
        };

        self.state.send_modify(|s| s.connected = false);
        exit
    }

    /// Reconciles subscriptions, then flushes the replay buffer.
    async fn on_open(&mut self, sink: &mut WsSink) -> Result<(), tungstenite::Error> {
        if !self.session.subscriptions.is_empty() {
            let msg = ControlMessage::Subscribe {
                channels: self.session.subscriptions.to_vec(),
            };
            send_control(sink, &msg).await?;
        }
        for text in self.session.outbox.drain() {
            sink.send(Message::text(text)).await?;
        }
        Ok(())
    }

    async fn handle_open(
        &mut self,
        sink: &mut WsSink,
        cmd: Option<Command>,
    ) -> Result<Option<Exit>, tungstenite::Error> {
        match cmd {
            Some(Command::Subscribe(channels)) => {
                self.session.subscriptions.subscribe(&channels);
                send_control(sink, &ControlMessage::Subscribe { channels }).await?;
            }
            Some(Command::Unsubscribe(channels)) => {
                self.session.subscriptions.unsubscribe(&channels);
                send_control(sink, &ControlMessage::Unsubscribe { channels }).await?;
            }
            Some(Command::Send(text)) => sink.send(Message::text(text)).await?,
            Some(Command::Shutdown) | None => {
                if let Err(e) = sink.send(Message::Close(None)).await {
                    tracing::debug!(error = %e, "close frame not delivered");
                }
                return Ok(Some(Exit::Shutdown));
            }
        }
        Ok(None)
    }

    /// Applies one decoded inbound frame. Malformed frames change nothing.
    fn dispatch(&self, decoded: Result<ServerEvent, ProtocolError>) {
        let event = match decoded {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed realtime frame");
                return;
            }
        };

        if let ServerEvent::Error { message } = &event {
            tracing::warn!(message = ?message, "server reported error");
        }

        let _frame = tracing::debug_span!("realtime_frame", kind = event.kind()).entered();
        let mut applied = Applied::Unchanged;
        self.state.send_if_modified(|s| {
            applied = s.apply(event);
            applied == Applied::Changed
        });
        match applied {
            Applied::Unhandled => tracing::debug!("unhandled realtime frame"),
            Applied::Changed | Applied::Unchanged => tracing::trace!("realtime frame applied"),
        }
    }

    fn lost(&self, e: &tungstenite::Error) -> Exit {
        tracing::warn!(error = %e, "realtime transport error");
        self.record_error(CONNECTION_ERROR);
        Exit::Dropped
    }

    fn record_error(&self, message: &str) {
        self.state
            .send_modify(|s| s.last_error = Some(message.to_string()));
    }

    fn set_status(&self, phase: ConnectionPhase, retry_in: Option<Duration>) {
        self.status.send_replace(ConnectionStatus {
            phase,
            failed_attempts: self.failed_attempts,
            retry_in,
        });
    }
}

async fn send_control(sink: &mut WsSink, msg: &ControlMessage) -> Result<(), tungstenite::Error> {
    match msg.to_json() {
        Ok(text) => sink.send(Message::text(text)).await,
        Err(e) => {
            tracing::error!(kind = msg.kind(), error = %e, "failed to encode control message");
            Ok(())
        }
    }
}

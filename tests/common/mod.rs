//! Shared helpers for integration tests: an in-process mock push server,
//! listeners that reject handshakes or cut upgraded sockets, and bounded
//! waits on the client's watch channels.
#![allow(dead_code, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use dropship_realtime::client::{ConnectionStatus, ObservedState, RealtimeClient};
use dropship_realtime::config::ClientConfig;
use dropship_realtime::server::{ObservedControl, PushBus, serve};

/// Upper bound for any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(5);

/// Mock push server bound to an ephemeral local port.
pub struct MockServer {
    /// Bound address.
    pub addr: SocketAddr,
    /// Bus for publishing frames and observing client messages.
    pub bus: PushBus,
    task: JoinHandle<()>,
}

impl MockServer {
    /// Binds `127.0.0.1:0` and starts serving.
    pub async fn start() -> Self {
        let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
            panic!("failed to bind mock server");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("mock server has no local addr");
        };
        let bus = PushBus::new(256);
        let served = bus.clone();
        let task = tokio::spawn(async move {
            let _ = serve(listener, served).await;
        });
        Self { addr, bus, task }
    }

    /// Base WebSocket URL, without the user segment.
    pub fn ws_base(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Base HTTP URL.
    pub fn http_base(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// TCP listener that accepts and immediately drops every connection, so
/// every WebSocket handshake fails. Counts accepted connections.
pub struct RejectingListener {
    /// Bound address.
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl RejectingListener {
    /// Binds `127.0.0.1:0` and starts rejecting.
    pub async fn start() -> Self {
        let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
            panic!("failed to bind rejecting listener");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("rejecting listener has no local addr");
        };
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });
        Self {
            addr,
            accepted,
            task,
        }
    }

    /// Base WebSocket URL pointing at this listener.
    pub fn ws_base(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for RejectingListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Listener that completes the WebSocket upgrade and then, for the first
/// `drops` connections, drops the TCP stream without a close frame. Later
/// connections stay open until the peer leaves.
pub struct CuttingListener {
    /// Bound address.
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl CuttingListener {
    /// Binds `127.0.0.1:0` and starts accepting.
    pub async fn start(drops: usize) -> Self {
        let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
            panic!("failed to bind cutting listener");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("cutting listener has no local addr");
        };
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                if seen <= drops {
                    drop(socket);
                } else {
                    tokio::spawn(async move { while socket.next().await.is_some() {} });
                }
            }
        });
        Self {
            addr,
            accepted,
            task,
        }
    }

    /// Base WebSocket URL pointing at this listener.
    pub fn ws_base(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for CuttingListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Client config with quick retries and a heartbeat that never fires
/// during a test.
pub fn quick_config(base_url: &str) -> ClientConfig {
    ClientConfig::default()
        .with_base_url(base_url)
        .with_heartbeat(Duration::from_secs(3_600))
        .with_reconnect(5, Duration::from_millis(10), Duration::from_millis(50))
}

/// Waits until the client's status satisfies `pred`.
pub async fn wait_status<F>(client: &RealtimeClient, pred: F) -> ConnectionStatus
where
    F: FnMut(&ConnectionStatus) -> bool,
{
    let mut rx = client.watch_status();
    match tokio::time::timeout(WAIT, rx.wait_for(pred)).await {
        Ok(Ok(status)) => *status,
        _ => panic!("timed out waiting for status; last {:?}", client.status()),
    }
}

/// Waits until the client's observed state satisfies `pred`.
pub async fn wait_state<F>(client: &RealtimeClient, pred: F) -> ObservedState
where
    F: FnMut(&ObservedState) -> bool,
{
    let mut rx = client.watch_state();
    match tokio::time::timeout(WAIT, rx.wait_for(pred)).await {
        Ok(Ok(state)) => state.clone(),
        _ => panic!("timed out waiting for state; last {:?}", client.state()),
    }
}

/// Next control message the server received.
pub async fn next_observed(rx: &mut broadcast::Receiver<ObservedControl>) -> ObservedControl {
    match tokio::time::timeout(WAIT, rx.recv()).await {
        Ok(Ok(observed)) => observed,
        Ok(Err(e)) => panic!("observation channel failed: {e}"),
        Err(_) => panic!("timed out waiting for a client message"),
    }
}

/// Asserts the server receives nothing else for `quiet`.
pub async fn assert_quiet(rx: &mut broadcast::Receiver<ObservedControl>, quiet: Duration) {
    if let Ok(Ok(extra)) = tokio::time::timeout(quiet, rx.recv()).await {
        panic!("unexpected client message: {:?}", extra.message);
    }
}

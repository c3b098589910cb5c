//! Client and mock-server configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Numeric values that fail to parse fall
//! back to their defaults.

use std::net::SocketAddr;
use std::time::Duration;

use crate::client::Backoff;
use crate::error::ClientError;

/// Channels subscribed by the watcher binary when none are configured.
pub const DEFAULT_CHANNELS: [&str; 3] = ["metrics", "alerts", "system"];

/// Shortest heartbeat interval the client will run with.
pub const MIN_HEARTBEAT: Duration = Duration::from_millis(10);

/// Realtime client configuration.
///
/// Loaded via [`ClientConfig::from_env`], or built from [`Default`] and the
/// `with_*` helpers in code and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base WebSocket URL; the user id is appended as a path segment.
    pub ws_base_url: String,

    /// Authenticated user identity, if known at load time.
    pub user_id: Option<String>,

    /// Channels the watcher subscribes to on startup.
    pub channels: Vec<String>,

    /// Interval between heartbeat pings while the connection is open.
    pub heartbeat_interval: Duration,

    /// Consecutive failed attempts after which reconnection stops.
    pub max_reconnect_attempts: u32,

    /// Delay before the first retry; doubled per further failure.
    pub reconnect_base_delay: Duration,

    /// Upper bound for any retry delay.
    pub reconnect_max_delay: Duration,

    /// Messages kept while disconnected and replayed on connect (0 = drop).
    pub replay_buffer_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_base_url: "ws://localhost:8000/ws".to_string(),
            user_id: None,
            channels: DEFAULT_CHANNELS.iter().map(|c| (*c).to_string()).collect(),
            heartbeat_interval: Duration::from_secs(30),
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_millis(1_000),
            reconnect_max_delay: Duration::from_millis(30_000),
            replay_buffer_capacity: 0,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidEndpoint`] if `REALTIME_WS_URL` is set
    /// to something other than a `ws://` or `wss://` URL.
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidEndpoint`] for a non-WebSocket base URL.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let ws_base_url = lookup("REALTIME_WS_URL").unwrap_or(defaults.ws_base_url);
        validate_ws_url(&ws_base_url)?;

        let user_id = lookup("REALTIME_USER_ID")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let channels = lookup("REALTIME_CHANNELS")
            .map(|v| parse_list(&v))
            .unwrap_or(defaults.channels);

        let heartbeat_interval = Duration::from_secs(
            parse_or(
                &lookup,
                "REALTIME_HEARTBEAT_SECS",
                defaults.heartbeat_interval.as_secs(),
            )
            .max(1),
        );
        let max_reconnect_attempts = parse_or(
            &lookup,
            "REALTIME_MAX_RECONNECT_ATTEMPTS",
            defaults.max_reconnect_attempts,
        );
        let reconnect_base_delay = Duration::from_millis(parse_or(
            &lookup,
            "REALTIME_RECONNECT_BASE_MS",
            1_000,
        ));
        let reconnect_max_delay = Duration::from_millis(parse_or(
            &lookup,
            "REALTIME_RECONNECT_MAX_MS",
            30_000,
        ));
        let replay_buffer_capacity = parse_or(
            &lookup,
            "REALTIME_REPLAY_BUFFER",
            defaults.replay_buffer_capacity,
        );

        Ok(Self {
            ws_base_url,
            user_id,
            channels,
            heartbeat_interval,
            max_reconnect_attempts,
            reconnect_base_delay,
            reconnect_max_delay,
            replay_buffer_capacity,
        })
    }

    /// Returns a copy pointing at another base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.ws_base_url = url.into();
        self
    }

    /// Returns a copy with a different heartbeat interval, raised to at
    /// least [`MIN_HEARTBEAT`].
    #[must_use]
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval.max(MIN_HEARTBEAT);
        self
    }

    /// Returns a copy with a different reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, max_attempts: u32, base: Duration, max: Duration) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self.reconnect_base_delay = base;
        self.reconnect_max_delay = max;
        self
    }

    /// Returns a copy with a different replay buffer capacity.
    #[must_use]
    pub fn with_replay_buffer(mut self, capacity: usize) -> Self {
        self.replay_buffer_capacity = capacity;
        self
    }

    /// The backoff policy described by this configuration.
    #[must_use]
    pub const fn backoff(&self) -> Backoff {
        Backoff::new(self.reconnect_base_delay, self.reconnect_max_delay)
    }

    /// Builds the endpoint address for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingIdentity`] for a blank user id and
    /// [`ClientError::InvalidEndpoint`] for a non-WebSocket base URL.
    pub fn endpoint_for(&self, user_id: &str) -> Result<String, ClientError> {
        let user_id = user_id.trim();
        if user_id.is_empty() || user_id.contains('/') {
            return Err(ClientError::MissingIdentity);
        }
        validate_ws_url(&self.ws_base_url)?;
        Ok(format!(
            "{}/{}",
            self.ws_base_url.trim_end_matches('/'),
            user_id
        ))
    }
}

/// Mock push server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind (e.g. `127.0.0.1:8000`).
    pub listen_addr: SocketAddr,

    /// Seconds between simulator pushes.
    pub push_interval_secs: u64,

    /// Capacity of the push bus broadcast channel.
    pub bus_capacity: usize,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] if `MOCK_LISTEN_ADDR` is set
    /// but cannot be parsed as a [`SocketAddr`].
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] for an unparsable listen address.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_addr = lookup("MOCK_LISTEN_ADDR").unwrap_or_else(|| "127.0.0.1:8000".to_string());
        let listen_addr: SocketAddr = raw_addr
            .parse()
            .map_err(|_| ClientError::InvalidConfig(format!("MOCK_LISTEN_ADDR={raw_addr}")))?;

        Ok(Self {
            listen_addr,
            push_interval_secs: parse_or(&lookup, "MOCK_PUSH_INTERVAL_SECS", 5).max(1),
            bus_capacity: parse_or(&lookup, "MOCK_BUS_CAPACITY", 1_024).max(1),
        })
    }
}

fn validate_ws_url(url: &str) -> Result<(), ClientError> {
    let rest = url
        .strip_prefix("ws://")
        .or_else(|| url.strip_prefix("wss://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => Err(ClientError::InvalidEndpoint(url.to_string())),
    }
}

/// Parses a lookup value as `T`, returning `default` on missing or invalid
/// values.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Splits a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

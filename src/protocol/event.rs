//! Server → client push frames.
//!
//! [`ServerFrame`] is the loosely typed envelope as it travels on the wire.
//! [`ServerEvent`] is the decoded form the client dispatches on: one variant
//! per frame type, so handling is checked for exhaustiveness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Epoch values at or above this are taken as milliseconds (year 5138 in
/// seconds).
const EPOCH_MILLIS_FLOOR: i64 = 100_000_000_000;

/// Wire envelope shared by every server push frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFrame {
    /// Frame type discriminator.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Channel name, used by `data` frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Server timestamp: an RFC 3339 string or a numeric Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

impl ServerFrame {
    /// Builds a frame of the given type stamped with the current time.
    #[must_use]
    pub fn new(kind: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            data,
            channel: None,
            timestamp: Some(Value::String(Utc::now().to_rfc3339())),
        }
    }

    /// Connection acknowledgment sent right after the upgrade.
    #[must_use]
    pub fn connection(user_id: &str) -> Self {
        Self::new("connection", Some(serde_json::json!({ "user_id": user_id })))
    }

    /// Heartbeat reply.
    #[must_use]
    pub fn pong() -> Self {
        Self::new("pong", None)
    }

    /// Full metrics snapshot.
    #[must_use]
    pub fn dashboard_update(metrics: Value) -> Self {
        Self::new("dashboard_update", Some(metrics))
    }

    /// A newly raised alert.
    #[must_use]
    pub fn new_alert(alert: Value) -> Self {
        Self::new("new_alert", Some(serde_json::json!({ "alert": alert })))
    }

    /// A change to an existing alert, matched by its `id`.
    #[must_use]
    pub fn alert_update(alert: Value) -> Self {
        Self::new("alert_update", Some(serde_json::json!({ "alert": alert })))
    }

    /// Full system status snapshot.
    #[must_use]
    pub fn system_status(status: Value) -> Self {
        Self::new("system_status", Some(status))
    }

    /// Channel-scoped data push.
    #[must_use]
    pub fn channel_data(channel: impl Into<String>, data: Value) -> Self {
        let mut frame = Self::new("data", Some(data));
        frame.channel = Some(channel.into());
        frame
    }

    /// Server-side error report.
    #[must_use]
    pub fn error(message: Option<&str>) -> Self {
        let data = message.map(|m| serde_json::json!({ "message": m }));
        Self::new("error", data)
    }

    /// The subscription channel this frame belongs to.
    ///
    /// `None` means the frame is not channel-scoped and goes to every
    /// connection regardless of its subscriptions.
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        match self.kind.as_str() {
            "dashboard_update" => Some("metrics"),
            "new_alert" | "alert_update" => Some("alerts"),
            "system_status" => Some("system"),
            "data" => self.channel.as_deref(),
            _ => None,
        }
    }

    /// Interprets [`Self::timestamp`].
    ///
    /// Strings are read as RFC 3339. Integers of twelve or more digits
    /// are Unix milliseconds, shorter ones Unix seconds.
    #[must_use]
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        match self.timestamp.as_ref()? {
            Value::String(t) => DateTime::parse_from_rfc3339(t)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            Value::Number(n) => {
                let raw = n.as_i64()?;
                if (-EPOCH_MILLIS_FLOOR..EPOCH_MILLIS_FLOOR).contains(&raw) {
                    DateTime::from_timestamp(raw, 0)
                } else {
                    DateTime::from_timestamp_millis(raw)
                }
            }
            _ => None,
        }
    }
}

/// A decoded server push frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Connection acknowledgment.
    Connection,
    /// Heartbeat acknowledgment.
    Pong,
    /// Replacement metrics snapshot.
    DashboardUpdate(Value),
    /// Alert to prepend to the list.
    NewAlert(Value),
    /// Alert replacing the listed alert with the same `id`.
    AlertUpdate(Value),
    /// Replacement system status snapshot.
    SystemStatus(Value),
    /// Channel-scoped data.
    ChannelData {
        /// Channel name.
        channel: String,
        /// Payload for that channel.
        data: Value,
    },
    /// Server-reported error.
    Error {
        /// Server-provided message, if any.
        message: Option<String>,
    },
    /// A frame type this client does not know.
    Unrecognized(String),
}

impl ServerEvent {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] for invalid JSON or a missing
    /// `type`, and [`ProtocolError::MissingField`] when a known type lacks
    /// its payload.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let frame: ServerFrame = serde_json::from_str(text)?;
        Self::from_frame(frame)
    }

    /// Decodes a binary frame carrying UTF-8 JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotUtf8`] for invalid UTF-8, then everything
    /// [`decode`](Self::decode) returns.
    pub fn decode_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::NotUtf8)?;
        Self::decode(text)
    }

    /// Converts an already parsed envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingField`] when a known type lacks its
    /// payload.
    pub fn from_frame(frame: ServerFrame) -> Result<Self, ProtocolError> {
        let ServerFrame {
            kind,
            data,
            channel,
            ..
        } = frame;

        let event = match kind.as_str() {
            "connection" => Self::Connection,
            "pong" => Self::Pong,
            "dashboard_update" => Self::DashboardUpdate(require(data, "dashboard_update")?),
            "new_alert" => Self::NewAlert(alert_of(data, "new_alert")?),
            "alert_update" => Self::AlertUpdate(alert_of(data, "alert_update")?),
            "system_status" => Self::SystemStatus(require(data, "system_status")?),
            "data" => {
                let channel = channel.ok_or(ProtocolError::MissingField {
                    kind: "data",
                    field: "channel",
                })?;
                Self::ChannelData {
                    channel,
                    data: require(data, "data")?,
                }
            }
            "error" => Self::Error {
                message: data
                    .as_ref()
                    .and_then(|d| d.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            other => Self::Unrecognized(other.to_owned()),
        };
        Ok(event)
    }

    /// Returns the frame type this event was decoded from.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Connection => "connection",
            Self::Pong => "pong",
            Self::DashboardUpdate(_) => "dashboard_update",
            Self::NewAlert(_) => "new_alert",
            Self::AlertUpdate(_) => "alert_update",
            Self::SystemStatus(_) => "system_status",
            Self::ChannelData { .. } => "data",
            Self::Error { .. } => "error",
            Self::Unrecognized(kind) => kind.as_str(),
        }
    }
}

fn require(data: Option<Value>, kind: &'static str) -> Result<Value, ProtocolError> {
    data.ok_or(ProtocolError::MissingField {
        kind,
        field: "data",
    })
}

fn alert_of(data: Option<Value>, kind: &'static str) -> Result<Value, ProtocolError> {
    data.and_then(|mut d| d.get_mut("alert").map(Value::take))
        .ok_or(ProtocolError::MissingField {
            kind,
            field: "data.alert",
        })
}

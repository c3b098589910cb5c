//! Client → server control messages.

use serde::{Deserialize, Serialize};

/// Control messages the client sends over the socket.
///
/// The channel lists travel under the `metrics` key for compatibility with
/// the dashboard push endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Heartbeat.
    Ping,
    /// Start receiving the listed channels.
    Subscribe {
        /// Channel names.
        #[serde(rename = "metrics")]
        channels: Vec<String>,
    },
    /// Stop receiving the listed channels.
    Unsubscribe {
        /// Channel names.
        #[serde(rename = "metrics")]
        channels: Vec<String>,
    },
    /// Ask the server to re-push the latest data of one kind.
    Refresh {
        /// Data kind, e.g. `"metrics"` or `"system"`.
        refresh_type: String,
    },
}

impl ControlMessage {
    /// Serializes the message to its JSON text form.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`]; none of the variants
    /// can actually fail to encode.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Returns the `type` tag as a static string slice.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Refresh { .. } => "refresh",
        }
    }
}

//! Client error types.
//!
//! [`ClientError`] covers everything the caller-facing API can reject:
//! bad endpoints, a missing identity, unencodable payloads and invalid
//! configuration. Runtime connection problems never surface here; the
//! background task reports them through
//! [`ObservedState::last_error`](crate::client::ObservedState::last_error).
//!
//! [`ProtocolError`] is the decoding error for inbound frames.

/// Message recorded when the handshake with the push endpoint fails.
pub const CONNECT_FAILED: &str = "Failed to connect";

/// Message recorded when an open connection reports a transport error.
pub const CONNECTION_ERROR: &str = "Connection error";

/// Fallback for server `error` frames that carry no message.
pub const UNKNOWN_SERVER_ERROR: &str = "Unknown server error";

/// Errors returned by the realtime client API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The configured base URL is not a `ws://` or `wss://` URL.
    #[error("invalid endpoint url: {0}")]
    InvalidEndpoint(String),

    /// No user identity was supplied, or it was blank.
    #[error("missing user identity")]
    MissingIdentity,

    /// The outbound payload could not be serialized to JSON.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// A configuration value was present but invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Returns a short stable code for this variant, suitable for log fields.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidEndpoint(_) => "invalid_endpoint",
            Self::MissingIdentity => "missing_identity",
            Self::Encode(_) => "encode",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}

/// Errors produced while decoding an inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON or lacked the `type` discriminator.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame named a known type but lacked a field that type requires.
    #[error("{kind} frame is missing `{field}`")]
    MissingField {
        /// The frame's `type` value.
        kind: &'static str,
        /// Path of the missing field.
        field: &'static str,
    },

    /// A binary frame was not valid UTF-8.
    #[error("binary frame is not utf-8")]
    NotUtf8,
}

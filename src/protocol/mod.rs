//! Wire protocol: client control messages and server push frames.
//!
//! Every frame is a JSON text message. Client → server messages are
//! [`ControlMessage`]s; server → client frames share the envelope
//! `{type, data?, channel?, timestamp?}` and decode into [`ServerEvent`].

pub mod control;
pub mod event;

pub use control::ControlMessage;
pub use event::{ServerEvent, ServerFrame};

//! Realtime channel client: connection lifecycle, subscriptions, and the
//! observed state fed by server pushes.
//!
//! ```text
//! RealtimeClient ──commands──▶ Supervisor task ──▶ socket
//!       ▲                           │
//!       └──── watch(ObservedState, ConnectionStatus) ◀── frames
//! ```

pub mod backoff;
mod connection;
pub mod outbox;
pub mod realtime;
pub mod state;
pub mod status;
pub mod subscription;

pub use backoff::Backoff;
pub use outbox::ReplayBuffer;
pub use realtime::RealtimeClient;
pub use state::{Applied, ObservedState};
pub use status::{ConnectionPhase, ConnectionStatus};
pub use subscription::SubscriptionSet;

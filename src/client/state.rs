//! Observed state materialized from server push frames.
//!
//! Each [`ServerEvent`] touches exactly one domain: metrics, alerts, system
//! status or the last error. Nothing here persists; a fresh client starts
//! from [`ObservedState::default`].

use serde::Serialize;
use serde_json::Value;

use crate::error::UNKNOWN_SERVER_ERROR;
use crate::protocol::ServerEvent;

/// Latest view of the realtime feed, as exposed to consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObservedState {
    /// Whether the socket is currently open.
    pub connected: bool,
    /// Most recent metrics snapshot.
    pub metrics: Option<Value>,
    /// Alerts, newest first.
    pub alerts: Vec<Value>,
    /// Most recent system status snapshot.
    pub status: Option<Value>,
    /// Last connection or server error.
    pub last_error: Option<String>,
}

/// What applying an event did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A state field was replaced or mutated.
    Changed,
    /// The event was acknowledged without a state change.
    Unchanged,
    /// The event was valid but this client has no handler for it.
    Unhandled,
}

impl ObservedState {
    /// Applies one decoded server event.
    pub fn apply(&mut self, event: ServerEvent) -> Applied {
        match event {
            ServerEvent::Connection | ServerEvent::Pong => Applied::Unchanged,
            ServerEvent::DashboardUpdate(metrics) => {
                self.metrics = Some(metrics);
                Applied::Changed
            }
            ServerEvent::NewAlert(alert) => {
                self.alerts.insert(0, alert);
                Applied::Changed
            }
            ServerEvent::AlertUpdate(alert) => self.update_alert(alert),
            ServerEvent::SystemStatus(status) => {
                self.status = Some(status);
                Applied::Changed
            }
            ServerEvent::ChannelData { channel, data } => self.apply_channel(&channel, data),
            ServerEvent::Error { message } => {
                self.last_error = Some(message.unwrap_or_else(|| UNKNOWN_SERVER_ERROR.to_string()));
                Applied::Changed
            }
            ServerEvent::Unrecognized(_) => Applied::Unhandled,
        }
    }

    /// Replaces, in place, every alert whose `id` matches `alert`'s `id`.
    fn update_alert(&mut self, alert: Value) -> Applied {
        let Some(id) = alert.get("id").cloned() else {
            return Applied::Unhandled;
        };
        let mut applied = Applied::Unchanged;
        for slot in self
            .alerts
            .iter_mut()
            .filter(|existing| existing.get("id") == Some(&id))
        {
            slot.clone_from(&alert);
            applied = Applied::Changed;
        }
        applied
    }

    /// Channel-scoped pushes replace the whole domain value.
    fn apply_channel(&mut self, channel: &str, data: Value) -> Applied {
        match channel {
            "metrics" => {
                self.metrics = Some(data);
                Applied::Changed
            }
            "alerts" => match data {
                Value::Array(alerts) => {
                    self.alerts = alerts;
                    Applied::Changed
                }
                _ => Applied::Unhandled,
            },
            _ => Applied::Unhandled,
        }
    }
}

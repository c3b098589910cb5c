//! Per-connection channel filter.
//!
//! Tracks which channels a WebSocket client subscribed to and decides which
//! pushed frames it receives.

use std::collections::HashSet;

/// Wildcard channel matching every topic.
pub const WILDCARD: &str = "*";

/// Manages the set of channel subscriptions for a single connection.
#[derive(Debug, Default)]
pub struct ChannelFilter {
    /// Subscribed channel names. Ignored while `subscribe_all` is set.
    channels: HashSet<String>,
    /// Whether the client subscribed to the wildcard `"*"`.
    subscribe_all: bool,
}

impl ChannelFilter {
    /// Creates a new empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds channels. `"*"` enables the wildcard.
    pub fn subscribe(&mut self, channels: &[String]) {
        for channel in channels {
            if channel == WILDCARD {
                self.subscribe_all = true;
            } else {
                self.channels.insert(channel.clone());
            }
        }
    }

    /// Removes channels. `"*"` disables the wildcard.
    pub fn unsubscribe(&mut self, channels: &[String]) {
        for channel in channels {
            if channel == WILDCARD {
                self.subscribe_all = false;
            } else {
                self.channels.remove(channel);
            }
        }
    }

    /// Returns `true` if a frame with this topic should be forwarded.
    ///
    /// Frames without a topic are always forwarded.
    #[must_use]
    pub fn matches(&self, topic: Option<&str>) -> bool {
        match topic {
            None => true,
            Some(topic) => self.subscribe_all || self.channels.contains(topic),
        }
    }

    /// Returns the number of explicitly subscribed channels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn empty_matches_only_untopical() {
        let filter = ChannelFilter::new();
        assert!(!filter.matches(Some("metrics")));
        assert!(filter.matches(None));
    }

    #[test]
    fn subscribe_specific_channel() {
        let mut filter = ChannelFilter::new();
        filter.subscribe(&names(&["alerts"]));
        assert!(filter.matches(Some("alerts")));
        assert!(!filter.matches(Some("metrics")));
    }

    #[test]
    fn wildcard_matches_everything() {
        let mut filter = ChannelFilter::new();
        filter.subscribe(&names(&[WILDCARD]));
        assert!(filter.is_subscribed_all());
        assert!(filter.matches(Some("orders")));
        filter.unsubscribe(&names(&[WILDCARD]));
        assert!(!filter.matches(Some("orders")));
    }

    #[test]
    fn unsubscribe_removes_channel() {
        let mut filter = ChannelFilter::new();
        filter.subscribe(&names(&["metrics", "system"]));
        assert_eq!(filter.count(), 2);
        filter.unsubscribe(&names(&["metrics"]));
        assert!(!filter.matches(Some("metrics")));
        assert_eq!(filter.count(), 1);
    }
}

//! Client-side subscription set.
//!
//! Tracks the channels the client wants to receive. The set lives outside
//! the socket so it survives reconnects, and is replayed in full after
//! every successful connection.

use std::collections::BTreeSet;

/// Unique, ordered set of channel names.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubscriptionSet {
    channels: BTreeSet<String>,
}

impl SubscriptionSet {
    /// Creates a new empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds channels, ignoring blanks and duplicates. Returns how many were new.
    pub fn subscribe<S: AsRef<str>>(&mut self, channels: &[S]) -> usize {
        channels
            .iter()
            .map(|c| c.as_ref().trim())
            .filter(|c| !c.is_empty())
            .filter(|c| self.channels.insert((*c).to_string()))
            .count()
    }

    /// Removes channels. Returns how many were present.
    pub fn unsubscribe<S: AsRef<str>>(&mut self, channels: &[S]) -> usize {
        channels
            .iter()
            .filter(|c| self.channels.remove(c.as_ref().trim()))
            .count()
    }

    /// Returns `true` if `channel` is in the set.
    #[must_use]
    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }

    /// Number of channels in the set.
    #[must_use]
    pub fn count(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if no channel is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// All channels in sorted order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.channels.iter().cloned().collect()
    }
}

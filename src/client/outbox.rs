//! Bounded replay buffer for messages sent while disconnected.

use std::collections::VecDeque;

/// FIFO of encoded messages awaiting the next open connection.
///
/// With capacity 0 every push is refused, so sends while disconnected are
/// dropped. When full, the oldest message is evicted.
#[derive(Debug, Default, Clone)]
pub struct ReplayBuffer {
    queue: VecDeque<String>,
    capacity: usize,
}

/// Result of offering a message to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queued {
    /// Stored without loss.
    Stored,
    /// Stored after evicting the oldest message.
    Evicted,
    /// Buffering is disabled; the message was dropped.
    Dropped,
}

impl ReplayBuffer {
    /// Creates a buffer holding at most `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Offers a message.
    pub fn push(&mut self, message: String) -> Queued {
        if self.capacity == 0 {
            return Queued::Dropped;
        }
        let outcome = if self.queue.len() >= self.capacity {
            self.queue.pop_front();
            Queued::Evicted
        } else {
            Queued::Stored
        };
        self.queue.push_back(message);
        outcome
    }

    /// Removes and returns every queued message, oldest first.
    pub fn drain(&mut self) -> Vec<String> {
        self.queue.drain(..).collect()
    }

    /// Number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

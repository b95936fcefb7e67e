//! Observer types.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Callback run after every committed state change.
pub type Observer = Arc<dyn Fn() + Send + Sync>;

/// Unique identifier for a registered observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(pub u64);

/// Events delivered to channel observers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// State changed; read it back through the manager.
    Changed {
        /// Monotonic counter of committed updates.
        revision: u64,
    },

    /// The observer was removed and will receive nothing further.
    Dropped { reason: DropReason },
}

/// Why a channel observer was removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Receiver went away.
    Disconnected,
    /// Explicitly unregistered.
    Unregistered,
}

/// Receiving side of a channel observer.
pub struct ObserverHandle {
    pub id: ObserverId,
    pub receiver: crossbeam_channel::Receiver<FeedEvent>,
}

impl ObserverHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<FeedEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<FeedEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<FeedEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything queued so far.
    pub fn drain(&self) -> Vec<FeedEvent> {
        self.receiver.try_iter().collect()
    }
}

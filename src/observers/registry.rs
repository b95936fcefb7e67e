//! Observer registry that fans state changes out to consumers.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{DropReason, FeedEvent, Observer, ObserverHandle, ObserverId};

enum Registered {
    Callback(Observer),
    Channel(Sender<FeedEvent>),
}

/// Tracks observers in registration order and notifies them.
pub struct ObserverRegistry {
    observers: RwLock<BTreeMap<ObserverId, Registered>>,
    /// Counter for generating observer IDs.
    next_id: AtomicU64,
    /// Committed update counter.
    revision: AtomicU64,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            revision: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> ObserverId {
        ObserverId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Add a callback observer.
    pub fn register(&self, callback: Observer) -> ObserverId {
        let id = self.next_id();
        self.observers
            .write()
            .insert(id, Registered::Callback(callback));
        id
    }

    /// Add a channel observer with a bounded buffer.
    pub fn watch(&self, buffer_size: usize) -> ObserverHandle {
        let id = self.next_id();
        let (sender, receiver) = bounded(buffer_size.max(1));
        self.observers
            .write()
            .insert(id, Registered::Channel(sender));
        ObserverHandle { id, receiver }
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        match self.observers.write().remove(&id) {
            Some(Registered::Channel(sender)) => {
                // Best effort
                let _ = sender.try_send(FeedEvent::Dropped {
                    reason: DropReason::Unregistered,
                });
                true
            }
            Some(Registered::Callback(_)) => true,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Tell every observer that state changed.
    ///
    /// Callbacks run outside the registry lock so they may register or
    /// unregister observers themselves. Channel observers whose buffer is
    /// full or whose receiver is gone are removed.
    pub fn notify(&self) {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        let event = FeedEvent::Changed { revision };

        let mut callbacks = Vec::new();
        let mut to_remove = Vec::new();

        {
            let observers = self.observers.read();
            for (id, observer) in observers.iter() {
                match observer {
                    Registered::Callback(cb) => callbacks.push(cb.clone()),
                    Registered::Channel(sender) => match sender.try_send(event.clone()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            to_remove.push((*id, DropReason::BufferOverflow))
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            to_remove.push((*id, DropReason::Disconnected))
                        }
                    },
                }
            }
        }

        if !to_remove.is_empty() {
            let mut observers = self.observers.write();
            for (id, reason) in to_remove {
                if let Some(Registered::Channel(sender)) = observers.remove(&id) {
                    tracing::debug!(observer = id.0, ?reason, "dropping channel observer");
                    // Might fail, that's ok
                    let _ = sender.try_send(FeedEvent::Dropped { reason });
                }
            }
        }

        for callback in callbacks {
            callback();
        }
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

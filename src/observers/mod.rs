//! Observer registry for feed state changes.
//!
//! Consumers learn about state changes in one of two ways:
//! - a callback, invoked after every committed update
//! - a bounded channel of [`FeedEvent`]s, for consumers on other threads
//!
//! Either kind counts as an observer for the live-update subscription: the
//! first observer establishes it and the last one to leave tears it down.
//!
//! # Example
//!
//! ```ignore
//! let handle = manager.watch(16).await;
//!
//! loop {
//!     match handle.recv() {
//!         Ok(FeedEvent::Changed { revision }) => redraw(manager.snapshot(), revision),
//!         Ok(FeedEvent::Dropped { .. }) | Err(_) => break,
//!     }
//! }
//! ```

mod registry;
mod types;

pub use registry::ObserverRegistry;
pub use types::{DropReason, FeedEvent, Observer, ObserverHandle, ObserverId};

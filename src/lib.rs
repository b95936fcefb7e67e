//! # Feed State
//!
//! Client-side state for social activity feeds served by a hosted
//! feed-as-a-service API.
//!
//! ## Core Concepts
//!
//! - **Activities**: JSON records, flat or aggregated into groups, kept in an
//!   arena keyed by id with path indices for every place an activity appears
//! - **Reactions**: optimistic local bookkeeping of counts, own reactions and
//!   latest reactions after the server confirms a change
//! - **Paging**: cursor-driven feed pages and per-activity reaction pages
//! - **Live updates**: pushed add/delete events folded into local state
//! - **Observers**: callbacks or channels notified after every state change
//!
//! ## Example
//!
//! ```ignore
//! use feedstate::{Collaborators, FeedConfig, FeedRegistry, FeedRequestOptions};
//!
//! let registry = FeedRegistry::new(Collaborators::from_api(api, user));
//! let feed = registry.get_or_create(FeedConfig::flat("timeline"));
//!
//! let observer = feed.register(Arc::new(|| println!("feed changed"))).await;
//! feed.refresh(&FeedRequestOptions::default()).await;
//!
//! for activity in feed.snapshot().ordered_activities() {
//!     println!("{}", activity["verb"]);
//! }
//!
//! feed.load_next_page().await;
//! feed.unregister(observer).await;
//! ```

pub mod activities;
pub mod client;
pub mod config;
pub mod error;
mod live;
mod locks;
pub mod manager;
pub mod observers;
pub mod registry;
pub mod types;

// Re-exports
pub use activities::{ActivityIndex, ActivityPath, ActivityStore, PathSegment, ReactionOp};
pub use client::{
    ActivityRemover, AnalyticsClient, Collaborators, CurrentUser, ErrorReporter, FeedReader,
    LoggingErrorReporter, ReactionClient, RealtimeHandler, StaticUser, Subscription,
    SubscriptionSource,
};
pub use config::{FeedConfig, FeedRequestOptions, MarkFlag};
pub use error::{user_message, FeedError, RequestKind, Result};
pub use manager::{FeedManager, FeedSnapshot};
pub use observers::{DropReason, FeedEvent, Observer, ObserverHandle, ObserverId};
pub use registry::FeedRegistry;
pub use types::*;

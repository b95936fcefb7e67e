//! Live-update subscription slot.
//!
//! The slot lock is held for the whole subscribe call, so a teardown that
//! arrives while a subscribe is in flight waits for it to settle before
//! deciding whether to cancel.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::client::{RealtimeHandler, Subscription, SubscriptionSource};
use crate::types::FeedId;

pub(crate) struct LiveSubscription {
    slot: Mutex<Option<Box<dyn Subscription>>>,
}

impl LiveSubscription {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Subscribe unless a subscription is already established.
    pub(crate) async fn establish(
        &self,
        source: &Arc<dyn SubscriptionSource>,
        feed: &FeedId,
        handler: RealtimeHandler,
    ) {
        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            return;
        }

        match source.subscribe(feed, handler).await {
            Ok(subscription) => {
                tracing::info!(feed = %feed, "now listening to changes in realtime");
                *slot = Some(subscription);
            }
            Err(e) => {
                tracing::error!(feed = %feed, error = %e, "failed to subscribe to realtime updates");
            }
        }
    }

    /// Cancel the subscription if `still_wanted` says nobody needs it.
    ///
    /// `still_wanted` is evaluated after any in-flight subscribe settles.
    pub(crate) async fn tear_down(&self, feed: &FeedId, still_wanted: impl FnOnce() -> bool) {
        let mut slot = self.slot.lock().await;
        if slot.is_none() || still_wanted() {
            return;
        }

        if let Some(mut subscription) = slot.take() {
            match subscription.cancel().await {
                Ok(()) => {
                    tracing::info!(feed = %feed, "stopped listening to changes in realtime");
                }
                Err(e) => {
                    tracing::error!(feed = %feed, error = %e, "failed to cancel realtime subscription");
                }
            }
        }
    }

    pub(crate) async fn is_active(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

//! Collaborator seams: everything the manager reaches over the network.
//!
//! The manager never talks to a transport directly. A host application
//! provides implementations of these traits (usually thin wrappers around an
//! HTTP/WebSocket SDK) bundled in [`Collaborators`].
//!
//! The `#[async_trait]` macro keeps the traits object safe so they can be
//! stored as `Arc<dyn ...>`.

use crate::config::FeedRequestOptions;
use crate::error::{user_message, FeedError, RequestKind, Result};
use crate::types::{
    Engagement, FeedId, FeedResponse, ReactionFilterResponse, ReactionRequestOptions,
    RealtimeUpdate,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reads pages of a feed.
#[async_trait]
pub trait FeedReader: Send + Sync {
    async fn get(&self, feed: &FeedId, options: &FeedRequestOptions) -> Result<FeedResponse>;
}

/// Creates, deletes and pages through reactions.
#[async_trait]
pub trait ReactionClient: Send + Sync {
    /// Create a reaction of `kind` on `activity`; returns the server record.
    async fn add(
        &self,
        kind: &str,
        activity: &Value,
        options: &ReactionRequestOptions,
    ) -> Result<Value>;

    async fn delete(&self, reaction_id: &str) -> Result<()>;

    /// Query parameters come from a reaction cursor plus `activity_id`/`kind`.
    async fn filter(&self, query: &BTreeMap<String, String>) -> Result<ReactionFilterResponse>;
}

/// Removes activities from a feed.
#[async_trait]
pub trait ActivityRemover: Send + Sync {
    async fn remove_activity(&self, feed: &FeedId, activity_id: &str) -> Result<()>;
}

/// Callback invoked for each pushed live-update event, in arrival order.
pub type RealtimeHandler = Arc<dyn Fn(RealtimeUpdate) + Send + Sync>;

/// Transport-level live subscription.
#[async_trait]
pub trait Subscription: Send + Sync {
    async fn cancel(&mut self) -> Result<()>;
}

/// Source of live add/delete events for a feed.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    async fn subscribe(
        &self,
        feed: &FeedId,
        handler: RealtimeHandler,
    ) -> Result<Box<dyn Subscription>>;
}

/// Receives every failed request, once.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &FeedError, kind: RequestKind, context: &Value);
}

/// Optional engagement tracking.
pub trait AnalyticsClient: Send + Sync {
    fn track_engagement(&self, engagement: Engagement);
}

/// The signed-in user.
pub trait CurrentUser: Send + Sync {
    /// Default owner of feeds configured without a user id.
    fn user_id(&self) -> String;

    /// Profile attached as `user` to locally built reactions.
    fn profile(&self) -> Value;
}

/// Static user profile, handy when the profile is already known.
#[derive(Clone, Debug)]
pub struct StaticUser {
    pub id: String,
    pub profile: Value,
}

impl StaticUser {
    pub fn new(id: impl Into<String>, profile: Value) -> Self {
        Self {
            id: id.into(),
            profile,
        }
    }
}

impl CurrentUser for StaticUser {
    fn user_id(&self) -> String {
        self.id.clone()
    }

    fn profile(&self) -> Value {
        self.profile.clone()
    }
}

/// Error reporter that logs a user-facing message through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingErrorReporter;

impl ErrorReporter for LoggingErrorReporter {
    fn report(&self, error: &FeedError, kind: RequestKind, context: &Value) {
        tracing::warn!(
            kind = kind.as_str(),
            error = %error,
            context = %context,
            "{}",
            user_message(error, kind, context)
        );
    }
}

/// Everything a manager needs from the outside world.
#[derive(Clone)]
pub struct Collaborators {
    pub feeds: Arc<dyn FeedReader>,
    pub reactions: Arc<dyn ReactionClient>,
    pub activities: Arc<dyn ActivityRemover>,
    pub realtime: Option<Arc<dyn SubscriptionSource>>,
    pub errors: Arc<dyn ErrorReporter>,
    pub analytics: Option<Arc<dyn AnalyticsClient>>,
    pub user: Arc<dyn CurrentUser>,
}

impl Collaborators {
    /// Bundle for an API object implementing all request traits.
    pub fn from_api<A>(api: Arc<A>, user: Arc<dyn CurrentUser>) -> Self
    where
        A: FeedReader + ReactionClient + ActivityRemover + 'static,
    {
        Self {
            feeds: api.clone(),
            reactions: api.clone(),
            activities: api,
            realtime: None,
            errors: Arc::new(LoggingErrorReporter),
            analytics: None,
            user,
        }
    }

    pub fn with_realtime(mut self, source: Arc<dyn SubscriptionSource>) -> Self {
        self.realtime = Some(source);
        self
    }

    pub fn with_errors(mut self, errors: Arc<dyn ErrorReporter>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsClient>) -> Self {
        self.analytics = Some(analytics);
        self
    }
}

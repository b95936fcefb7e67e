//! Feed manager tying activities, reactions, paging and live updates together.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use crate::activities::reactions::{own_reactions, reactions_next};
use crate::activities::{apply_reaction_op, ActivityIndex, ActivityPath, ActivityStore, ReactionOp};
use crate::client::{Collaborators, RealtimeHandler};
use crate::config::{cursor_query, FeedConfig, FeedRequestOptions, MarkFlag};
use crate::error::{FeedError, RequestKind};
use crate::live::LiveSubscription;
use crate::locks::KeyedLocks;
use crate::observers::{Observer, ObserverHandle, ObserverId, ObserverRegistry};
use crate::types::{
    activity_id, Counts, Engagement, EngagementContent, FeedId, FeedResponse,
    ReactionRequestOptions, RealtimeUpdate,
};

/// Mutable feed state. Only touched under the state lock.
#[derive(Default)]
struct FeedState {
    activity_order: Vec<String>,
    activities: ActivityStore,
    index: ActivityIndex,
    refreshing: bool,
    /// Cursor of the last successful page.
    next_cursor: Option<String>,
    realtime_adds: Vec<Value>,
    realtime_deletes: Vec<Value>,
    counts: Counts,
}

impl FeedState {
    /// Replace everything with a fresh first page.
    fn replace_page(&mut self, response: FeedResponse, counts: Counts) {
        self.activity_order = response
            .results
            .iter()
            .filter_map(activity_id)
            .collect();
        self.activities = ActivityStore::from_results(&response.results);
        self.index = ActivityIndex::from_results(&response.results);
        self.realtime_adds.clear();
        self.realtime_deletes.clear();
        self.counts = counts;
        self.next_cursor = response.next;
        self.refreshing = false;
    }

    /// Merge a further page into what is loaded.
    fn append_page(&mut self, response: FeedResponse) {
        for record in &response.results {
            let id = match activity_id(record) {
                Some(id) => id,
                None => {
                    tracing::warn!("skipping page record without an id");
                    continue;
                }
            };

            if self.activities.insert(record.clone()).is_some() {
                self.index.remove_root(&id);
            } else {
                self.activity_order.push(id);
            }
            self.index.index_root(record);
        }
        self.next_cursor = response.next;
        self.refreshing = false;
    }

    fn has_next_page(&self) -> bool {
        self.next_cursor.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// Primary path: the group slot for aggregated activities, else the root.
    fn primary_path(&self, id: &str) -> ActivityPath {
        self.index
            .path(id)
            .cloned()
            .unwrap_or_else(|| ActivityPath::root(id))
    }

    /// Every location of an activity, falling back to its primary path.
    fn paths_for(&self, id: &str) -> Vec<ActivityPath> {
        let paths = self.index.paths(id);
        if !paths.is_empty() {
            return paths.to_vec();
        }
        let primary = self.primary_path(id);
        if self.activities.resolve(&primary).is_some() {
            vec![primary]
        } else {
            Vec::new()
        }
    }

    fn apply_to_activity(&mut self, id: &str, op: &ReactionOp) {
        for path in self.paths_for(id) {
            if let Some(target) = self.activities.resolve_mut(&path) {
                if let Err(e) = apply_reaction_op(target, op) {
                    tracing::warn!(activity = id, path = ?path, error = %e, "skipping reaction update");
                }
            }
        }
    }

    fn remove_activity(&mut self, id: &str) {
        let path = self.primary_path(id);
        self.activities.remove_at(&path);
        self.activity_order.retain(|x| x != id);

        let root = path.root_id().to_string();
        self.index.reindex_root(&root, self.activities.get(&root));
    }
}

/// Consistent copy of the feed state for rendering.
#[derive(Clone, Debug)]
pub struct FeedSnapshot {
    pub feed_id: FeedId,
    pub activity_order: Vec<String>,
    pub activities: ActivityStore,
    pub counts: Counts,
    pub refreshing: bool,
    pub has_next_page: bool,
    pub realtime_adds: Vec<Value>,
    pub realtime_deletes: Vec<Value>,
}

impl FeedSnapshot {
    /// Top-level records in display order.
    pub fn ordered_activities(&self) -> impl Iterator<Item = &Value> {
        self.activity_order
            .iter()
            .filter_map(move |id| self.activities.get(id))
    }

    /// "3 new notifications" style notice for pending live adds.
    pub fn new_activities_label(&self, single: &str, plural: &str) -> Option<String> {
        match self.realtime_adds.len() {
            0 => None,
            1 => Some(format!("1 new {}", single)),
            n => Some(format!("{} new {}", n, plural)),
        }
    }
}

/// State and observers shared with the live-update handler.
struct Shared {
    state: Mutex<FeedState>,
    observers: ObserverRegistry,
}

impl Shared {
    /// Apply a change under the lock, then notify observers.
    fn update<R>(&self, f: impl FnOnce(&mut FeedState) -> R) -> R {
        let result = {
            let mut state = self.state.lock();
            f(&mut state)
        };
        self.observers.notify();
        result
    }

    fn apply_realtime(&self, update: RealtimeUpdate) {
        let delta = update.activity_delta();
        tracing::debug!(
            added = update.new.len(),
            deleted = update.deleted.len(),
            "realtime update"
        );
        self.update(|state| {
            state.realtime_adds.extend(update.new);
            state.realtime_deletes.extend(update.deleted);
            state.counts.shift(delta);
        });
    }
}

/// Owns the state of one feed and every operation on it.
///
/// Operations never return errors: failures go to the configured
/// [`ErrorReporter`](crate::client::ErrorReporter) once, any in-progress flag
/// is released, and the state from before the call is kept.
pub struct FeedManager {
    config: FeedConfig,
    feed_id: FeedId,
    collaborators: Collaborators,
    shared: Arc<Shared>,
    live: LiveSubscription,
    /// In-flight toggles by (kind, activity id).
    toggles: KeyedLocks<(String, String)>,
    /// In-flight reaction page loads by (activity path, kind).
    reaction_pages: KeyedLocks<(ActivityPath, String)>,
}

impl FeedManager {
    /// Create a manager with empty state.
    pub fn new(config: FeedConfig, collaborators: Collaborators) -> Self {
        let feed_id = Self::resolve_feed_id(&config, &collaborators);
        Self {
            config,
            feed_id,
            collaborators,
            shared: Arc::new(Shared {
                state: Mutex::new(FeedState::default()),
                observers: ObserverRegistry::new(),
            }),
            live: LiveSubscription::new(),
            toggles: KeyedLocks::new(),
            reaction_pages: KeyedLocks::new(),
        }
    }

    /// Feed identity for a config; a missing user id means the current user.
    pub fn resolve_feed_id(config: &FeedConfig, collaborators: &Collaborators) -> FeedId {
        let user_id = config
            .user_id
            .clone()
            .unwrap_or_else(|| collaborators.user.user_id());
        FeedId::new(config.feed_group.clone(), user_id)
    }

    pub fn feed_id(&self) -> &FeedId {
        &self.feed_id
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    // --- Reads ---

    pub fn snapshot(&self) -> FeedSnapshot {
        let state = self.shared.state.lock();
        FeedSnapshot {
            feed_id: self.feed_id.clone(),
            activity_order: state.activity_order.clone(),
            activities: state.activities.clone(),
            counts: state.counts,
            refreshing: state.refreshing,
            has_next_page: state.has_next_page(),
            realtime_adds: state.realtime_adds.clone(),
            realtime_deletes: state.realtime_deletes.clone(),
        }
    }

    pub fn activity_order(&self) -> Vec<String> {
        self.shared.state.lock().activity_order.clone()
    }

    /// Top-level record by id.
    pub fn activity(&self, id: &str) -> Option<Value> {
        self.shared.state.lock().activities.get(id).cloned()
    }

    /// Value at an arbitrary path.
    pub fn resolve(&self, path: &ActivityPath) -> Option<Value> {
        self.shared.state.lock().activities.resolve(path).cloned()
    }

    pub fn counts(&self) -> Counts {
        self.shared.state.lock().counts
    }

    pub fn is_refreshing(&self) -> bool {
        self.shared.state.lock().refreshing
    }

    pub fn has_next_page(&self) -> bool {
        self.shared.state.lock().has_next_page()
    }

    pub fn realtime_adds(&self) -> Vec<Value> {
        self.shared.state.lock().realtime_adds.clone()
    }

    pub fn realtime_deletes(&self) -> Vec<Value> {
        self.shared.state.lock().realtime_deletes.clone()
    }

    /// Primary path of an activity followed by `rest`.
    pub fn get_activity_path(&self, activity_id: &str, rest: &[&str]) -> ActivityPath {
        self.shared
            .state
            .lock()
            .primary_path(activity_id)
            .join(rest.iter().copied())
    }

    /// Every location of an activity in the store.
    pub fn get_activity_paths(&self, activity_id: &str) -> Vec<ActivityPath> {
        self.shared.state.lock().paths_for(activity_id)
    }

    /// Activity synthesized for a reaction posted to target feeds.
    pub fn reaction_activity(&self, reaction_id: &str) -> Option<String> {
        self.shared
            .state
            .lock()
            .index
            .reaction_activity(reaction_id)
            .map(str::to_string)
    }

    pub fn is_toggling(&self, kind: &str, activity_id: &str) -> bool {
        self.toggles
            .is_held(&(kind.to_string(), activity_id.to_string()))
    }

    pub fn is_loading_reactions(&self, path: &ActivityPath, kind: &str) -> bool {
        self.reaction_pages.is_held(&(path.clone(), kind.to_string()))
    }

    // --- Feed pages ---

    /// Load the first page, replacing everything loaded so far.
    pub async fn refresh(&self, extra: &FeedRequestOptions) {
        let options = self.config.request_options(Some(extra));

        self.shared.update(|state| state.refreshing = true);
        tracing::debug!(feed = %self.feed_id, "refreshing feed");

        let response = match self.collaborators.feeds.get(&self.feed_id, &options).await {
            Ok(response) => response,
            Err(e) => {
                self.shared.update(|state| state.refreshing = false);
                self.report(&e, RequestKind::GetFeed, self.feed_context());
                return;
            }
        };

        let mut counts = response.counts();
        if options.mark_seen.as_ref().is_some_and(MarkFlag::is_all) {
            counts.unseen = 0;
        }
        if options.mark_read.as_ref().is_some_and(MarkFlag::is_all) {
            counts.unread = 0;
        }

        tracing::debug!(
            feed = %self.feed_id,
            results = response.results.len(),
            has_next = response.has_next(),
            "feed refreshed"
        );
        self.shared.update(|state| state.replace_page(response, counts));
    }

    /// Append the page after the last one loaded.
    ///
    /// Does nothing without a cursor, or while a refresh or another page
    /// load is in flight.
    pub async fn load_next_page(&self) {
        let cursor = {
            let mut state = self.shared.state.lock();
            let cursor = match state.next_cursor.as_deref() {
                Some(c) if !c.is_empty() => c.to_string(),
                _ => return,
            };
            if state.refreshing {
                return;
            }
            state.refreshing = true;
            cursor
        };
        self.shared.observers.notify();

        let options = self
            .config
            .request_options(Some(&FeedRequestOptions::from_cursor(&cursor)));
        tracing::debug!(feed = %self.feed_id, cursor = %cursor, "loading next page");

        let response = match self.collaborators.feeds.get(&self.feed_id, &options).await {
            Ok(response) => response,
            Err(e) => {
                self.shared.update(|state| state.refreshing = false);
                self.report(&e, RequestKind::GetFeedNextPage, self.feed_context());
                return;
            }
        };

        self.shared.update(|state| state.append_page(response));
    }

    /// Refresh the unread/unseen counters without touching activities.
    pub async fn refresh_unread_unseen(&self) {
        let options = FeedRequestOptions::with_limit(1);
        match self.collaborators.feeds.get(&self.feed_id, &options).await {
            Ok(response) => {
                let counts = response.counts();
                self.shared.update(|state| state.counts = counts);
            }
            Err(e) => {
                self.report(&e, RequestKind::GetNotificationCounts, self.feed_context());
            }
        }
    }

    // --- Reactions ---

    /// Create a reaction and count it at every location of the activity.
    pub async fn on_add_reaction(
        &self,
        kind: &str,
        activity: &Value,
        options: &ReactionRequestOptions,
    ) {
        let reaction = match self.collaborators.reactions.add(kind, activity, options).await {
            Ok(reaction) => reaction,
            Err(e) => {
                self.report(&e, RequestKind::AddReaction, self.reaction_context(kind, activity));
                return;
            }
        };

        let mut enriched = match reaction {
            Value::Object(map) => map,
            other => {
                let e = FeedError::InvalidResponse(format!("reaction is not an object: {}", other));
                self.report(&e, RequestKind::AddReaction, self.reaction_context(kind, activity));
                return;
            }
        };

        self.track(kind.to_string(), activity, options.track_analytics);
        enriched.insert("user".to_string(), self.collaborators.user.profile());

        if let Some(id) = activity_id(activity) {
            let op = ReactionOp::Add {
                kind: kind.to_string(),
                reaction: Value::Object(enriched),
            };
            self.shared.update(|state| state.apply_to_activity(&id, &op));
        }
    }

    /// Delete a reaction and uncount it at every location of the activity.
    ///
    /// If the reaction produced an activity in target feeds, that activity is
    /// removed too.
    pub async fn on_remove_reaction(
        &self,
        kind: &str,
        activity: &Value,
        reaction_id: &str,
        options: &ReactionRequestOptions,
    ) {
        if let Err(e) = self.collaborators.reactions.delete(reaction_id).await {
            self.report(&e, RequestKind::DeleteReaction, self.reaction_context(kind, activity));
            return;
        }

        self.track(format!("un{}", kind), activity, options.track_analytics);

        let op = ReactionOp::Remove {
            kind: kind.to_string(),
            reaction_id: reaction_id.to_string(),
        };
        self.shared.update(|state| {
            let synthetic = state
                .index
                .reaction_activity(reaction_id)
                .map(str::to_string);
            if let Some(synthetic) = synthetic {
                state.remove_activity(&synthetic);
            }
            if let Some(id) = activity_id(activity) {
                state.apply_to_activity(&id, &op);
            }
        });
    }

    /// Remove the most recent own reaction of `kind`, or add one if there is
    /// none. Dropped while another toggle of the same pair is in flight.
    pub async fn on_toggle_reaction(
        &self,
        kind: &str,
        activity: &Value,
        options: &ReactionRequestOptions,
    ) {
        let id = match activity_id(activity) {
            Some(id) => id,
            None => return,
        };

        let _guard = match self.toggles.try_acquire((kind.to_string(), id.clone())) {
            Some(guard) => guard,
            None => {
                tracing::debug!(kind, activity = %id, "toggle already in flight");
                return;
            }
        };

        let latest = {
            let state = self.shared.state.lock();
            let primary = state.primary_path(&id);
            let paths = state.paths_for(&id);
            let record = state
                .activities
                .resolve(&primary)
                .or_else(|| paths.first().and_then(|path| state.activities.resolve(path)));
            let latest = record
                .and_then(|record| own_reactions(record, kind).first())
                .and_then(activity_id);
            latest
        };

        match latest {
            Some(reaction_id) => {
                self.on_remove_reaction(kind, activity, &reaction_id, options)
                    .await
            }
            None => self.on_add_reaction(kind, activity, options).await,
        }
    }

    /// Fetch the next page of `latest_reactions[kind]` for an activity.
    pub async fn load_next_reactions(
        &self,
        activity_id: &str,
        kind: &str,
        activity_path: Option<ActivityPath>,
    ) {
        let path = activity_path.unwrap_or_else(|| self.get_activity_path(activity_id, &[]));

        let next = {
            let state = self.shared.state.lock();
            state
                .activities
                .resolve(&path)
                .and_then(|record| reactions_next(record, kind))
                .map(str::to_string)
        };
        let next = match next {
            Some(next) => next,
            None => return,
        };

        let guard = match self.reaction_pages.try_acquire((path.clone(), kind.to_string())) {
            Some(guard) => guard,
            None => return,
        };
        self.shared.observers.notify();

        let mut query: BTreeMap<String, String> = cursor_query(&next).into_iter().collect();
        query.insert("activity_id".to_string(), activity_id.to_string());
        query.insert("kind".to_string(), kind.to_string());

        let response = match self.collaborators.reactions.filter(&query).await {
            Ok(response) => response,
            Err(e) => {
                drop(guard);
                self.shared.observers.notify();
                self.report(&e, RequestKind::GetReactionsNextPage, json!({ "options": query }));
                return;
            }
        };

        let op = ReactionOp::AppendLatest {
            kind: kind.to_string(),
            reactions: response.results,
            next: response.next,
        };
        // Held until the new cursor is in state.
        self.shared.update(move |state| {
            if let Some(target) = state.activities.resolve_mut(&path) {
                if let Err(e) = apply_reaction_op(target, &op) {
                    tracing::warn!(path = ?path, error = %e, "skipping reaction page");
                }
            }
            drop(guard);
        });
    }

    // --- Activities ---

    /// Delete an activity from the feed and from local state.
    pub async fn on_remove_activity(&self, activity_id: &str) {
        if let Err(e) = self
            .collaborators
            .activities
            .remove_activity(&self.feed_id, activity_id)
            .await
        {
            let context = json!({
                "activityId": activity_id,
                "feedGroup": self.config.feed_group,
                "userId": self.config.user_id,
            });
            self.report(&e, RequestKind::DeleteActivity, context);
            return;
        }

        self.shared.update(|state| state.remove_activity(activity_id));
    }

    // --- Observers and live updates ---

    /// Add a callback observer and make sure live updates flow.
    pub async fn register(&self, callback: Observer) -> ObserverId {
        let id = self.shared.observers.register(callback);
        self.subscribe().await;
        id
    }

    /// Add a channel observer and make sure live updates flow.
    pub async fn watch(&self, buffer_size: usize) -> ObserverHandle {
        let handle = self.shared.observers.watch(buffer_size);
        self.subscribe().await;
        handle
    }

    /// Remove an observer; the last one out tears the subscription down.
    pub async fn unregister(&self, id: ObserverId) {
        self.shared.observers.unregister(id);
        self.unsubscribe().await;
    }

    pub fn observer_count(&self) -> usize {
        self.shared.observers.len()
    }

    /// Establish the live subscription if `notify` is configured.
    pub async fn subscribe(&self) {
        if !self.config.notify {
            return;
        }
        let source = match &self.collaborators.realtime {
            Some(source) => source,
            None => {
                tracing::debug!(feed = %self.feed_id, "notify requested without a realtime source");
                return;
            }
        };

        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        let handler: RealtimeHandler = Arc::new(move |update| {
            if let Some(shared) = shared.upgrade() {
                shared.apply_realtime(update);
            }
        });

        self.live.establish(source, &self.feed_id, handler).await;
    }

    /// Cancel the live subscription once no observers remain.
    pub async fn unsubscribe(&self) {
        let observers = &self.shared.observers;
        self.live
            .tear_down(&self.feed_id, || !observers.is_empty())
            .await;
    }

    pub async fn is_subscribed(&self) -> bool {
        self.live.is_active().await
    }

    // --- Helpers ---

    fn feed_context(&self) -> Value {
        json!({
            "feedGroup": self.config.feed_group,
            "userId": self.config.user_id,
        })
    }

    fn reaction_context(&self, kind: &str, activity: &Value) -> Value {
        json!({
            "kind": kind,
            "activity": activity,
            "feedGroup": self.config.feed_group,
            "userId": self.config.user_id,
        })
    }

    fn report(&self, error: &FeedError, kind: RequestKind, context: Value) {
        tracing::debug!(feed = %self.feed_id, kind = kind.as_str(), error = %error, "request failed");
        self.collaborators.errors.report(error, kind, &context);
    }

    fn track(&self, label: String, activity: &Value, requested: bool) {
        if !requested {
            return;
        }
        let analytics = match &self.collaborators.analytics {
            Some(analytics) => analytics,
            None => return,
        };

        analytics.track_engagement(Engagement {
            label,
            feed_id: self.feed_id.to_string(),
            content: EngagementContent {
                foreign_id: activity
                    .get("foreign_id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            location: self.config.analytics_location.clone(),
        });
    }
}

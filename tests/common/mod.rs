//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use feedstate::{
    ActivityRemover, AnalyticsClient, Collaborators, Engagement, ErrorReporter, FeedConfig,
    FeedError, FeedId, FeedManager, FeedReader, FeedRequestOptions, FeedResponse, ReactionClient,
    ReactionFilterResponse, ReactionRequestOptions, RealtimeHandler, RealtimeUpdate, RequestKind,
    Result, StaticUser, Subscription, SubscriptionSource,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Flat activity with the full activity signature.
pub fn activity(id: &str) -> Value {
    json!({
        "id": id,
        "actor": "user:bob",
        "verb": "post",
        "object": format!("note:{}", id),
        "foreign_id": format!("post:{}", id),
    })
}

pub fn transport_error() -> FeedError {
    FeedError::Transport("connection reset".to_string())
}

/// Scripted stand-in for the feed API.
#[derive(Default)]
pub struct MockApi {
    feed_responses: Mutex<VecDeque<Result<FeedResponse>>>,
    pub feed_requests: Mutex<Vec<FeedRequestOptions>>,
    feed_gate: Mutex<Option<Arc<Notify>>>,

    reaction_responses: Mutex<VecDeque<Result<Value>>>,
    pub added: Mutex<Vec<(String, Value, ReactionRequestOptions)>>,
    reaction_gate: Mutex<Option<Arc<Notify>>>,
    next_reaction: AtomicUsize,

    delete_responses: Mutex<VecDeque<Result<()>>>,
    pub deleted: Mutex<Vec<String>>,

    filter_responses: Mutex<VecDeque<Result<ReactionFilterResponse>>>,
    pub filter_queries: Mutex<Vec<BTreeMap<String, String>>>,
    filter_gate: Mutex<Option<Arc<Notify>>>,
    chained_reaction_pages: AtomicBool,

    remove_responses: Mutex<VecDeque<Result<()>>>,
    pub removed: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_page(&self, response: FeedResponse) {
        self.feed_responses.lock().push_back(Ok(response));
    }

    pub fn fail_next_read(&self) {
        self.feed_responses.lock().push_back(Err(transport_error()));
    }

    /// Hold feed reads until the returned notifier fires.
    pub fn hold_feed_reads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.feed_gate.lock() = Some(gate.clone());
        gate
    }

    /// Hold reaction creation until the returned notifier fires.
    pub fn hold_reactions(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.reaction_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn push_reaction(&self, reaction: Result<Value>) {
        self.reaction_responses.lock().push_back(reaction);
    }

    pub fn fail_next_delete(&self) {
        self.delete_responses.lock().push_back(Err(transport_error()));
    }

    pub fn push_reaction_page(&self, response: Result<ReactionFilterResponse>) {
        self.filter_responses.lock().push_back(response);
    }

    /// Hold reaction page requests until the returned notifier fires.
    pub fn hold_filters(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.filter_gate.lock() = Some(gate.clone());
        gate
    }

    /// Answer unscripted reaction page requests with one reaction and a
    /// cursor that depends on the requested `id_lt`.
    pub fn chain_reaction_pages(&self) {
        self.chained_reaction_pages.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_remove(&self) {
        self.remove_responses.lock().push_back(Err(transport_error()));
    }

    pub fn feed_read_count(&self) -> usize {
        self.feed_requests.lock().len()
    }
}

#[async_trait]
impl FeedReader for MockApi {
    async fn get(&self, _feed: &FeedId, options: &FeedRequestOptions) -> Result<FeedResponse> {
        self.feed_requests.lock().push(options.clone());

        let gate = self.feed_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.feed_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(FeedResponse::default()))
    }
}

#[async_trait]
impl ReactionClient for MockApi {
    async fn add(
        &self,
        kind: &str,
        activity: &Value,
        options: &ReactionRequestOptions,
    ) -> Result<Value> {
        self.added
            .lock()
            .push((kind.to_string(), activity.clone(), options.clone()));

        let gate = self.reaction_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(scripted) = self.reaction_responses.lock().pop_front() {
            return scripted;
        }

        let n = self.next_reaction.fetch_add(1, Ordering::SeqCst) + 1;
        let id = options.id.clone().unwrap_or_else(|| format!("r{}", n));
        Ok(json!({
            "id": id,
            "kind": kind,
            "activity_id": activity["id"],
            "user_id": "alice",
            "data": options.data.clone().unwrap_or(Value::Null),
        }))
    }

    async fn delete(&self, reaction_id: &str) -> Result<()> {
        self.deleted.lock().push(reaction_id.to_string());
        self.delete_responses.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn filter(&self, query: &BTreeMap<String, String>) -> Result<ReactionFilterResponse> {
        self.filter_queries.lock().push(query.clone());

        let gate = self.filter_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(scripted) = self.filter_responses.lock().pop_front() {
            return scripted;
        }

        if self.chained_reaction_pages.load(Ordering::SeqCst) {
            let id_lt = query.get("id_lt").cloned().unwrap_or_default();
            return Ok(ReactionFilterResponse {
                results: vec![json!({"id": format!("c-{}", id_lt)})],
                next: Some(format!("?id_lt={}x", id_lt)),
            });
        }
        Ok(ReactionFilterResponse::default())
    }
}

#[async_trait]
impl ActivityRemover for MockApi {
    async fn remove_activity(&self, _feed: &FeedId, activity_id: &str) -> Result<()> {
        self.removed.lock().push(activity_id.to_string());
        self.remove_responses.lock().pop_front().unwrap_or(Ok(()))
    }
}

/// Live-update source the tests push events through.
#[derive(Default)]
pub struct MockRealtime {
    handler: Mutex<Option<RealtimeHandler>>,
    pub subscribes: AtomicUsize,
    pub cancels: Arc<AtomicUsize>,
    pub fail_subscribe: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockRealtime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold subscribe calls until the returned notifier fires.
    pub fn hold_subscribes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn push(&self, update: RealtimeUpdate) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(update);
        }
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

struct MockSubscription {
    cancels: Arc<AtomicUsize>,
}

#[async_trait]
impl Subscription for MockSubscription {
    async fn cancel(&mut self) -> Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl SubscriptionSource for MockRealtime {
    async fn subscribe(
        &self,
        _feed: &FeedId,
        handler: RealtimeHandler,
    ) -> Result<Box<dyn Subscription>> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(FeedError::Subscription("faye handshake failed".to_string()));
        }

        *self.handler.lock() = Some(handler);
        Ok(Box::new(MockSubscription {
            cancels: self.cancels.clone(),
        }))
    }
}

/// Error reporter that remembers every report.
#[derive(Default)]
pub struct RecordingErrors {
    pub reports: Mutex<Vec<(RequestKind, String, Value)>>,
}

impl RecordingErrors {
    pub fn kinds(&self) -> Vec<RequestKind> {
        self.reports.lock().iter().map(|(kind, _, _)| *kind).collect()
    }

    pub fn last_context(&self) -> Option<Value> {
        self.reports.lock().last().map(|(_, _, context)| context.clone())
    }
}

impl ErrorReporter for RecordingErrors {
    fn report(&self, error: &FeedError, kind: RequestKind, context: &Value) {
        self.reports
            .lock()
            .push((kind, error.to_string(), context.clone()));
    }
}

#[derive(Default)]
pub struct RecordingAnalytics {
    pub events: Mutex<Vec<Engagement>>,
}

impl AnalyticsClient for RecordingAnalytics {
    fn track_engagement(&self, engagement: Engagement) {
        self.events.lock().push(engagement);
    }
}

/// Mock collaborators wired together.
pub struct Harness {
    pub api: Arc<MockApi>,
    pub realtime: Arc<MockRealtime>,
    pub errors: Arc<RecordingErrors>,
    pub analytics: Arc<RecordingAnalytics>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        Self {
            api: MockApi::new(),
            realtime: MockRealtime::new(),
            errors: Arc::new(RecordingErrors::default()),
            analytics: Arc::new(RecordingAnalytics::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        let user = Arc::new(StaticUser::new(
            "alice",
            json!({"id": "alice", "data": {"name": "Alice"}}),
        ));
        Collaborators::from_api(self.api.clone(), user)
            .with_realtime(self.realtime.clone())
            .with_errors(self.errors.clone())
            .with_analytics(self.analytics.clone())
    }

    pub fn manager(&self, config: FeedConfig) -> FeedManager {
        FeedManager::new(config, self.collaborators())
    }

    /// Timeline manager already holding `results` from a first page.
    pub async fn loaded(&self, results: Vec<Value>, next: Option<&str>) -> FeedManager {
        let manager = self.manager(FeedConfig::flat("timeline"));
        self.api.push_page(FeedResponse::page(results, next));
        manager.refresh(&FeedRequestOptions::default()).await;
        manager
    }
}

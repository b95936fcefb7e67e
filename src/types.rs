//! Core types for the feed state manager.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Identity of a feed: group plus owning user.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedId {
    pub group: String,
    pub user_id: String,
}

impl FeedId {
    pub fn new(group: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            user_id: user_id.into(),
        }
    }
}

impl fmt::Debug for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedId({}:{})", self.group, self.user_id)
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.user_id)
    }
}

/// Unread / unseen notification counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub unread: u64,
    pub unseen: u64,
}

impl Counts {
    /// Shift both counters by a signed delta, flooring at zero.
    pub fn shift(&mut self, delta: i64) {
        self.unread = shift_floor(self.unread, delta);
        self.unseen = shift_floor(self.unseen, delta);
    }
}

fn shift_floor(value: u64, delta: i64) -> u64 {
    if delta >= 0 {
        value.saturating_add(delta as u64)
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}

/// One page of a feed read.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub results: Vec<Value>,

    /// Continuation cursor; empty or absent means last page.
    #[serde(default)]
    pub next: Option<String>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub unread: Option<u64>,

    #[serde(default, deserialize_with = "lenient_count")]
    pub unseen: Option<u64>,
}

impl FeedResponse {
    /// Page with the given results and cursor.
    pub fn page(results: Vec<Value>, next: Option<&str>) -> Self {
        Self {
            results,
            next: next.map(str::to_string),
            ..Default::default()
        }
    }

    /// Counters reported by the server, zero when missing.
    pub fn counts(&self) -> Counts {
        Counts {
            unread: self.unread.unwrap_or(0),
            unseen: self.unseen.unwrap_or(0),
        }
    }

    /// Whether this page points at a further one.
    pub fn has_next(&self) -> bool {
        self.next.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// True when results are aggregated groups rather than flat activities.
    pub fn is_aggregated(&self) -> bool {
        self.results
            .first()
            .is_some_and(|first| first.get("activities").is_some())
    }
}

/// Counters that are not non-negative integers are treated as absent.
fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_u64()))
}

/// One page of reactions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReactionFilterResponse {
    #[serde(default)]
    pub results: Vec<Value>,

    #[serde(default)]
    pub next: Option<String>,
}

/// A pushed live-update event.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RealtimeUpdate {
    #[serde(default)]
    pub new: Vec<Value>,

    #[serde(default)]
    pub deleted: Vec<Value>,
}

impl RealtimeUpdate {
    /// Net change in activity count carried by this event.
    pub fn activity_delta(&self) -> i64 {
        self.new.len() as i64 - self.deleted.len() as i64
    }
}

/// Options for creating a reaction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReactionRequestOptions {
    /// Client-chosen reaction id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Extra feeds that receive an activity for this reaction.
    #[serde(default, rename = "targetFeeds", skip_serializing_if = "Vec::is_empty")]
    pub target_feeds: Vec<String>,

    /// Record an engagement event with the analytics collaborator.
    #[serde(skip)]
    pub track_analytics: bool,
}

impl ReactionRequestOptions {
    pub fn tracked() -> Self {
        Self {
            track_analytics: true,
            ..Default::default()
        }
    }
}

/// Engagement event forwarded to the analytics collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    pub label: String,
    pub feed_id: String,
    pub content: EngagementContent,
    pub location: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngagementContent {
    pub foreign_id: Option<String>,
}

/// Id of a record, if it has one. Numeric ids are keyed by their decimal
/// form so `1` and `"1"` name the same record.
pub fn activity_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Whether a record carries the structural signature of an activity.
pub fn is_activity(value: &Value) -> bool {
    match value.as_object() {
        Some(obj) => ["id", "actor", "verb", "object"]
            .iter()
            .all(|key| obj.get(*key).is_some_and(is_truthy)),
        None => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

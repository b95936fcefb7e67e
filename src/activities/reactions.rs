//! Reaction bookkeeping on a single activity record.
//!
//! An activity carries three per-kind maps that must stay consistent:
//! `reaction_counts`, `own_reactions` and `latest_reactions`. Reaction paging
//! state lives under `latest_reactions_extra[kind].next`.

use crate::error::{FeedError, Result};
use crate::types::activity_id;
use serde_json::{json, Map, Value};

pub const REACTION_COUNTS: &str = "reaction_counts";
pub const OWN_REACTIONS: &str = "own_reactions";
pub const LATEST_REACTIONS: &str = "latest_reactions";
pub const LATEST_REACTIONS_EXTRA: &str = "latest_reactions_extra";

/// A change to the reaction state of one activity.
#[derive(Clone, Debug)]
pub enum ReactionOp {
    /// Count the reaction and put it at the head of both lists.
    Add { kind: String, reaction: Value },

    /// Uncount the reaction and drop it (by id) from both lists.
    Remove { kind: String, reaction_id: String },

    /// Append a fetched page to `latest_reactions` and store its cursor.
    AppendLatest {
        kind: String,
        reactions: Vec<Value>,
        next: Option<String>,
    },
}

/// Apply a reaction operation to an activity record.
pub fn apply_reaction_op(activity: &mut Value, op: &ReactionOp) -> Result<()> {
    let obj = activity.as_object_mut().ok_or_else(|| {
        FeedError::InvalidOperation("reaction target is not an object".to_string())
    })?;

    match op {
        ReactionOp::Add { kind, reaction } => {
            let count = slot(obj, REACTION_COUNTS, kind, json!(0));
            *count = json!(count.as_u64().unwrap_or(0) + 1);

            list(obj, OWN_REACTIONS, kind).insert(0, reaction.clone());
            list(obj, LATEST_REACTIONS, kind).insert(0, reaction.clone());
        }

        ReactionOp::Remove { kind, reaction_id } => {
            let count = slot(obj, REACTION_COUNTS, kind, json!(0));
            *count = json!(count.as_u64().unwrap_or(0).saturating_sub(1));

            remove_by_id(list(obj, OWN_REACTIONS, kind), reaction_id);
            remove_by_id(list(obj, LATEST_REACTIONS, kind), reaction_id);
        }

        ReactionOp::AppendLatest {
            kind,
            reactions,
            next,
        } => {
            list(obj, LATEST_REACTIONS, kind).extend(reactions.iter().cloned());

            let extra = slot(obj, LATEST_REACTIONS_EXTRA, kind, json!({}));
            if !extra.is_object() {
                *extra = json!({});
            }
            if let Some(extra) = extra.as_object_mut() {
                extra.insert(
                    "next".to_string(),
                    next.clone().map(Value::String).unwrap_or(Value::Null),
                );
            }
        }
    }

    Ok(())
}

/// The current user's reactions of `kind`, most recent first.
pub fn own_reactions<'a>(activity: &'a Value, kind: &str) -> &'a [Value] {
    activity
        .get(OWN_REACTIONS)
        .and_then(|m| m.get(kind))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn latest_reactions<'a>(activity: &'a Value, kind: &str) -> &'a [Value] {
    activity
        .get(LATEST_REACTIONS)
        .and_then(|m| m.get(kind))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn reaction_count(activity: &Value, kind: &str) -> u64 {
    activity
        .get(REACTION_COUNTS)
        .and_then(|m| m.get(kind))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Cursor for the next page of `latest_reactions[kind]`, if any.
pub fn reactions_next<'a>(activity: &'a Value, kind: &str) -> Option<&'a str> {
    activity
        .get(LATEST_REACTIONS_EXTRA)
        .and_then(|m| m.get(kind))
        .and_then(|e| e.get("next"))
        .and_then(Value::as_str)
        .filter(|next| !next.is_empty())
}

/// `obj[field][kind]`, creating either level when missing or mistyped.
fn slot<'a>(obj: &'a mut Map<String, Value>, field: &str, kind: &str, default: Value) -> &'a mut Value {
    let field = obj.entry(field).or_insert_with(|| json!({}));
    if !field.is_object() {
        *field = json!({});
    }
    match field {
        Value::Object(map) => map.entry(kind).or_insert(default),
        _ => unreachable!("field was just made an object"),
    }
}

fn list<'a>(obj: &'a mut Map<String, Value>, field: &str, kind: &str) -> &'a mut Vec<Value> {
    let entry = slot(obj, field, kind, json!([]));
    if !entry.is_array() {
        *entry = json!([]);
    }
    match entry {
        Value::Array(items) => items,
        _ => unreachable!("entry was just made an array"),
    }
}

fn remove_by_id(items: &mut Vec<Value>, id: &str) {
    if let Some(pos) = items
        .iter()
        .position(|r| activity_id(r).as_deref() == Some(id))
    {
        items.remove(pos);
    }
}

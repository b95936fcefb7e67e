//! Path indices over the activity store.

use serde_json::Value;
use std::collections::HashMap;

use super::store::{ActivityPath, PathSegment};
use crate::types::{activity_id, is_activity};

/// Where a reaction's synthetic activity lives.
#[derive(Clone, Debug, PartialEq, Eq)]
struct ReactionLink {
    activity_id: String,
    root: String,
}

/// Index of activity locations.
///
/// - `id_to_path`: primary location of activities nested in aggregated
///   groups (`[group, "activities", i]`).
/// - `id_to_paths`: every location of a record with the activity signature,
///   including copies nested inside other activities (reposts).
/// - `reaction_activities`: reaction id to the activity created for it in
///   target feeds.
#[derive(Clone, Debug, Default)]
pub struct ActivityIndex {
    id_to_path: HashMap<String, ActivityPath>,
    id_to_paths: HashMap<String, Vec<ActivityPath>>,
    reaction_activities: HashMap<String, ReactionLink>,
}

impl ActivityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh index for a page of results.
    pub fn from_results(results: &[Value]) -> Self {
        let mut index = Self::new();
        for record in results {
            index.index_root(record);
        }
        index
    }

    /// Add entries for one top-level record.
    pub fn index_root(&mut self, record: &Value) {
        let root = match activity_id(record) {
            Some(id) => id,
            None => return,
        };

        let grouped = record.get("activities").and_then(Value::as_array);

        if let Some(activities) = grouped {
            for (i, act) in activities.iter().enumerate() {
                if let Some(id) = activity_id(act) {
                    let path = ActivityPath::root(root.as_str()).join(["activities"]).join([i]);
                    self.id_to_path.insert(id, path);
                }
            }
        }

        let mut current = ActivityPath::root(root.as_str());
        self.scan(record, &mut current);

        match grouped {
            Some(activities) => {
                for act in activities {
                    self.link_reaction(act, &root);
                }
            }
            None => self.link_reaction(record, &root),
        }
    }

    /// Drop every entry that points into `root`.
    ///
    /// An activity whose primary path was in `root` falls back to its latest
    /// remaining slot in another group.
    pub fn remove_root(&mut self, root: &str) {
        let mut orphaned = Vec::new();
        self.id_to_path.retain(|id, path| {
            let keep = path.root_id() != root;
            if !keep {
                orphaned.push(id.clone());
            }
            keep
        });

        self.id_to_paths.retain(|_, paths| {
            paths.retain(|path| path.root_id() != root);
            !paths.is_empty()
        });

        for id in orphaned {
            let fallback = self
                .paths(&id)
                .iter()
                .rev()
                .find(|path| is_group_slot(path))
                .cloned();
            if let Some(path) = fallback {
                self.id_to_path.insert(id, path);
            }
        }

        self.reaction_activities.retain(|_, link| link.root != root);
    }

    /// Rebuild the entries of `root` from its current record.
    pub fn reindex_root(&mut self, root: &str, record: Option<&Value>) {
        self.remove_root(root);
        if let Some(record) = record {
            self.index_root(record);
        }
    }

    /// Primary path of an activity, when it lives inside a group.
    pub fn path(&self, id: &str) -> Option<&ActivityPath> {
        self.id_to_path.get(id)
    }

    /// Every indexed location of an activity.
    pub fn paths(&self, id: &str) -> &[ActivityPath] {
        self.id_to_paths.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Activity synthesized for a reaction posted to target feeds.
    pub fn reaction_activity(&self, reaction_id: &str) -> Option<&str> {
        self.reaction_activities
            .get(reaction_id)
            .map(|link| link.activity_id.as_str())
    }

    pub fn activity_count(&self) -> usize {
        self.id_to_paths.len()
    }

    fn scan(&mut self, value: &Value, current: &mut ActivityPath) {
        match value {
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    current.push(i);
                    self.scan(item, current);
                    current.pop();
                }
            }
            Value::Object(obj) => {
                if is_activity(value) {
                    if let Some(id) = activity_id(value) {
                        self.id_to_paths
                            .entry(id)
                            .or_default()
                            .push(current.clone());
                    }
                }
                for (key, child) in obj {
                    current.push(key.as_str());
                    self.scan(child, current);
                    current.pop();
                }
            }
            _ => {}
        }
    }

    fn link_reaction(&mut self, activity: &Value, root: &str) {
        let reaction_id = activity.get("reaction").and_then(activity_id);

        if let (Some(reaction_id), Some(id)) = (reaction_id, activity_id(activity)) {
            self.reaction_activities.insert(
                reaction_id,
                ReactionLink {
                    activity_id: id,
                    root: root.to_string(),
                },
            );
        }
    }
}

/// `[group, "activities", i]`
fn is_group_slot(path: &ActivityPath) -> bool {
    matches!(
        path.segments(),
        [PathSegment::Key(_), PathSegment::Key(key), PathSegment::Index(_)] if key == "activities"
    )
}

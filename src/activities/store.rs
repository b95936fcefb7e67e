//! Addressable arena of activity records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::types::activity_id;

/// One step into a nested record.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl fmt::Debug for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{}", i),
            PathSegment::Key(k) => write!(f, "{:?}", k),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Location of an activity inside the store.
///
/// The first segment is always the id of a top-level record; the rest walk
/// into it (`[group-1, "activities", 2]`).
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ActivityPath(Vec<PathSegment>);

impl ActivityPath {
    /// Path of a top-level record.
    pub fn root(id: impl Into<String>) -> Self {
        ActivityPath(vec![PathSegment::Key(id.into())])
    }

    /// Build from raw segments. Returns None unless the first is a key.
    pub fn from_segments(segments: Vec<PathSegment>) -> Option<Self> {
        match segments.first() {
            Some(PathSegment::Key(_)) => Some(ActivityPath(segments)),
            _ => None,
        }
    }

    pub fn root_id(&self) -> &str {
        match &self.0[0] {
            PathSegment::Key(k) => k,
            PathSegment::Index(_) => unreachable!("activity paths start with a key"),
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    pub fn push(&mut self, segment: impl Into<PathSegment>) {
        self.0.push(segment.into());
    }

    pub fn pop(&mut self) -> Option<PathSegment> {
        if self.0.len() > 1 {
            self.0.pop()
        } else {
            None
        }
    }

    /// This path extended by `rest`.
    pub fn join<I, S>(&self, rest: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        let mut path = self.clone();
        for segment in rest {
            path.push(segment);
        }
        path
    }
}

impl fmt::Debug for ActivityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

fn step<'a>(value: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match segment {
        PathSegment::Key(k) => value.as_object()?.get(k),
        PathSegment::Index(i) => value.as_array()?.get(*i),
    }
}

fn step_mut<'a>(value: &'a mut Value, segment: &PathSegment) -> Option<&'a mut Value> {
    match segment {
        PathSegment::Key(k) => value.as_object_mut()?.get_mut(k),
        PathSegment::Index(i) => value.as_array_mut()?.get_mut(*i),
    }
}

/// Map from top-level activity id to its record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivityStore {
    records: HashMap<String, Value>,
}

impl ActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key each result by its id. Results without an id are skipped.
    pub fn from_results(results: &[Value]) -> Self {
        let mut store = Self::new();
        for record in results {
            store.insert(record.clone());
        }
        store
    }

    /// Insert a top-level record, returning the one it replaced.
    pub fn insert(&mut self, record: Value) -> Option<Value> {
        let id = activity_id(&record)?;
        self.records.insert(id, record)
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &HashMap<String, Value> {
        &self.records
    }

    /// Value at `path`, if every step exists.
    pub fn resolve(&self, path: &ActivityPath) -> Option<&Value> {
        let mut current = self.records.get(path.root_id())?;
        for segment in &path.segments()[1..] {
            current = step(current, segment)?;
        }
        Some(current)
    }

    pub fn resolve_mut(&mut self, path: &ActivityPath) -> Option<&mut Value> {
        let mut current = self.records.get_mut(path.root_id())?;
        for segment in &path.segments()[1..] {
            current = step_mut(current, segment)?;
        }
        Some(current)
    }

    /// Remove the value at `path`. Removing from an array shifts later
    /// elements, so callers must reindex the root afterwards.
    pub fn remove_at(&mut self, path: &ActivityPath) -> Option<Value> {
        if path.is_root() {
            return self.records.remove(path.root_id());
        }

        let mut parent_path = path.clone();
        let last = parent_path.pop()?;
        let parent = self.resolve_mut(&parent_path)?;
        match last {
            PathSegment::Key(k) => parent.as_object_mut()?.remove(&k),
            PathSegment::Index(i) => {
                let arr = parent.as_array_mut()?;
                if i < arr.len() {
                    Some(arr.remove(i))
                } else {
                    None
                }
            }
        }
    }
}

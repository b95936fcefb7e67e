//! Registry sharing one manager per feed identity.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::client::Collaborators;
use crate::config::FeedConfig;
use crate::manager::FeedManager;
use crate::types::FeedId;

/// Hands out one [`FeedManager`] per feed so every consumer of a feed sees
/// the same state.
pub struct FeedRegistry {
    collaborators: Collaborators,
    managers: RwLock<HashMap<FeedId, Arc<FeedManager>>>,
}

impl FeedRegistry {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            managers: RwLock::new(HashMap::new()),
        }
    }

    /// Manager for the feed described by `config`, creating it on first use.
    ///
    /// When the feed already has a manager, that manager (and its original
    /// config) is returned.
    pub fn get_or_create(&self, config: FeedConfig) -> Arc<FeedManager> {
        let feed_id = FeedManager::resolve_feed_id(&config, &self.collaborators);

        if let Some(manager) = self.managers.read().get(&feed_id) {
            return manager.clone();
        }

        let mut managers = self.managers.write();
        managers
            .entry(feed_id)
            .or_insert_with(|| {
                tracing::debug!(feed_group = %config.feed_group, "creating feed manager");
                Arc::new(FeedManager::new(config, self.collaborators.clone()))
            })
            .clone()
    }

    pub fn get(&self, feed_id: &FeedId) -> Option<Arc<FeedManager>> {
        self.managers.read().get(feed_id).cloned()
    }

    pub fn remove(&self, feed_id: &FeedId) -> Option<Arc<FeedManager>> {
        self.managers.write().remove(feed_id)
    }

    /// Drop managers that have no observers left. Returns their feed ids.
    ///
    /// Channel observers that fell behind leave a manager silently, so its
    /// live subscription is torn down here before the manager goes.
    pub async fn prune(&self) -> Vec<FeedId> {
        let idle: Vec<(FeedId, Arc<FeedManager>)> = self
            .managers
            .read()
            .iter()
            .filter(|(_, manager)| manager.observer_count() == 0)
            .map(|(id, manager)| (id.clone(), manager.clone()))
            .collect();

        let mut pruned = Vec::new();
        for (id, manager) in idle {
            manager.unsubscribe().await;

            let mut managers = self.managers.write();
            let still_idle = manager.observer_count() == 0
                && managers
                    .get(&id)
                    .is_some_and(|current| Arc::ptr_eq(current, &manager));
            if still_idle {
                managers.remove(&id);
                tracing::debug!(feed = %id, "pruned idle feed manager");
                pruned.push(id);
            }
        }
        pruned
    }

    pub fn feed_ids(&self) -> Vec<FeedId> {
        self.managers.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.managers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.read().is_empty()
    }
}

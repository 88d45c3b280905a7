// Block lists and private group membership

use crate::chat::error::{ChatError, ChatResult};
use crate::chat::registry::Registry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-owner block sets and private groups.
///
/// Both maps are keyed by owner name and guarded by their own lock.
/// Group additions consult the registry, so the store keeps a handle to it.
pub struct RelationStore {
    blocks: RwLock<HashMap<String, HashSet<String>>>,
    groups: RwLock<HashMap<String, HashSet<String>>>,
    registry: Arc<Registry>,
}

impl RelationStore {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
            registry,
        }
    }

    /// Add `target` to `owner`'s block set.
    ///
    /// The target does not need to be registered.
    pub async fn block(&self, owner: &str, target: &str) -> ChatResult<()> {
        if owner == target {
            return Err(ChatError::SelfBlock(owner.to_string()));
        }

        let mut blocks = self.blocks.write().await;
        blocks
            .entry(owner.to_string())
            .or_default()
            .insert(target.to_string());
        tracing::debug!("{} has blocked {}", owner, target);
        Ok(())
    }

    pub async fn unblock(&self, owner: &str, target: &str) -> ChatResult<()> {
        if owner == target {
            return Err(ChatError::SelfBlock(owner.to_string()));
        }

        let mut blocks = self.blocks.write().await;
        if let Some(set) = blocks.get_mut(owner) {
            if set.remove(target) {
                tracing::debug!("{} has unblocked {}", owner, target);
            }
        }
        Ok(())
    }

    /// Add `target` to `owner`'s private group.
    ///
    /// Only names currently held in the registry are accepted.
    pub async fn add_to_group(&self, owner: &str, target: &str) -> ChatResult<()> {
        if owner == target {
            return Err(ChatError::SelfGroup(owner.to_string()));
        }

        // Hold the group lock across the registry check so a concurrent
        // disconnect cleanup cannot interleave between check and insert.
        let mut groups = self.groups.write().await;
        if !self.registry.is_registered(target).await {
            return Err(ChatError::UnregisteredGroupTarget(target.to_string()));
        }

        groups
            .entry(owner.to_string())
            .or_default()
            .insert(target.to_string());
        tracing::debug!("{} has added {} to their private group", owner, target);
        Ok(())
    }

    /// Remove `target` from `owner`'s private group. No-op if absent.
    pub async fn remove_from_group(&self, owner: &str, target: &str) {
        let mut groups = self.groups.write().await;
        if let Some(set) = groups.get_mut(owner) {
            if set.remove(target) {
                tracing::debug!("{} has removed {} from their private group", owner, target);
            }
        }
    }

    /// True if either name appears in the other's block set
    pub async fn is_blocked(&self, a: &str, b: &str) -> bool {
        let blocks = self.blocks.read().await;
        let blocks_of = |owner: &str, target: &str| {
            blocks
                .get(owner)
                .map(|set| set.contains(target))
                .unwrap_or(false)
        };
        blocks_of(a, b) || blocks_of(b, a)
    }

    /// Members of `owner`'s private group, possibly empty
    pub async fn group_members(&self, owner: &str) -> HashSet<String> {
        let groups = self.groups.read().await;
        groups.get(owner).cloned().unwrap_or_default()
    }

    /// Release a departing session's name and drop everything tied to it.
    ///
    /// Discards the owner's block set and group and removes the name from
    /// every other group. Block entries held against the name are kept.
    /// The name is unregistered while both relation locks are held, so a
    /// new session claiming it cannot record relations until the old ones
    /// are gone. Lock order is blocks, groups, registry.
    pub async fn release(&self, name: &str) {
        let mut blocks = self.blocks.write().await;
        let mut groups = self.groups.write().await;
        self.registry.unregister(name).await;

        blocks.remove(name);
        groups.remove(name);
        for members in groups.values_mut() {
            members.remove(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::session::SessionId;

    async fn store_with(names: &[&str]) -> (RelationStore, Arc<Registry>) {
        let registry = Arc::new(Registry::new());
        for name in names {
            registry.register(SessionId::new(), name).await.unwrap();
        }
        (RelationStore::new(registry.clone()), registry)
    }

    #[tokio::test]
    async fn test_block_is_symmetric() {
        let (store, _) = store_with(&[]).await;

        store.block("alice", "bob").await.unwrap();
        assert!(store.is_blocked("alice", "bob").await);
        assert!(store.is_blocked("bob", "alice").await);
        assert!(!store.is_blocked("alice", "carol").await);
        assert!(!store.is_blocked("carol", "alice").await);
    }

    #[tokio::test]
    async fn test_self_block_is_rejected() {
        let (store, _) = store_with(&["alice"]).await;

        let result = store.block("alice", "alice").await;
        assert!(matches!(result, Err(ChatError::SelfBlock(_))));
        assert!(!store.blocks.read().await.contains_key("alice"));

        let result = store.unblock("alice", "alice").await;
        assert!(matches!(result, Err(ChatError::SelfBlock(_))));
    }

    #[tokio::test]
    async fn test_block_is_idempotent_and_allows_unknown_names() {
        let (store, _) = store_with(&[]).await;

        store.block("alice", "ghost").await.unwrap();
        store.block("alice", "ghost").await.unwrap();
        assert_eq!(store.blocks.read().await["alice"].len(), 1);
    }

    #[tokio::test]
    async fn test_unblock() {
        let (store, _) = store_with(&[]).await;

        // No block set yet
        store.unblock("alice", "bob").await.unwrap();

        store.block("alice", "bob").await.unwrap();
        store.unblock("alice", "bob").await.unwrap();
        assert!(!store.is_blocked("alice", "bob").await);

        // Already removed
        store.unblock("alice", "bob").await.unwrap();
    }

    #[tokio::test]
    async fn test_group_add_requires_registration() {
        let (store, _) = store_with(&["alice", "bob"]).await;

        store.add_to_group("alice", "bob").await.unwrap();
        let result = store.add_to_group("alice", "nobody").await;
        assert!(matches!(result, Err(ChatError::UnregisteredGroupTarget(_))));

        let members = store.group_members("alice").await;
        assert_eq!(members.len(), 1);
        assert!(members.contains("bob"));
    }

    #[tokio::test]
    async fn test_self_group_is_rejected() {
        let (store, _) = store_with(&["alice"]).await;

        let result = store.add_to_group("alice", "alice").await;
        assert!(matches!(result, Err(ChatError::SelfGroup(_))));
        assert!(store.group_members("alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_group_remove_skips_registration_check() {
        let (store, registry) = store_with(&["alice", "bob"]).await;

        store.add_to_group("alice", "bob").await.unwrap();
        registry.unregister("bob").await;

        store.remove_from_group("alice", "bob").await;
        store.remove_from_group("alice", "never-added").await;
        store.remove_from_group("nobody", "bob").await;
        assert!(store.group_members("alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_release_clears_departed_name() {
        let (store, registry) = store_with(&["alice", "bob", "carol"]).await;

        store.add_to_group("alice", "bob").await.unwrap();
        store.add_to_group("bob", "carol").await.unwrap();
        store.block("bob", "carol").await.unwrap();
        store.block("alice", "bob").await.unwrap();

        store.release("bob").await;

        assert!(!registry.is_registered("bob").await);
        assert!(store.group_members("alice").await.is_empty());
        assert!(store.group_members("bob").await.is_empty());
        assert!(!store.blocks.read().await.contains_key("bob"));
        // Blocks held by others against bob stay in place
        assert!(store.is_blocked("alice", "bob").await);
    }

    #[tokio::test]
    async fn test_release_keeps_relations_of_new_owner() {
        let (store, registry) = store_with(&["alice", "bob"]).await;
        let store = Arc::new(store);
        store.block("bob", "carol").await.unwrap();

        // Hold the block lock so the release parks before touching the
        // registry, then let a new bob race it.
        let held = store.blocks.write().await;

        let releasing = tokio::spawn({
            let store = store.clone();
            async move { store.release("bob").await }
        });
        let rejoining = tokio::spawn({
            let store = store.clone();
            let registry = registry.clone();
            async move {
                while registry.register(SessionId::new(), "bob").await.is_err() {
                    tokio::task::yield_now().await;
                }
                store.block("bob", "alice").await.unwrap();
                store.add_to_group("alice", "bob").await.unwrap();
            }
        });

        tokio::task::yield_now().await;
        drop(held);
        releasing.await.unwrap();
        rejoining.await.unwrap();

        assert!(registry.is_registered("bob").await);
        assert!(store.is_blocked("bob", "alice").await);
        assert!(!store.is_blocked("bob", "carol").await);
        assert!(store.group_members("alice").await.contains("bob"));
    }
}

//! Path-keyed TTL caches for entries, ACLs, metadata and principals.
//!
//! Each namespace is its own concurrent map with its own TTL. Readers never
//! see an expired value; a background sweeper additionally evicts expired
//! pairs on a fixed cadence so the maps do not grow without bound.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use grid_wire::models::{Access, Meta, User};

use crate::fs::Entry;
use crate::paths;

/// Cache namespaces, each with an independently tunable TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheNamespace {
    /// Resolved entries keyed by path.
    Entry,
    /// Known-missing paths.
    NegativeEntry,
    /// Child path listings keyed by directory path.
    DirChildren,
    /// Directory ACLs keyed by path.
    DirAcl,
    /// File ACLs keyed by path.
    FileAcl,
    /// Metadata triples keyed by path.
    Metadata,
    /// The zone's group list.
    Groups,
    /// Group members keyed by group name.
    GroupUsers,
    /// Group membership keyed by user name.
    UserGroups,
    /// The zone's user list.
    Users,
}

/// Key for the single-value namespaces (`Groups`, `Users`).
const GLOBAL_KEY: &str = "*";

struct Expiring<V> {
    value: V,
    deadline: Instant,
}

/// One namespace: a concurrent map whose values carry a deadline.
struct TtlMap<V> {
    map: scc::HashMap<String, Expiring<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlMap<V> {
    fn new(ttl: Duration) -> Self {
        Self {
            map: scc::HashMap::new(),
            ttl,
        }
    }

    /// Fetch a live value. Expired pairs are dropped, never returned.
    async fn get(&self, key: &str) -> Option<V> {
        let (value, deadline) = self
            .map
            .read_async(key, |_, e| (e.value.clone(), e.deadline))
            .await?;
        if deadline <= Instant::now() {
            // A concurrent put may have refreshed the pair since the read;
            // dropping it anyway only costs a miss.
            self.map.remove_async(key).await;
            return None;
        }
        Some(value)
    }

    async fn put(&self, key: impl Into<String>, value: V) {
        let entry = Expiring {
            value,
            deadline: Instant::now() + self.ttl,
        };
        self.map.upsert_async(key.into(), entry).await;
    }

    async fn remove(&self, key: &str) {
        self.map.remove_async(key).await;
    }

    /// Drop every key at or under `prefix` (path-segment aware).
    async fn remove_subtree(&self, prefix: &str) {
        self.map
            .retain_async(|k, _| !paths::is_descendant_or_self(k, prefix))
            .await;
    }

    async fn clear(&self) {
        self.map.clear_async().await;
    }

    async fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.map.len();
        self.map.retain_async(|_, e| e.deadline > now).await;
        before.saturating_sub(self.map.len())
    }
}

/// All namespaces of one file-system instance.
pub struct FileSystemCache {
    entries: TtlMap<Entry>,
    negative_entries: TtlMap<()>,
    dir_children: TtlMap<Vec<String>>,
    dir_acls: TtlMap<Vec<Access>>,
    file_acls: TtlMap<Vec<Access>>,
    metadata: TtlMap<Vec<Meta>>,
    groups: TtlMap<Vec<User>>,
    group_users: TtlMap<Vec<User>>,
    user_groups: TtlMap<Vec<User>>,
    users: TtlMap<Vec<User>>,
    invalidate_parent_entry_immediately: bool,
}

impl FileSystemCache {
    /// Build the namespaces. `overrides` wins over `default_ttl`; negative
    /// entries default to half the standard TTL so misses recover faster
    /// than hits go stale.
    #[must_use]
    pub fn new(
        default_ttl: Duration,
        overrides: &HashMap<CacheNamespace, Duration>,
        invalidate_parent_entry_immediately: bool,
    ) -> Self {
        let ttl = |ns: CacheNamespace, fallback: Duration| -> Duration {
            overrides.get(&ns).copied().unwrap_or(fallback)
        };
        Self {
            entries: TtlMap::new(ttl(CacheNamespace::Entry, default_ttl)),
            negative_entries: TtlMap::new(ttl(CacheNamespace::NegativeEntry, default_ttl / 2)),
            dir_children: TtlMap::new(ttl(CacheNamespace::DirChildren, default_ttl)),
            dir_acls: TtlMap::new(ttl(CacheNamespace::DirAcl, default_ttl)),
            file_acls: TtlMap::new(ttl(CacheNamespace::FileAcl, default_ttl)),
            metadata: TtlMap::new(ttl(CacheNamespace::Metadata, default_ttl)),
            groups: TtlMap::new(ttl(CacheNamespace::Groups, default_ttl)),
            group_users: TtlMap::new(ttl(CacheNamespace::GroupUsers, default_ttl)),
            user_groups: TtlMap::new(ttl(CacheNamespace::UserGroups, default_ttl)),
            users: TtlMap::new(ttl(CacheNamespace::Users, default_ttl)),
            invalidate_parent_entry_immediately,
        }
    }

    // ── Entries ─────────────────────────────────────────────────────────

    pub async fn get_entry(&self, path: &str) -> Option<Entry> {
        self.entries.get(path).await
    }

    pub async fn add_entry(&self, entry: Entry) {
        self.entries.put(entry.path.clone(), entry).await;
    }

    pub async fn remove_entry(&self, path: &str) {
        self.entries.remove(path).await;
    }

    /// Evict the parent's entry after a child mutation, or leave it in place
    /// when the instance is configured to only patch child listings.
    pub async fn remove_parent_entry(&self, path: &str) {
        if self.invalidate_parent_entry_immediately {
            self.entries.remove(paths::dirname(path)).await;
        }
    }

    // ── Negative entries ────────────────────────────────────────────────

    pub async fn has_negative_entry(&self, path: &str) -> bool {
        self.negative_entries.get(path).await.is_some()
    }

    pub async fn add_negative_entry(&self, path: &str) {
        trace!(path, "caching negative entry");
        self.negative_entries.put(path, ()).await;
    }

    pub async fn remove_negative_entry(&self, path: &str) {
        self.negative_entries.remove(path).await;
    }

    /// Drop every negative entry at or under `path`. Used by renames, where
    /// the whole subtree becomes reachable at the destination.
    pub async fn remove_negative_entries_under(&self, path: &str) {
        self.negative_entries.remove_subtree(path).await;
    }

    // ── Directory children ──────────────────────────────────────────────

    pub async fn get_dir_children(&self, path: &str) -> Option<Vec<String>> {
        self.dir_children.get(path).await
    }

    pub async fn add_dir_children(&self, path: &str, children: Vec<String>) {
        self.dir_children.put(path, children).await;
    }

    pub async fn remove_dir_children(&self, path: &str) {
        self.dir_children.remove(path).await;
    }

    // ── ACLs ────────────────────────────────────────────────────────────

    pub async fn get_dir_acls(&self, path: &str) -> Option<Vec<Access>> {
        self.dir_acls.get(path).await
    }

    pub async fn add_dir_acls(&self, path: &str, accesses: Vec<Access>) {
        self.dir_acls.put(path, accesses).await;
    }

    pub async fn remove_dir_acls(&self, path: &str) {
        self.dir_acls.remove(path).await;
    }

    pub async fn get_file_acls(&self, path: &str) -> Option<Vec<Access>> {
        self.file_acls.get(path).await
    }

    pub async fn add_file_acls(&self, path: &str, accesses: Vec<Access>) {
        self.file_acls.put(path, accesses).await;
    }

    pub async fn remove_file_acls(&self, path: &str) {
        self.file_acls.remove(path).await;
    }

    // ── Metadata ────────────────────────────────────────────────────────

    pub async fn get_metadata(&self, path: &str) -> Option<Vec<Meta>> {
        self.metadata.get(path).await
    }

    pub async fn add_metadata(&self, path: &str, metas: Vec<Meta>) {
        self.metadata.put(path, metas).await;
    }

    pub async fn remove_metadata(&self, path: &str) {
        self.metadata.remove(path).await;
    }

    // ── Principals ──────────────────────────────────────────────────────

    pub async fn get_groups(&self) -> Option<Vec<User>> {
        self.groups.get(GLOBAL_KEY).await
    }

    pub async fn add_groups(&self, groups: Vec<User>) {
        self.groups.put(GLOBAL_KEY, groups).await;
    }

    pub async fn get_group_users(&self, group: &str) -> Option<Vec<User>> {
        self.group_users.get(group).await
    }

    pub async fn add_group_users(&self, group: &str, users: Vec<User>) {
        self.group_users.put(group, users).await;
    }

    pub async fn get_user_groups(&self, user: &str) -> Option<Vec<User>> {
        self.user_groups.get(user).await
    }

    pub async fn add_user_groups(&self, user: &str, groups: Vec<User>) {
        self.user_groups.put(user, groups).await;
    }

    pub async fn get_users(&self) -> Option<Vec<User>> {
        self.users.get(GLOBAL_KEY).await
    }

    pub async fn add_users(&self, users: Vec<User>) {
        self.users.put(GLOBAL_KEY, users).await;
    }

    // ── Maintenance ─────────────────────────────────────────────────────

    /// Drop everything in one namespace.
    pub async fn clear(&self, namespace: CacheNamespace) {
        match namespace {
            CacheNamespace::Entry => self.entries.clear().await,
            CacheNamespace::NegativeEntry => self.negative_entries.clear().await,
            CacheNamespace::DirChildren => self.dir_children.clear().await,
            CacheNamespace::DirAcl => self.dir_acls.clear().await,
            CacheNamespace::FileAcl => self.file_acls.clear().await,
            CacheNamespace::Metadata => self.metadata.clear().await,
            CacheNamespace::Groups => self.groups.clear().await,
            CacheNamespace::GroupUsers => self.group_users.clear().await,
            CacheNamespace::UserGroups => self.user_groups.clear().await,
            CacheNamespace::Users => self.users.clear().await,
        }
    }

    /// Drop everything in every namespace.
    pub async fn clear_all(&self) {
        for namespace in [
            CacheNamespace::Entry,
            CacheNamespace::NegativeEntry,
            CacheNamespace::DirChildren,
            CacheNamespace::DirAcl,
            CacheNamespace::FileAcl,
            CacheNamespace::Metadata,
            CacheNamespace::Groups,
            CacheNamespace::GroupUsers,
            CacheNamespace::UserGroups,
            CacheNamespace::Users,
        ] {
            self.clear(namespace).await;
        }
    }

    /// One sweep over every namespace, dropping expired pairs.
    pub async fn evict_expired(&self) {
        let evicted = self.entries.evict_expired().await
            + self.negative_entries.evict_expired().await
            + self.dir_children.evict_expired().await
            + self.dir_acls.evict_expired().await
            + self.file_acls.evict_expired().await
            + self.metadata.evict_expired().await
            + self.groups.evict_expired().await
            + self.group_users.evict_expired().await
            + self.user_groups.evict_expired().await
            + self.users.evict_expired().await;
        if evicted > 0 {
            debug!(evicted, "cache sweep");
        }
    }
}

/// Background sweeper for a [`FileSystemCache`].
pub struct CacheSweeper {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl CacheSweeper {
    /// Start sweeping `cache` every `interval`.
    pub fn spawn(cache: Arc<FileSystemCache>, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let task = tokio::spawn({
            let token = token.clone();
            async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                // The first tick fires immediately; skip it.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        () = token.cancelled() => break,
                        _ = ticker.tick() => cache.evict_expired().await,
                    }
                }
            }
        });
        Self { token, task }
    }

    /// Stop the sweeper and wait for it to exit.
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_ttl(ttl: Duration) -> FileSystemCache {
        FileSystemCache::new(ttl, &HashMap::new(), true)
    }

    #[tokio::test]
    async fn expired_pairs_are_never_returned() {
        let cache = cache_with_ttl(Duration::from_millis(20));
        cache.add_negative_entry("/z/missing").await;
        assert!(cache.has_negative_entry("/z/missing").await);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!cache.has_negative_entry("/z/missing").await);
    }

    #[tokio::test]
    async fn namespace_overrides_beat_the_default_ttl() {
        let overrides = HashMap::from([(CacheNamespace::NegativeEntry, Duration::from_millis(10))]);
        let cache = FileSystemCache::new(Duration::from_secs(3600), &overrides, true);
        cache.add_negative_entry("/z/x").await;
        cache.add_dir_children("/z", vec!["/z/x".into()]).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!cache.has_negative_entry("/z/x").await);
        assert!(cache.get_dir_children("/z").await.is_some());
    }

    #[tokio::test]
    async fn subtree_removal_respects_segment_boundaries() {
        let cache = cache_with_ttl(Duration::from_secs(60));
        cache.add_negative_entry("/z/a").await;
        cache.add_negative_entry("/z/a/b").await;
        cache.add_negative_entry("/z/ab").await;

        cache.remove_negative_entries_under("/z/a").await;
        assert!(!cache.has_negative_entry("/z/a").await);
        assert!(!cache.has_negative_entry("/z/a/b").await);
        assert!(cache.has_negative_entry("/z/ab").await);
    }

    #[tokio::test]
    async fn parent_entry_invalidation_honors_the_flag() {
        use crate::fs::{Entry, EntryKind};
        use std::time::SystemTime;

        let entry = Entry {
            id: 1,
            kind: EntryKind::Directory,
            name: "z".into(),
            path: "/z".into(),
            owner: "rods".into(),
            size: 0,
            create_time: SystemTime::UNIX_EPOCH,
            modify_time: SystemTime::UNIX_EPOCH,
            checksum: String::new(),
            internal: None,
        };

        let eager = cache_with_ttl(Duration::from_secs(60));
        eager.add_entry(entry.clone()).await;
        eager.remove_parent_entry("/z/child").await;
        assert!(eager.get_entry("/z").await.is_none());

        let lazy = FileSystemCache::new(Duration::from_secs(60), &HashMap::new(), false);
        lazy.add_entry(entry).await;
        lazy.remove_parent_entry("/z/child").await;
        assert!(lazy.get_entry("/z").await.is_some());
    }
}

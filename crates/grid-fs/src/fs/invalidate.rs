//! Cache invalidation rules for facade mutations.
//!
//! The rules are deliberately narrow: each mutation evicts exactly the
//! records it made stale. Whether a parent's own entry is evicted or only
//! its child listing patched is decided by the cache's
//! `invalidate_parent_entry_cache_immediately` setting.

use std::future::Future;
use std::pin::Pin;

use grid_wire::connection::Dialer;

use crate::fs::FileSystem;
use crate::paths;

impl<D: Dialer> FileSystem<D> {
    /// A file's bytes changed (truncate, replicate): size and mtime are
    /// stale. The parent's listing is not affected.
    pub(crate) async fn invalidate_for_file_update(&self, path: &str) {
        self.cache.remove_negative_entry(path).await;
        self.cache.remove_entry(path).await;
    }

    /// A file appeared at `path`.
    pub(crate) async fn invalidate_for_file_create(&self, path: &str) {
        self.cache.remove_negative_entry(path).await;
        self.cache.remove_parent_entry(path).await;
        self.append_to_parent_children(path).await;
    }

    /// A directory appeared at `path`.
    pub(crate) async fn invalidate_for_dir_create(&self, path: &str) {
        self.cache.remove_negative_entry(path).await;
        self.cache.remove_parent_entry(path).await;
        self.append_to_parent_children(path).await;
    }

    /// A file disappeared from `path`.
    pub(crate) async fn invalidate_for_file_remove(&self, path: &str) {
        self.cache.remove_entry(path).await;
        self.cache.remove_file_acls(path).await;
        self.cache.remove_metadata(path).await;
        self.cache.remove_parent_entry(path).await;
        self.drop_from_parent_children(path).await;
    }

    /// A directory disappeared from `path`; `recursive` also walks every
    /// cached descendant.
    pub(crate) async fn invalidate_for_dir_remove(&self, path: &str, recursive: bool) {
        if recursive {
            self.invalidate_subtree(path).await;
        } else {
            self.cache.remove_entry(path).await;
            self.cache.remove_metadata(path).await;
            self.cache.remove_dir_children(path).await;
            self.cache.remove_dir_acls(path).await;
        }
        self.cache.remove_parent_entry(path).await;
        self.drop_from_parent_children(path).await;
    }

    /// Walk the cached child listing depth-first, dropping every record
    /// that described the subtree.
    fn invalidate_subtree<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.cache.remove_entry(path).await;
            self.cache.remove_file_acls(path).await;
            self.cache.remove_metadata(path).await;

            if let Some(children) = self.cache.get_dir_children(path).await {
                for child in children {
                    self.invalidate_subtree(&child).await;
                }
            }

            // Harmless on files; directories need both gone.
            self.cache.remove_dir_children(path).await;
            self.cache.remove_dir_acls(path).await;
        })
    }

    /// Patch `path` into its parent's cached child listing, if one exists.
    /// An uncached parent stays uncached: inventing a one-element listing
    /// would masquerade as a complete one.
    async fn append_to_parent_children(&self, path: &str) {
        let parent = paths::dirname(path);
        if let Some(mut children) = self.cache.get_dir_children(parent).await {
            if !children.iter().any(|child| child == path) {
                children.push(path.to_owned());
            }
            self.cache.add_dir_children(parent, children).await;
        }
    }

    /// Drop `path` from its parent's cached child listing, if one exists.
    async fn drop_from_parent_children(&self, path: &str) {
        let parent = paths::dirname(path);
        if let Some(mut children) = self.cache.get_dir_children(parent).await {
            children.retain(|child| child != path);
            self.cache.add_dir_children(parent, children).await;
        }
    }
}

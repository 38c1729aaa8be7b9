//! File-system configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheNamespace;

/// Default TTL for cached records.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Default cadence of the cache sweeper.
pub const DEFAULT_CACHE_CLEANUP_TIME: Duration = Duration::from_secs(5 * 60);
/// Default connection pool size.
pub const DEFAULT_CONNECTION_MAX: usize = 10;
/// Default idle time before the reaper closes a pooled connection.
pub const DEFAULT_CONNECTION_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Default hard cap on a connection's age.
pub const DEFAULT_CONNECTION_LIFESPAN: Duration = Duration::from_secs(60 * 60);
/// Default deadline for one network operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Tunables for a [`FileSystem`](crate::fs::FileSystem) instance.
///
/// All fields have working defaults; most callers only set
/// `application_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileSystemConfig {
    /// Application name reported to the server at startup.
    pub application_name: String,

    /// Default TTL for cached records.
    pub cache_timeout: Duration,

    /// Cadence of the background cache sweeper.
    pub cache_cleanup_time: Duration,

    /// Per-namespace TTL overrides.
    pub cache_timeout_settings: HashMap<CacheNamespace, Duration>,

    /// Maximum number of live connections; zero disables the pool.
    pub connection_max: usize,

    /// Idle time before the reaper closes a pooled connection.
    pub connection_idle_timeout: Duration,

    /// Hard cap on a connection's age; stale connections are dropped on
    /// return instead of being reused.
    pub connection_lifespan: Duration,

    /// Deadline for one network operation, including waiting on the pool.
    pub operation_timeout: Duration,

    /// Commit the server-side transaction each time a connection is
    /// returned, so the next user sees a fresh view.
    pub start_new_transaction: bool,

    /// On mutation, evict the parent's cached entry outright (`true`) or
    /// only patch its cached child listing (`false`).
    pub invalidate_parent_entry_cache_immediately: bool,
}

impl FileSystemConfig {
    /// Defaults with the given application name.
    #[must_use]
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            ..Self::default()
        }
    }
}

impl Default for FileSystemConfig {
    fn default() -> Self {
        Self {
            application_name: String::new(),
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
            cache_cleanup_time: DEFAULT_CACHE_CLEANUP_TIME,
            cache_timeout_settings: HashMap::new(),
            connection_max: DEFAULT_CONNECTION_MAX,
            connection_idle_timeout: DEFAULT_CONNECTION_IDLE_TIMEOUT,
            connection_lifespan: DEFAULT_CONNECTION_LIFESPAN,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            start_new_transaction: true,
            invalidate_parent_entry_cache_immediately: true,
        }
    }
}

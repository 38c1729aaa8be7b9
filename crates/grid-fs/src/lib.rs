//! Cached file-system facade over a grid data-grid service.
//!
//! Collections read as directories and data objects as files, behind a
//! path-keyed TTL cache, a pooled session layer, a parallel block-transfer
//! engine and a registry of open file handles. The wire protocol itself
//! lives in the `grid-wire` crate.

pub mod cache;
pub mod config;
pub mod fs;
pub mod paths;
pub mod session;
pub mod transfer;

pub use cache::CacheNamespace;
pub use config::FileSystemConfig;
pub use fs::{Entry, EntryInternal, EntryKind, FileHandle, FileSystem, HandleId, OpenMode};
pub use session::{PoolConfig, SessionPool};
pub use transfer::{Block, BlockPlan, TransferProgress};

pub use grid_wire::{
    Account, AuthScheme, CsNegotiationPolicy, GridError, SslConfig, TcpDialer,
    TransferMetricsSnapshot,
};

//! Pooled, lifecycle-managed sessions of authenticated connections.

mod pool;

pub use pool::{PoolConfig, PooledConnection, SessionPool};

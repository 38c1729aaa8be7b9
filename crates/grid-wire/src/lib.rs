//! Client SDK for the grid wire protocol.
//!
//! Speaks the framed header/body/error/bulk-stream envelope over a pluggable
//! byte stream, runs the startup and auth ceremonies, and exposes one typed
//! function per wire message. Connection pooling, caching and the
//! file-system facade live in the `grid-fs` crate on top of this one.

pub mod account;
pub mod codec;
pub mod connection;
pub mod error;
pub mod messages;
pub mod metrics;
pub mod models;
pub mod ops;

pub use account::{Account, AuthScheme, CsNegotiationPolicy, SslConfig};
pub use connection::{Connection, ConnectionState, Dialer, TcpDialer, Wire};
pub use error::GridError;
pub use metrics::{TransferMetrics, TransferMetricsSnapshot};

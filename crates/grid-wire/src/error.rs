//! Unified error taxonomy for the SDK and everything layered on top of it.

use thiserror::Error;

/// Errors surfaced by the SDK and the file-system layers built on it.
///
/// Server-returned status codes are translated into these kinds by the codec
/// (see [`crate::codec::error_from_code`]); anything the table does not know
/// becomes [`GridError::Server`] with the raw code attached.
#[derive(Debug, Error)]
pub enum GridError {
    /// No such collection or data object.
    #[error("not found: {0}")]
    NotFound(String),

    /// Create attempted where something already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Malformed path, negative size, unknown open mode, and friends.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The server rejected the credentials or the ACL check.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The operation exceeded the configured operation timeout.
    #[error("operation timed out")]
    Timeout,

    /// The transport failed; the connection is no longer usable.
    #[error("connection broken")]
    ConnectionBroken,

    /// The pool is configured with zero connections.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Operation on a handle that is closing or already closed.
    #[error("file handle closed")]
    HandleClosed,

    /// Server-side quota exceeded.
    #[error("quota exceeded: {0}")]
    Quota(String),

    /// The server is temporarily overloaded.
    #[error("server busy: {0}")]
    ServerBusy(String),

    /// Any other server-reported failure, with the raw status code.
    #[error("server error {code}: {context}")]
    Server { code: i32, context: String },

    /// Transport-level I/O failure outside an established connection
    /// (dialing, local file access during transfers).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl GridError {
    /// Whether this error names a missing path.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the transfer engine may retry the failed block once.
    ///
    /// Only transport-level failures qualify; server verdicts such as
    /// `Unauthorized`, `NotFound` or `Quota` fail fast.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionBroken | Self::Timeout)
    }
}

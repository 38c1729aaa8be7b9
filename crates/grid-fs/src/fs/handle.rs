//! Open file handles and the per-instance handle registry.
//!
//! A handle owns its connection for its entire lifetime; that connection is
//! out of the pool (but still counted against the pool bound) until the
//! handle closes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use grid_wire::connection::Dialer;
use grid_wire::messages::Whence;
use grid_wire::{GridError, ops};

use crate::fs::entry::Entry;
use crate::session::{PooledConnection, SessionPool};

/// Stable opaque identifier of an open handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub(crate) u64);

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fh-{}", self.0)
    }
}

/// How a file was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// `"r"`: read-only, must exist.
    Read,
    /// `"w"`: write, created or overwritten.
    Write,
    /// `"r+"`: read/write, must exist.
    ReadWrite,
    /// `"a"`: write-only at end, must exist or is created.
    Append,
    /// `"w+"`: read/write, truncated on open.
    Truncate,
    /// `"wo"`: write-only at the current offset.
    WriteOnly,
}

impl OpenMode {
    /// Parse the conventional mode string. Unknown strings are an
    /// `InvalidArgument` error.
    pub fn parse(mode: &str) -> Result<Self, GridError> {
        match mode {
            "r" => Ok(Self::Read),
            "w" => Ok(Self::Write),
            "r+" | "rw" => Ok(Self::ReadWrite),
            "a" => Ok(Self::Append),
            "w+" => Ok(Self::Truncate),
            "wo" => Ok(Self::WriteOnly),
            other => Err(GridError::InvalidArgument(format!(
                "unknown open mode {other:?}"
            ))),
        }
    }

    /// Mode string as sent on the wire.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Read => "r",
            Self::Write => "w",
            Self::ReadWrite => "r+",
            Self::Append => "a",
            Self::Truncate => "w+",
            Self::WriteOnly => "wo",
        }
    }

    /// Whether this mode addresses an existing object (stat on open makes
    /// sense) rather than creating a fresh one.
    #[must_use]
    pub fn opens_existing(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite | Self::Append)
    }

    #[must_use]
    pub fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite | Self::Truncate)
    }

    #[must_use]
    pub fn can_write(self) -> bool {
        !matches!(self, Self::Read)
    }
}

/// Handle lifecycle. Operations are only valid in `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleStatus {
    Open,
    Closing,
    Closed,
}

struct HandleState<S: grid_wire::Wire> {
    status: HandleStatus,
    conn: Option<PooledConnection<S>>,
    wire_handle: i64,
    offset: i64,
}

/// An open data object.
///
/// All operations go through the handle's own connection and are serialized
/// by an internal lock; the handle itself can be shared freely.
pub struct FileHandle<D: Dialer> {
    id: HandleId,
    entry: Entry,
    open_mode: OpenMode,
    resource: String,
    pool: Arc<SessionPool<D>>,
    registry: Weak<HandleRegistry<D>>,
    state: Mutex<HandleState<D::Stream>>,
}

impl<D: Dialer> FileHandle<D> {
    pub(crate) fn new(
        id: HandleId,
        entry: Entry,
        open_mode: OpenMode,
        resource: String,
        pool: Arc<SessionPool<D>>,
        registry: Weak<HandleRegistry<D>>,
        conn: PooledConnection<D::Stream>,
        wire_handle: i64,
        offset: i64,
    ) -> Self {
        Self {
            id,
            entry,
            open_mode,
            resource,
            pool,
            registry,
            state: Mutex::new(HandleState {
                status: HandleStatus::Open,
                conn: Some(conn),
                wire_handle,
                offset,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// The entry this handle was opened against. For freshly created files
    /// this is a synthesized entry with `id == 0`.
    #[must_use]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    #[must_use]
    pub fn open_mode(&self) -> OpenMode {
        self.open_mode
    }

    /// Resource the object was opened on; empty for the server default.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Current file offset.
    pub async fn offset(&self) -> i64 {
        self.state.lock().await.offset
    }

    /// Read up to `length` bytes at the current offset. A short or empty
    /// result means end of file.
    pub async fn read(&self, length: usize) -> Result<Bytes, GridError> {
        if !self.open_mode.can_read() {
            return Err(GridError::InvalidArgument(format!(
                "handle opened {:?} cannot read",
                self.open_mode
            )));
        }
        let mut state = self.state.lock().await;
        if state.status != HandleStatus::Open {
            return Err(GridError::HandleClosed);
        }
        let wire_handle = state.wire_handle;
        let conn = state
            .conn
            .as_mut()
            .unwrap_or_else(|| unreachable!("open handle without connection"));
        let data = ops::read_data_object(conn, wire_handle, length as i64).await?;
        state.offset += data.len() as i64;
        Ok(data)
    }

    /// Write `data` at the current offset.
    pub async fn write(&self, data: &[u8]) -> Result<(), GridError> {
        if !self.open_mode.can_write() {
            return Err(GridError::InvalidArgument(format!(
                "handle opened {:?} cannot write",
                self.open_mode
            )));
        }
        let mut state = self.state.lock().await;
        if state.status != HandleStatus::Open {
            return Err(GridError::HandleClosed);
        }
        let wire_handle = state.wire_handle;
        let conn = state
            .conn
            .as_mut()
            .unwrap_or_else(|| unreachable!("open handle without connection"));
        ops::write_data_object(conn, wire_handle, data).await?;
        state.offset += data.len() as i64;
        Ok(())
    }

    /// Reposition the handle. Returns the resulting absolute offset.
    pub async fn seek(&self, offset: i64, whence: Whence) -> Result<i64, GridError> {
        let mut state = self.state.lock().await;
        if state.status != HandleStatus::Open {
            return Err(GridError::HandleClosed);
        }
        let wire_handle = state.wire_handle;
        let conn = state
            .conn
            .as_mut()
            .unwrap_or_else(|| unreachable!("open handle without connection"));
        let new_offset = ops::seek_data_object(conn, wire_handle, offset, whence).await?;
        state.offset = new_offset;
        Ok(new_offset)
    }

    /// Close the handle: deregister, close the server descriptor, give the
    /// connection back to the pool.
    pub async fn close(&self) -> Result<(), GridError> {
        self.close_inner(true).await
    }

    /// Close without touching the registry. Used when the registry itself
    /// is draining, to avoid mutating it mid-iteration.
    pub(crate) async fn force_close(&self) -> Result<(), GridError> {
        self.close_inner(false).await
    }

    async fn close_inner(&self, deregister: bool) -> Result<(), GridError> {
        let mut state = self.state.lock().await;
        if state.status != HandleStatus::Open {
            return Err(GridError::HandleClosed);
        }
        state.status = HandleStatus::Closing;

        if deregister && let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id).await;
        }

        let wire_handle = state.wire_handle;
        let mut conn = state
            .conn
            .take()
            .unwrap_or_else(|| unreachable!("open handle without connection"));
        let result = ops::close_data_object(&mut conn, wire_handle).await;
        self.pool.return_connection(conn).await;
        state.status = HandleStatus::Closed;

        if let Err(ref error) = result {
            warn!(id = %self.id, %error, "closing data object failed");
        } else {
            debug!(id = %self.id, path = %self.entry.path, "handle closed");
        }
        result
    }
}

/// Per-instance registry of live handles.
///
/// Every live handle is present here; a closed handle never is. Draining on
/// release force-closes each handle without re-entering the registry.
pub(crate) struct HandleRegistry<D: Dialer> {
    handles: scc::HashMap<u64, Arc<FileHandle<D>>>,
    next_id: AtomicU64,
}

impl<D: Dialer> HandleRegistry<D> {
    pub(crate) fn new() -> Self {
        Self {
            handles: scc::HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn allocate_id(&self) -> HandleId {
        HandleId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) async fn insert(&self, handle: Arc<FileHandle<D>>) {
        let _ = self.handles.insert_async(handle.id().0, handle).await;
    }

    pub(crate) async fn remove(&self, id: HandleId) {
        self.handles.remove_async(&id.0).await;
    }

    /// Take every registered handle out of the registry.
    pub(crate) async fn drain(&self) -> Vec<Arc<FileHandle<D>>> {
        let mut drained = Vec::new();
        self.handles
            .scan_async(|_, handle| drained.push(Arc::clone(handle)))
            .await;
        self.handles.clear_async().await;
        drained
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }
}

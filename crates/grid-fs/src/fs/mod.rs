//! The file-system facade.
//!
//! Collections read as directories, data objects as files. Every operation
//! normalizes its paths, consults the cache, and only then borrows a pooled
//! connection for the wire work. Mutations invalidate precisely the cached
//! records they touched (see `invalidate.rs`).

mod entry;
mod handle;
mod invalidate;
mod meta;

pub use entry::{Entry, EntryInternal, EntryKind};
pub use handle::{FileHandle, HandleId, OpenMode};

pub(crate) use handle::HandleRegistry;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::Mutex;
use tracing::debug;

use grid_wire::connection::{Dialer, TcpDialer};
use grid_wire::metrics::TransferMetricsSnapshot;
use grid_wire::{Account, GridError, ops};

use crate::cache::{CacheSweeper, FileSystemCache};
use crate::config::FileSystemConfig;
use crate::paths;
use crate::session::{PoolConfig, PooledConnection, SessionPool};
use crate::transfer::{self, TransferProgress};

/// A cached, pooled view of one account's data grid.
///
/// Cheap to share behind an `Arc`; all operations take `&self`. Each
/// instance owns its own pool, cache and handle registry, so several
/// instances can coexist in one process.
///
/// Constructors spawn the pool reaper and cache sweeper, so they must be
/// called from within a Tokio runtime. Call [`release`](Self::release) when
/// done; nothing network-visible happens on drop.
pub struct FileSystem<D: Dialer = TcpDialer> {
    account: Arc<Account>,
    config: FileSystemConfig,
    pool: Arc<SessionPool<D>>,
    pub(crate) cache: Arc<FileSystemCache>,
    handles: Arc<HandleRegistry<D>>,
    sweeper: Mutex<Option<CacheSweeper>>,
}

impl FileSystem<TcpDialer> {
    /// Connect over TCP with the given configuration.
    #[must_use]
    pub fn new(account: Account, config: FileSystemConfig) -> Self {
        Self::with_dialer(account, config, TcpDialer)
    }

    /// Connect over TCP with default configuration.
    #[must_use]
    pub fn with_default_config(account: Account, application_name: &str) -> Self {
        Self::new(account, FileSystemConfig::new(application_name))
    }
}

impl<D: Dialer> FileSystem<D> {
    /// Build a facade over a custom transport backend.
    #[must_use]
    pub fn with_dialer(account: Account, config: FileSystemConfig, dialer: D) -> Self {
        let account = Arc::new(account);
        let pool = SessionPool::new(
            dialer,
            Arc::clone(&account),
            PoolConfig {
                application_name: config.application_name.clone(),
                max_connections: config.connection_max,
                idle_timeout: config.connection_idle_timeout,
                lifespan: config.connection_lifespan,
                operation_timeout: config.operation_timeout,
                start_new_transaction: config.start_new_transaction,
            },
        );
        let cache = Arc::new(FileSystemCache::new(
            config.cache_timeout,
            &config.cache_timeout_settings,
            config.invalidate_parent_entry_cache_immediately,
        ));
        let sweeper = CacheSweeper::spawn(Arc::clone(&cache), config.cache_cleanup_time);

        Self {
            account,
            config,
            pool,
            cache,
            handles: Arc::new(HandleRegistry::new()),
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// Force-close every open handle, stop the background tasks and close
    /// every connection. Idempotent; further operations fail.
    pub async fn release(&self) {
        for handle in self.handles.drain().await {
            let _ = handle.force_close().await;
        }
        if let Some(sweeper) = self.sweeper.lock().await.take() {
            sweeper.stop().await;
        }
        self.pool.release().await;
        debug!("file system released");
    }

    /// Number of live connections, pinned handles included.
    #[must_use]
    pub fn connections(&self) -> usize {
        self.pool.connections()
    }

    /// Number of open file handles.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    /// Byte and operation counters across every connection.
    #[must_use]
    pub fn transfer_metrics(&self) -> TransferMetricsSnapshot {
        self.pool.transfer_metrics()
    }

    #[must_use]
    pub fn account(&self) -> &Account {
        &self.account
    }

    #[must_use]
    pub fn config(&self) -> &FileSystemConfig {
        &self.config
    }

    /// Drop every path-keyed cache namespace.
    pub async fn clear_cache(&self) {
        self.cache.clear_all().await;
    }

    fn normalize(&self, path: &str) -> Result<String, GridError> {
        paths::normalize(path, &self.account.home_path())
    }

    pub(crate) async fn acquire(&self) -> Result<PooledConnection<D::Stream>, GridError> {
        self.pool.acquire().await
    }

    pub(crate) async fn give_back(&self, conn: PooledConnection<D::Stream>) {
        self.pool.return_connection(conn).await;
    }

    // ── Stat and existence ──────────────────────────────────────────────

    /// Resolve a path into an entry, directory first, then file.
    ///
    /// Serves from cache when possible. A parent whose child listing is
    /// cached and does not contain the path answers `NotFound` without any
    /// network traffic; confirmed misses are negatively cached.
    pub async fn stat(&self, path: &str) -> Result<Entry, GridError> {
        let path = self.normalize(path)?;

        if self.cache.has_negative_entry(&path).await {
            return Err(GridError::NotFound(path));
        }
        if let Some(entry) = self.cache.get_entry(&path).await {
            return Ok(entry);
        }

        let parent = paths::dirname(&path);
        if let Some(children) = self.cache.get_dir_children(parent).await
            && !children.iter().any(|child| child == &path)
        {
            self.cache.add_negative_entry(&path).await;
            return Err(GridError::NotFound(path));
        }

        match self.get_collection_entry(&path).await {
            Ok(entry) => return Ok(entry),
            Err(error) if !error.is_not_found() => return Err(error),
            Err(_) => {}
        }
        match self.get_data_object_entry(&path).await {
            Ok(entry) => return Ok(entry),
            Err(error) if !error.is_not_found() => return Err(error),
            Err(_) => {}
        }

        self.cache.add_negative_entry(&path).await;
        Err(GridError::NotFound(path))
    }

    /// Resolve a path that must be a directory.
    pub async fn stat_dir(&self, path: &str) -> Result<Entry, GridError> {
        let path = self.normalize(path)?;
        self.get_collection_entry(&path).await
    }

    /// Resolve a path that must be a file.
    pub async fn stat_file(&self, path: &str) -> Result<Entry, GridError> {
        let path = self.normalize(path)?;
        self.get_data_object_entry(&path).await
    }

    /// Whether anything exists at the path. Any error reads as `false`.
    pub async fn exists(&self, path: &str) -> bool {
        match self.stat(path).await {
            Ok(entry) => entry.exists(),
            Err(_) => false,
        }
    }

    /// Whether a directory exists at the path. Any error reads as `false`.
    pub async fn exists_dir(&self, path: &str) -> bool {
        match self.stat_dir(path).await {
            Ok(entry) => entry.exists(),
            Err(_) => false,
        }
    }

    /// Whether a file exists at the path. Any error reads as `false`.
    pub async fn exists_file(&self, path: &str) -> bool {
        match self.stat_file(path).await {
            Ok(entry) => entry.exists(),
            Err(_) => false,
        }
    }

    // ── Listing ─────────────────────────────────────────────────────────

    /// List every entry directly under a directory.
    pub async fn list(&self, path: &str) -> Result<Vec<Entry>, GridError> {
        let path = self.normalize(path)?;
        let dir = self.get_collection_entry(&path).await?;
        self.list_entries(&dir).await
    }

    async fn list_entries(&self, dir: &Entry) -> Result<Vec<Entry>, GridError> {
        // A fully populated child listing (every child entry still cached)
        // is served without server traffic.
        if let Some(children) = self.cache.get_dir_children(&dir.path).await {
            let mut cached = Vec::with_capacity(children.len());
            let mut complete = true;
            for child in &children {
                match self.cache.get_entry(child).await {
                    Some(entry) => cached.push(entry),
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            if complete {
                for entry in &cached {
                    self.cache.remove_negative_entry(&entry.path).await;
                }
                return Ok(cached);
            }
        }

        let collection = dir
            .as_collection()
            .ok_or_else(|| missing_record(&dir.path))?
            .clone();

        let mut conn = self.acquire().await?;
        let result = async {
            let collections = ops::list_sub_collections(&mut conn, &dir.path).await?;
            let objects = ops::list_data_objects_master_replica(&mut conn, &collection).await?;
            Ok::<_, GridError>((collections, objects))
        }
        .await;
        self.give_back(conn).await;
        let (collections, objects) = result?;

        let mut entries = Vec::with_capacity(collections.len() + objects.len());
        for collection in collections {
            entries.push(Entry::from_collection(collection));
        }
        for object in objects {
            // Objects without a replica cannot be described; skip them.
            if let Some(entry) = Entry::from_data_object(object) {
                entries.push(entry);
            }
        }

        let mut child_paths = Vec::with_capacity(entries.len());
        for entry in &entries {
            child_paths.push(entry.path.clone());
            self.cache.remove_negative_entry(&entry.path).await;
            self.cache.add_entry(entry.clone()).await;
        }
        self.cache.add_dir_children(&dir.path, child_paths).await;

        Ok(entries)
    }

    // ── Directory mutation ──────────────────────────────────────────────

    /// Create a directory; `recurse` also creates missing intermediates and
    /// tolerates the directory already existing.
    pub async fn make_dir(&self, path: &str, recurse: bool) -> Result<(), GridError> {
        let path = self.normalize(path)?;

        let mut conn = self.acquire().await?;
        let result = ops::create_collection(&mut conn, &path, recurse).await;
        self.give_back(conn).await;

        match result {
            Ok(()) => {
                self.invalidate_for_dir_create(&path).await;
                self.cache.add_dir_children(&path, Vec::new()).await;
                Ok(())
            }
            Err(GridError::AlreadyExists(_)) if recurse => {
                self.cache.remove_negative_entry(&path).await;
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Remove a directory. `recurse` removes contents; `force` skips the
    /// trash.
    pub async fn remove_dir(&self, path: &str, recurse: bool, force: bool) -> Result<(), GridError> {
        let path = self.normalize(path)?;

        let mut conn = self.acquire().await?;
        let result = ops::delete_collection(&mut conn, &path, recurse, force).await;
        self.give_back(conn).await;
        result?;

        self.cache.add_negative_entry(&path).await;
        self.invalidate_for_dir_remove(&path, recurse).await;
        Ok(())
    }

    /// Remove a file; `force` skips the trash.
    pub async fn remove_file(&self, path: &str, force: bool) -> Result<(), GridError> {
        let path = self.normalize(path)?;

        let mut conn = self.acquire().await?;
        let result = ops::delete_data_object(&mut conn, &path, force).await;
        self.give_back(conn).await;
        result?;

        self.cache.add_negative_entry(&path).await;
        self.invalidate_for_file_remove(&path).await;
        Ok(())
    }

    // ── Rename and copy ─────────────────────────────────────────────────

    /// Rename a directory. When `dest` names an existing directory, the
    /// source directory moves *into* it under its own name.
    pub async fn rename_dir(&self, src: &str, dest: &str) -> Result<(), GridError> {
        let src = self.normalize(src)?;
        let dest = self.normalize(dest)?;

        let dest = if self.exists_dir(&dest).await {
            paths::join(&dest, paths::basename(&src))
        } else {
            dest
        };
        self.rename_dir_to_dir(&src, &dest).await
    }

    /// Rename a directory to an exact destination path.
    pub async fn rename_dir_to_dir(&self, src: &str, dest: &str) -> Result<(), GridError> {
        let src = self.normalize(src)?;
        let dest = self.normalize(dest)?;

        let mut conn = self.acquire().await?;
        let result = ops::move_collection(&mut conn, &src, &dest).await;
        self.give_back(conn).await;
        result?;

        // The whole subtree moved: stale negative entries under the source
        // must not shadow the destination's history, and vice versa.
        self.cache.remove_negative_entries_under(&src).await;
        self.cache.add_negative_entry(&src).await;
        self.invalidate_for_dir_remove(&src, true).await;
        self.invalidate_for_dir_create(&dest).await;
        Ok(())
    }

    /// Rename a file. When `dest` names an existing directory, the file
    /// moves into it under its own name.
    pub async fn rename_file(&self, src: &str, dest: &str) -> Result<(), GridError> {
        let src = self.normalize(src)?;
        let dest = self.normalize(dest)?;

        let dest = if self.exists_dir(&dest).await {
            paths::join(&dest, paths::basename(&src))
        } else {
            dest
        };
        self.rename_file_to_file(&src, &dest).await
    }

    /// Rename a file to an exact destination path.
    pub async fn rename_file_to_file(&self, src: &str, dest: &str) -> Result<(), GridError> {
        let src = self.normalize(src)?;
        let dest = self.normalize(dest)?;

        let mut conn = self.acquire().await?;
        let result = ops::move_data_object(&mut conn, &src, &dest).await;
        self.give_back(conn).await;
        result?;

        self.cache.add_negative_entry(&src).await;
        self.invalidate_for_file_remove(&src).await;
        self.invalidate_for_file_create(&dest).await;
        Ok(())
    }

    /// Server-side copy. When `dest` names an existing directory, the copy
    /// lands inside it under the source's name.
    pub async fn copy_file(&self, src: &str, dest: &str) -> Result<(), GridError> {
        let src = self.normalize(src)?;
        let dest = self.normalize(dest)?;

        let dest = if self.exists_dir(&dest).await {
            paths::join(&dest, paths::basename(&src))
        } else {
            dest
        };
        self.copy_file_to_file(&src, &dest).await
    }

    /// Server-side copy to an exact destination path.
    pub async fn copy_file_to_file(&self, src: &str, dest: &str) -> Result<(), GridError> {
        let src = self.normalize(src)?;
        let dest = self.normalize(dest)?;

        let mut conn = self.acquire().await?;
        let result = ops::copy_data_object(&mut conn, &src, &dest).await;
        self.give_back(conn).await;
        result?;

        self.invalidate_for_file_create(&dest).await;
        Ok(())
    }

    // ── Size and replicas ───────────────────────────────────────────────

    /// Truncate a file to `size` bytes; negative sizes clamp to zero.
    pub async fn truncate_file(&self, path: &str, size: i64) -> Result<(), GridError> {
        let path = self.normalize(path)?;
        let size = size.max(0);

        let mut conn = self.acquire().await?;
        let result = ops::truncate_data_object(&mut conn, &path, size).await;
        self.give_back(conn).await;
        result?;

        self.invalidate_for_file_update(&path).await;
        Ok(())
    }

    /// Request a replica of a file on `resource`; `update` rolls stale
    /// replicas forward instead.
    pub async fn replicate_file(
        &self,
        path: &str,
        resource: &str,
        update: bool,
    ) -> Result<(), GridError> {
        let path = self.normalize(path)?;

        let mut conn = self.acquire().await?;
        let result = ops::replicate_data_object(&mut conn, &path, resource, update, false).await;
        self.give_back(conn).await;
        result?;

        self.invalidate_for_file_update(&path).await;
        Ok(())
    }

    // ── Transfers ───────────────────────────────────────────────────────

    /// Download a file over a single connection.
    pub async fn download_file(
        &self,
        path: &str,
        resource: &str,
        local_path: impl AsRef<Path>,
    ) -> Result<(), GridError> {
        let (path, local_path, size) = self.resolve_download(path, local_path.as_ref()).await?;
        transfer::spawn_download(
            Arc::clone(&self.pool),
            path,
            resource.to_owned(),
            local_path,
            size,
            1,
            Some(size.max(1)),
        )
        .wait()
        .await
    }

    /// Download a file over `task_num` parallel connections.
    pub async fn download_file_parallel(
        &self,
        path: &str,
        resource: &str,
        local_path: impl AsRef<Path>,
        task_num: usize,
    ) -> Result<(), GridError> {
        let (path, local_path, size) = self.resolve_download(path, local_path.as_ref()).await?;
        transfer::spawn_download(
            Arc::clone(&self.pool),
            path,
            resource.to_owned(),
            local_path,
            size,
            task_num,
            None,
        )
        .wait()
        .await
    }

    /// Start a parallel download and return its progress/error channels.
    pub async fn download_file_parallel_async(
        &self,
        path: &str,
        resource: &str,
        local_path: impl AsRef<Path>,
        block_size: Option<i64>,
        task_num: usize,
    ) -> Result<TransferProgress, GridError> {
        let (path, local_path, size) = self.resolve_download(path, local_path.as_ref()).await?;
        Ok(transfer::spawn_download(
            Arc::clone(&self.pool),
            path,
            resource.to_owned(),
            local_path,
            size,
            task_num,
            block_size,
        ))
    }

    /// Upload a local file over a single connection; `replicate` requests a
    /// replica update afterwards.
    pub async fn upload_file(
        &self,
        local_path: impl AsRef<Path>,
        path: &str,
        resource: &str,
        replicate: bool,
    ) -> Result<(), GridError> {
        let (local_path, path, size) = self.resolve_upload(local_path.as_ref(), path).await?;
        let result = transfer::spawn_upload(
            Arc::clone(&self.pool),
            local_path,
            path.clone(),
            resource.to_owned(),
            size,
            1,
            Some(size.max(1)),
            replicate,
        )
        .wait()
        .await;
        self.invalidate_for_file_create(&path).await;
        result
    }

    /// Upload a local file over `task_num` parallel connections.
    pub async fn upload_file_parallel(
        &self,
        local_path: impl AsRef<Path>,
        path: &str,
        resource: &str,
        task_num: usize,
        replicate: bool,
    ) -> Result<(), GridError> {
        let (local_path, path, size) = self.resolve_upload(local_path.as_ref(), path).await?;
        let result = transfer::spawn_upload(
            Arc::clone(&self.pool),
            local_path,
            path.clone(),
            resource.to_owned(),
            size,
            task_num,
            None,
            replicate,
        )
        .wait()
        .await;
        self.invalidate_for_file_create(&path).await;
        result
    }

    /// Start a parallel upload and return its progress/error channels.
    pub async fn upload_file_parallel_async(
        &self,
        local_path: impl AsRef<Path>,
        path: &str,
        resource: &str,
        block_size: Option<i64>,
        task_num: usize,
        replicate: bool,
    ) -> Result<TransferProgress, GridError> {
        let (local_path, path, size) = self.resolve_upload(local_path.as_ref(), path).await?;
        let progress = transfer::spawn_upload(
            Arc::clone(&self.pool),
            local_path,
            path.clone(),
            resource.to_owned(),
            size,
            task_num,
            block_size,
            replicate,
        );
        self.invalidate_for_file_create(&path).await;
        Ok(progress)
    }

    /// Validate a download and resolve its destination: an existing local
    /// directory receives the file under the remote name; an existing local
    /// file is refused.
    async fn resolve_download(
        &self,
        path: &str,
        local_path: &Path,
    ) -> Result<(String, PathBuf, i64), GridError> {
        let path = self.normalize(path)?;
        let entry = self
            .stat(&path)
            .await
            .map_err(|_| GridError::NotFound(path.clone()))?;
        if entry.kind == EntryKind::Directory {
            return Err(GridError::InvalidArgument(format!(
                "cannot download a collection {path}"
            )));
        }

        let local_path = match tokio::fs::metadata(local_path).await {
            Ok(meta) if meta.is_dir() => local_path.join(paths::basename(&path)),
            Ok(_) => {
                return Err(GridError::AlreadyExists(
                    local_path.display().to_string(),
                ));
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => local_path.to_path_buf(),
            Err(error) => return Err(error.into()),
        };

        Ok((path, local_path, entry.size))
    }

    /// Validate an upload and resolve its destination: an existing remote
    /// directory receives the file under the local name.
    async fn resolve_upload(
        &self,
        local_path: &Path,
        path: &str,
    ) -> Result<(PathBuf, String, i64), GridError> {
        let path = self.normalize(path)?;

        let meta = match tokio::fs::metadata(local_path).await {
            Ok(meta) => meta,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(GridError::NotFound(local_path.display().to_string()));
            }
            Err(error) => return Err(error.into()),
        };
        if meta.is_dir() {
            return Err(GridError::InvalidArgument(format!(
                "local path {} is a directory",
                local_path.display()
            )));
        }

        let path = match self.stat(&path).await {
            Ok(entry) if entry.kind == EntryKind::Directory => {
                let local_name = local_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        GridError::InvalidArgument(format!(
                            "local path {} has no file name",
                            local_path.display()
                        ))
                    })?;
                paths::join(&entry.path, &local_name)
            }
            Ok(_) => path,
            Err(error) if error.is_not_found() => path,
            Err(error) => return Err(error),
        };

        Ok((local_path.to_path_buf(), path, meta.len() as i64))
    }

    // ── Open files ──────────────────────────────────────────────────────

    /// Open an existing file. The handle pins one pool connection until it
    /// closes.
    pub async fn open_file(
        &self,
        path: &str,
        resource: &str,
        mode: &str,
    ) -> Result<Arc<FileHandle<D>>, GridError> {
        let open_mode = OpenMode::parse(mode)?;
        let path = self.normalize(path)?;

        // Stat before pinning a connection: with a pool of one, statting
        // after the open would wait on our own permit.
        let entry = if open_mode.opens_existing() {
            self.stat_file(&path).await.ok()
        } else {
            None
        };
        let entry = entry.unwrap_or_else(|| self.synthesized_entry(&path));

        let mut conn = self.acquire().await?;
        let opened = ops::open_data_object(&mut conn, &path, resource, open_mode.wire_name()).await;
        let (wire_handle, offset) = match opened {
            Ok(opened) => opened,
            Err(error) => {
                self.give_back(conn).await;
                return Err(error);
            }
        };

        let handle = self
            .register_handle(entry, open_mode, resource, conn, wire_handle, offset)
            .await;
        Ok(handle)
    }

    /// Create a file (truncating any previous object) and open it for
    /// writing.
    pub async fn create_file(
        &self,
        path: &str,
        resource: &str,
        mode: &str,
    ) -> Result<Arc<FileHandle<D>>, GridError> {
        let open_mode = OpenMode::parse(mode)?;
        let path = self.normalize(path)?;

        let mut conn = self.acquire().await?;
        let created =
            ops::create_data_object(&mut conn, &path, resource, open_mode.wire_name(), true).await;
        let wire_handle = match created {
            Ok(handle) => handle,
            Err(error) => {
                self.give_back(conn).await;
                return Err(error);
            }
        };

        let entry = self.synthesized_entry(&path);
        let handle = self
            .register_handle(entry, open_mode, resource, conn, wire_handle, 0)
            .await;
        self.invalidate_for_file_create(&path).await;
        Ok(handle)
    }

    async fn register_handle(
        &self,
        entry: Entry,
        open_mode: OpenMode,
        resource: &str,
        conn: PooledConnection<D::Stream>,
        wire_handle: i64,
        offset: i64,
    ) -> Arc<FileHandle<D>> {
        let id = self.handles.allocate_id();
        let handle = Arc::new(FileHandle::new(
            id,
            entry,
            open_mode,
            resource.to_owned(),
            Arc::clone(&self.pool),
            Arc::downgrade(&self.handles),
            conn,
            wire_handle,
            offset,
        ));
        self.handles.insert(Arc::clone(&handle)).await;
        debug!(%id, path = %handle.entry().path, mode = ?open_mode, "handle opened");
        handle
    }

    /// Entry for a file the server has not described yet (`id == 0`).
    fn synthesized_entry(&self, path: &str) -> Entry {
        let now = SystemTime::now();
        Entry {
            id: 0,
            kind: EntryKind::File,
            name: paths::basename(path).to_owned(),
            path: path.to_owned(),
            owner: self.account.client_user.clone(),
            size: 0,
            create_time: now,
            modify_time: now,
            checksum: String::new(),
            internal: None,
        }
    }

    // ── Internal resolution ─────────────────────────────────────────────

    pub(crate) async fn get_collection_entry(&self, path: &str) -> Result<Entry, GridError> {
        if self.cache.has_negative_entry(path).await {
            return Err(GridError::NotFound(path.to_owned()));
        }
        if let Some(entry) = self.cache.get_entry(path).await
            && entry.kind == EntryKind::Directory
        {
            return Ok(entry);
        }

        let mut conn = self.acquire().await?;
        let result = ops::get_collection(&mut conn, path).await;
        self.give_back(conn).await;
        let collection = result?;

        if collection.id <= 0 {
            return Err(GridError::NotFound(path.to_owned()));
        }
        let entry = Entry::from_collection(collection);
        self.cache.remove_negative_entry(path).await;
        self.cache.add_entry(entry.clone()).await;
        Ok(entry)
    }

    pub(crate) async fn get_data_object_entry(&self, path: &str) -> Result<Entry, GridError> {
        if self.cache.has_negative_entry(path).await {
            return Err(GridError::NotFound(path.to_owned()));
        }
        if let Some(entry) = self.cache.get_entry(path).await
            && entry.kind == EntryKind::File
        {
            return Ok(entry);
        }

        let parent = self.get_collection_entry(paths::dirname(path)).await?;
        let collection = parent
            .as_collection()
            .ok_or_else(|| missing_record(&parent.path))?
            .clone();

        let mut conn = self.acquire().await?;
        let result =
            ops::get_data_object_master_replica(&mut conn, &collection, paths::basename(path))
                .await;
        self.give_back(conn).await;
        let object = result?;

        if object.id <= 0 {
            return Err(GridError::NotFound(path.to_owned()));
        }
        let entry = Entry::from_data_object(object)
            .ok_or_else(|| GridError::NotFound(path.to_owned()))?;
        self.cache.remove_negative_entry(path).await;
        self.cache.add_entry(entry.clone()).await;
        Ok(entry)
    }
}

/// A cached directory entry lost its raw server record; resolving through
/// it is a bug, not a user error.
fn missing_record(path: &str) -> GridError {
    GridError::Server {
        code: 0,
        context: format!("cached entry for {path} has no collection record"),
    }
}

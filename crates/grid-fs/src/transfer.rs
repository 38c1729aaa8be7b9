//! Parallel block transfer between the grid and the local disk.
//!
//! A transfer is planned as contiguous, non-overlapping byte ranges, then
//! fanned out over workers that each borrow their own connection, open the
//! object, seek to their range and move it chunk by chunk. The server's
//! random-access open permits blocks to land in any order; progress is
//! reported as a monotonically non-decreasing running total by a single
//! aggregator task.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use grid_wire::connection::Dialer;
use grid_wire::messages::Whence;
use grid_wire::{GridError, ops};

use crate::session::SessionPool;

/// Blocks never shrink below this, no matter how many workers are asked for.
pub const MIN_BLOCK_SIZE: i64 = 4 * 1024 * 1024;

/// Wire chunk size within a block.
const IO_CHUNK_SIZE: i64 = 1024 * 1024;

/// One contiguous byte range of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub index: usize,
    pub offset: i64,
    pub length: i64,
}

/// Ordered, contiguous, non-overlapping block covering of a file.
#[derive(Debug, Clone)]
pub struct BlockPlan {
    blocks: Vec<Block>,
}

impl BlockPlan {
    /// Plan `total_size` bytes across `task_num` workers.
    ///
    /// The block size is `max(MIN_BLOCK_SIZE, ceil(total/task_num))` unless
    /// the caller fixes it. An empty file yields an empty plan.
    #[must_use]
    pub fn new(total_size: i64, task_num: usize, fixed_block_size: Option<i64>) -> Self {
        if total_size <= 0 {
            return Self { blocks: Vec::new() };
        }
        let task_num = task_num.max(1) as i64;
        let block_size = fixed_block_size
            .filter(|size| *size > 0)
            .unwrap_or_else(|| MIN_BLOCK_SIZE.max((total_size + task_num - 1) / task_num));

        let mut blocks = Vec::new();
        let mut offset = 0;
        while offset < total_size {
            let length = block_size.min(total_size - offset);
            blocks.push(Block {
                index: blocks.len(),
                offset,
                length,
            });
            offset += length;
        }
        Self { blocks }
    }

    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Live view of an in-flight transfer.
///
/// `progress` carries running byte totals and closes on completion;
/// `errors` delivers at most one error after the progress channel has
/// closed, then closes itself. Cancel via [`cancel`](Self::cancel).
pub struct TransferProgress {
    /// Running total of transferred bytes, non-decreasing.
    pub progress: mpsc::Receiver<u64>,
    /// At most one error, delivered after `progress` closes.
    pub errors: mpsc::Receiver<GridError>,
    cancel: CancellationToken,
}

impl TransferProgress {
    /// Signal cancellation: workers stop at the next chunk boundary, open
    /// object handles are dropped, and the progress channel closes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The transfer's cancellation token, for composing with other signals.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive the transfer to completion, discarding progress values.
    pub(crate) async fn wait(mut self) -> Result<(), GridError> {
        while self.progress.recv().await.is_some() {}
        match self.errors.recv().await {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Which way the bytes flow.
#[derive(Clone, Copy)]
enum Direction {
    /// Remote object to local file.
    Pull,
    /// Local file to remote object.
    Push,
}

#[derive(Clone)]
struct TransferJob<D: Dialer> {
    pool: Arc<SessionPool<D>>,
    remote_path: String,
    resource: String,
    local_path: PathBuf,
    direction: Direction,
}

/// Start a parallel download. The local file is pre-allocated to
/// `total_size`; on failure a partial file is left in place for the caller
/// to deal with.
pub(crate) fn spawn_download<D: Dialer>(
    pool: Arc<SessionPool<D>>,
    remote_path: String,
    resource: String,
    local_path: PathBuf,
    total_size: i64,
    task_num: usize,
    block_size: Option<i64>,
) -> TransferProgress {
    let job = TransferJob {
        pool,
        remote_path,
        resource,
        local_path,
        direction: Direction::Pull,
    };
    spawn_transfer(job, total_size, task_num, block_size, false)
}

/// Start a parallel upload. The remote object is created (truncating any
/// previous content) before workers start; `replicate` requests a replica
/// update after the last block lands.
pub(crate) fn spawn_upload<D: Dialer>(
    pool: Arc<SessionPool<D>>,
    local_path: PathBuf,
    remote_path: String,
    resource: String,
    total_size: i64,
    task_num: usize,
    block_size: Option<i64>,
    replicate: bool,
) -> TransferProgress {
    let job = TransferJob {
        pool,
        remote_path,
        resource,
        local_path,
        direction: Direction::Push,
    };
    spawn_transfer(job, total_size, task_num, block_size, replicate)
}

fn spawn_transfer<D: Dialer>(
    job: TransferJob<D>,
    total_size: i64,
    task_num: usize,
    block_size: Option<i64>,
    replicate: bool,
) -> TransferProgress {
    let task_num = task_num.max(1);
    let cancel = CancellationToken::new();
    let (progress_tx, progress_rx) = mpsc::channel::<u64>(64);
    let (error_tx, error_rx) = mpsc::channel::<GridError>(1);
    let (delta_tx, mut delta_rx) = mpsc::channel::<u64>(task_num.max(1) * 2);

    // Single aggregator: the only writer to the progress channel, so totals
    // can never go backwards.
    let aggregator = tokio::spawn(async move {
        let mut total: u64 = 0;
        while let Some(delta) = delta_rx.recv().await {
            total += delta;
            if progress_tx.send(total).await.is_err() {
                // Receiver gone; keep draining so workers never block.
            }
        }
        total
    });

    tokio::spawn(run_transfer(
        job,
        total_size,
        task_num,
        block_size,
        replicate,
        cancel.clone(),
        delta_tx,
        error_tx,
        aggregator,
    ));

    TransferProgress {
        progress: progress_rx,
        errors: error_rx,
        cancel,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_transfer<D: Dialer>(
    job: TransferJob<D>,
    total_size: i64,
    task_num: usize,
    block_size: Option<i64>,
    replicate: bool,
    cancel: CancellationToken,
    delta_tx: mpsc::Sender<u64>,
    error_tx: mpsc::Sender<GridError>,
    aggregator: tokio::task::JoinHandle<u64>,
) {
    let setup = match job.direction {
        Direction::Pull => preallocate(&job.local_path, total_size).await,
        Direction::Push => create_remote(&job).await,
    };
    let mut first_error = setup.err();

    if first_error.is_none() {
        let plan = BlockPlan::new(total_size, task_num, block_size);
        debug!(
            path = %job.remote_path,
            blocks = plan.len(),
            workers = task_num,
            "transfer planned"
        );
        let queue = Arc::new(Mutex::new(VecDeque::from(plan.blocks)));
        let (worker_err_tx, mut worker_err_rx) = mpsc::channel::<GridError>(task_num);

        let mut workers = Vec::with_capacity(task_num);
        for _ in 0..task_num {
            workers.push(tokio::spawn(run_worker(
                job.clone(),
                Arc::clone(&queue),
                delta_tx.clone(),
                worker_err_tx.clone(),
                cancel.clone(),
            )));
        }
        drop(worker_err_tx);

        for worker in workers {
            let _ = worker.await;
        }
        first_error = worker_err_rx.recv().await;
    }

    if first_error.is_none() && replicate {
        first_error = replicate_remote(&job).await.err();
    }

    // Close the delta stream, let the aggregator flush its last total, and
    // only then surface the error: no progress value follows an error.
    drop(delta_tx);
    let _ = aggregator.await;
    if let Some(error) = first_error {
        let _ = error_tx.try_send(error);
    }
}

async fn run_worker<D: Dialer>(
    job: TransferJob<D>,
    queue: Arc<Mutex<VecDeque<Block>>>,
    delta_tx: mpsc::Sender<u64>,
    worker_err_tx: mpsc::Sender<GridError>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let block = {
            let mut queue = queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            queue.pop_front()
        };
        let Some(block) = block else { break };

        let mut attempts = 0;
        loop {
            let outcome = tokio::select! {
                () = cancel.cancelled() => {
                    // Dropping the in-flight future forfeits the worker's
                    // connection mid-read; the pool slot frees up.
                    return;
                }
                result = transfer_block(&job, block) => result,
            };
            match outcome {
                Ok(()) => {
                    let _ = delta_tx.send(block.length as u64).await;
                    break;
                }
                Err(error) if error.is_transient() && attempts == 0 => {
                    attempts += 1;
                    warn!(block = block.index, %error, "retrying block after transient error");
                }
                Err(error) => {
                    let _ = worker_err_tx.try_send(error);
                    cancel.cancel();
                    return;
                }
            }
        }
    }
}

async fn transfer_block<D: Dialer>(job: &TransferJob<D>, block: Block) -> Result<(), GridError> {
    let mut conn = job.pool.acquire().await?;

    let mode = match job.direction {
        Direction::Pull => "r",
        Direction::Push => "r+",
    };
    let result = async {
        let (wire_handle, _) =
            ops::open_data_object(&mut conn, &job.remote_path, &job.resource, mode).await?;
        let moved = match job.direction {
            Direction::Pull => pull_block(&mut conn, wire_handle, job, block).await,
            Direction::Push => push_block(&mut conn, wire_handle, job, block).await,
        };
        let closed = ops::close_data_object(&mut conn, wire_handle).await;
        moved.and(closed)
    }
    .await;

    job.pool.return_connection(conn).await;
    result
}

async fn pull_block<D: Dialer>(
    conn: &mut grid_wire::Connection<D::Stream>,
    wire_handle: i64,
    job: &TransferJob<D>,
    block: Block,
) -> Result<(), GridError> {
    ops::seek_data_object(conn, wire_handle, block.offset, Whence::Start).await?;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(&job.local_path)
        .await?;
    file.seek(std::io::SeekFrom::Start(block.offset as u64))
        .await?;

    let mut remaining = block.length;
    while remaining > 0 {
        let data = ops::read_data_object(conn, wire_handle, remaining.min(IO_CHUNK_SIZE)).await?;
        if data.is_empty() {
            return Err(GridError::Server {
                code: 0,
                context: format!(
                    "unexpected end of data at offset {}",
                    block.offset + block.length - remaining
                ),
            });
        }
        file.write_all(&data).await?;
        remaining -= data.len() as i64;
    }
    file.flush().await?;
    Ok(())
}

async fn push_block<D: Dialer>(
    conn: &mut grid_wire::Connection<D::Stream>,
    wire_handle: i64,
    job: &TransferJob<D>,
    block: Block,
) -> Result<(), GridError> {
    ops::seek_data_object(conn, wire_handle, block.offset, Whence::Start).await?;

    let mut file = tokio::fs::File::open(&job.local_path).await?;
    file.seek(std::io::SeekFrom::Start(block.offset as u64))
        .await?;

    let mut remaining = block.length;
    let mut buf = vec![0u8; IO_CHUNK_SIZE as usize];
    while remaining > 0 {
        let want = remaining.min(IO_CHUNK_SIZE) as usize;
        let read = file.read(&mut buf[..want]).await?;
        if read == 0 {
            return Err(GridError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "local file shrank during upload",
            )));
        }
        ops::write_data_object(conn, wire_handle, &buf[..read]).await?;
        remaining -= read as i64;
    }
    Ok(())
}

async fn preallocate(path: &Path, total_size: i64) -> Result<(), GridError> {
    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await?;
    file.set_len(total_size.max(0) as u64).await?;
    Ok(())
}

/// Create (or truncate) the upload destination so workers can open it for
/// random-access writes.
async fn create_remote<D: Dialer>(job: &TransferJob<D>) -> Result<(), GridError> {
    let mut conn = job.pool.acquire().await?;
    let result = async {
        let wire_handle =
            ops::create_data_object(&mut conn, &job.remote_path, &job.resource, "w", true).await?;
        ops::close_data_object(&mut conn, wire_handle).await
    }
    .await;
    job.pool.return_connection(conn).await;
    result
}

async fn replicate_remote<D: Dialer>(job: &TransferJob<D>) -> Result<(), GridError> {
    let mut conn = job.pool.acquire().await?;
    let result =
        ops::replicate_data_object(&mut conn, &job.remote_path, &job.resource, true, false).await;
    job.pool.return_connection(conn).await;
    result
}

//! The connection pool.
//!
//! The pool is the sole owner of connections; callers borrow one for the
//! duration of a single operation through an owned guard. Fairness comes
//! from the semaphore (FIFO among waiters); the bound is the permit count.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use grid_wire::connection::{Connection, Dialer, Wire};
use grid_wire::metrics::{TransferMetrics, TransferMetricsSnapshot};
use grid_wire::{Account, GridError, ops};

/// Pool tunables, distilled from the file-system configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Application name reported during the connect ceremony.
    pub application_name: String,
    /// Maximum live connections; zero disables the pool entirely.
    pub max_connections: usize,
    /// Idle time before the reaper closes a connection.
    pub idle_timeout: Duration,
    /// Hard cap on a connection's age.
    pub lifespan: Duration,
    /// Deadline for one operation, pool wait included.
    pub operation_timeout: Duration,
    /// Commit the server-side transaction on every return.
    pub start_new_transaction: bool,
}

/// A connection borrowed from the pool.
///
/// Give it back with [`SessionPool::return_connection`]. Dropping the guard
/// instead forfeits the connection: the slot frees up, the socket just
/// closes. That keeps error paths safe at the cost of a reconnect later.
pub struct PooledConnection<S: Wire> {
    conn: Option<Connection<S>>,
    _permit: OwnedSemaphorePermit,
    live: Arc<AtomicUsize>,
}

impl<S: Wire> std::ops::Deref for PooledConnection<S> {
    type Target = Connection<S>;

    fn deref(&self) -> &Connection<S> {
        self.conn
            .as_ref()
            .unwrap_or_else(|| unreachable!("connection already returned"))
    }
}

impl<S: Wire> std::ops::DerefMut for PooledConnection<S> {
    fn deref_mut(&mut self) -> &mut Connection<S> {
        self.conn
            .as_mut()
            .unwrap_or_else(|| unreachable!("connection already returned"))
    }
}

impl<S: Wire> Drop for PooledConnection<S> {
    fn drop(&mut self) {
        if self.conn.is_some() {
            self.live.fetch_sub(1, Ordering::SeqCst);
            trace!("pooled connection forfeited without return");
        }
    }
}

struct ReaperHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// A pool of authenticated connections sharing one account.
pub struct SessionPool<D: Dialer> {
    dialer: D,
    account: Arc<Account>,
    config: PoolConfig,
    semaphore: Arc<Semaphore>,
    idle: Mutex<VecDeque<Connection<D::Stream>>>,
    /// Connections in existence: idle plus checked out.
    live: Arc<AtomicUsize>,
    metrics: Arc<TransferMetrics>,
    released: AtomicBool,
    reaper: Mutex<Option<ReaperHandle>>,
}

impl<D: Dialer> SessionPool<D> {
    /// Build the pool and start its reaper.
    pub fn new(dialer: D, account: Arc<Account>, config: PoolConfig) -> Arc<Self> {
        let semaphore = Arc::new(Semaphore::new(config.max_connections));
        let pool = Arc::new(Self {
            dialer,
            account,
            config,
            semaphore,
            idle: Mutex::new(VecDeque::new()),
            live: Arc::new(AtomicUsize::new(0)),
            metrics: Arc::new(TransferMetrics::default()),
            released: AtomicBool::new(false),
            reaper: Mutex::new(None),
        });
        Self::spawn_reaper(&pool);
        pool
    }

    fn spawn_reaper(pool: &Arc<Self>) {
        let token = CancellationToken::new();
        let weak = Arc::downgrade(pool);
        let idle_timeout = pool.config.idle_timeout;
        let cadence = (idle_timeout / 2).max(Duration::from_millis(10));

        let task = tokio::spawn({
            let token = token.clone();
            async move {
                let mut ticker = tokio::time::interval(cadence);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        () = token.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                    let Some(pool) = weak.upgrade() else { break };
                    pool.reap_idle(idle_timeout).await;
                }
            }
        });

        if let Ok(mut slot) = pool.reaper.try_lock() {
            *slot = Some(ReaperHandle { token, task });
        }
    }

    async fn reap_idle(&self, idle_timeout: Duration) {
        let mut expired = Vec::new();
        {
            let mut idle = self.idle.lock().await;
            let mut keep = VecDeque::with_capacity(idle.len());
            while let Some(conn) = idle.pop_front() {
                if conn.idle_for() > idle_timeout || !conn.is_alive() {
                    expired.push(conn);
                } else {
                    keep.push_back(conn);
                }
            }
            *idle = keep;
        }
        for mut conn in expired {
            self.live.fetch_sub(1, Ordering::SeqCst);
            conn.disconnect().await;
            debug!("reaped idle connection");
        }
    }

    /// Borrow a connection, waiting FIFO behind other callers when the pool
    /// is saturated. Fails with `Timeout` once `operation_timeout` elapses,
    /// and with `PoolExhausted` only when the pool is configured with zero
    /// connections.
    pub async fn acquire(&self) -> Result<PooledConnection<D::Stream>, GridError> {
        if self.config.max_connections == 0 {
            return Err(GridError::PoolExhausted);
        }
        if self.released.load(Ordering::SeqCst) {
            return Err(GridError::ConnectionBroken);
        }
        tokio::time::timeout(self.config.operation_timeout, self.acquire_inner())
            .await
            .map_err(|_| GridError::Timeout)?
    }

    async fn acquire_inner(&self) -> Result<PooledConnection<D::Stream>, GridError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            // The semaphore only closes on release().
            .map_err(|_| GridError::ConnectionBroken)?;

        // Prefer a healthy idle connection; drop any that went stale while
        // parked.
        loop {
            let candidate = self.idle.lock().await.pop_front();
            let Some(conn) = candidate else { break };
            if conn.is_alive() && conn.age() < self.config.lifespan {
                trace!("reusing idle connection");
                return Ok(self.guard(conn, permit));
            }
            self.live.fetch_sub(1, Ordering::SeqCst);
            let mut conn = conn;
            conn.disconnect().await;
        }

        let conn = self.open_connection().await?;
        self.live.fetch_add(1, Ordering::SeqCst);
        debug!(live = self.live.load(Ordering::SeqCst), "opened connection");
        Ok(self.guard(conn, permit))
    }

    fn guard(
        &self,
        conn: Connection<D::Stream>,
        permit: OwnedSemaphorePermit,
    ) -> PooledConnection<D::Stream> {
        PooledConnection {
            conn: Some(conn),
            _permit: permit,
            live: Arc::clone(&self.live),
        }
    }

    async fn open_connection(&self) -> Result<Connection<D::Stream>, GridError> {
        let stream = self.dialer.dial(&self.account).await?;
        let mut conn = Connection::new(
            stream,
            Arc::clone(&self.account),
            self.config.operation_timeout,
            Arc::clone(&self.metrics),
        );
        conn.connect(&self.config.application_name).await?;
        Ok(conn)
    }

    /// Give a borrowed connection back.
    ///
    /// Broken connections and connections past their lifespan are dropped.
    /// When configured, a transaction commit runs first; its failure also
    /// drops the connection.
    pub async fn return_connection(&self, mut guard: PooledConnection<D::Stream>) {
        let Some(mut conn) = guard.conn.take() else {
            return;
        };

        if self.released.load(Ordering::SeqCst) || !conn.is_alive() {
            self.live.fetch_sub(1, Ordering::SeqCst);
            conn.disconnect().await;
            return;
        }

        if conn.age() >= self.config.lifespan {
            conn.mark_stale();
            self.live.fetch_sub(1, Ordering::SeqCst);
            conn.disconnect().await;
            debug!("dropped connection past lifespan");
            return;
        }

        if self.config.start_new_transaction
            && let Err(error) = ops::commit_transaction(&mut conn).await
        {
            warn!(%error, "transaction refresh failed; dropping connection");
            self.live.fetch_sub(1, Ordering::SeqCst);
            conn.disconnect().await;
            return;
        }

        conn.touch();
        self.idle.lock().await.push_back(conn);
        // The guard (and with it the permit) drops here, waking the oldest
        // waiter after the connection is back on the free list.
    }

    /// Close everything and refuse further acquires. Idempotent.
    ///
    /// Connections currently checked out (including those pinned by open
    /// file handles) are dropped when their owners let go of them; the
    /// released flag keeps them out of the free list.
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.semaphore.close();

        let reaper = self.reaper.lock().await.take();
        if let Some(ReaperHandle { token, task }) = reaper {
            token.cancel();
            let _ = task.await;
        }

        let drained: Vec<_> = {
            let mut idle = self.idle.lock().await;
            idle.drain(..).collect()
        };
        for mut conn in drained {
            self.live.fetch_sub(1, Ordering::SeqCst);
            conn.disconnect().await;
        }
        debug!("session pool released");
    }

    /// Number of connections currently in existence (idle plus checked out).
    #[must_use]
    pub fn connections(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Snapshot of the byte/operation counters across all connections.
    #[must_use]
    pub fn transfer_metrics(&self) -> TransferMetricsSnapshot {
        self.metrics.snapshot()
    }

    #[must_use]
    pub fn account(&self) -> &Account {
        &self.account
    }

    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        self.config.operation_timeout
    }
}

//! The transactional store: pooled connections, scoped transactions with a
//! fixed start timestamp, and a background statistics monitor.
//!
//! [`Store::open`] validates the database path, builds the pool, applies all
//! pending migrations, and spawns the monitor task. No repository operation
//! runs before migrations have finished. [`Store::close`] stops the monitor
//! and is safe to call more than once.

use std::ops::Deref;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};

use crate::migrations::{run_migrations, MigrationError};
use crate::pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};

/// A source of "now", injected into the store so transaction timestamps are
/// deterministic in tests.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock. Used everywhere outside tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Lightweight internal statistics, refreshed periodically by the monitor.
///
/// Foreground code only ever reads a snapshot of this; the monitor is the
/// sole writer.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// Total number of user rows at the last refresh.
    pub user_count: i64,
    /// When the last successful refresh ran. `None` until the first tick.
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The pool could not be created (bad path, pool init failure).
    #[error(transparent)]
    Config(#[from] PoolError),

    /// A migration failed while opening the store.
    #[error("migrate: {0}")]
    Migration(#[from] MigrationError),

    /// No connection could be checked out of the pool.
    #[error("failed to get database connection: {0}")]
    Pool(#[from] r2d2::Error),

    /// An underlying SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// A pooled connection checked out for a single logical operation.
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Wraps a SQLite transaction together with a timestamp fixed at the start of
/// the transaction, so every write within it sees the same "now".
///
/// Dropping a `Tx` without calling [`Tx::commit`] rolls it back. That is the
/// cancellation guarantee: an abandoned operation can never half-commit.
pub struct Tx<'conn> {
    inner: rusqlite::Transaction<'conn>,
    /// The transaction start time, from the store's clock.
    pub now: DateTime<Utc>,
}

impl<'conn> Tx<'conn> {
    /// Commits the transaction, making its writes visible.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the commit fails; the transaction is
    /// rolled back in that case.
    pub fn commit(self) -> Result<(), StoreError> {
        self.inner.commit()?;
        Ok(())
    }
}

impl Deref for Tx<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.inner
    }
}

/// Handle to the database: pool, clock, and the background monitor.
pub struct Store {
    pool: DbPool,
    clock: Arc<dyn Clock>,
    stats: Arc<RwLock<StoreStats>>,
    shutdown_tx: watch::Sender<bool>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Opens the store: validates the path, creates the pool, runs all
    /// pending migrations, and starts the background monitor.
    ///
    /// Must be called from within a tokio runtime (the monitor is spawned on
    /// it). `monitor_interval` is how often statistics refresh; production
    /// uses 10 seconds, tests shorten it.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal to startup: `StoreError::Config` for an
    /// empty path or pool init failure, `StoreError::Migration` naming the
    /// migration that failed, `StoreError::Pool` if no connection is
    /// available to migrate on.
    pub fn open(
        db_path: &str,
        settings: DbRuntimeSettings,
        monitor_interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let pool = create_pool(db_path, settings)?;

        {
            let conn = pool.get()?;
            let applied = run_migrations(&conn)?;
            if applied > 0 {
                tracing::info!(count = applied, "applied database migrations");
            }
        }

        let stats = Arc::new(RwLock::new(StoreStats::default()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = spawn_monitor(
            pool.clone(),
            Arc::clone(&stats),
            Arc::clone(&clock),
            monitor_interval,
            shutdown_rx,
        );

        Ok(Self {
            pool,
            clock,
            stats,
            shutdown_tx,
            monitor: Mutex::new(Some(monitor)),
        })
    }

    /// Checks a connection out of the pool.
    ///
    /// Each logical operation owns its own connection for its whole duration;
    /// connections are never shared across concurrent callers.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Pool` if the pool is exhausted or the connection
    /// cannot be established within the pool's timeout.
    pub fn conn(&self) -> Result<PooledConn, StoreError> {
        Ok(self.pool.get()?)
    }

    /// Begins a transaction on the given connection, stamping it with the
    /// clock's current time.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the underlying connection cannot
    /// start a transaction.
    pub fn begin_tx<'c>(&self, conn: &'c mut Connection) -> Result<Tx<'c>, StoreError> {
        let now = self.clock.now();
        let tx = conn.transaction()?;
        Ok(Tx { inner: tx, now })
    }

    /// Returns a snapshot of the monitor's statistics.
    pub fn stats(&self) -> StoreStats {
        self.stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Stops the background monitor and waits for it to exit.
    ///
    /// Safe to call after a partial open and safe to call twice: a second
    /// close is a no-op. Pooled connections close as they drop.
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(true);

        let handle = self.monitor.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "store monitor exited abnormally");
                }
            }
        }
    }
}

/// Spawns the periodic statistics refresh task.
///
/// Runs until the shutdown signal fires or the store is dropped. Tick
/// failures are logged and swallowed; the monitor never propagates errors to
/// foreground callers.
fn spawn_monitor(
    pool: DbPool,
    stats: Arc<RwLock<StoreStats>>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick completes immediately; consume it so the
        // loop waits a full interval before the first refresh.
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    // Err means the store was dropped; either way, stop.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let pool = pool.clone();
                    let res = tokio::task::spawn_blocking(move || refresh_stats(&pool)).await;
                    match res {
                        Ok(Ok(user_count)) => {
                            if let Ok(mut s) = stats.write() {
                                s.user_count = user_count;
                                s.refreshed_at = Some(clock.now());
                            }
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(error = %e, "stats refresh failed");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "stats refresh task join error");
                        }
                    }
                }
            }
        }

        tracing::debug!("store monitor stopped");
    })
}

fn refresh_stats(pool: &DbPool) -> Result<i64, StoreError> {
    let conn = pool.get()?;
    let user_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(user_count)
}

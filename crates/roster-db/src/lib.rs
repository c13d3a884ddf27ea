//! Database layer for the roster service.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and the transactional [`Store`]. Every table is
//! created through versioned migrations managed by this crate, applied
//! exactly once when the store opens.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: no external database process required. WAL
//!   mode allows concurrent readers with a single writer, which matches the
//!   roster access pattern of occasional writes and frequent reads.
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, ensuring migrations ship with the server and cannot
//!   drift from the code that depends on them.
//! - **Injected clock**: every transaction carries a timestamp fixed at its
//!   start, taken from a [`Clock`] supplied when the store opens, so time is
//!   deterministic in tests.

mod migrations;
mod pool;
mod store;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
pub use store::{Clock, Store, StoreError, StoreStats, SystemClock, Tx};

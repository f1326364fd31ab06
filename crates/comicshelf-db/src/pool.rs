//! SQLite connection pooling.
//!
//! The daemon is effectively a single writer (the worker pool appends
//! history, everything else reads), so WAL mode lets CLI queries run
//! while a job commits. The pool is sized by the caller to match the
//! configured worker count, and every connection waits out writer
//! contention via `busy_timeout` instead of failing fast.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use comicshelf_core::{Error, Result};

use crate::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON;
     PRAGMA journal_mode = WAL;
     PRAGMA busy_timeout = 5000;";

/// Open (creating if needed) the history database at `db_path` with room
/// for `max_size` concurrent connections, and run pending migrations.
pub fn init_pool(db_path: &str, max_size: u32) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
    build(manager, max_size)
}

/// An isolated in-memory database pool for tests.
///
/// Each call names its own shared-cache in-memory database, so parallel
/// tests never see each other's rows while connections within one pool
/// still share state.
pub fn init_memory_pool() -> Result<DbPool> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let uri = format!("file:memdb_{n}?mode=memory&cache=shared");

    let manager = SqliteConnectionManager::file(uri)
        .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
    build(manager, 4)
}

fn build(manager: SqliteConnectionManager, max_size: u32) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(max_size.max(1))
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {e}")))?;

    let conn = pool
        .get()
        .map_err(|e| Error::database(format!("Failed to get connection for migrations: {e}")))?;
    migrations::run_migrations(&conn)?;

    Ok(pool)
}

/// Convenience helper to get a connection from the pool.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {e}")))
}

//! comicshelf-db: durable SQLite history and cover store.
//!
//! Backed by rusqlite behind an r2d2 pool. The schema is managed by
//! embedded migrations; all access goes through the typed functions in
//! [`queries`].

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use models::{CoverRow, HistoryRecord, Outcome};
pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};
pub use queries::records::NewRecord;

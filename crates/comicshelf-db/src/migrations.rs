//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order.  A
//! `schema_migrations` table tracks which versions have been applied.

use rusqlite::Connection;

use comicshelf_core::{Error, Result};

/// V1: initial schema -- history records and the cover cache table.
const V1_INITIAL: &str = r#"
-- Processing history: one append-only record per pipeline outcome.
CREATE TABLE history (
    id                 TEXT PRIMARY KEY,
    content_hash       TEXT NOT NULL,
    original_filename  TEXT NOT NULL,
    canonical_filename TEXT,
    series             TEXT,
    volume             INTEGER,
    chapter            REAL,
    title              TEXT,
    artist             TEXT,
    summary            TEXT,
    tags               TEXT NOT NULL DEFAULT '[]',
    outcome            TEXT NOT NULL,
    detail             TEXT,
    archive_path       TEXT,
    library_path       TEXT,
    cover_path         TEXT,
    discovered_at      TEXT NOT NULL,
    completed_at       TEXT,
    supersedes         TEXT REFERENCES history(id)
);

CREATE INDEX idx_history_hash    ON history(content_hash);
CREATE INDEX idx_history_outcome ON history(outcome);
CREATE INDEX idx_history_slot    ON history(series, volume, chapter);

-- At most one filed record may carry a given content hash.
CREATE UNIQUE INDEX idx_history_filed_hash
    ON history(content_hash) WHERE outcome = 'filed';

-- Cover cache bookkeeping: one row per (series, volume), last write wins.
CREATE TABLE covers (
    series       TEXT NOT NULL,
    volume       INTEGER NOT NULL,
    path         TEXT NOT NULL,
    source_path  TEXT NOT NULL,
    extracted_at TEXT NOT NULL,
    PRIMARY KEY (series, volume)
);
"#;

/// V2: converter output path on history records.
const V2_CONVERTED_PATH: &str = r#"
ALTER TABLE history ADD COLUMN converted_path TEXT;
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL), (2, V2_CONVERTED_PATH)];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
    }

    Ok(())
}

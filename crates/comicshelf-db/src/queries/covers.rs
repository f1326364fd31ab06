//! Cover cache bookkeeping operations.

use chrono::Utc;
use rusqlite::Connection;

use comicshelf_core::{Error, Result};

use crate::models::CoverRow;

/// Insert or replace the cover row for a (series, volume) key.
pub fn upsert_cover(
    conn: &Connection,
    series: &str,
    volume: u32,
    path: &str,
    source_path: &str,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO covers (series, volume, path, source_path, extracted_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(series, volume) DO UPDATE SET
             path = excluded.path,
             source_path = excluded.source_path,
             extracted_at = excluded.extracted_at",
        rusqlite::params![series, volume, path, source_path, &now],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Look up the cover row for a (series, volume) key.
pub fn get_cover(conn: &Connection, series: &str, volume: u32) -> Result<Option<CoverRow>> {
    let result = conn.query_row(
        "SELECT series, volume, path, source_path, extracted_at
         FROM covers WHERE series = ?1 AND volume = ?2",
        rusqlite::params![series, volume],
        CoverRow::from_row,
    );
    match result {
        Ok(r) => Ok(Some(r)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

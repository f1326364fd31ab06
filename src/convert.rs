//! External converter hand-off.
//!
//! Conversion itself happens outside the daemon. This module exposes the
//! filed catalog for a converter to walk and records where its output
//! landed, one auxiliary path per filed record.

use comicshelf_core::metadata::ComicMetadata;
use comicshelf_core::{Error, RecordId, Result};
use comicshelf_db::queries::records;
use comicshelf_db::HistoryRecord;
use rusqlite::Connection;

/// A filed archive as seen by a converter.
#[derive(Debug, Clone)]
pub struct FiledEntry {
    pub id: RecordId,
    pub library_path: String,
    pub metadata: ComicMetadata,
    pub converted_path: Option<String>,
}

impl FiledEntry {
    fn from_record(record: HistoryRecord) -> Option<Self> {
        Some(Self {
            id: record.id,
            library_path: record.library_path.clone()?,
            metadata: record.metadata()?,
            converted_path: record.converted_path,
        })
    }

    /// Whether a converter has already produced output for this entry.
    pub fn is_converted(&self) -> bool {
        self.converted_path.is_some()
    }
}

/// All filed archives, oldest first.
///
/// Filed records without a library path or usable metadata should not
/// exist; any that do are skipped with a warning rather than surfaced.
pub fn filed_entries(conn: &Connection) -> Result<Vec<FiledEntry>> {
    let mut entries = Vec::new();
    for record in records::list_filed(conn)? {
        let id = record.id;
        match FiledEntry::from_record(record) {
            Some(entry) => entries.push(entry),
            None => tracing::warn!("Filed record {id} is missing path or metadata; skipping"),
        }
    }
    Ok(entries)
}

/// Record the converter's output path for a filed record.
pub fn record_output(conn: &Connection, id: RecordId, output_path: &str) -> Result<()> {
    if records::set_converted_path(conn, id, output_path)? {
        Ok(())
    } else {
        Err(Error::not_found("filed record", id))
    }
}

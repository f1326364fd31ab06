//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`.

use std::fmt;
use std::str::FromStr;

use comicshelf_core::metadata::{ChapterNumber, ComicMetadata};
use comicshelf_core::RecordId;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(T::from(uuid))
}

fn parse_opt_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(v) => {
            let uuid = Uuid::parse_str(&v).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            Ok(Some(T::from(uuid)))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Terminal outcome of a processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Filed,
    Duplicate,
    NeedsReview,
    Failed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Filed => "filed",
            Outcome::Duplicate => "duplicate",
            Outcome::NeedsReview => "needs_review",
            Outcome::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "filed" => Ok(Outcome::Filed),
            "duplicate" => Ok(Outcome::Duplicate),
            "needs_review" => Ok(Outcome::NeedsReview),
            "failed" => Ok(Outcome::Failed),
            other => Err(format!("unknown outcome: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// HistoryRecord
// ---------------------------------------------------------------------------

/// One row of the append-only processing history.
#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub id: RecordId,
    pub content_hash: String,
    pub original_filename: String,
    pub canonical_filename: Option<String>,
    pub series: Option<String>,
    pub volume: Option<u32>,
    pub chapter: Option<ChapterNumber>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub outcome: Outcome,
    pub detail: Option<String>,
    pub archive_path: Option<String>,
    pub library_path: Option<String>,
    pub cover_path: Option<String>,
    pub converted_path: Option<String>,
    pub discovered_at: String,
    pub completed_at: Option<String>,
    pub supersedes: Option<RecordId>,
}

impl HistoryRecord {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let volume: Option<i64> = row.get(5)?;
        let chapter: Option<f64> = row.get(6)?;
        let tags_json: String = row.get(10)?;
        let outcome_text: String = row.get(11)?;
        let outcome = outcome_text.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                11,
                rusqlite::types::Type::Text,
                format!("unknown outcome: {outcome_text}").into(),
            )
        })?;

        Ok(Self {
            id: parse_id(row, 0)?,
            content_hash: row.get(1)?,
            original_filename: row.get(2)?,
            canonical_filename: row.get(3)?,
            series: row.get(4)?,
            volume: volume.map(|v| v as u32),
            chapter: chapter.and_then(ChapterNumber::from_f64),
            title: row.get(7)?,
            artist: row.get(8)?,
            summary: row.get(9)?,
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            outcome,
            detail: row.get(12)?,
            archive_path: row.get(13)?,
            library_path: row.get(14)?,
            cover_path: row.get(15)?,
            converted_path: row.get(16)?,
            discovered_at: row.get(17)?,
            completed_at: row.get(18)?,
            supersedes: parse_opt_id(row, 19)?,
        })
    }

    /// Reassemble the resolved metadata, when the record carries a series.
    pub fn metadata(&self) -> Option<ComicMetadata> {
        let series = self.series.clone()?;
        Some(ComicMetadata {
            series,
            volume: self.volume,
            chapter: self.chapter,
            title: self.title.clone(),
            artist: self.artist.clone(),
            summary: self.summary.clone(),
            tags: self.tags.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// CoverRow
// ---------------------------------------------------------------------------

/// Bookkeeping row for one cached cover thumbnail.
#[derive(Debug, Clone)]
pub struct CoverRow {
    pub series: String,
    pub volume: u32,
    pub path: String,
    pub source_path: String,
    pub extracted_at: String,
}

impl CoverRow {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let volume: i64 = row.get(1)?;
        Ok(Self {
            series: row.get(0)?,
            volume: volume as u32,
            path: row.get(2)?,
            source_path: row.get(3)?,
            extracted_at: row.get(4)?,
        })
    }
}

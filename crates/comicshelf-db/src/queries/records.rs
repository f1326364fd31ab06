//! History record operations.
//!
//! The history table is append-only: outcomes are never updated in place
//! (the one exception being the auxiliary converter output path). Review
//! resolution appends a superseding record instead of editing the old one.

use chrono::Utc;
use rusqlite::Connection;

use comicshelf_core::metadata::{normalize_series, ChapterNumber, ComicMetadata};
use comicshelf_core::{Error, RecordId, Result};

use crate::models::{HistoryRecord, Outcome};

const COLS: &str = "id, content_hash, original_filename, canonical_filename, series,
    volume, chapter, title, artist, summary, tags, outcome, detail,
    archive_path, library_path, cover_path, converted_path,
    discovered_at, completed_at, supersedes";

/// Fields for one new history record.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub content_hash: String,
    pub original_filename: String,
    pub canonical_filename: Option<String>,
    pub metadata: Option<ComicMetadata>,
    pub outcome: Outcome,
    pub detail: Option<String>,
    pub archive_path: Option<String>,
    pub library_path: Option<String>,
    pub cover_path: Option<String>,
    pub discovered_at: String,
    pub supersedes: Option<RecordId>,
}

impl NewRecord {
    /// A record with only the required fields set.
    pub fn new(content_hash: impl Into<String>, original_filename: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            content_hash: content_hash.into(),
            original_filename: original_filename.into(),
            canonical_filename: None,
            metadata: None,
            outcome,
            detail: None,
            archive_path: None,
            library_path: None,
            cover_path: None,
            discovered_at: Utc::now().to_rfc3339(),
            supersedes: None,
        }
    }
}

/// Append a record and return it as stored.
pub fn append(conn: &Connection, new: NewRecord) -> Result<HistoryRecord> {
    let id = RecordId::new();
    let now = Utc::now().to_rfc3339();

    let meta = new.metadata.as_ref();
    let tags_json = serde_json::to_string(&meta.map(|m| m.tags.clone()).unwrap_or_default())
        .map_err(|e| Error::database(e.to_string()))?;

    conn.execute(
        "INSERT INTO history (id, content_hash, original_filename, canonical_filename,
             series, volume, chapter, title, artist, summary, tags, outcome, detail,
             archive_path, library_path, cover_path, discovered_at, completed_at, supersedes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        rusqlite::params![
            id.to_string(),
            &new.content_hash,
            &new.original_filename,
            new.canonical_filename.as_deref(),
            meta.map(|m| m.series.as_str()),
            meta.and_then(|m| m.volume),
            meta.and_then(|m| m.chapter).map(ChapterNumber::as_f64),
            meta.and_then(|m| m.title.as_deref()),
            meta.and_then(|m| m.artist.as_deref()),
            meta.and_then(|m| m.summary.as_deref()),
            &tags_json,
            new.outcome.as_str(),
            new.detail.as_deref(),
            new.archive_path.as_deref(),
            new.library_path.as_deref(),
            new.cover_path.as_deref(),
            &new.discovered_at,
            &now,
            new.supersedes.map(|s| s.to_string()),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    get_record(conn, id)?.ok_or_else(|| Error::not_found("record", id))
}

/// Get a record by ID.
pub fn get_record(conn: &Connection, id: RecordId) -> Result<Option<HistoryRecord>> {
    let q = format!("SELECT {COLS} FROM history WHERE id = ?1");
    let result = conn.query_row(&q, [id.to_string()], HistoryRecord::from_row);
    match result {
        Ok(r) => Ok(Some(r)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Find the filed record carrying this content hash, if any.
pub fn find_filed_by_hash(conn: &Connection, hash: &str) -> Result<Option<HistoryRecord>> {
    let q = format!("SELECT {COLS} FROM history WHERE content_hash = ?1 AND outcome = 'filed'");
    let result = conn.query_row(&q, [hash], HistoryRecord::from_row);
    match result {
        Ok(r) => Ok(Some(r)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Whether a filed record points at this library path.
///
/// The library copy is rewritten during filing, so its bytes differ from
/// the ingested original whose hash the record carries; the recorded
/// path is the authoritative link between record and library file.
pub fn any_filed_with_library_path(conn: &Connection, path: &str) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM history WHERE outcome = 'filed' AND library_path = ?1",
        [path],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Whether any record, of any outcome, carries this content hash.
pub fn any_with_hash(conn: &Connection, hash: &str) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM history WHERE content_hash = ?1",
        [hash],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Find the filed record occupying a (series, volume, chapter) slot.
///
/// `IS` comparison makes NULL volume/chapter match NULL, so chapter-only
/// and volume-only slots are distinct from fully-numbered ones. The
/// series comparison goes through [`normalize_series`] (SQLite `LOWER`
/// is ASCII-only and cannot collapse whitespace), so "BLUE  PERIOD" and
/// "Blue Period" occupy the same slot.
pub fn find_filed_by_slot(
    conn: &Connection,
    series: &str,
    volume: Option<u32>,
    chapter: Option<ChapterNumber>,
) -> Result<Option<HistoryRecord>> {
    let q = format!(
        "SELECT {COLS} FROM history
         WHERE outcome = 'filed' AND volume IS ?1 AND chapter IS ?2"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(
            rusqlite::params![volume, chapter.map(ChapterNumber::as_f64)],
            HistoryRecord::from_row,
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let wanted = normalize_series(series);
    for row in rows {
        let record = row.map_err(|e| Error::database(e.to_string()))?;
        if record
            .series
            .as_deref()
            .is_some_and(|s| normalize_series(s) == wanted)
        {
            return Ok(Some(record));
        }
    }
    Ok(None)
}

/// List needs-review records that have not been superseded, oldest first.
pub fn list_needs_review(conn: &Connection) -> Result<Vec<HistoryRecord>> {
    let q = format!(
        "SELECT {COLS} FROM history
         WHERE outcome = 'needs_review'
           AND id NOT IN (SELECT supersedes FROM history WHERE supersedes IS NOT NULL)
         ORDER BY discovered_at ASC"
    );
    collect(conn, &q, [])
}

/// Find the open (not superseded) needs-review record for a hash.
pub fn find_needs_review_by_hash(conn: &Connection, hash: &str) -> Result<Option<HistoryRecord>> {
    let q = format!(
        "SELECT {COLS} FROM history
         WHERE outcome = 'needs_review' AND content_hash = ?1
           AND id NOT IN (SELECT supersedes FROM history WHERE supersedes IS NOT NULL)
         ORDER BY discovered_at DESC LIMIT 1"
    );
    let result = conn.query_row(&q, [hash], HistoryRecord::from_row);
    match result {
        Ok(r) => Ok(Some(r)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all filed records, oldest first.
pub fn list_filed(conn: &Connection) -> Result<Vec<HistoryRecord>> {
    let q = format!(
        "SELECT {COLS} FROM history WHERE outcome = 'filed' ORDER BY discovered_at ASC"
    );
    collect(conn, &q, [])
}

/// Store the converter output path for a filed record.
pub fn set_converted_path(conn: &Connection, id: RecordId, path: &str) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE history SET converted_path = ?1 WHERE id = ?2 AND outcome = 'filed'",
            rusqlite::params![path, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

fn collect<P: rusqlite::Params>(conn: &Connection, q: &str, params: P) -> Result<Vec<HistoryRecord>> {
    let mut stmt = conn.prepare(q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(params, HistoryRecord::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};

    fn meta(series: &str, volume: Option<u32>, chapter: Option<f64>) -> ComicMetadata {
        ComicMetadata {
            volume,
            chapter: chapter.and_then(ChapterNumber::from_f64),
            ..ComicMetadata::for_series(series)
        }
    }

    #[test]
    fn append_and_find_by_hash() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let mut new = NewRecord::new("abc123", "Blue Period Vol.018 Ch.00076.cbz", Outcome::Filed);
        new.metadata = Some(meta("Blue Period", Some(18), Some(76.0)));
        new.canonical_filename = Some("Blue Period Vol.018 Ch.00076.cbz".into());
        let record = append(&conn, new).unwrap();

        assert_eq!(record.outcome, Outcome::Filed);
        assert_eq!(record.series.as_deref(), Some("Blue Period"));
        assert_eq!(record.chapter, ChapterNumber::from_f64(76.0));

        let found = find_filed_by_hash(&conn, "abc123").unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert!(find_filed_by_hash(&conn, "missing").unwrap().is_none());
        assert!(any_with_hash(&conn, "abc123").unwrap());
    }

    #[test]
    fn slot_lookup_is_null_safe() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let mut new = NewRecord::new("h1", "One Piece - Chapter 1050.cbz", Outcome::Filed);
        new.metadata = Some(meta("One Piece", None, Some(1050.0)));
        append(&conn, new).unwrap();

        // Same series and chapter, NULL volume matches NULL.
        let hit = find_filed_by_slot(&conn, "One Piece", None, ChapterNumber::from_f64(1050.0))
            .unwrap();
        assert!(hit.is_some());

        // A volumed slot is distinct from the volumeless one.
        let miss = find_filed_by_slot(&conn, "One Piece", Some(1), ChapterNumber::from_f64(1050.0))
            .unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn slot_lookup_normalizes_series() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let mut new = NewRecord::new("h1", "Blue Period Vol.018 Ch.00076.cbz", Outcome::Filed);
        new.metadata = Some(meta("Blue Period", Some(18), Some(76.0)));
        append(&conn, new).unwrap();

        let hit = find_filed_by_slot(
            &conn,
            "BLUE   PERIOD",
            Some(18),
            ChapterNumber::from_f64(76.0),
        )
        .unwrap();
        assert!(hit.is_some(), "case and spacing must not split the slot");

        let miss = find_filed_by_slot(
            &conn,
            "Blue Periodical",
            Some(18),
            ChapterNumber::from_f64(76.0),
        )
        .unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn filed_records_found_by_library_path() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let mut new = NewRecord::new("h1", "a.cbz", Outcome::Filed);
        new.library_path = Some("/library/Series/a.cbz".into());
        append(&conn, new).unwrap();

        assert!(any_filed_with_library_path(&conn, "/library/Series/a.cbz").unwrap());
        assert!(!any_filed_with_library_path(&conn, "/library/Series/b.cbz").unwrap());
    }

    #[test]
    fn superseded_reviews_are_hidden() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let mut new = NewRecord::new("h2", "weird.cbz", Outcome::NeedsReview);
        new.detail = Some("series conflict".into());
        let review = append(&conn, new).unwrap();
        assert_eq!(list_needs_review(&conn).unwrap().len(), 1);

        let mut resolved = NewRecord::new("h2", "weird.cbz", Outcome::Filed);
        resolved.metadata = Some(meta("Fixed Series", Some(1), Some(1.0)));
        resolved.supersedes = Some(review.id);
        let filed = append(&conn, resolved).unwrap();
        assert_eq!(filed.supersedes, Some(review.id));

        assert!(list_needs_review(&conn).unwrap().is_empty());
        assert!(find_needs_review_by_hash(&conn, "h2").unwrap().is_none());
    }

    #[test]
    fn converted_path_only_for_filed() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let filed = append(
            &conn,
            NewRecord::new("h3", "a.cbz", Outcome::Filed),
        )
        .unwrap();
        let failed = append(
            &conn,
            NewRecord::new("h4", "b.cbz", Outcome::Failed),
        )
        .unwrap();

        assert!(set_converted_path(&conn, filed.id, "/out/a.pdf").unwrap());
        assert!(!set_converted_path(&conn, failed.id, "/out/b.pdf").unwrap());

        let back = get_record(&conn, filed.id).unwrap().unwrap();
        assert_eq!(back.converted_path.as_deref(), Some("/out/a.pdf"));
    }

    #[test]
    fn list_filed_in_discovery_order() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let mut first = NewRecord::new("f1", "a.cbz", Outcome::Filed);
        first.discovered_at = "2026-01-01T00:00:00Z".into();
        let mut second = NewRecord::new("f2", "b.cbz", Outcome::Filed);
        second.discovered_at = "2026-01-02T00:00:00Z".into();
        append(&conn, second).unwrap();
        append(&conn, first).unwrap();

        let filed = list_filed(&conn).unwrap();
        assert_eq!(filed.len(), 2);
        assert_eq!(filed[0].content_hash, "f1");
    }
}

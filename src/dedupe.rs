//! Duplicate detection against the processing history.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use comicshelf_core::metadata::ComicMetadata;
use comicshelf_core::Result;
use comicshelf_db::queries::records;
use comicshelf_db::HistoryRecord;

/// How an incoming archive relates to what has already been filed.
#[derive(Debug, Clone)]
pub enum Classification {
    /// No filed record matches; file normally.
    New,
    /// A filed record already carries this exact content hash.
    ExactDuplicate(HistoryRecord),
    /// A filed record occupies the same (series, volume, chapter) slot
    /// with different content.
    MetadataConflict(HistoryRecord),
}

/// Classify an archive by content hash, then by metadata slot.
///
/// The hash check runs first: identical bytes are an exact duplicate no
/// matter what the metadata says. Only then is the slot checked for a
/// different archive claiming the same position.
pub fn classify(
    conn: &Connection,
    hash: &str,
    metadata: &ComicMetadata,
) -> Result<Classification> {
    if let Some(existing) = records::find_filed_by_hash(conn, hash)? {
        return Ok(Classification::ExactDuplicate(existing));
    }

    if let Some(existing) =
        records::find_filed_by_slot(conn, &metadata.series, metadata.volume, metadata.chapter)?
    {
        if existing.content_hash != hash {
            return Ok(Classification::MetadataConflict(existing));
        }
    }

    Ok(Classification::New)
}

/// SHA-256 of a file's raw bytes, hex encoded, computed streaming.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use comicshelf_core::ChapterNumber;
    use comicshelf_db::queries::records::NewRecord;
    use comicshelf_db::{get_conn, init_memory_pool, Outcome};

    fn meta(series: &str, volume: Option<u32>, chapter: Option<f64>) -> ComicMetadata {
        ComicMetadata {
            volume,
            chapter: chapter.and_then(ChapterNumber::from_f64),
            ..ComicMetadata::for_series(series)
        }
    }

    fn filed(conn: &rusqlite::Connection, hash: &str, m: ComicMetadata) {
        let mut new = NewRecord::new(hash, "x.cbz", Outcome::Filed);
        new.metadata = Some(m);
        records::append(conn, new).unwrap();
    }

    #[test]
    fn fresh_hash_and_slot_is_new() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let c = classify(&conn, "h1", &meta("Blue Period", Some(18), Some(76.0))).unwrap();
        assert_matches!(c, Classification::New);
    }

    #[test]
    fn same_hash_is_exact_duplicate() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        filed(&conn, "h1", meta("Blue Period", Some(18), Some(76.0)));

        // Even with different metadata, identical bytes win.
        let c = classify(&conn, "h1", &meta("Other Series", None, Some(1.0))).unwrap();
        assert_matches!(c, Classification::ExactDuplicate(r) if r.content_hash == "h1");
    }

    #[test]
    fn same_slot_different_hash_is_conflict() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        filed(&conn, "h1", meta("Blue Period", Some(18), Some(76.0)));

        let c = classify(&conn, "h2", &meta("Blue Period", Some(18), Some(76.0))).unwrap();
        assert_matches!(c, Classification::MetadataConflict(r) if r.content_hash == "h1");
    }

    #[test]
    fn slot_match_ignores_series_case_and_spacing() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        filed(&conn, "h1", meta("Blue Period", Some(18), Some(76.0)));

        // A retranslation with shouting-case naming is the same slot.
        let c = classify(&conn, "h2", &meta("BLUE  PERIOD", Some(18), Some(76.0))).unwrap();
        assert_matches!(c, Classification::MetadataConflict(r) if r.content_hash == "h1");
    }

    #[test]
    fn different_slot_is_new() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        filed(&conn, "h1", meta("Blue Period", Some(18), Some(76.0)));

        let c = classify(&conn, "h2", &meta("Blue Period", Some(18), Some(77.0))).unwrap();
        assert_matches!(c, Classification::New);

        // NULL volume is a distinct slot from volume 18.
        let c = classify(&conn, "h3", &meta("Blue Period", None, Some(76.0))).unwrap();
        assert_matches!(c, Classification::New);
    }

    #[test]
    fn non_filed_records_do_not_block() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let mut new = NewRecord::new("h1", "x.cbz", Outcome::NeedsReview);
        new.metadata = Some(meta("Blue Period", Some(18), Some(76.0)));
        records::append(&conn, new).unwrap();

        let c = classify(&conn, "h1", &meta("Blue Period", Some(18), Some(76.0))).unwrap();
        assert_matches!(c, Classification::New);
    }

    #[test]
    fn hash_file_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"hello").unwrap();

        let h = hash_file(&path).unwrap();
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_file(&path).unwrap());

        std::fs::write(&path, b"hello!").unwrap();
        assert_ne!(h, hash_file(&path).unwrap());
    }
}

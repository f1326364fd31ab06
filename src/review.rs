//! Review queue: listing held records and resolving them with corrected
//! metadata.
//!
//! Resolution never edits the held record. It re-runs the tail of the
//! pipeline with the operator's metadata and appends a superseding
//! record, so the history keeps both the hold and its resolution.

use std::path::PathBuf;
use std::sync::Arc;

use comicshelf_archive::Cbz;
use comicshelf_core::metadata::ComicMetadata;
use comicshelf_core::{Error, Result};
use comicshelf_db::queries::records;
use comicshelf_db::{get_conn, HistoryRecord};

use crate::pipeline::{self, FinalizeInput, Shared};

/// Open needs-review records, oldest first. Superseded holds are hidden.
pub fn pending(conn: &rusqlite::Connection) -> Result<Vec<HistoryRecord>> {
    records::list_needs_review(conn)
}

/// Resolve a held record by re-filing its archive with corrected metadata.
///
/// The archive is re-read from the path recorded at hold time and pushed
/// back through duplicate detection and filing. Whatever the outcome, the
/// appended record supersedes the hold. The corrected metadata must name
/// a series and carry at least one of volume or chapter.
pub async fn resolve(
    shared: &Arc<Shared>,
    hash: &str,
    metadata: ComicMetadata,
) -> Result<HistoryRecord> {
    if metadata.series.trim().is_empty() {
        return Err(Error::Validation("series must not be empty".into()));
    }
    if metadata.volume.is_none() && metadata.chapter.is_none() {
        return Err(Error::Validation(
            "at least one of volume or chapter is required".into(),
        ));
    }

    let held = {
        let shared = Arc::clone(shared);
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<HistoryRecord>> {
            let conn = get_conn(&shared.pool)?;
            records::find_needs_review_by_hash(&conn, &hash)
        })
        .await
        .map_err(|e| Error::Internal(format!("blocking task failed: {e}")))??
    };
    let held = held.ok_or_else(|| Error::not_found("needs-review record", hash))?;

    let archive_path = held
        .archive_path
        .as_deref()
        .map(PathBuf::from)
        .ok_or_else(|| {
            Error::Metadata(format!("record {} has no archive path", held.id))
        })?;

    let _hash_guard = shared.hash_locks.acquire(hash).await;
    let dest = crate::library::destination(
        &shared.config.paths.library,
        &metadata,
        &shared.config.naming,
    );
    let _path_guard = shared.path_locks.acquire(&dest.to_string_lossy()).await;

    let shared_bg = Arc::clone(shared);
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || {
        let cbz = Cbz::open(&archive_path)?;
        let cover = cbz.extract_cover().unwrap_or_else(|e| {
            tracing::warn!("Could not read cover from {}: {e}", archive_path.display());
            None
        });
        let original_filename = archive_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let input = FinalizeInput {
            path: archive_path,
            discovered_at: held.discovered_at.clone(),
            original_filename,
            hash,
            cbz,
            cover,
            metadata,
            review: Vec::new(),
            supersedes: Some(held.id),
        };
        pipeline::finalize(&shared_bg, input)
    })
    .await
    .map_err(|e| Error::Internal(format!("blocking task failed: {e}")))?
}

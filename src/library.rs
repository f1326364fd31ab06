//! Library filing and startup reconciliation.
//!
//! Filed archives live at `{library}/{series}/{canonical filename}`. The
//! move into the library is always the last filesystem step of a job, so
//! a crash can leave the original in place but never a half-filed
//! library entry.

use std::path::{Path, PathBuf};

use chrono::Utc;
use walkdir::WalkDir;

use comicshelf_archive::Cbz;
use comicshelf_core::config::{Config, NamingConfig};
use comicshelf_core::metadata::{canonical_filename, sanitize_component, ComicMetadata};
use comicshelf_core::{Error, Result};
use comicshelf_db::queries::records::{self, NewRecord};
use comicshelf_db::{get_conn, DbPool, Outcome};

use crate::dedupe::hash_file;
use crate::reconcile;

/// Final library location for an archive with this metadata.
pub fn destination(library_root: &Path, meta: &ComicMetadata, naming: &NamingConfig) -> PathBuf {
    library_root
        .join(sanitize_component(&meta.series))
        .join(canonical_filename(meta, naming, "cbz"))
}

/// Move a finished archive into the library.
///
/// Refuses to overwrite: an existing destination is a filing error, since
/// duplicate detection should have caught it earlier.
pub fn file_into_library(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        return Err(Error::filing(
            "move",
            format!("destination already exists: {}", dest.display()),
        ));
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    move_file(src, dest)?;
    tracing::info!("Filed {} -> {}", src.display(), dest.display());
    Ok(())
}

/// Move a discarded archive into `dir`, suffixing the name on collision.
pub fn move_to_dir(src: &Path, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let name = src
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::filing("discard", "source path has no file name"))?;

    let mut dest = dir.join(name);
    let mut counter = 1;
    while dest.exists() {
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name);
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("cbz");
        dest = dir.join(format!("{stem} ({counter}).{ext}"));
        counter += 1;
    }

    move_file(src, &dest)?;
    Ok(dest)
}

/// Copy an archive into the backup directory under its canonical name.
pub fn backup_copy(src: &Path, backup_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(backup_dir)?;
    let name = src
        .file_name()
        .ok_or_else(|| Error::filing("backup", "source path has no file name"))?;
    let dest = backup_dir.join(name);
    std::fs::copy(src, &dest)?;
    Ok(dest)
}

/// Rename, falling back to copy-and-remove across filesystems.
fn move_file(src: &Path, dest: &Path) -> std::io::Result<()> {
    match std::fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(src, dest)?;
            std::fs::remove_file(src)
        }
    }
}

/// Startup reconciliation: walk the library and re-derive history records
/// for archives that have none.
///
/// A crash between the library move and the history append leaves an
/// orphan: a filed archive with no `filed` record pointing at it. An
/// archive counts as recorded when a filed record references its path,
/// or, for files moved within the library, when one carries its hash.
/// When the canonical filename plus embedded metadata yield complete
/// metadata the orphan's record is re-derived as `filed`; otherwise a
/// needs-review record is appended. Returns the number of orphans found.
pub fn reconcile_orphans(config: &Config, pool: &DbPool) -> Result<usize> {
    let library = &config.paths.library;
    if !library.is_dir() {
        return Ok(0);
    }

    let conn = get_conn(pool)?;
    let mut orphans = 0;

    for entry in WalkDir::new(library).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_cbz = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("cbz"));
        if !is_cbz {
            continue;
        }

        // The library copy is rewritten at filing time, so its hash
        // never matches the ingested original's; check the recorded
        // path first and fall back to the hash for moved files.
        if records::any_filed_with_library_path(&conn, &path.to_string_lossy())? {
            continue;
        }
        let hash = match hash_file(path) {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!("Skipping unreadable library file {}: {e}", path.display());
                continue;
            }
        };
        if records::find_filed_by_hash(&conn, &hash)?.is_some() {
            continue;
        }

        orphans += 1;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        tracing::warn!("Library archive without history record: {}", path.display());

        let embedded = Cbz::open(path).ok().and_then(|cbz| cbz.metadata().cloned());
        let parsed = comicshelf_parser::parse(&filename);
        let reconciled = reconcile::reconcile(&parsed, embedded.as_ref());

        let mut new = NewRecord::new(hash, filename.clone(), Outcome::Filed);
        new.discovered_at = Utc::now().to_rfc3339();
        new.library_path = Some(path.to_string_lossy().into_owned());
        if reconciled.needs_review() {
            new.outcome = Outcome::NeedsReview;
            new.detail = Some(format!(
                "recovered at startup; {}",
                reconciled.review.join("; ")
            ));
            new.archive_path = Some(path.to_string_lossy().into_owned());
        } else {
            new.canonical_filename = Some(canonical_filename(
                &reconciled.metadata,
                &config.naming,
                "cbz",
            ));
            new.detail = Some("record re-derived at startup".into());
        }
        new.metadata = Some(reconciled.metadata);
        records::append(&conn, new)?;
    }

    Ok(orphans)
}

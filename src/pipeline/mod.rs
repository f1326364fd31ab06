//! Pipeline orchestrator: worker pool and the per-file state machine.
//!
//! Each discovered file moves through
//! `Discovered -> Validated -> Parsed -> MetadataResolved ->
//! DuplicateChecked -> Filed | NeedsReview | Failed`, owned by one worker
//! from dequeue to terminal state. Heavy work (hashing, archive I/O,
//! image encoding, DB access) runs on the blocking thread pool in two
//! phases; the per-hash and per-destination locks are taken between them.

pub mod locks;

pub use locks::KeyedLocks;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;

use comicshelf_archive::{Cbz, ComicInfo};
use comicshelf_core::config::Config;
use comicshelf_core::metadata::{canonical_filename, ComicMetadata};
use comicshelf_core::{Error, JobId, RecordId, Result};
use comicshelf_db::queries::records::{self, NewRecord};
use comicshelf_db::{get_conn, DbPool, HistoryRecord, Outcome};

use crate::covers::CoverCache;
use crate::dedupe::{self, hash_file, Classification};
use crate::library;
use crate::reconcile::{self, Reconciled};

/// Position of a job in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Discovered,
    Validated,
    Parsed,
    MetadataResolved,
    DuplicateChecked,
    Filed,
    /// Exact duplicate discarded; terminal like `Filed`, nothing new in
    /// the library.
    Discarded,
    NeedsReview,
    Failed,
}

/// Per-file processing aggregate, owned by one worker until terminal.
#[derive(Debug)]
pub struct ProcessingJob {
    pub id: JobId,
    pub path: PathBuf,
    pub discovered_at: String,
    pub state: JobState,
}

impl ProcessingJob {
    fn new(path: PathBuf) -> Self {
        Self {
            id: JobId::new(),
            path,
            discovered_at: Utc::now().to_rfc3339(),
            state: JobState::Discovered,
        }
    }

    fn advance(&mut self, state: JobState) {
        tracing::debug!("Job {}: {:?} -> {:?}", self.id, self.state, state);
        self.state = state;
    }
}

/// State shared by all workers and the review interface.
pub struct Shared {
    pub config: Config,
    pub pool: DbPool,
    pub covers: CoverCache,
    pub hash_locks: KeyedLocks,
    pub path_locks: KeyedLocks,
}

impl Shared {
    pub fn new(config: Config, pool: DbPool) -> Self {
        let covers = CoverCache::new(config.paths.covers.clone(), pool.clone());
        Self {
            config,
            pool,
            covers,
            hash_locks: KeyedLocks::new(),
            path_locks: KeyedLocks::new(),
        }
    }
}

/// Fixed-size worker pool draining the discovery queue.
pub struct Orchestrator {
    shared: Arc<Shared>,
    rx: Arc<AsyncMutex<mpsc::Receiver<PathBuf>>>,
}

impl Orchestrator {
    pub fn new(shared: Arc<Shared>, rx: mpsc::Receiver<PathBuf>) -> Self {
        Self {
            shared,
            rx: Arc::new(AsyncMutex::new(rx)),
        }
    }

    /// Run until the discovery queue closes and all workers drain.
    pub async fn run(self) {
        let workers = self.shared.config.processing.workers.max(1);
        tracing::info!("Starting {workers} pipeline workers");

        let mut set = JoinSet::new();
        for n in 0..workers {
            let shared = Arc::clone(&self.shared);
            let rx = Arc::clone(&self.rx);
            set.spawn(worker(n, shared, rx));
        }

        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                tracing::error!("Pipeline worker panicked: {e}");
            }
        }
        tracing::info!("Pipeline drained");
    }
}

async fn worker(n: usize, shared: Arc<Shared>, rx: Arc<AsyncMutex<mpsc::Receiver<PathBuf>>>) {
    loop {
        // Hold the receiver lock only for the dequeue itself.
        let path = { rx.lock().await.recv().await };
        let Some(path) = path else { break };

        match process(&shared, path.clone()).await {
            Ok(Some(record)) => {
                tracing::info!(
                    "Job for {} finished: {}",
                    path.display(),
                    record.outcome.as_str()
                );
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Job for {} errored: {e}", path.display());
            }
        }
    }
    tracing::debug!("Worker {n} exiting");
}

/// Run one file through the full pipeline.
///
/// Returns the terminal history record, or `None` when the file was
/// transiently unreadable and left for a later check cycle.
pub async fn process(shared: &Arc<Shared>, path: PathBuf) -> Result<Option<HistoryRecord>> {
    let mut job = ProcessingJob::new(path.clone());
    tracing::info!("Job {} started for {}", job.id, path.display());

    // Content hash first; everything downstream is keyed by it.
    let hash = {
        let hash_path = path.clone();
        match run_blocking(move || hash_file(&hash_path)).await? {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(
                    "Cannot read {} ({e}); leaving for the next check cycle",
                    path.display()
                );
                return Ok(None);
            }
        }
    };

    let analysis = {
        let path = path.clone();
        let hash = hash.clone();
        run_blocking(move || analyze(&path, hash)).await?
    };

    let analysis = match analysis {
        Ok(a) => a,
        Err(e @ Error::Io { .. }) => {
            tracing::warn!(
                "Cannot open {} ({e}); leaving for the next check cycle",
                path.display()
            );
            return Ok(None);
        }
        Err(e) => {
            // Terminal before metadata: corrupt container or similar.
            // The source file stays where it is.
            job.advance(JobState::Failed);
            let record = record_failure(shared, &job, hash, &e).await?;
            return Ok(Some(record));
        }
    };

    job.advance(JobState::Validated);
    job.advance(JobState::Parsed);
    job.advance(JobState::MetadataResolved);

    // Serialize on content, then on the destination we may write.
    let _hash_guard = shared.hash_locks.acquire(&analysis.hash).await;
    let _path_guard = if analysis.reconciled.review.is_empty() {
        let dest = library::destination(
            &shared.config.paths.library,
            &analysis.reconciled.metadata,
            &shared.config.naming,
        );
        Some(shared.path_locks.acquire(&dest.to_string_lossy()).await)
    } else {
        None
    };

    job.advance(JobState::DuplicateChecked);

    let input = FinalizeInput {
        path: path.clone(),
        discovered_at: job.discovered_at.clone(),
        original_filename: file_name_of(&path),
        hash: hash.clone(),
        cbz: analysis.cbz,
        cover: analysis.cover,
        metadata: analysis.reconciled.metadata,
        review: analysis.reconciled.review,
        supersedes: None,
    };

    let result = {
        let shared = Arc::clone(shared);
        run_blocking(move || finalize(&shared, input)).await?
    };

    match result {
        Ok(record) => {
            job.advance(terminal_state(record.outcome));
            Ok(Some(record))
        }
        Err(e) => {
            job.advance(JobState::Failed);
            let record = record_failure(shared, &job, hash, &e).await?;
            Ok(Some(record))
        }
    }
}

fn terminal_state(outcome: Outcome) -> JobState {
    match outcome {
        Outcome::Filed => JobState::Filed,
        Outcome::Duplicate => JobState::Discarded,
        Outcome::NeedsReview => JobState::NeedsReview,
        Outcome::Failed => JobState::Failed,
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("blocking task failed: {e}")))
}

fn display_or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

// ---------------------------------------------------------------------------
// Analysis phase (read-only)
// ---------------------------------------------------------------------------

struct Analysis {
    hash: String,
    cbz: Cbz,
    cover: Option<Vec<u8>>,
    reconciled: Reconciled,
}

fn analyze(path: &Path, hash: String) -> Result<Analysis> {
    let cbz = Cbz::open(path)?;

    let filename = file_name_of(path);
    let parsed = comicshelf_parser::parse(&filename);
    let mut reconciled = reconcile::reconcile(&parsed, cbz.metadata());

    if cbz.images().is_empty() {
        reconciled
            .review
            .push("archive contains no page images".into());
    }

    let cover = match cbz.extract_cover() {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Could not read cover from {}: {e}", path.display());
            None
        }
    };

    Ok(Analysis {
        hash,
        cbz,
        cover,
        reconciled,
    })
}

// ---------------------------------------------------------------------------
// Finalize phase (holds the job's locks)
// ---------------------------------------------------------------------------

pub(crate) struct FinalizeInput {
    pub path: PathBuf,
    pub discovered_at: String,
    pub original_filename: String,
    pub hash: String,
    pub cbz: Cbz,
    pub cover: Option<Vec<u8>>,
    pub metadata: ComicMetadata,
    pub review: Vec<String>,
    pub supersedes: Option<RecordId>,
}

/// Classify, then either discard, route to review, or file.
///
/// The history append for a `filed` outcome happens after the library
/// move; it is the commit point of the whole job.
pub(crate) fn finalize(shared: &Shared, input: FinalizeInput) -> Result<HistoryRecord> {
    let conn = get_conn(&shared.pool)?;
    let paths = &shared.config.paths;

    match dedupe::classify(&conn, &input.hash, &input.metadata)? {
        Classification::ExactDuplicate(existing) => {
            if shared.config.processing.backup_enabled {
                if let Some(backup) = &paths.backup {
                    if let Err(e) = library::backup_copy(&input.path, backup) {
                        tracing::warn!("Backup of duplicate failed: {e}");
                    }
                }
            }
            let moved = library::move_to_dir(&input.path, &paths.duplicates_dir())?;
            tracing::info!(
                "Exact duplicate of record {}; moved to {}",
                existing.id,
                moved.display()
            );

            let mut new = NewRecord::new(&input.hash, &input.original_filename, Outcome::Duplicate);
            new.discovered_at = input.discovered_at;
            new.metadata = Some(input.metadata);
            new.detail = Some(format!("exact duplicate of record {}", existing.id));
            new.archive_path = Some(moved.to_string_lossy().into_owned());
            new.supersedes = input.supersedes;
            records::append(&conn, new)
        }

        Classification::MetadataConflict(existing) => {
            let mut new =
                NewRecord::new(&input.hash, &input.original_filename, Outcome::NeedsReview);
            new.discovered_at = input.discovered_at;
            new.detail = Some(format!(
                "slot ({}, vol {}, ch {}) already filed as '{}' with different content (record {})",
                input.metadata.series,
                display_or_dash(input.metadata.volume),
                display_or_dash(input.metadata.chapter),
                existing.original_filename,
                existing.id,
            ));
            new.metadata = Some(input.metadata);
            new.archive_path = Some(input.path.to_string_lossy().into_owned());
            new.supersedes = input.supersedes;
            records::append(&conn, new)
        }

        Classification::New if !input.review.is_empty() => {
            let mut new =
                NewRecord::new(&input.hash, &input.original_filename, Outcome::NeedsReview);
            new.discovered_at = input.discovered_at;
            new.detail = Some(input.review.join("; "));
            new.metadata = Some(input.metadata);
            new.archive_path = Some(input.path.to_string_lossy().into_owned());
            new.supersedes = input.supersedes;
            records::append(&conn, new)
        }

        Classification::New => file_archive(shared, &conn, input),
    }
}

/// The happy path: rewrite metadata, cache the cover, move into the
/// library, back up, delete the original, append the filed record.
fn file_archive(
    shared: &Shared,
    conn: &comicshelf_db::PooledConnection,
    input: FinalizeInput,
) -> Result<HistoryRecord> {
    let paths = &shared.config.paths;
    let canonical = canonical_filename(&input.metadata, &shared.config.naming, "cbz");

    std::fs::create_dir_all(&paths.processing)?;
    let workspace_out = paths.processing.join(&canonical);
    let info = ComicInfo::from_metadata(&input.metadata);

    // Cover handling is best-effort; a bad image never blocks filing.
    // An archive with its own cover page (or the first seen for a
    // volume) refreshes the cache; later chapters of the same volume
    // reuse the cached cover and get it inserted as a page.
    let mut cover_path: Option<PathBuf> = None;
    let mut cover_insert: Option<Vec<u8>> = None;
    match input.metadata.volume {
        None => {
            tracing::info!(
                "No volume number for {}; cover not cached",
                input.path.display()
            );
        }
        Some(volume) => {
            let series = &input.metadata.series;
            let cached = shared.covers.get(series, volume).unwrap_or_else(|e| {
                tracing::warn!("Cover lookup failed for {series} Vol.{volume}: {e}");
                None
            });
            match cached {
                Some(existing) if !input.cbz.has_cover_page() => {
                    match std::fs::read(&existing) {
                        Ok(bytes) => cover_insert = Some(bytes),
                        Err(e) => tracing::warn!(
                            "Could not read cached cover {}: {e}",
                            existing.display()
                        ),
                    }
                    cover_path = Some(existing);
                }
                _ => {
                    if let Some(bytes) = &input.cover {
                        match shared.covers.put(series, volume, bytes, &input.path) {
                            Ok(p) => cover_path = Some(p),
                            Err(e) => tracing::warn!(
                                "Cover cache failed for {}: {e}",
                                input.path.display()
                            ),
                        }
                    }
                }
            }
        }
    }

    let rewritten = input
        .cbz
        .rewrite(&info, cover_insert.as_deref(), &workspace_out)?;

    let dest = library::destination(&paths.library, &input.metadata, &shared.config.naming);
    if let Err(e) = library::file_into_library(&rewritten, &dest) {
        let _ = std::fs::remove_file(&rewritten);
        return Err(e);
    }

    if shared.config.processing.backup_enabled {
        if let Some(backup) = &paths.backup {
            if let Err(e) = library::backup_copy(&dest, backup) {
                tracing::warn!("Backup of filed archive failed: {e}");
            }
        }
    }

    if let Err(e) = std::fs::remove_file(&input.path) {
        tracing::warn!(
            "Could not remove original {} after filing: {e}",
            input.path.display()
        );
    }

    let mut new = NewRecord::new(&input.hash, &input.original_filename, Outcome::Filed);
    new.discovered_at = input.discovered_at;
    new.canonical_filename = Some(canonical);
    new.metadata = Some(input.metadata);
    new.library_path = Some(dest.to_string_lossy().into_owned());
    new.cover_path = cover_path.map(|p| p.to_string_lossy().into_owned());
    new.supersedes = input.supersedes;
    records::append(conn, new)
}

async fn record_failure(
    shared: &Arc<Shared>,
    job: &ProcessingJob,
    hash: String,
    error: &Error,
) -> Result<HistoryRecord> {
    let shared = Arc::clone(shared);
    let mut new = NewRecord::new(hash, file_name_of(&job.path), Outcome::Failed);
    new.discovered_at = job.discovered_at.clone();
    new.detail = Some(error.to_string());
    new.archive_path = Some(job.path.to_string_lossy().into_owned());

    run_blocking(move || {
        let conn = get_conn(&shared.pool)?;
        records::append(&conn, new)
    })
    .await?
}

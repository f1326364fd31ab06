pub mod settle;

pub use settle::SettleTracker;

use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use comicshelf_core::config::Config;
use comicshelf_db::{queries::records, DbPool};

use crate::dedupe::hash_file;

/// Watches the download directory and feeds the discovery queue with
/// files that have settled.
pub struct DirWatcher {
    config: Config,
    pool: DbPool,
    discovery_tx: Option<mpsc::Sender<PathBuf>>,
    watcher: Option<RecommendedWatcher>,
}

impl DirWatcher {
    pub fn new(config: Config, pool: DbPool, discovery_tx: mpsc::Sender<PathBuf>) -> Self {
        Self {
            config,
            pool,
            discovery_tx: Some(discovery_tx),
            watcher: None,
        }
    }

    /// Start watching the download directory.
    ///
    /// Pre-existing files are seeded into the settle tracker so a restart
    /// picks up anything dropped while the daemon was down.
    pub fn start(&mut self) -> Result<()> {
        let downloads = self.config.paths.downloads.clone();
        let extensions = self.config.watch.extensions.clone();
        let discovery_tx = self
            .discovery_tx
            .take()
            .context("Watcher already started")?;

        let (event_tx, mut event_rx) = mpsc::channel::<PathBuf>(100);

        let filter_exts = extensions.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    if event.kind.is_create() || event.kind.is_modify() {
                        for path in event.paths {
                            if is_archive_file(&path, &filter_exts) {
                                let _ = event_tx.blocking_send(path);
                            }
                        }
                    }
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        if downloads.exists() {
            watcher
                .watch(&downloads, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch directory: {}", downloads.display()))?;
            tracing::info!("Watching directory: {}", downloads.display());
        } else {
            anyhow::bail!("Watch directory does not exist: {}", downloads.display());
        }

        self.watcher = Some(watcher);

        let existing = scan_existing(&downloads, &extensions);
        if !existing.is_empty() {
            tracing::info!("Found {} pre-existing files to track", existing.len());
        }

        let quiet = self.config.watch.settle_secs;
        let poll = self.config.watch.poll_interval_secs.max(1);
        let pool = self.pool.clone();

        tokio::spawn(async move {
            let mut tracker = SettleTracker::new(quiet);
            for path in existing {
                tracker.touch(path);
            }

            let mut check_interval = tokio::time::interval(Duration::from_secs(poll));

            loop {
                tokio::select! {
                    maybe = event_rx.recv() => {
                        match maybe {
                            Some(path) => {
                                tracing::debug!("File event: {}", path.display());
                                tracker.touch(path);
                            }
                            // Watcher dropped; stop feeding the queue.
                            None => break,
                        }
                    }
                    _ = check_interval.tick() => {
                        for path in tracker.check() {
                            if let Some(retry) = enqueue(&pool, &discovery_tx, path).await {
                                tracker.touch(retry);
                            }
                        }
                    }
                }
            }
            tracing::info!("Directory watcher task stopped");
        });

        Ok(())
    }

    /// Stop watching. The discovery sender closes once in-flight settle
    /// checks finish, letting the worker pool drain.
    pub fn stop(&mut self) {
        self.watcher = None;
        tracing::info!("File watcher stopped");
    }
}

/// Cheap duplicate skip, then enqueue.
///
/// The history lookup here is an optimization to keep known content out
/// of the queue; the duplicate detector remains authoritative after the
/// per-hash lock is held. An unreadable file is handed back to the
/// caller so it re-enters the settle tracker for the next check cycle.
async fn enqueue(pool: &DbPool, tx: &mpsc::Sender<PathBuf>, path: PathBuf) -> Option<PathBuf> {
    let known = {
        let pool = pool.clone();
        let path = path.clone();
        tokio::task::spawn_blocking(move || -> comicshelf_core::Result<bool> {
            let hash = hash_file(&path)?;
            let conn = comicshelf_db::get_conn(&pool)?;
            records::any_with_hash(&conn, &hash)
        })
        .await
    };

    match known {
        Ok(Ok(true)) => {
            tracing::info!("Skipping already-seen content: {}", path.display());
            return None;
        }
        Ok(Ok(false)) => {}
        Ok(Err(e @ comicshelf_core::Error::Io { .. })) => {
            tracing::warn!(
                "Cannot read {} ({e}); retrying next check cycle",
                path.display()
            );
            return Some(path);
        }
        Ok(Err(e)) => {
            tracing::warn!("Pre-check failed for {}, enqueueing anyway: {e}", path.display());
        }
        Err(e) => {
            tracing::warn!("Pre-check task failed for {}: {e}", path.display());
        }
    }

    if tx.send(path.clone()).await.is_err() {
        tracing::warn!("Discovery queue closed; dropping {}", path.display());
    } else {
        tracing::info!("Queued for processing: {}", path.display());
    }
    None
}

fn scan_existing(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_archive_file(p, extensions))
        .collect()
}

/// Check if a file has one of the configured archive extensions.
pub fn is_archive_file(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension() else {
        return false;
    };
    let ext = ext.to_string_lossy().to_lowercase();
    extensions.iter().any(|e| e.to_lowercase() == ext)
}

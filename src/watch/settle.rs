//! Stability detection for files still being written.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Last observed shape of a pending file.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Snapshot {
    size: u64,
    mtime: Option<SystemTime>,
}

impl Snapshot {
    fn stat(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            size: meta.len(),
            mtime: meta.modified().ok(),
        })
    }
}

/// Tracks files and determines when they have settled (stopped changing).
///
/// A file is stable when its size and mtime are unchanged across the
/// configured quiet interval. Each check re-stats the file, so a file
/// that is still growing keeps resetting its own clock, and a settled
/// file is reported exactly once.
pub struct SettleTracker {
    pending: HashMap<PathBuf, (Snapshot, Instant)>,
    quiet: Duration,
}

impl SettleTracker {
    pub fn new(quiet_secs: u64) -> Self {
        Self {
            pending: HashMap::new(),
            quiet: Duration::from_secs(quiet_secs),
        }
    }

    /// Record that a file appeared or changed. Restarts its quiet clock.
    pub fn touch(&mut self, path: PathBuf) {
        match Snapshot::stat(&path) {
            Ok(snap) => {
                self.pending.insert(path, (snap, Instant::now()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.pending.remove(&path);
            }
            // Unreadable right now; keep whatever state we had and let the
            // next check cycle retry.
            Err(e) => {
                tracing::debug!("Could not stat {}: {e}", path.display());
                self.pending.entry(path).or_insert((
                    Snapshot { size: 0, mtime: None },
                    Instant::now(),
                ));
            }
        }
    }

    /// Number of files still waiting to settle.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Re-stat every pending file and return those that settled.
    ///
    /// Vanished files are dropped. Files that cannot be statted stay
    /// pending for the next cycle.
    pub fn check(&mut self) -> Vec<PathBuf> {
        let now = Instant::now();
        let mut settled = Vec::new();

        self.pending.retain(|path, (snap, since)| {
            let current = match Snapshot::stat(path) {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("Pending file vanished: {}", path.display());
                    return false;
                }
                Err(e) => {
                    tracing::debug!("Could not stat pending {}: {e}", path.display());
                    return true;
                }
            };

            if current != *snap {
                *snap = current;
                *since = now;
                return true;
            }

            if now.duration_since(*since) >= self.quiet {
                settled.push(path.clone());
                return false;
            }
            true
        });

        for path in &settled {
            tracing::info!("File settled: {}", path.display());
        }
        settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_file_settles_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cbz");
        std::fs::write(&path, b"done").unwrap();

        let mut tracker = SettleTracker::new(0);
        tracker.touch(path.clone());

        let settled = tracker.check();
        assert_eq!(settled, vec![path]);
        assert!(tracker.check().is_empty(), "must not fire twice");
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn growing_file_resets_its_clock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cbz");
        std::fs::write(&path, b"part").unwrap();

        let mut tracker = SettleTracker::new(3600);
        tracker.touch(path.clone());

        std::fs::write(&path, b"part two, larger now").unwrap();
        assert!(tracker.check().is_empty());
        assert_eq!(tracker.pending_count(), 1);
    }

    #[test]
    fn vanished_file_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cbz");
        std::fs::write(&path, b"x").unwrap();

        let mut tracker = SettleTracker::new(0);
        tracker.touch(path.clone());
        std::fs::remove_file(&path).unwrap();

        assert!(tracker.check().is_empty());
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn touch_on_missing_file_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cbz");
        std::fs::write(&path, b"x").unwrap();

        let mut tracker = SettleTracker::new(3600);
        tracker.touch(path.clone());
        std::fs::remove_file(&path).unwrap();
        tracker.touch(path);

        assert_eq!(tracker.pending_count(), 0);
    }
}

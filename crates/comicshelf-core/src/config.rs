//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for paths, watching, processing, and naming. Every section
//! defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub watch: WatchConfig,
    pub processing: ProcessingConfig,
    pub naming: NamingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            watch: WatchConfig::default(),
            processing: ProcessingConfig::default(),
            naming: NamingConfig::default(),
        }
    }
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    ///
    /// This is intentionally string-based so the caller can read the file
    /// however it sees fit (async, embedded, etc.).
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.paths.downloads == self.paths.library {
            warnings.push(
                "paths.downloads and paths.library are the same directory; filed archives would be re-ingested".into(),
            );
        }
        if self.processing.backup_enabled && self.paths.backup.is_none() {
            warnings.push("processing.backup_enabled is set but paths.backup is not".into());
        }
        if self.processing.workers == 0 {
            warnings.push("processing.workers is 0; no files will ever be processed".into());
        }
        if self.processing.queue_capacity == 0 {
            warnings.push("processing.queue_capacity is 0; discovery would block forever".into());
        }
        if self.watch.settle_secs == 0 {
            warnings.push(
                "watch.settle_secs is 0; partially written files may be picked up".into(),
            );
        }
        if self.watch.extensions.is_empty() {
            warnings.push("watch.extensions is empty; nothing will match".into());
        }
        if self.naming.volume_digits == 0 || self.naming.chapter_digits == 0 {
            warnings.push("naming digit widths must be at least 1".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Directory layout and database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory watched for incoming archives.
    pub downloads: PathBuf,
    /// Working area for in-flight jobs (`duplicates/` lives here).
    pub processing: PathBuf,
    /// Final filed library root.
    pub library: PathBuf,
    /// Cover image cache root.
    pub covers: PathBuf,
    /// Optional backup directory receiving a copy of every filed archive.
    pub backup: Option<PathBuf>,
    /// SQLite database file.
    pub db_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            downloads: PathBuf::from("./data/downloads"),
            processing: PathBuf::from("./data/processing"),
            library: PathBuf::from("./data/library"),
            covers: PathBuf::from("./data/covers"),
            backup: None,
            db_path: PathBuf::from("./data/comicshelf.db"),
        }
    }
}

impl PathsConfig {
    /// Discard directory for exact-duplicate archives.
    pub fn duplicates_dir(&self) -> PathBuf {
        self.processing.join("duplicates")
    }
}

/// File-system watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet interval a file must survive unchanged before it is considered
    /// fully written.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// How often pending files are re-checked for stability.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// File extensions (lowercase, no dot) eligible for ingestion.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_settle_secs() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    5
}
fn default_extensions() -> Vec<String> {
    vec!["cbz".into()]
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            settle_secs: default_settle_secs(),
            poll_interval_secs: default_poll_interval(),
            extensions: default_extensions(),
        }
    }
}

/// Worker pool and pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of concurrent pipeline workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Bound of the discovery queue between watcher and workers.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Copy each filed archive into `paths.backup` before deleting the
    /// original.
    pub backup_enabled: bool,
}

fn default_workers() -> usize {
    2
}
fn default_queue_capacity() -> usize {
    64
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            backup_enabled: false,
        }
    }
}

/// Canonical filename formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Zero-pad width for volume numbers.
    #[serde(default = "default_volume_digits")]
    pub volume_digits: usize,
    /// Zero-pad width for the whole part of chapter numbers.
    #[serde(default = "default_chapter_digits")]
    pub chapter_digits: usize,
}

fn default_volume_digits() -> usize {
    3
}
fn default_chapter_digits() -> usize {
    5
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            volume_digits: default_volume_digits(),
            chapter_digits: default_chapter_digits(),
        }
    }
}

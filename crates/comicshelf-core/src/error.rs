//! Unified error type for the comicshelf application.
//!
//! All crates funnel their failures into [`Error`]. Failures that are local
//! to one file's processing job (a corrupt archive, a filing I/O error)
//! never escape the job that produced them; the pipeline records them and
//! moves on.

use std::fmt;

/// Unified error type covering all failure modes in comicshelf.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "record", "cover").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A database operation failed.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An I/O operation failed. Transient for the job that hit it; the
    /// watcher retries unreadable files on its next check cycle.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The container is not a readable comic archive. Fatal for the job,
    /// never for the process; the source file is left in place.
    #[error("Corrupt archive [{path}]: {message}")]
    Archive {
        /// Path of the offending archive.
        path: String,
        /// Human-readable error description.
        message: String,
    },

    /// Embedded metadata could not be serialized.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// A failure during the final rewrite/move filing step.
    #[error("Filing error [{step}]: {message}")]
    Filing {
        /// The filing step that failed.
        step: String,
        /// Human-readable error description.
        message: String,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::Archive`].
    pub fn archive(path: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::Archive {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Filing`].
    pub fn filing(step: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Filing {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Whether this error marks the archive itself as unusable, as opposed
    /// to a transient environment failure.
    pub fn is_corrupt_archive(&self) -> bool {
        matches!(self, Error::Archive { .. })
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("record", "abc-123");
        assert_eq!(err.to_string(), "record not found: abc-123");
    }

    #[test]
    fn archive_display() {
        let err = Error::archive("/downloads/x.cbz", "not a zip archive");
        assert_eq!(
            err.to_string(),
            "Corrupt archive [/downloads/x.cbz]: not a zip archive"
        );
        assert!(err.is_corrupt_archive());
    }

    #[test]
    fn filing_display() {
        let err = Error::filing("move", "destination already exists");
        assert_eq!(
            err.to_string(),
            "Filing error [move]: destination already exists"
        );
        assert!(!err.is_corrupt_archive());
    }

    #[test]
    fn database_display() {
        let err = Error::database("connection refused");
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn result_alias() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok_fn().unwrap(), 42);
    }
}

//! comicshelf-core: shared types, IDs, errors, and configuration.
//!
//! This crate is the foundational dependency for all other comicshelf
//! crates, providing type-safe identifiers, a unified error type, the
//! canonical metadata model, and application configuration.

pub mod config;
pub mod error;
pub mod ids;
pub mod metadata;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use metadata::{canonical_filename, normalize_series, ChapterNumber, ComicMetadata};

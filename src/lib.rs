//! comicshelf: comic archive ingestion, deduplication, and library filing.
//!
//! The daemon watches a download directory for finished CBZ archives,
//! derives metadata from the filename and any embedded `ComicInfo.xml`,
//! detects duplicates against a durable history, and files archives into
//! the library under canonical names.

pub mod convert;
pub mod covers;
pub mod dedupe;
pub mod library;
pub mod pipeline;
pub mod reconcile;
pub mod review;
pub mod watch;

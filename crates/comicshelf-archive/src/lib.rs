//! comicshelf-archive: CBZ container access and embedded metadata.
//!
//! [`Cbz`] opens and validates a comic archive, classifies its page
//! images, and reads any embedded [`ComicInfo`] document tolerantly.
//! [`Cbz::rewrite`] synthesizes a new archive with updated metadata
//! (and optionally an inserted cover page) without ever mutating the
//! source file.

pub mod cbz;
pub mod comicinfo;
pub mod natsort;

pub use cbz::{Cbz, COVER_PAGE, METADATA_ENTRY};
pub use comicinfo::ComicInfo;

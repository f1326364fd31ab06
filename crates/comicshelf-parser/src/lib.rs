//! comicshelf-parser: filename parser for comic archive names.
//!
//! Extracts series, volume, and chapter information from names such as
//! `"Blue Period Vol.018 Ch.00076.cbz"`.
//!
//! # Quick start
//!
//! ```
//! use comicshelf_parser::parse;
//!
//! let c = parse("Blue Period Vol.018 Ch.00076.cbz");
//! assert_eq!(c.series.as_deref(), Some("Blue Period"));
//! assert_eq!(c.volume, Some(18));
//! assert_eq!(c.chapter.map(|ch| ch.as_f64()), Some(76.0));
//! ```

pub mod components;
mod rules;

pub use components::FilenameComponents;

use std::path::Path;

/// Parse a comic archive filename into structured components.
///
/// This is the primary entry point. The extension is stripped, then an
/// ordered rule table is applied to the stem; the first matching rule
/// wins. Parsing never fails: a name no rule recognizes yields empty
/// components, and the caller decides what to do with them.
///
/// # Examples
///
/// ```
/// let c = comicshelf_parser::parse("[Group] Series Name - Ch. 76.5.cbz");
/// assert_eq!(c.series.as_deref(), Some("Series Name"));
/// assert!(c.volume.is_none());
/// assert_eq!(c.chapter.map(|ch| ch.as_f64()), Some(76.5));
/// ```
pub fn parse(filename: &str) -> FilenameComponents {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    rules::apply(stem)
}

//! Output type for the filename parser.

use comicshelf_core::ChapterNumber;
use serde::{Deserialize, Serialize};

/// Structured components extracted from a comic archive filename.
///
/// Fields are populated on a best-effort basis; every field is optional
/// and is `None` when no rule matched the corresponding part of the name.
/// Release-group tags like `[Group]` are stripped and never retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilenameComponents {
    /// Series name, cleaned of bracket tags and trailing separators.
    pub series: Option<String>,

    /// Volume number.
    pub volume: Option<u32>,

    /// Chapter number; decimal chapters like `76.5` are preserved exactly.
    pub chapter: Option<ChapterNumber>,

    /// Chapter title text trailing the chapter number, when present.
    pub title: Option<String>,
}

impl FilenameComponents {
    /// Components with nothing recognized.
    pub fn empty() -> Self {
        Self {
            series: None,
            volume: None,
            chapter: None,
            title: None,
        }
    }
}

//! Canonical comic metadata model and filename formatting.
//!
//! [`ComicMetadata`] is the reconciled description of one archive; it is
//! what flows between the parser, the archive rewriter, the duplicate
//! detector, and the history store. Chapter numbers are stored as
//! fixed-point hundredths so split chapters like `76.5` compare exactly.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::config::NamingConfig;

// ---------------------------------------------------------------------------
// ChapterNumber
// ---------------------------------------------------------------------------

/// Chapter number with two decimal places of precision, stored as an
/// integer count of hundredths (`76.5` is stored as `7650`).
///
/// Fixed-point storage keeps equality and ordering exact, which the
/// duplicate detector relies on when matching series/volume/chapter slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChapterNumber(u32);

impl ChapterNumber {
    /// Build from an integer chapter number.
    pub fn from_whole(n: u32) -> Self {
        Self(n * 100)
    }

    /// Build from a float, rounding to the nearest hundredth. Returns
    /// `None` for negative or non-finite input.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let hundredths = (value * 100.0).round();
        if hundredths > u32::MAX as f64 {
            return None;
        }
        Some(Self(hundredths as u32))
    }

    /// The value as a float, for storage columns and display.
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// The whole part of the chapter number.
    pub fn whole(self) -> u32 {
        self.0 / 100
    }

    /// The fractional part in hundredths (0..=99).
    pub fn frac(self) -> u32 {
        self.0 % 100
    }

    /// Whether this is a plain integer chapter.
    pub fn is_whole(self) -> bool {
        self.frac() == 0
    }

    /// Format with the whole part zero-padded to `width` digits and the
    /// fractional part appended only when present: `padded(5)` renders
    /// `76.5` as `00076.5` and `76` as `00076`.
    pub fn padded(self, width: usize) -> String {
        if self.is_whole() {
            format!("{:0width$}", self.whole(), width = width)
        } else if self.frac() % 10 == 0 {
            format!("{:0width$}.{}", self.whole(), self.frac() / 10, width = width)
        } else {
            format!("{:0width$}.{:02}", self.whole(), self.frac(), width = width)
        }
    }
}

impl fmt::Display for ChapterNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole() {
            write!(f, "{}", self.whole())
        } else if self.frac() % 10 == 0 {
            write!(f, "{}.{}", self.whole(), self.frac() / 10)
        } else {
            write!(f, "{}.{:02}", self.whole(), self.frac())
        }
    }
}

impl FromStr for ChapterNumber {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|e| crate::Error::Validation(format!("invalid chapter number '{s}': {e}")))?;
        ChapterNumber::from_f64(value)
            .ok_or_else(|| crate::Error::Validation(format!("chapter number out of range: {s}")))
    }
}

impl Serialize for ChapterNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for ChapterNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        ChapterNumber::from_f64(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid chapter number: {value}")))
    }
}

// ---------------------------------------------------------------------------
// ComicMetadata
// ---------------------------------------------------------------------------

/// Reconciled metadata for one comic archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComicMetadata {
    /// Series name as it should appear in the library.
    pub series: String,
    pub volume: Option<u32>,
    pub chapter: Option<ChapterNumber>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ComicMetadata {
    /// Minimal metadata carrying only a series name.
    pub fn for_series(series: impl Into<String>) -> Self {
        Self {
            series: series.into(),
            volume: None,
            chapter: None,
            title: None,
            artist: None,
            summary: None,
            tags: Vec::new(),
        }
    }
}

/// Normalize a series name for comparison: lowercase, with runs of
/// whitespace collapsed to single spaces and the ends trimmed.
pub fn normalize_series(series: &str) -> String {
    series
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Replace characters that are unsafe in file and directory names.
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Build the canonical archive filename: `{Series} Vol.{NNN} Ch.{NNNNN}.{ext}`.
///
/// Segments with no value are omitted along with their label, so a
/// chapter-only file becomes `{Series} Ch.{NNNNN}.{ext}` and a file with
/// neither number is just `{Series}.{ext}`.
pub fn canonical_filename(meta: &ComicMetadata, naming: &NamingConfig, ext: &str) -> String {
    let mut name = sanitize_component(&meta.series);
    if let Some(volume) = meta.volume {
        name.push_str(&format!(
            " Vol.{:0width$}",
            volume,
            width = naming.volume_digits
        ));
    }
    if let Some(chapter) = meta.chapter {
        name.push_str(&format!(" Ch.{}", chapter.padded(naming.chapter_digits)));
    }
    format!("{name}.{ext}")
}

//! Metadata reconciliation between filename and embedded sources.
//!
//! The filename is the authoritative source for series, volume, chapter,
//! and title; embedded `ComicInfo.xml` values only fill fields the
//! filename left absent. Passthrough fields (artist, summary, tags) come
//! only from embedded metadata. Disagreements and gaps do not fail the
//! job; they surface as review flags.

use comicshelf_archive::ComicInfo;
use comicshelf_core::metadata::{normalize_series, ComicMetadata};
use comicshelf_parser::FilenameComponents;

/// Series used when neither source names one.
pub const UNKNOWN_SERIES: &str = "Unknown";

/// Result of reconciling the two metadata sources.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub metadata: ComicMetadata,
    /// Human-readable reasons this job needs operator review. Empty means
    /// the metadata is good enough to file.
    pub review: Vec<String>,
}

impl Reconciled {
    pub fn needs_review(&self) -> bool {
        !self.review.is_empty()
    }
}

/// Merge parsed filename components with embedded metadata.
///
/// Never fails; the worst input yields an `Unknown` series flagged for
/// review.
pub fn reconcile(parsed: &FilenameComponents, embedded: Option<&ComicInfo>) -> Reconciled {
    let mut review = Vec::new();

    let embedded_series = embedded
        .and_then(|e| e.series.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    let series = match (&parsed.series, &embedded_series) {
        (Some(from_name), Some(from_info)) => {
            if normalize_series(from_name) != normalize_series(from_info) {
                review.push(format!(
                    "series conflict: filename says '{from_name}', embedded metadata says '{from_info}'"
                ));
            }
            from_name.clone()
        }
        (Some(from_name), None) => from_name.clone(),
        (None, Some(from_info)) => from_info.clone(),
        (None, None) => {
            review.push("series could not be determined from filename or metadata".into());
            UNKNOWN_SERIES.to_string()
        }
    };

    let volume = parsed.volume.or_else(|| embedded.and_then(|e| e.parsed_volume()));
    let chapter = parsed
        .chapter
        .or_else(|| embedded.and_then(|e| e.parsed_number()));
    let title = parsed
        .title
        .clone()
        .or_else(|| embedded.and_then(|e| e.title.clone()));

    if volume.is_none() && chapter.is_none() {
        review.push("neither volume nor chapter number could be determined".into());
    }

    let metadata = ComicMetadata {
        series,
        volume,
        chapter,
        title,
        artist: embedded.and_then(|e| e.writer.clone()),
        summary: embedded.and_then(|e| e.summary.clone()),
        tags: embedded.map(|e| e.tag_list()).unwrap_or_default(),
    };

    Reconciled { metadata, review }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comicshelf_core::ChapterNumber;
    use comicshelf_parser::parse;

    fn info(series: Option<&str>, volume: Option<&str>, number: Option<&str>) -> ComicInfo {
        ComicInfo {
            series: series.map(String::from),
            volume: volume.map(String::from),
            number: number.map(String::from),
            ..ComicInfo::default()
        }
    }

    #[test]
    fn filename_wins_over_embedded() {
        let parsed = parse("Blue Period Vol.018 Ch.00076.cbz");
        let embedded = info(Some("Blue Period"), Some("17"), Some("75"));
        let r = reconcile(&parsed, Some(&embedded));

        assert!(!r.needs_review());
        assert_eq!(r.metadata.series, "Blue Period");
        assert_eq!(r.metadata.volume, Some(18));
        assert_eq!(r.metadata.chapter, ChapterNumber::from_f64(76.0));
    }

    #[test]
    fn embedded_fills_absent_fields() {
        let parsed = parse("One Piece - Chapter 1050.cbz");
        let embedded = info(Some("One Piece"), Some("103"), None);
        let r = reconcile(&parsed, Some(&embedded));

        assert!(!r.needs_review());
        assert_eq!(r.metadata.volume, Some(103));
        assert_eq!(r.metadata.chapter, ChapterNumber::from_f64(1050.0));
    }

    #[test]
    fn series_conflict_keeps_filename_and_flags() {
        let parsed = parse("Blue Period Vol.018 Ch.00076.cbz");
        let embedded = info(Some("Ao no Jidai"), None, None);
        let r = reconcile(&parsed, Some(&embedded));

        assert!(r.needs_review());
        assert_eq!(r.metadata.series, "Blue Period");
        let flag = &r.review[0];
        assert!(flag.contains("Blue Period"), "flag: {flag}");
        assert!(flag.contains("Ao no Jidai"), "flag: {flag}");
    }

    #[test]
    fn series_comparison_ignores_case_and_whitespace() {
        let parsed = parse("Blue Period Vol.018 Ch.00076.cbz");
        let embedded = info(Some("  blue   PERIOD "), None, None);
        let r = reconcile(&parsed, Some(&embedded));
        assert!(!r.needs_review());
    }

    #[test]
    fn unknown_series_flagged() {
        let parsed = parse("randomfile.cbz");
        let r = reconcile(&parsed, None);

        assert!(r.needs_review());
        assert_eq!(r.metadata.series, UNKNOWN_SERIES);
        assert_eq!(r.review.len(), 2);
    }

    #[test]
    fn missing_numbers_flagged() {
        let parsed = parse("randomfile.cbz");
        let embedded = info(Some("Some Series"), None, None);
        let r = reconcile(&parsed, Some(&embedded));

        assert!(r.needs_review());
        assert_eq!(r.metadata.series, "Some Series");
        assert!(r.review[0].contains("volume nor chapter"));
    }

    #[test]
    fn passthrough_fields_from_embedded_only() {
        let parsed = parse("Blue Period Vol.018 Ch.00076.cbz");
        let embedded = ComicInfo {
            writer: Some("Tsubasa Yamaguchi".into()),
            summary: Some("Art school drama.".into()),
            tags: Some("seinen, art".into()),
            ..info(Some("Blue Period"), None, None)
        };
        let r = reconcile(&parsed, Some(&embedded));

        assert_eq!(r.metadata.artist.as_deref(), Some("Tsubasa Yamaguchi"));
        assert_eq!(r.metadata.summary.as_deref(), Some("Art school drama."));
        assert_eq!(r.metadata.tags, vec!["seinen", "art"]);
    }

    #[test]
    fn empty_embedded_series_does_not_conflict() {
        let parsed = parse("Blue Period Vol.018 Ch.00076.cbz");
        let embedded = info(Some("   "), None, None);
        let r = reconcile(&parsed, Some(&embedded));
        assert!(!r.needs_review());
        assert_eq!(r.metadata.series, "Blue Period");
    }
}

//! Ordered pattern-rule table for comic filenames.
//!
//! Rules are tried most-specific first; the first match wins. All rules
//! are case-insensitive and anchored at the start of the file stem.
//! Bare digits inside a series name are never read as a volume or chapter
//! without an explicit marker token (`Vol.`, `Ch.`, `Chapter`, `v`/`c`),
//! except for the final catch-all which only accepts a trailing run of
//! three or more digits.

use regex::Regex;
use std::sync::LazyLock;

use comicshelf_core::ChapterNumber;

use crate::components::FilenameComponents;

static RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // "Series Name Vol.018 Ch.00076" with an optional trailing title
        r"(?i)^(?P<series>.+?)\s+Vol\.(?P<volume>\d+)\s+Ch\.(?P<chapter>[\d.]+)(?:\s+(?P<title>.+))?$",
        // "Series Name v18 c76"
        r"(?i)^(?P<series>.+?)\s+v(?P<volume>\d+)\s+c(?P<chapter>[\d.]+)",
        // "Series Name - Volume 18 - Chapter 76"
        r"(?i)^(?P<series>.+?)\s*-\s*Volume\s+(?P<volume>\d+)\s*-\s*Chapter\s+(?P<chapter>[\d.]+)",
        // "[Group] Series Name - Ch. 76" (no volume, optional title)
        r"(?i)^(?:\[.+?\]\s*)?(?P<series>.+?)\s*-\s*Ch(?:apter)?\.?\s*(?P<chapter>[\d.]+)(?:\s*-\s*(?P<title>.+))?$",
        // "Series Name Chapter 76" (no volume)
        r"(?i)^(?P<series>.+?)\s+Chapter\s+(?P<chapter>[\d.]+)",
        // "Series Name 076" (bare trailing chapter number, 3+ digits)
        r"(?i)^(?P<series>.+?)\s+(?P<chapter>\d{3,})$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("rule patterns are valid"))
    .collect()
});

static GROUP_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[.+?\]\s*").unwrap());

/// Apply the rule table to a file stem (no extension).
pub(crate) fn apply(stem: &str) -> FilenameComponents {
    for rule in RULES.iter() {
        let Some(caps) = rule.captures(stem) else {
            continue;
        };

        let series = caps
            .name("series")
            .map(|m| clean_series(m.as_str()))
            .filter(|s| !s.is_empty());
        let volume = caps
            .name("volume")
            .and_then(|m| m.as_str().parse::<u32>().ok());
        let chapter = caps
            .name("chapter")
            .and_then(|m| m.as_str().parse::<ChapterNumber>().ok());
        let title = caps
            .name("title")
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty());

        // A rule that matched but produced no usable chapter is treated as
        // a miss so a later, laxer rule gets a chance.
        if chapter.is_none() {
            continue;
        }

        return FilenameComponents {
            series,
            volume,
            chapter,
            title,
        };
    }

    FilenameComponents::empty()
}

/// Clean a raw series capture: strip `[Group]` tags, collapse whitespace,
/// drop trailing separator characters. Casing and non-ASCII are preserved.
pub(crate) fn clean_series(raw: &str) -> String {
    let stripped = GROUP_TAG.replace(raw.trim(), "");
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches([' ', '-', '_'])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_group_tag() {
        assert_eq!(clean_series("[Scans] Blue Period"), "Blue Period");
    }

    #[test]
    fn clean_strips_trailing_separators() {
        assert_eq!(clean_series("One Piece -"), "One Piece");
        assert_eq!(clean_series("One Piece _"), "One Piece");
    }

    #[test]
    fn clean_collapses_whitespace() {
        assert_eq!(clean_series("  Blue   Period "), "Blue Period");
    }

    #[test]
    fn clean_preserves_case_and_unicode() {
        assert_eq!(clean_series("ベルセルク BERSERK"), "ベルセルク BERSERK");
    }
}

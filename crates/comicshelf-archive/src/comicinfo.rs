//! `ComicInfo.xml` embedded metadata.
//!
//! The de-facto comic archive metadata format: a flat XML document of
//! optional string fields. Reading is tolerant, a malformed document
//! yields `None` rather than failing the archive open.

use comicshelf_core::metadata::{ChapterNumber, ComicMetadata};
use comicshelf_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Embedded `ComicInfo.xml` document.
///
/// All fields are optional strings, matching the wire format; numeric
/// accessors parse on demand and return `None` for unparseable values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "ComicInfo", default)]
pub struct ComicInfo {
    #[serde(rename = "Series", skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(rename = "Volume", skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    /// Chapter/issue number, decimal-capable ("76.5").
    #[serde(rename = "Number", skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(rename = "Title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "Writer", skip_serializing_if = "Option::is_none")]
    pub writer: Option<String>,
    #[serde(rename = "Summary", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Comma-separated tag list.
    #[serde(rename = "Tags", skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

impl ComicInfo {
    /// Tolerant parse. Returns `None` for non-UTF-8 or malformed XML,
    /// logging the reason; embedded metadata is best-effort only.
    pub fn from_xml(bytes: &[u8]) -> Option<Self> {
        let text = match std::str::from_utf8(bytes) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("ComicInfo.xml is not valid UTF-8: {e}");
                return None;
            }
        };
        match quick_xml::de::from_str::<ComicInfo>(text) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!("Malformed ComicInfo.xml ignored: {e}");
                None
            }
        }
    }

    /// Serialize to an XML document with declaration.
    pub fn to_xml(&self) -> Result<String> {
        let body = quick_xml::se::to_string(self)
            .map_err(|e| Error::Metadata(format!("ComicInfo serialization failed: {e}")))?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n{body}"))
    }

    /// Build a document carrying the resolved metadata for an archive.
    pub fn from_metadata(meta: &ComicMetadata) -> Self {
        Self {
            series: Some(meta.series.clone()),
            volume: meta.volume.map(|v| v.to_string()),
            number: meta.chapter.map(|c| c.to_string()),
            title: meta.title.clone(),
            writer: meta.artist.clone(),
            summary: meta.summary.clone(),
            tags: if meta.tags.is_empty() {
                None
            } else {
                Some(meta.tags.join(", "))
            },
        }
    }

    /// Volume as a number, when present and parseable.
    pub fn parsed_volume(&self) -> Option<u32> {
        self.volume.as_deref().and_then(|v| v.trim().parse().ok())
    }

    /// Chapter number, when present and parseable.
    pub fn parsed_number(&self) -> Option<ChapterNumber> {
        self.number.as_deref().and_then(|n| n.parse().ok())
    }

    /// Tags split out of the comma-separated field.
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .map(|t| {
                t.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_typical_document() {
        let xml = br#"<?xml version="1.0"?>
<ComicInfo>
  <Series>Blue Period</Series>
  <Volume>18</Volume>
  <Number>76.5</Number>
  <Title>A New Color</Title>
  <Writer>Tsubasa Yamaguchi</Writer>
  <Tags>seinen, art</Tags>
</ComicInfo>"#;
        let info = ComicInfo::from_xml(xml).unwrap();
        assert_eq!(info.series.as_deref(), Some("Blue Period"));
        assert_eq!(info.parsed_volume(), Some(18));
        assert_eq!(
            info.parsed_number(),
            ChapterNumber::from_f64(76.5)
        );
        assert_eq!(info.tag_list(), vec!["seinen", "art"]);
    }

    #[test]
    fn malformed_xml_yields_none() {
        assert!(ComicInfo::from_xml(b"<ComicInfo><Series>broken").is_none());
        assert!(ComicInfo::from_xml(b"not xml at all").is_none());
        assert!(ComicInfo::from_xml(&[0xff, 0xfe, 0x00]).is_none());
    }

    #[test]
    fn unknown_fields_ignored() {
        let xml = b"<ComicInfo><Series>X</Series><PageCount>180</PageCount></ComicInfo>";
        let info = ComicInfo::from_xml(xml).unwrap();
        assert_eq!(info.series.as_deref(), Some("X"));
    }

    #[test]
    fn unparseable_numbers_are_none() {
        let xml = b"<ComicInfo><Volume>eighteen</Volume><Number>abc</Number></ComicInfo>";
        let info = ComicInfo::from_xml(xml).unwrap();
        assert!(info.parsed_volume().is_none());
        assert!(info.parsed_number().is_none());
    }

    #[test]
    fn xml_roundtrip() {
        let meta = ComicMetadata {
            volume: Some(18),
            chapter: ChapterNumber::from_f64(76.5),
            title: Some("A New Color".into()),
            artist: Some("Tsubasa Yamaguchi".into()),
            tags: vec!["seinen".into(), "art".into()],
            ..ComicMetadata::for_series("Blue Period")
        };
        let info = ComicInfo::from_metadata(&meta);
        let xml = info.to_xml().unwrap();
        assert!(xml.starts_with("<?xml"));
        let back = ComicInfo::from_xml(xml.as_bytes()).unwrap();
        assert_eq!(info, back);
        assert_eq!(back.number.as_deref(), Some("76.5"));
    }

    #[test]
    fn empty_document_serializes() {
        let info = ComicInfo::default();
        let xml = info.to_xml().unwrap();
        assert!(xml.contains("ComicInfo"));
    }
}

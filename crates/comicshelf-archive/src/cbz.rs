//! CBZ container access.
//!
//! A [`Cbz`] is a read-only handle over one archive: the entry listing,
//! the natural-sorted image subset, and any embedded [`ComicInfo`] are
//! captured at open time. Rewriting never mutates the source; a new
//! archive is synthesized next to the requested output path and renamed
//! into place.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use comicshelf_core::{Error, Result};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::comicinfo::ComicInfo;
use crate::natsort::natural_cmp;

/// Well-known name of the embedded metadata entry.
pub const METADATA_ENTRY: &str = "ComicInfo.xml";

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Entry stems recognized as a dedicated cover page, in priority order.
const COVER_STEMS: [&str; 3] = ["000_cover", "cover", "000"];

/// Entry name used when a cover page is inserted during a rewrite.
pub const COVER_PAGE: &str = "000_cover.jpg";

/// Read-only handle over a comic archive.
#[derive(Debug)]
pub struct Cbz {
    path: PathBuf,
    entries: Vec<String>,
    images: Vec<String>,
    metadata: Option<ComicInfo>,
}

impl Cbz {
    /// Open and validate an archive.
    ///
    /// Returns [`Error::Io`] when the file cannot be accessed and
    /// [`Error::Archive`] when it is not a readable zip container.
    /// Malformed embedded metadata is tolerated and read as `None`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| Error::archive(path.display(), e.to_string()))?;

        let entries: Vec<String> = archive.file_names().map(String::from).collect();

        let mut images: Vec<String> = entries
            .iter()
            .filter(|name| is_image_entry(name))
            .cloned()
            .collect();
        images.sort_by(|a, b| natural_cmp(a, b));

        let metadata = match archive.by_name(METADATA_ENTRY) {
            Ok(mut entry) => {
                let mut bytes = Vec::new();
                entry.read_to_end(&mut bytes)?;
                ComicInfo::from_xml(&bytes)
            }
            Err(_) => None,
        };

        Ok(Self {
            path,
            entries,
            images,
            metadata,
        })
    }

    /// Path this handle was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entry names in archive order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Page image entries in natural order.
    pub fn images(&self) -> &[String] {
        &self.images
    }

    /// Embedded metadata, if present and well-formed.
    pub fn metadata(&self) -> Option<&ComicInfo> {
        self.metadata.as_ref()
    }

    /// The entry to use as the cover: a recognized cover stem if one
    /// exists, otherwise the natural-sort-first image.
    pub fn cover_entry(&self) -> Option<&str> {
        for stem in COVER_STEMS {
            if let Some(name) = self
                .images
                .iter()
                .find(|n| entry_stem(n).eq_ignore_ascii_case(stem))
            {
                return Some(name);
            }
        }
        self.images.first().map(String::as_str)
    }

    /// Whether the archive carries a dedicated cover page (a recognized
    /// cover stem), as opposed to only ordinary numbered pages.
    pub fn has_cover_page(&self) -> bool {
        self.images.iter().any(|name| {
            COVER_STEMS
                .iter()
                .any(|stem| entry_stem(name).eq_ignore_ascii_case(stem))
        })
    }

    /// Read one entry's bytes.
    pub fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let file = File::open(&self.path)?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| Error::archive(self.path.display(), e.to_string()))?;
        let mut entry = archive
            .by_name(name)
            .map_err(|_| Error::not_found("archive entry", name))?;
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Read the cover image bytes, if the archive has any images.
    pub fn extract_cover(&self) -> Result<Option<Vec<u8>>> {
        match self.cover_entry() {
            Some(name) => {
                let name = name.to_string();
                Ok(Some(self.read_entry(&name)?))
            }
            None => Ok(None),
        }
    }

    /// Synthesize a copy of this archive with `info` as its metadata,
    /// written to `output`. When `cover` is given its bytes are inserted
    /// as a leading [`COVER_PAGE`] entry.
    ///
    /// Unmodified entries are raw-copied (no recompression). The new
    /// archive is built under a temporary name in the output directory
    /// and renamed into place, so `output` never exists half-written.
    /// The source archive is not touched.
    pub fn rewrite(&self, info: &ComicInfo, cover: Option<&[u8]>, output: &Path) -> Result<PathBuf> {
        let xml = info.to_xml()?;

        let file = File::open(&self.path)?;
        let mut source = ZipArchive::new(file)
            .map_err(|e| Error::archive(self.path.display(), e.to_string()))?;

        let tmp_path = temp_sibling(output)?;
        let mut writer = ZipWriter::new(File::create(&tmp_path)?);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let result = (|| -> Result<()> {
            if let Some(bytes) = cover {
                writer
                    .start_file(COVER_PAGE, options)
                    .map_err(|e| Error::filing("rewrite", e.to_string()))?;
                writer.write_all(bytes)?;
            }
            for i in 0..source.len() {
                let entry = source
                    .by_index_raw(i)
                    .map_err(|e| Error::archive(self.path.display(), e.to_string()))?;
                if entry.name() == METADATA_ENTRY {
                    continue;
                }
                writer
                    .raw_copy_file(entry)
                    .map_err(|e| Error::filing("rewrite", e.to_string()))?;
            }
            writer
                .start_file(METADATA_ENTRY, options)
                .map_err(|e| Error::filing("rewrite", e.to_string()))?;
            writer.write_all(xml.as_bytes())?;
            writer
                .finish()
                .map_err(|e| Error::filing("rewrite", e.to_string()))?;
            Ok(())
        })();

        if let Err(e) = result {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e);
        }

        std::fs::rename(&tmp_path, output)?;
        Ok(output.to_path_buf())
    }
}

fn is_image_entry(name: &str) -> bool {
    let path = Path::new(name);
    if name.starts_with("__MACOSX") {
        return false;
    }
    if path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
    {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

fn entry_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

fn temp_sibling(output: &Path) -> Result<PathBuf> {
    let dir = output
        .parent()
        .ok_or_else(|| Error::filing("rewrite", "output path has no parent directory"))?;
    let name = output
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::filing("rewrite", "output path has no file name"))?;
    Ok(dir.join(format!(".{name}.part")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_cbz(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let options = FileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn open_lists_images_in_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cbz");
        build_cbz(
            &path,
            &[
                ("2.jpg", b"b" as &[u8]),
                ("10.jpg", b"c"),
                ("1.jpg", b"a"),
                ("notes.txt", b"x"),
            ],
        );

        let cbz = Cbz::open(&path).unwrap();
        assert_eq!(cbz.images(), &["1.jpg", "2.jpg", "10.jpg"]);
        assert_eq!(cbz.entries().len(), 4);
        assert!(cbz.metadata().is_none());
    }

    #[test]
    fn macosx_and_dotfiles_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cbz");
        build_cbz(
            &path,
            &[
                ("__MACOSX/1.jpg", b"x" as &[u8]),
                (".hidden.jpg", b"x"),
                ("pages/.DS_Store", b"x"),
                ("pages/1.jpg", b"a"),
            ],
        );

        let cbz = Cbz::open(&path).unwrap();
        assert_eq!(cbz.images(), &["pages/1.jpg"]);
    }

    #[test]
    fn cover_prefers_named_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cbz");
        build_cbz(
            &path,
            &[
                ("001.jpg", b"a" as &[u8]),
                ("cover.jpg", b"c"),
                ("002.jpg", b"b"),
            ],
        );

        let cbz = Cbz::open(&path).unwrap();
        assert_eq!(cbz.cover_entry(), Some("cover.jpg"));
        assert_eq!(cbz.extract_cover().unwrap().unwrap(), b"c");
    }

    #[test]
    fn cover_falls_back_to_first_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cbz");
        build_cbz(
            &path,
            &[("2.jpg", b"b" as &[u8]), ("10.jpg", b"c"), ("1.jpg", b"a")],
        );

        let cbz = Cbz::open(&path).unwrap();
        assert_eq!(cbz.cover_entry(), Some("1.jpg"));
    }

    #[test]
    fn embedded_metadata_read_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cbz");
        build_cbz(
            &path,
            &[
                ("1.jpg", b"a" as &[u8]),
                (
                    METADATA_ENTRY,
                    b"<ComicInfo><Series>Blue Period</Series></ComicInfo>",
                ),
            ],
        );

        let cbz = Cbz::open(&path).unwrap();
        assert_eq!(
            cbz.metadata().and_then(|m| m.series.as_deref()),
            Some("Blue Period")
        );
    }

    #[test]
    fn malformed_metadata_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cbz");
        build_cbz(
            &path,
            &[
                ("1.jpg", b"a" as &[u8]),
                (METADATA_ENTRY, b"<ComicInfo><Series>broken"),
            ],
        );

        let cbz = Cbz::open(&path).unwrap();
        assert!(cbz.metadata().is_none());
        assert_eq!(cbz.images(), &["1.jpg"]);
    }

    #[test]
    fn corrupt_archive_is_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.cbz");
        std::fs::write(&path, b"this is not a zip file").unwrap();

        let err = Cbz::open(&path).unwrap_err();
        assert!(err.is_corrupt_archive(), "got: {err}");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Cbz::open("/nonexistent/missing.cbz").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn rewrite_replaces_metadata_and_keeps_pages() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.cbz");
        build_cbz(
            &src,
            &[
                ("1.jpg", b"a" as &[u8]),
                ("2.jpg", b"b"),
                (METADATA_ENTRY, b"<ComicInfo><Series>Old</Series></ComicInfo>"),
            ],
        );

        let cbz = Cbz::open(&src).unwrap();
        let info = ComicInfo {
            series: Some("New Series".into()),
            ..ComicInfo::default()
        };
        let out = dir.path().join("out.cbz");
        let written = cbz.rewrite(&info, None, &out).unwrap();
        assert_eq!(written, out);

        let rewritten = Cbz::open(&out).unwrap();
        assert_eq!(rewritten.images(), &["1.jpg", "2.jpg"]);
        assert_eq!(
            rewritten.metadata().and_then(|m| m.series.as_deref()),
            Some("New Series")
        );
        assert_eq!(rewritten.read_entry("1.jpg").unwrap(), b"a");

        // Source untouched.
        let original = Cbz::open(&src).unwrap();
        assert_eq!(
            original.metadata().and_then(|m| m.series.as_deref()),
            Some("Old")
        );
    }

    #[test]
    fn rewrite_inserts_metadata_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.cbz");
        build_cbz(&src, &[("1.jpg", b"a" as &[u8])]);

        let cbz = Cbz::open(&src).unwrap();
        let info = ComicInfo {
            series: Some("Series".into()),
            ..ComicInfo::default()
        };
        let out = dir.path().join("out.cbz");
        cbz.rewrite(&info, None, &out).unwrap();

        let rewritten = Cbz::open(&out).unwrap();
        assert!(rewritten.metadata().is_some());
        assert!(rewritten.entries().iter().any(|e| e == METADATA_ENTRY));
    }

    #[test]
    fn rewrite_can_insert_cover_page() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.cbz");
        build_cbz(&src, &[("001.jpg", b"page" as &[u8])]);

        let cbz = Cbz::open(&src).unwrap();
        assert!(!cbz.has_cover_page());

        let out = dir.path().join("out.cbz");
        cbz.rewrite(&ComicInfo::default(), Some(b"cover bytes".as_slice()), &out)
            .unwrap();

        let rewritten = Cbz::open(&out).unwrap();
        assert!(rewritten.has_cover_page());
        assert_eq!(rewritten.cover_entry(), Some(COVER_PAGE));
        assert_eq!(rewritten.read_entry(COVER_PAGE).unwrap(), b"cover bytes");
        assert_eq!(rewritten.read_entry("001.jpg").unwrap(), b"page");
    }

    #[test]
    fn cover_page_detection_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cbz");
        build_cbz(
            &path,
            &[("Cover.jpg", b"c" as &[u8]), ("001.jpg", b"a")],
        );
        assert!(Cbz::open(&path).unwrap().has_cover_page());

        let plain = dir.path().join("plain.cbz");
        build_cbz(&plain, &[("001.jpg", b"a" as &[u8]), ("002.jpg", b"b")]);
        assert!(!Cbz::open(&plain).unwrap().has_cover_page());
    }
}

//! Cover thumbnail cache.
//!
//! One JPEG per (series, volume) under the covers directory, paired with
//! a bookkeeping row in the `covers` table. Writes overwrite; there is no
//! eviction.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::ImageFormat;

use comicshelf_core::metadata::sanitize_component;
use comicshelf_core::{Error, Result};
use comicshelf_db::queries::covers as cover_queries;
use comicshelf_db::{get_conn, DbPool};

/// Covers wider than this are downscaled before encoding.
const MAX_WIDTH: u32 = 500;

/// Filesystem plus DB cache of cover thumbnails keyed by (series, volume).
pub struct CoverCache {
    base_dir: PathBuf,
    pool: DbPool,
}

impl CoverCache {
    pub fn new(base_dir: PathBuf, pool: DbPool) -> Self {
        Self { base_dir, pool }
    }

    /// On-disk location for a key: `{base}/{series}/Vol.NNN/cover.jpg`.
    pub fn cover_path(&self, series: &str, volume: u32) -> PathBuf {
        self.base_dir
            .join(sanitize_component(series))
            .join(format!("Vol.{volume:03}"))
            .join("cover.jpg")
    }

    /// Decode, resize if needed, re-encode as JPEG, and store.
    ///
    /// Returns the path of the written thumbnail. A later put for the same
    /// key replaces both the file and the DB row.
    pub fn put(
        &self,
        series: &str,
        volume: u32,
        data: &[u8],
        source_path: &Path,
    ) -> Result<PathBuf> {
        let img = image::load_from_memory(data)
            .map_err(|e| Error::Metadata(format!("cover image decode failed: {e}")))?;

        let img = if img.width() > MAX_WIDTH {
            img.resize(MAX_WIDTH, u32::MAX, FilterType::Lanczos3)
        } else {
            img
        };

        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg)
            .map_err(|e| Error::Metadata(format!("cover JPEG encode failed: {e}")))?;

        let path = self.cover_path(series, volume);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, buf.into_inner())?;

        let conn = get_conn(&self.pool)?;
        cover_queries::upsert_cover(
            &conn,
            series,
            volume,
            &path.to_string_lossy(),
            &source_path.to_string_lossy(),
        )?;

        tracing::debug!("Cached cover for {series} Vol.{volume:03} at {}", path.display());
        Ok(path)
    }

    /// Look up a cached cover, preferring the expected on-disk location
    /// and falling back to the DB row.
    pub fn get(&self, series: &str, volume: u32) -> Result<Option<PathBuf>> {
        let path = self.cover_path(series, volume);
        if path.is_file() {
            return Ok(Some(path));
        }

        let conn = get_conn(&self.pool)?;
        match cover_queries::get_cover(&conn, series, volume)? {
            Some(row) => {
                let recorded = PathBuf::from(row.path);
                if recorded.is_file() {
                    Ok(Some(recorded))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }
}

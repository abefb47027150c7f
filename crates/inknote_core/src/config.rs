//! Storage layout and image tuning.
//!
//! # Responsibility
//! - Resolve where the notebook document and image files live.
//! - Hold the fixed limits used when storing and placing images.
//!
//! # Invariants
//! - The document and the image directory always share one data root.

use crate::model::geometry::Size;
use std::path::{Path, PathBuf};

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "INKNOTE_DATA_DIR";
pub const DOCUMENT_FILE_NAME: &str = "notebooks.json";
pub const IMAGES_DIR_NAME: &str = "PageImages";
const FALLBACK_DIR_NAME: &str = "inknote";

/// On-disk layout beneath the application's private data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolves the data root from `INKNOTE_DATA_DIR`, falling back to a
    /// directory under the system temp dir.
    pub fn from_env() -> Self {
        if let Ok(raw) = std::env::var(DATA_DIR_ENV) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Self::new(trimmed);
            }
        }
        Self::new(std::env::temp_dir().join(FALLBACK_DIR_NAME))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn document_path(&self) -> PathBuf {
        self.data_dir.join(DOCUMENT_FILE_NAME)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join(IMAGES_DIR_NAME)
    }
}

/// Limits applied by the image file cache and page sessions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSettings {
    /// Longest side, in pixels, an image is stored at.
    pub max_stored_dimension: u32,
    /// JPEG quality (1-100) for stored images.
    pub jpeg_quality: u8,
    /// Longest side, in page points, of a newly placed content image.
    pub max_placed_dimension: f64,
    /// Page canvas used to center newly placed images.
    pub canvas_size: Size,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            max_stored_dimension: 2048,
            jpeg_quality: 80,
            max_placed_dimension: 300.0,
            canvas_size: Size::new(768.0, 1024.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{StorageConfig, DOCUMENT_FILE_NAME, IMAGES_DIR_NAME};
    use std::path::Path;

    #[test]
    fn layout_shares_one_root() {
        let config = StorageConfig::new("/data/inknote");
        assert_eq!(
            config.document_path(),
            Path::new("/data/inknote").join(DOCUMENT_FILE_NAME)
        );
        assert_eq!(
            config.images_dir(),
            Path::new("/data/inknote").join(IMAGES_DIR_NAME)
        );
    }
}

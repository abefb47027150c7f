//! Content and background image storage.
//!
//! # Responsibility
//! - Store user-provided image bytes as files in one directory.
//! - Serve decoded images through a shared in-memory cache.
//! - Run disk reads off the caller's task, with cooperative cancellation.
//!
//! # Invariants
//! - File names are generated UUIDs; callers never choose them.
//! - Lookups are confined to the image directory (base name only).

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod file_cache;

pub use file_cache::{ImageFileCache, ImageLoadTask, StoredImage};

pub type ImageResult<T> = Result<T, ImageStoreError>;

/// Failure while persisting or reading an image file.
#[derive(Debug)]
pub enum ImageStoreError {
    /// Input bytes are not a decodable image.
    Decode(image::ImageError),
    /// Re-encoding for storage failed.
    Encode(image::ImageError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The blocking worker running the save panicked or was aborted.
    Worker(tokio::task::JoinError),
}

impl Display for ImageStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(err) => write!(f, "failed to decode image: {err}"),
            Self::Encode(err) => write!(f, "failed to encode image: {err}"),
            Self::Io { path, source } => {
                write!(f, "image io error at `{}`: {source}", path.display())
            }
            Self::Worker(err) => write!(f, "image worker failed: {err}"),
        }
    }
}

impl Error for ImageStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Decode(err) | Self::Encode(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Worker(err) => Some(err),
        }
    }
}

/// Shared cancellation flag for in-flight loads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

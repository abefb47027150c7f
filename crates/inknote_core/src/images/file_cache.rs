//! Image file cache.
//!
//! # Responsibility
//! - Save, load and delete image files under a dedicated directory.
//! - Keep decoded images in memory until memory pressure clears them.
//!
//! # Invariants
//! - The cache map lock is held only for the map access itself, never
//!   across disk I/O or decoding.
//! - A cancelled load returns `None` and never populates the cache.
//! - `clear()` never touches disk.

use super::{CancelToken, ImageResult, ImageStoreError};
use crate::config::ImageSettings;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use uuid::Uuid;

const STORED_IMAGE_EXTENSION: &str = "jpg";

/// Result of persisting one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Generated file name, relative to the image directory.
    pub file_name: String,
    /// Pixel width as stored (after downscaling).
    pub width: u32,
    /// Pixel height as stored (after downscaling).
    pub height: u32,
}

type ImageMap = HashMap<String, Arc<DynamicImage>>;

struct CacheState {
    dir: PathBuf,
    settings: ImageSettings,
    decoded: Mutex<ImageMap>,
}

/// Disk-backed image store with an in-memory decoded cache.
///
/// Clones share the same directory and cache.
#[derive(Clone)]
pub struct ImageFileCache {
    state: Arc<CacheState>,
}

impl ImageFileCache {
    pub fn new(dir: impl Into<PathBuf>, settings: ImageSettings) -> Self {
        Self {
            state: Arc::new(CacheState {
                dir: dir.into(),
                settings,
                decoded: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.state.dir
    }

    pub fn settings(&self) -> &ImageSettings {
        &self.state.settings
    }

    /// Persists `bytes` as a new image file on the blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn save(&self, bytes: Vec<u8>) -> ImageResult<StoredImage> {
        let cache = self.clone();
        tokio::task::spawn_blocking(move || cache.save_blocking(&bytes))
            .await
            .map_err(ImageStoreError::Worker)?
    }

    /// Persists `bytes` as a new image file and returns its generated name.
    ///
    /// Images larger than `max_stored_dimension` on either side are scaled
    /// down, preserving aspect ratio. The directory is created on demand.
    pub fn save_blocking(&self, bytes: &[u8]) -> ImageResult<StoredImage> {
        let decoded = image::load_from_memory(bytes).map_err(ImageStoreError::Decode)?;
        let limit = self.state.settings.max_stored_dimension;
        let (width, height) = decoded.dimensions();
        let bounded = if width > limit || height > limit {
            decoded.resize(limit, limit, FilterType::Lanczos3)
        } else {
            decoded
        };
        let stored = DynamicImage::ImageRgb8(bounded.to_rgb8());

        let mut encoded = Vec::new();
        stored
            .write_with_encoder(JpegEncoder::new_with_quality(
                &mut encoded,
                self.state.settings.jpeg_quality,
            ))
            .map_err(ImageStoreError::Encode)?;

        fs::create_dir_all(&self.state.dir).map_err(|source| ImageStoreError::Io {
            path: self.state.dir.clone(),
            source,
        })?;
        let file_name = format!("{}.{STORED_IMAGE_EXTENSION}", Uuid::new_v4());
        let path = self.state.dir.join(&file_name);
        fs::write(&path, &encoded).map_err(|source| ImageStoreError::Io {
            path: path.clone(),
            source,
        })?;

        let (width, height) = stored.dimensions();
        self.decoded_map()
            .insert(file_name.clone(), Arc::new(stored));
        info!(
            "event=image_save module=images status=ok file={} width={} height={} bytes={}",
            file_name,
            width,
            height,
            encoded.len()
        );

        Ok(StoredImage {
            file_name,
            width,
            height,
        })
    }

    /// Loads one image, reading from disk on the blocking pool on a miss.
    ///
    /// Returns `None` when the name is invalid, the file is missing or
    /// unreadable, or `cancel` fires before or after the disk read.
    pub async fn load(&self, file_name: &str, cancel: &CancelToken) -> Option<Arc<DynamicImage>> {
        let key = self.cache_key(file_name)?;
        if let Some(hit) = self.cached(&key) {
            return Some(hit);
        }
        if cancel.is_cancelled() {
            return None;
        }

        let path = self.state.dir.join(&key);
        let read = tokio::task::spawn_blocking(move || read_image(&path)).await;
        if cancel.is_cancelled() {
            debug!("event=image_load module=images status=cancelled file={}", key);
            return None;
        }

        match read {
            Ok(result) => self.finish_load(key, result),
            Err(err) => {
                error!(
                    "event=image_load module=images status=error file={} error={}",
                    key, err
                );
                None
            }
        }
    }

    /// Reads the stored file bytes of one image on the blocking pool.
    ///
    /// Same `None` cases as [`ImageFileCache::load`]; the decoded cache is
    /// not consulted.
    pub async fn load_bytes(&self, file_name: &str, cancel: &CancelToken) -> Option<Vec<u8>> {
        let key = self.cache_key(file_name)?;
        if cancel.is_cancelled() {
            return None;
        }
        let path = self.state.dir.join(&key);
        let read = tokio::task::spawn_blocking(move || fs::read(path)).await;
        if cancel.is_cancelled() {
            return None;
        }
        match read {
            Ok(Ok(bytes)) => Some(bytes),
            Ok(Err(err)) if err.kind() == io::ErrorKind::NotFound => None,
            Ok(Err(err)) => {
                warn!(
                    "event=image_read module=images status=error file={} error={}",
                    key, err
                );
                None
            }
            Err(err) => {
                error!(
                    "event=image_read module=images status=error file={} error={}",
                    key, err
                );
                None
            }
        }
    }

    /// Synchronous variant of [`ImageFileCache::load`] for non-UI callers.
    pub fn load_blocking(&self, file_name: &str) -> Option<Arc<DynamicImage>> {
        let key = self.cache_key(file_name)?;
        if let Some(hit) = self.cached(&key) {
            return Some(hit);
        }
        let result = read_image(&self.state.dir.join(&key));
        self.finish_load(key, result)
    }

    /// Starts a detached load task for `file_name`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_load(&self, file_name: impl Into<String>) -> ImageLoadTask {
        let file_name = file_name.into();
        let cancel = CancelToken::new();
        let cache = self.clone();
        let task_name = file_name.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move { cache.load(&task_name, &task_cancel).await });
        ImageLoadTask {
            file_name,
            cancel,
            handle,
        }
    }

    /// Removes the file and the cache entry. A missing file is only logged.
    ///
    /// The file goes first so a load finishing concurrently cannot re-insert
    /// the entry afterwards.
    pub fn delete(&self, file_name: &str) {
        let Some(key) = self.cache_key(file_name) else {
            return;
        };

        let path = self.state.dir.join(&key);
        let removed = fs::remove_file(&path);
        self.decoded_map().remove(&key);
        match removed {
            Ok(()) => info!("event=image_delete module=images status=ok file={}", key),
            Err(err) if err.kind() == io::ErrorKind::NotFound => warn!(
                "event=image_delete module=images status=skipped reason=missing_file file={}",
                key
            ),
            Err(err) => error!(
                "event=image_delete module=images status=error file={} error={}",
                key, err
            ),
        }
    }

    /// Drops every decoded image held in memory.
    pub fn clear(&self) {
        let dropped = {
            let mut decoded = self.decoded_map();
            let count = decoded.len();
            decoded.clear();
            count
        };
        info!(
            "event=image_cache_clear module=images status=ok dropped={}",
            dropped
        );
    }

    /// Whether a file with this name exists in the image directory.
    pub fn contains_file(&self, file_name: &str) -> bool {
        sanitize_file_name(file_name)
            .map(|key| self.state.dir.join(key).is_file())
            .unwrap_or(false)
    }

    pub fn cached_len(&self) -> usize {
        self.decoded_map().len()
    }

    fn cache_key(&self, file_name: &str) -> Option<String> {
        let key = sanitize_file_name(file_name);
        if key.is_none() {
            warn!(
                "event=image_lookup module=images status=rejected reason=invalid_name name_len={}",
                file_name.len()
            );
        }
        key
    }

    fn cached(&self, key: &str) -> Option<Arc<DynamicImage>> {
        self.decoded_map().get(key).cloned()
    }

    fn finish_load(
        &self,
        key: String,
        result: ImageResult<Option<DynamicImage>>,
    ) -> Option<Arc<DynamicImage>> {
        match result {
            Ok(Some(image)) => {
                let mut decoded = self.decoded_map();
                if !self.state.dir.join(&key).is_file() {
                    debug!(
                        "event=image_load module=images status=discarded reason=deleted file={}",
                        key
                    );
                    return None;
                }
                let image = Arc::new(image);
                decoded.insert(key, Arc::clone(&image));
                Some(image)
            }
            Ok(None) => {
                debug!(
                    "event=image_load module=images status=missing file={}",
                    key
                );
                None
            }
            Err(err) => {
                warn!(
                    "event=image_load module=images status=error file={} error={}",
                    key, err
                );
                None
            }
        }
    }

    fn decoded_map(&self) -> MutexGuard<'_, ImageMap> {
        self.state
            .decoded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a detached image load.
///
/// Captures only the file name and its cancel flag.
pub struct ImageLoadTask {
    file_name: String,
    cancel: CancelToken,
    handle: JoinHandle<Option<Arc<DynamicImage>>>,
}

impl ImageLoadTask {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Waits for the load; `None` when missing, failed or cancelled.
    pub async fn wait(self) -> Option<Arc<DynamicImage>> {
        self.handle.await.ok().flatten()
    }
}

/// Reduces a caller-supplied name to its final path component.
///
/// Returns `None` for names with no usable base component (`""`, `..`).
pub(crate) fn sanitize_file_name(file_name: &str) -> Option<String> {
    let base = Path::new(file_name.trim()).file_name()?.to_str()?;
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

fn read_image(path: &Path) -> ImageResult<Option<DynamicImage>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ImageStoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    image::load_from_memory(&bytes)
        .map(Some)
        .map_err(ImageStoreError::Decode)
}

#[cfg(test)]
mod tests {
    use super::{sanitize_file_name, ImageFileCache};
    use crate::config::ImageSettings;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    #[test]
    fn load_finishing_after_delete_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ImageFileCache::new(dir.path().join("PageImages"), ImageSettings::default());
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let stored = cache.save_blocking(&png).unwrap();
        cache.clear();
        let decoded = cache
            .load_blocking(&stored.file_name)
            .map(|image| (*image).clone())
            .unwrap();
        cache.clear();

        cache.delete(&stored.file_name);
        let late = cache.finish_load(stored.file_name.clone(), Ok(Some(decoded)));

        assert!(late.is_none());
        assert_eq!(cache.cached_len(), 0);
    }

    #[test]
    fn sanitize_keeps_only_base_component() {
        assert_eq!(
            sanitize_file_name("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_file_name("nested/dir/a.jpg").as_deref(),
            Some("a.jpg")
        );
        assert_eq!(sanitize_file_name("plain.jpg").as_deref(), Some("plain.jpg"));
    }

    #[test]
    fn sanitize_rejects_names_without_base() {
        assert_eq!(sanitize_file_name(""), None);
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name("/"), None);
    }
}

//! Page editing session.
//!
//! # Responsibility
//! - Own the working copy of one open page.
//! - Load ink data lazily, once, when the page becomes visible.
//! - Apply background/image edits and write them back through the store.
//!
//! # Invariants
//! - Ink is written back only if the `Loaded` state was reached; a session
//!   that was never visible must not replace stored ink with an empty canvas.
//! - Every persist re-reads the parent notebook from the store and replaces
//!   this page by id, so edits from other sessions on the same notebook are
//!   kept.
//! - Image storage failures of explicit edits are returned to the caller.

use crate::images::{CancelToken, ImageFileCache, ImageLoadTask, ImageStoreError, StoredImage};
use crate::model::geometry::{Point, Size};
use crate::model::notebook::NotebookId;
use crate::model::page::{BackgroundLayer, BackgroundType, Page, PageId, PageImage, PageImageId};
use crate::service::ink::{InkCodec, InkDrawing};
use crate::store::NotebookRepository;
use image::DynamicImage;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type SessionResult<T> = Result<T, PageSessionError>;

/// Errors returned by page session edits.
#[derive(Debug)]
pub enum PageSessionError {
    /// Image bytes could not be stored.
    Image(ImageStoreError),
    /// Parent notebook no longer exists in the store.
    NotebookNotFound(NotebookId),
    /// Page no longer exists in its notebook.
    PageNotFound(PageId),
    /// Content image id is not on this page.
    ImageNotFound(PageImageId),
}

impl Display for PageSessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image(err) => write!(f, "{err}"),
            Self::NotebookNotFound(id) => write!(f, "notebook not found: {id}"),
            Self::PageNotFound(id) => write!(f, "page not found: {id}"),
            Self::ImageNotFound(id) => write!(f, "page image not found: {id}"),
        }
    }
}

impl Error for PageSessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Image(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ImageStoreError> for PageSessionError {
    fn from(value: ImageStoreError) -> Self {
        Self::Image(value)
    }
}

/// Observable phase of the lazy ink load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InkState {
    NotLoaded,
    Loading,
    Loaded,
}

enum InkSlot {
    NotLoaded,
    Loading,
    Loaded(InkDrawing),
}

/// Explicit placement for a new content image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    pub position: Point,
    pub size: Size,
}

/// Rendering outcome for one referenced image.
#[derive(Debug, Clone)]
pub enum ImageSlot {
    Ready(Arc<DynamicImage>),
    /// File is missing, unreadable, or the load was cancelled.
    Placeholder,
}

/// Controller for one open page.
pub struct PageSession<R: NotebookRepository> {
    repo: R,
    images: ImageFileCache,
    codec: Arc<dyn InkCodec>,
    notebook_id: NotebookId,
    page: Page,
    ink: Mutex<InkSlot>,
    loads: Mutex<Vec<CancelToken>>,
}

impl<R: NotebookRepository> PageSession<R> {
    /// Opens a session over the page's current stored state.
    pub fn open(
        repo: R,
        images: ImageFileCache,
        codec: Arc<dyn InkCodec>,
        notebook_id: NotebookId,
        page_id: PageId,
    ) -> SessionResult<Self> {
        let notebook = repo
            .notebook(notebook_id)
            .ok_or(PageSessionError::NotebookNotFound(notebook_id))?;
        let page = notebook
            .page(page_id)
            .cloned()
            .ok_or(PageSessionError::PageNotFound(page_id))?;

        Ok(Self {
            repo,
            images,
            codec,
            notebook_id,
            page,
            ink: Mutex::new(InkSlot::NotLoaded),
            loads: Mutex::new(Vec::new()),
        })
    }

    pub fn notebook_id(&self) -> NotebookId {
        self.notebook_id
    }

    pub fn page_id(&self) -> PageId {
        self.page.id
    }

    /// Working copy of the page, including unsaved ink state.
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn ink_state(&self) -> InkState {
        match *self.ink_slot() {
            InkSlot::NotLoaded => InkState::NotLoaded,
            InkSlot::Loading => InkState::Loading,
            InkSlot::Loaded(_) => InkState::Loaded,
        }
    }

    /// Loads ink data the first time the page becomes visible.
    ///
    /// Concurrent and repeated calls collapse into one load; callers that
    /// lose the race return immediately. Undecodable data yields an empty
    /// drawing. Dropping the future mid-load returns the session to
    /// `NotLoaded`, so a later call starts over.
    pub async fn become_visible(&self) {
        {
            let mut ink = self.ink_slot();
            if !matches!(*ink, InkSlot::NotLoaded) {
                return;
            }
            *ink = InkSlot::Loading;
        }
        let _loading = LoadingGuard { slot: &self.ink };

        let data = self.page.drawing_data.clone();
        let codec = Arc::clone(&self.codec);
        let page_id = self.page.id;
        let drawing =
            match tokio::task::spawn_blocking(move || decode_drawing(codec.as_ref(), data, page_id))
                .await
            {
                Ok(drawing) => drawing,
                Err(err) => {
                    warn!(
                        "event=ink_load module=page_session status=error page_id={} error={}",
                        page_id, err
                    );
                    InkDrawing::empty()
                }
            };

        *self.ink_slot() = InkSlot::Loaded(drawing);
    }

    /// Current drawing, once loaded.
    pub fn drawing(&self) -> Option<InkDrawing> {
        match &*self.ink_slot() {
            InkSlot::Loaded(drawing) => Some(drawing.clone()),
            _ => None,
        }
    }

    /// Replaces the live drawing. Ignored (returns `false`) before load.
    pub fn update_drawing(&self, drawing: InkDrawing) -> bool {
        let mut ink = self.ink_slot();
        match &mut *ink {
            InkSlot::Loaded(current) => {
                *current = drawing;
                true
            }
            _ => {
                debug!(
                    "event=ink_update module=page_session status=skipped reason=not_loaded page_id={}",
                    self.page.id
                );
                false
            }
        }
    }

    /// Writes the live drawing back to the page and the store.
    ///
    /// Returns `Ok(false)` without touching storage when ink was never
    /// loaded or is unchanged. An empty drawing on a page without stored ink
    /// counts as unchanged.
    pub fn save_drawing(&mut self) -> SessionResult<bool> {
        let encoded = match &*self.ink_slot() {
            InkSlot::Loaded(drawing) => self.codec.encode(drawing),
            _ => return Ok(false),
        };
        let unchanged = match self.page.drawing_data.as_deref() {
            Some(stored) => stored == encoded.as_slice(),
            None => encoded.is_empty(),
        };
        if unchanged {
            return Ok(false);
        }

        self.page.drawing_data = Some(encoded);
        self.persist()?;
        Ok(true)
    }

    /// Tears the session down: cancels in-flight loads, then saves ink.
    pub fn close(mut self) -> SessionResult<()> {
        self.cancel_loads();
        self.save_drawing()?;
        Ok(())
    }

    pub fn set_background_type(&mut self, background_type: BackgroundType) -> SessionResult<()> {
        self.page.background_type = background_type;
        self.persist()
    }

    /// Stores a new background image and switches the page to it.
    ///
    /// The previously referenced background file is deleted when it differs
    /// from the new one.
    pub async fn set_background_image(&mut self, bytes: Vec<u8>) -> SessionResult<StoredImage> {
        let stored = self.images.save(bytes).await?;
        if let Some(previous) = self.page.background_image.take() {
            if previous != stored.file_name {
                self.images.delete(&previous);
            }
        }
        self.page.background_image = Some(stored.file_name.clone());
        self.page.background_type = BackgroundType::CustomImage;
        self.persist()?;
        Ok(stored)
    }

    /// Stores image bytes and places them on the page.
    ///
    /// Without an explicit placement the image is centered on the canvas and
    /// scaled to fit `max_placed_dimension`.
    pub async fn add_image(
        &mut self,
        bytes: Vec<u8>,
        placement: Option<ImagePlacement>,
    ) -> SessionResult<PageImage> {
        let stored = self.images.save(bytes).await?;
        let placement = placement.unwrap_or_else(|| self.default_placement(&stored));
        let image = PageImage::new(stored.file_name, placement.position, placement.size);
        self.page.images.push(image.clone());
        self.persist()?;
        info!(
            "event=page_image_add module=page_session status=ok page_id={} image_id={}",
            self.page.id, image.id
        );
        Ok(image)
    }

    /// Removes a content image and deletes its backing file.
    pub fn remove_image(&mut self, image_id: PageImageId) -> SessionResult<PageImage> {
        let image_name = self
            .page
            .image(image_id)
            .map(|image| image.image_name.clone())
            .ok_or(PageSessionError::ImageNotFound(image_id))?;
        self.images.delete(&image_name);
        let removed = self
            .page
            .remove_image(image_id)
            .ok_or(PageSessionError::ImageNotFound(image_id))?;
        self.persist()?;
        Ok(removed)
    }

    pub fn move_image(&mut self, image_id: PageImageId, position: Point) -> SessionResult<()> {
        self.page
            .image_mut(image_id)
            .ok_or(PageSessionError::ImageNotFound(image_id))?
            .move_to(position);
        self.persist()
    }

    pub fn resize_image(&mut self, image_id: PageImageId, size: Size) -> SessionResult<()> {
        self.page
            .image_mut(image_id)
            .ok_or(PageSessionError::ImageNotFound(image_id))?
            .resize(size);
        self.persist()
    }

    pub fn background_layer(&self) -> BackgroundLayer {
        self.page.background_layer()
    }

    /// Starts loading one image; the load is cancelled when the session
    /// closes. Must be called from within a tokio runtime.
    pub fn load_image(&self, file_name: &str) -> ImageLoadTask {
        let task = self.images.spawn_load(file_name);
        self.load_tokens().push(task.cancel_token());
        task
    }

    /// Loads one image, degrading to a placeholder when unavailable.
    pub async fn resolve_image(&self, file_name: &str) -> ImageSlot {
        match self.load_image(file_name).wait().await {
            Some(image) => ImageSlot::Ready(image),
            None => ImageSlot::Placeholder,
        }
    }

    /// Cancels every image load started by this session.
    pub fn cancel_loads(&self) {
        let tokens = std::mem::take(&mut *self.load_tokens());
        for token in &tokens {
            token.cancel();
        }
        if !tokens.is_empty() {
            debug!(
                "event=image_load_cancel module=page_session status=ok page_id={} count={}",
                self.page.id,
                tokens.len()
            );
        }
    }

    fn default_placement(&self, stored: &StoredImage) -> ImagePlacement {
        let settings = self.images.settings();
        let size = Size::new(f64::from(stored.width), f64::from(stored.height))
            .fit_within(settings.max_placed_dimension);
        let canvas = settings.canvas_size;
        ImagePlacement {
            position: Point::new(canvas.width / 2.0, canvas.height / 2.0),
            size,
        }
    }

    fn persist(&mut self) -> SessionResult<()> {
        let mut notebook = self
            .repo
            .notebook(self.notebook_id)
            .ok_or(PageSessionError::NotebookNotFound(self.notebook_id))?;
        if !notebook.replace_page(self.page.clone()) {
            return Err(PageSessionError::PageNotFound(self.page.id));
        }
        self.repo.update(notebook);
        Ok(())
    }

    fn ink_slot(&self) -> MutexGuard<'_, InkSlot> {
        self.ink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_tokens(&self) -> MutexGuard<'_, Vec<CancelToken>> {
        self.loads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: NotebookRepository> Drop for PageSession<R> {
    fn drop(&mut self) {
        self.cancel_loads();
    }
}

/// Resets an abandoned `Loading` slot to `NotLoaded` on drop.
struct LoadingGuard<'a> {
    slot: &'a Mutex<InkSlot>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut ink = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*ink, InkSlot::Loading) {
            *ink = InkSlot::NotLoaded;
        }
    }
}

fn decode_drawing(codec: &dyn InkCodec, data: Option<Vec<u8>>, page_id: PageId) -> InkDrawing {
    let Some(data) = data else {
        return InkDrawing::empty();
    };
    match codec.decode(&data) {
        Ok(drawing) => drawing,
        Err(err) => {
            warn!(
                "event=ink_load module=page_session status=fallback reason=decode_failed page_id={} error={}",
                page_id, err
            );
            InkDrawing::empty()
        }
    }
}

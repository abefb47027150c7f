//! FFI use-case API for the touchscreen UI host.
//!
//! # Responsibility
//! - Expose notebook, page and image use-cases to Dart via FRB.
//! - Own the process-wide store, image cache and I/O runtime.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Storage is bound to one data directory per process.
//! - Ids cross the boundary as UUID strings.
//! - Image encoding and file I/O run on the I/O runtime; blocking exports
//!   must be called off the UI isolate.

use inknote_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    BackgroundLayer, BackgroundType, CancelToken, ImageFileCache, ImageSettings, InkDrawing,
    JsonNotebookStore, Notebook, NotebookRepository, NotebookService, OpaqueInkCodec, Page,
    PageImage, PageSession, Point, SessionResult, Size, StorageConfig,
};
use log::{info, warn};
use std::sync::{Arc, OnceLock};
use tokio::runtime::Runtime;
use uuid::Uuid;

const IO_WORKER_THREADS: usize = 2;

static CONTEXT: OnceLock<CoreContext> = OnceLock::new();
static RUNTIME: OnceLock<Runtime> = OnceLock::new();

struct CoreContext {
    config: StorageConfig,
    store: Arc<JsonNotebookStore>,
    images: ImageFileCache,
}

impl CoreContext {
    fn open(config: StorageConfig) -> Self {
        let store = Arc::new(JsonNotebookStore::open(config.document_path()));
        let images = ImageFileCache::new(config.images_dir(), ImageSettings::default());
        info!(
            "event=storage_init module=ffi status=ok data_dir={} notebooks={}",
            config.data_dir().display(),
            store.len()
        );
        Self {
            config,
            store,
            images,
        }
    }

    fn service(&self) -> NotebookService<Arc<JsonNotebookStore>> {
        NotebookService::new(Arc::clone(&self.store))
    }
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - UI-thread safe.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - UI-thread safe.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Idempotent for the same `level + log_dir`; different settings return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Binds storage to `data_dir` and loads the notebook document.
///
/// Call before any other storage export; otherwise the first one binds to
/// `INKNOTE_DATA_DIR` or a temp-directory fallback.
///
/// # FFI contract
/// - Sync call; reads the notebook document once.
/// - Idempotent for the same directory.
/// - Returns an error message when storage is already bound elsewhere.
#[flutter_rust_bridge::frb(sync)]
pub fn init_storage(data_dir: String) -> String {
    let trimmed = data_dir.trim();
    if trimmed.is_empty() {
        return "data_dir cannot be empty".to_string();
    }
    let requested = StorageConfig::new(trimmed);
    let context = CONTEXT.get_or_init(|| CoreContext::open(requested.clone()));
    if context.config != requested {
        return format!(
            "storage already initialized at `{}`; refusing to switch to `{}`",
            context.config.data_dir().display(),
            requested.data_dir().display()
        );
    }
    String::new()
}

/// Notebook row for the list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookSummary {
    pub id: String,
    pub name: String,
    pub page_count: u32,
}

/// Page row for the notebook view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub id: String,
    /// Stable background tag (`blank|lined|grid|customImage`).
    pub background_type: String,
    /// Effective background image file, if one is drawn.
    pub background_image: Option<String>,
    pub image_names: Vec<String>,
    pub has_drawing: bool,
}

/// Placed content image, in canvas points.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImageSummary {
    pub id: String,
    pub image_name: String,
    /// Center of the image.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Background picker entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundOption {
    pub tag: String,
    pub label: String,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Id of the created or affected entity, when there is one.
    pub id: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, id: Option<String>) -> Self {
        Self {
            ok: true,
            id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            message: message.into(),
        }
    }
}

fn respond(
    operation: &str,
    action: impl FnOnce() -> Result<ActionResponse, String>,
) -> ActionResponse {
    action().unwrap_or_else(|err| ActionResponse::failure(format!("{operation} failed: {err}")))
}

/// Lists all notebooks in store order.
///
/// # FFI contract
/// - Sync call, in-memory read.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn notebooks_list() -> Vec<NotebookSummary> {
    context()
        .store
        .notebooks()
        .iter()
        .map(to_notebook_summary)
        .collect()
}

/// Lists the pages of one notebook.
///
/// # FFI contract
/// - Sync call, in-memory read.
/// - Returns an empty list for unknown or malformed ids.
#[flutter_rust_bridge::frb(sync)]
pub fn notebook_pages(notebook_id: String) -> Vec<PageSummary> {
    let Ok(id) = parse_id(&notebook_id) else {
        return Vec::new();
    };
    context()
        .store
        .notebook(id)
        .map(|notebook| notebook.pages.iter().map(to_page_summary).collect())
        .unwrap_or_default()
}

/// Lists the content images placed on one page, in drawing order.
///
/// # FFI contract
/// - Sync call, in-memory read.
/// - Returns an empty list for unknown or malformed ids.
#[flutter_rust_bridge::frb(sync)]
pub fn page_images(notebook_id: String, page_id: String) -> Vec<PageImageSummary> {
    let (Ok(notebook_id), Ok(page_id)) = (parse_id(&notebook_id), parse_id(&page_id)) else {
        return Vec::new();
    };
    context()
        .store
        .notebook(notebook_id)
        .and_then(|notebook| notebook.page(page_id).cloned())
        .map(|page| page.images.iter().map(to_image_summary).collect())
        .unwrap_or_default()
}

/// Background styles in picker order.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - UI-thread safe.
#[flutter_rust_bridge::frb(sync)]
pub fn background_options() -> Vec<BackgroundOption> {
    BackgroundType::ALL
        .iter()
        .map(|kind| BackgroundOption {
            tag: kind.tag().to_string(),
            label: kind.label().to_string(),
        })
        .collect()
}

/// Creates an empty notebook; blank names become "Untitled Notebook".
///
/// # FFI contract
/// - Sync call; writes the notebook document.
/// - Never panics.
/// - Returns the created notebook id.
#[flutter_rust_bridge::frb(sync)]
pub fn notebook_create(name: String) -> ActionResponse {
    let notebook = context().service().create_notebook(&name);
    ActionResponse::success("Notebook created.", Some(notebook.id.to_string()))
}

/// Renames a notebook with the same blank-name substitution as create.
///
/// # FFI contract
/// - Sync call; writes the notebook document.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn notebook_rename(notebook_id: String, name: String) -> ActionResponse {
    respond("notebook_rename", || {
        let notebook = context()
            .service()
            .rename_notebook(parse_id(&notebook_id)?, &name)
            .map_err(|err| err.to_string())?;
        Ok(ActionResponse::success(
            "Notebook renamed.",
            Some(notebook.id.to_string()),
        ))
    })
}

/// # FFI contract
/// - Sync call; writes the notebook document.
/// - Image files referenced by the notebook are left on disk.
#[flutter_rust_bridge::frb(sync)]
pub fn notebook_delete(notebook_id: String) -> ActionResponse {
    respond("notebook_delete", || {
        let id = parse_id(&notebook_id)?;
        context()
            .service()
            .delete_notebook(id)
            .map_err(|err| err.to_string())?;
        Ok(ActionResponse::success("Notebook deleted.", Some(id.to_string())))
    })
}

/// Appends a page; `background_type` is a stable tag.
///
/// # FFI contract
/// - Sync call; writes the notebook document.
/// - Unknown tags fail without touching storage.
/// - Returns the created page id.
#[flutter_rust_bridge::frb(sync)]
pub fn page_add(notebook_id: String, background_type: String) -> ActionResponse {
    respond("page_add", || {
        let id = parse_id(&notebook_id)?;
        let kind = parse_background(&background_type)?;
        let page = context()
            .service()
            .add_page(id, kind)
            .map_err(|err| err.to_string())?;
        Ok(ActionResponse::success("Page added.", Some(page.id.to_string())))
    })
}

/// # FFI contract
/// - Sync call; writes the notebook document.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn page_delete(notebook_id: String, page_id: String) -> ActionResponse {
    respond("page_delete", || {
        let notebook_id = parse_id(&notebook_id)?;
        let page_id = parse_id(&page_id)?;
        context()
            .service()
            .delete_page(notebook_id, page_id)
            .map_err(|err| err.to_string())?;
        Ok(ActionResponse::success("Page deleted.", Some(page_id.to_string())))
    })
}

/// Moves the page at `from` to index `to`.
///
/// # FFI contract
/// - Sync call; writes the notebook document.
/// - `to` past the end is clamped; `from` past the end fails.
#[flutter_rust_bridge::frb(sync)]
pub fn page_reorder(notebook_id: String, from: u32, to: u32) -> ActionResponse {
    respond("page_reorder", || {
        let notebook_id = parse_id(&notebook_id)?;
        context()
            .service()
            .reorder_pages(notebook_id, from as usize, to as usize)
            .map_err(|err| err.to_string())?;
        Ok(ActionResponse::success("Pages reordered.", None))
    })
}

/// # FFI contract
/// - Sync call; writes the notebook document.
/// - A previously set background image file is kept.
#[flutter_rust_bridge::frb(sync)]
pub fn page_set_background_type(
    notebook_id: String,
    page_id: String,
    background_type: String,
) -> ActionResponse {
    respond("page_set_background_type", || {
        let kind = parse_background(&background_type)?;
        with_page_session(&notebook_id, &page_id, |session| {
            session.set_background_type(kind)
        })?;
        Ok(ActionResponse::success("Background updated.", None))
    })
}

/// Stores `image_bytes` as the page background. Returns the file name.
///
/// # FFI contract
/// - Blocking call: decode, resize and file write run on the I/O runtime.
/// - Must not be called on the UI isolate.
/// - The replaced background file is deleted.
#[flutter_rust_bridge::frb(sync)]
pub fn page_set_background_image(
    notebook_id: String,
    page_id: String,
    image_bytes: Vec<u8>,
) -> ActionResponse {
    respond("page_set_background_image", || {
        let runtime = runtime()?;
        let mut session = open_page_session(&notebook_id, &page_id)?;
        let stored = runtime
            .block_on(session.set_background_image(image_bytes))
            .map_err(|err| err.to_string())?;
        Ok(ActionResponse::success(
            "Background image set.",
            Some(stored.file_name),
        ))
    })
}

/// Places `image_bytes` on the page at the default position.
///
/// # FFI contract
/// - Blocking call: decode, resize and file write run on the I/O runtime.
/// - Must not be called on the UI isolate.
/// - Returns the new page image id.
#[flutter_rust_bridge::frb(sync)]
pub fn page_add_image(notebook_id: String, page_id: String, image_bytes: Vec<u8>) -> ActionResponse {
    respond("page_add_image", || {
        let runtime = runtime()?;
        let mut session = open_page_session(&notebook_id, &page_id)?;
        let image = runtime
            .block_on(session.add_image(image_bytes, None))
            .map_err(|err| err.to_string())?;
        Ok(ActionResponse::success("Image added.", Some(image.id.to_string())))
    })
}

/// # FFI contract
/// - Sync call; deletes the image file and writes the notebook document.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn page_remove_image(notebook_id: String, page_id: String, image_id: String) -> ActionResponse {
    respond("page_remove_image", || {
        let image_id = parse_id(&image_id)?;
        with_page_session(&notebook_id, &page_id, |session| {
            session.remove_image(image_id)
        })?;
        Ok(ActionResponse::success("Image removed.", Some(image_id.to_string())))
    })
}

/// Moves a placed image so its center sits at (`x`, `y`).
///
/// # FFI contract
/// - Sync call; writes the notebook document.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn page_move_image(
    notebook_id: String,
    page_id: String,
    image_id: String,
    x: f64,
    y: f64,
) -> ActionResponse {
    respond("page_move_image", || {
        let image_id = parse_id(&image_id)?;
        with_page_session(&notebook_id, &page_id, |session| {
            session.move_image(image_id, Point::new(x, y))
        })?;
        Ok(ActionResponse::success("Image moved.", Some(image_id.to_string())))
    })
}

/// # FFI contract
/// - Sync call; writes the notebook document.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn page_resize_image(
    notebook_id: String,
    page_id: String,
    image_id: String,
    width: f64,
    height: f64,
) -> ActionResponse {
    respond("page_resize_image", || {
        let image_id = parse_id(&image_id)?;
        with_page_session(&notebook_id, &page_id, |session| {
            session.resize_image(image_id, Size::new(width, height))
        })?;
        Ok(ActionResponse::success("Image resized.", Some(image_id.to_string())))
    })
}

/// Reads the stored bytes of one image file.
///
/// # FFI contract
/// - Blocking call: the file read runs on the I/O runtime.
/// - `None` when the file is missing or unreadable; the host draws a
///   placeholder.
#[flutter_rust_bridge::frb(sync)]
pub fn image_bytes(image_name: String) -> Option<Vec<u8>> {
    let runtime = runtime().ok()?;
    runtime.block_on(
        context()
            .images
            .load_bytes(&image_name, &CancelToken::new()),
    )
}

/// Stores the ink blob produced by the capture surface.
///
/// # FFI contract
/// - Blocking call: waits on the I/O runtime while the ink layer loads.
/// - `drawing_data` is stored byte-for-byte.
#[flutter_rust_bridge::frb(sync)]
pub fn page_save_drawing(
    notebook_id: String,
    page_id: String,
    drawing_data: Vec<u8>,
) -> ActionResponse {
    respond("page_save_drawing", || {
        let runtime = runtime()?;
        let session = open_page_session(&notebook_id, &page_id)?;
        runtime.block_on(session.become_visible());
        session.update_drawing(InkDrawing::from_bytes(drawing_data));
        session.close().map_err(|err| err.to_string())?;
        Ok(ActionResponse::success("Drawing saved.", None))
    })
}

/// Returns the stored ink blob of a page, if any.
///
/// # FFI contract
/// - Sync call, in-memory read.
#[flutter_rust_bridge::frb(sync)]
pub fn page_drawing(notebook_id: String, page_id: String) -> Option<Vec<u8>> {
    let notebook_id = parse_id(&notebook_id).ok()?;
    let page_id = parse_id(&page_id).ok()?;
    context()
        .store
        .notebook(notebook_id)?
        .page(page_id)?
        .drawing_data
        .clone()
}

/// Drops decoded images held in memory. Hook for memory-pressure signals.
///
/// # FFI contract
/// - Sync call, non-blocking; files on disk are untouched.
#[flutter_rust_bridge::frb(sync)]
pub fn clear_image_cache() {
    context().images.clear();
}

fn context() -> &'static CoreContext {
    CONTEXT.get_or_init(|| CoreContext::open(fallback_storage_config()))
}

fn fallback_storage_config() -> StorageConfig {
    let config = StorageConfig::from_env();
    warn!(
        "event=storage_init module=ffi status=fallback reason=init_storage_not_called data_dir={}",
        config.data_dir().display()
    );
    config
}

fn runtime() -> Result<&'static Runtime, String> {
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(IO_WORKER_THREADS)
        .thread_name("inknote-io")
        .build()
        .map_err(|err| format!("failed to start io runtime: {err}"))?;
    Ok(RUNTIME.get_or_init(move || runtime))
}

fn open_page_session(
    notebook_id: &str,
    page_id: &str,
) -> Result<PageSession<Arc<JsonNotebookStore>>, String> {
    let context = context();
    PageSession::open(
        Arc::clone(&context.store),
        context.images.clone(),
        Arc::new(OpaqueInkCodec),
        parse_id(notebook_id)?,
        parse_id(page_id)?,
    )
    .map_err(|err| err.to_string())
}

fn with_page_session<T>(
    notebook_id: &str,
    page_id: &str,
    f: impl FnOnce(&mut PageSession<Arc<JsonNotebookStore>>) -> SessionResult<T>,
) -> Result<T, String> {
    let mut session = open_page_session(notebook_id, page_id)?;
    f(&mut session).map_err(|err| err.to_string())
}

fn parse_id(raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("invalid id `{raw}`"))
}

fn parse_background(tag: &str) -> Result<BackgroundType, String> {
    BackgroundType::from_tag(tag.trim()).ok_or_else(|| format!("unknown background type `{tag}`"))
}

fn to_notebook_summary(notebook: &Notebook) -> NotebookSummary {
    NotebookSummary {
        id: notebook.id.to_string(),
        name: notebook.name.clone(),
        page_count: u32::try_from(notebook.pages.len()).unwrap_or(u32::MAX),
    }
}

fn to_page_summary(page: &Page) -> PageSummary {
    let background_image = match page.background_layer() {
        BackgroundLayer::Image(name) => Some(name),
        _ => None,
    };
    PageSummary {
        id: page.id.to_string(),
        background_type: page.background_type.tag().to_string(),
        background_image,
        image_names: page
            .images
            .iter()
            .map(|image| image.image_name.clone())
            .collect(),
        has_drawing: page.drawing_data.is_some(),
    }
}

fn to_image_summary(image: &PageImage) -> PageImageSummary {
    PageImageSummary {
        id: image.id.to_string(),
        image_name: image.image_name.clone(),
        x: image.position.x,
        y: image.position.y,
        width: image.size.width,
        height: image.size.height,
    }
}

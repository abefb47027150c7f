use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use inknote_core::{
    BackgroundLayer, BackgroundType, ImageFileCache, ImagePlacement, ImageSettings, ImageSlot,
    InkCodec, InkDecodeError, InkDrawing, InkState, JsonNotebookStore, NotebookId,
    NotebookRepository, NotebookService, OpaqueInkCodec, PageId, PageSession, PageSessionError,
    Point, Size,
};
use std::fs;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    store: Arc<JsonNotebookStore>,
    images: ImageFileCache,
    notebook_id: NotebookId,
    page_id: PageId,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonNotebookStore::open(dir.path().join("notebooks.json")));
        let images = ImageFileCache::new(dir.path().join("PageImages"), ImageSettings::default());
        let service = NotebookService::new(Arc::clone(&store));
        let notebook = service.create_notebook("Session");
        let page = service.add_page(notebook.id, BackgroundType::Blank).unwrap();
        Self {
            _dir: dir,
            store,
            images,
            notebook_id: notebook.id,
            page_id: page.id,
        }
    }

    fn open(&self) -> PageSession<Arc<JsonNotebookStore>> {
        self.open_with(Arc::new(OpaqueInkCodec))
    }

    fn open_with(&self, codec: Arc<dyn InkCodec>) -> PageSession<Arc<JsonNotebookStore>> {
        PageSession::open(
            Arc::clone(&self.store),
            self.images.clone(),
            codec,
            self.notebook_id,
            self.page_id,
        )
        .unwrap()
    }

    fn stored_page(&self) -> inknote_core::Page {
        self.store
            .notebook(self.notebook_id)
            .unwrap()
            .page(self.page_id)
            .cloned()
            .unwrap()
    }

    fn set_stored_ink(&self, data: &[u8]) {
        let mut notebook = self.store.notebook(self.notebook_id).unwrap();
        notebook.page_mut(self.page_id).unwrap().drawing_data = Some(data.to_vec());
        self.store.update(notebook);
    }

    fn image_files(&self) -> Vec<String> {
        match fs::read_dir(self.images.dir()) {
            Ok(entries) => entries
                .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([20, 120, 220]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

struct CountingCodec {
    decodes: AtomicUsize,
}

impl InkCodec for CountingCodec {
    fn decode(&self, data: &[u8]) -> Result<InkDrawing, InkDecodeError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        Ok(InkDrawing::from_bytes(data))
    }

    fn encode(&self, drawing: &InkDrawing) -> Vec<u8> {
        drawing.as_bytes().to_vec()
    }
}

struct SlowCodec;

impl InkCodec for SlowCodec {
    fn decode(&self, data: &[u8]) -> Result<InkDrawing, InkDecodeError> {
        std::thread::sleep(Duration::from_millis(200));
        Ok(InkDrawing::from_bytes(data))
    }

    fn encode(&self, drawing: &InkDrawing) -> Vec<u8> {
        drawing.as_bytes().to_vec()
    }
}

struct RejectingCodec;

impl InkCodec for RejectingCodec {
    fn decode(&self, _data: &[u8]) -> Result<InkDrawing, InkDecodeError> {
        Err(InkDecodeError("unsupported stroke version".to_string()))
    }

    fn encode(&self, drawing: &InkDrawing) -> Vec<u8> {
        drawing.as_bytes().to_vec()
    }
}

#[test]
fn session_never_made_visible_keeps_stored_ink() {
    let fixture = Fixture::new();
    fixture.set_stored_ink(b"strokes-v1");

    let session = fixture.open();
    assert_eq!(session.ink_state(), InkState::NotLoaded);
    assert!(!session.update_drawing(InkDrawing::empty()));
    session.close().unwrap();

    assert_eq!(
        fixture.stored_page().drawing_data.as_deref(),
        Some(&b"strokes-v1"[..])
    );
}

#[tokio::test]
async fn visible_session_round_trips_ink_and_saves_edits() {
    let fixture = Fixture::new();
    fixture.set_stored_ink(b"strokes-v1");

    let session = fixture.open();
    session.become_visible().await;
    assert_eq!(session.ink_state(), InkState::Loaded);
    assert_eq!(
        session.drawing(),
        Some(InkDrawing::from_bytes(b"strokes-v1".to_vec()))
    );

    assert!(session.update_drawing(InkDrawing::from_bytes(b"strokes-v2".to_vec())));
    session.close().unwrap();

    assert_eq!(
        fixture.stored_page().drawing_data.as_deref(),
        Some(&b"strokes-v2"[..])
    );
}

#[tokio::test]
async fn unchanged_ink_is_not_rewritten() {
    let fixture = Fixture::new();
    fixture.set_stored_ink(b"same");

    let mut session = fixture.open();
    session.become_visible().await;
    assert!(!session.save_drawing().unwrap());
}

#[tokio::test]
async fn missing_ink_starts_as_empty_canvas() {
    let fixture = Fixture::new();

    let session = fixture.open();
    session.become_visible().await;

    assert_eq!(session.drawing(), Some(InkDrawing::empty()));
}

#[tokio::test]
async fn viewing_a_blank_page_leaves_ink_absent() {
    let fixture = Fixture::new();
    let bytes_before = fs::read(fixture.store.document_path()).unwrap();

    let mut session = fixture.open();
    session.become_visible().await;
    assert!(!session.save_drawing().unwrap());
    session.close().unwrap();

    assert_eq!(fixture.stored_page().drawing_data, None);
    assert_eq!(fs::read(fixture.store.document_path()).unwrap(), bytes_before);
}

#[tokio::test]
async fn abandoned_load_can_be_restarted() {
    let fixture = Fixture::new();
    fixture.set_stored_ink(b"strokes-v1");
    let session = fixture.open_with(Arc::new(SlowCodec));

    tokio::select! {
        biased;
        _ = session.become_visible() => panic!("slow decode should not finish first"),
        _ = tokio::task::yield_now() => {}
    }
    assert_eq!(session.ink_state(), InkState::NotLoaded);

    session.become_visible().await;
    assert_eq!(session.ink_state(), InkState::Loaded);
    assert!(session.update_drawing(InkDrawing::from_bytes(b"strokes-v2".to_vec())));
    session.close().unwrap();

    assert_eq!(
        fixture.stored_page().drawing_data.as_deref(),
        Some(&b"strokes-v2"[..])
    );
}

#[tokio::test]
async fn undecodable_ink_falls_back_to_empty_canvas() {
    let fixture = Fixture::new();
    fixture.set_stored_ink(b"\x00garbage");

    let session = fixture.open_with(Arc::new(RejectingCodec));
    session.become_visible().await;

    assert_eq!(session.ink_state(), InkState::Loaded);
    assert_eq!(session.drawing(), Some(InkDrawing::empty()));
}

#[tokio::test]
async fn concurrent_visibility_signals_load_once() {
    let fixture = Fixture::new();
    fixture.set_stored_ink(b"strokes");
    let codec = Arc::new(CountingCodec {
        decodes: AtomicUsize::new(0),
    });

    let session = fixture.open_with(codec.clone());
    tokio::join!(
        session.become_visible(),
        session.become_visible(),
        session.become_visible()
    );
    session.become_visible().await;

    assert_eq!(codec.decodes.load(Ordering::SeqCst), 1);
    assert_eq!(session.ink_state(), InkState::Loaded);
}

#[test]
fn set_background_type_persists() {
    let fixture = Fixture::new();
    let mut session = fixture.open();

    session.set_background_type(BackgroundType::Lined).unwrap();

    assert_eq!(fixture.stored_page().background_type, BackgroundType::Lined);
    assert_eq!(session.background_layer(), BackgroundLayer::Lined);
}

#[tokio::test]
async fn set_background_image_keeps_exactly_one_file() {
    let fixture = Fixture::new();
    let mut session = fixture.open();

    let first = session.set_background_image(png_bytes(32, 32)).await.unwrap();
    assert_eq!(fixture.image_files(), vec![first.file_name.clone()]);

    let second = session.set_background_image(png_bytes(16, 16)).await.unwrap();
    assert_eq!(fixture.image_files(), vec![second.file_name.clone()]);
    assert!(!fixture.images.contains_file(&first.file_name));

    let stored = fixture.stored_page();
    assert_eq!(stored.background_type, BackgroundType::CustomImage);
    assert_eq!(stored.background_image.as_deref(), Some(second.file_name.as_str()));
    assert_eq!(
        session.background_layer(),
        BackgroundLayer::Image(second.file_name)
    );
}

#[tokio::test]
async fn add_image_centers_and_scales_by_default() {
    let fixture = Fixture::new();
    let mut session = fixture.open();

    let image = session.add_image(png_bytes(600, 400), None).await.unwrap();

    let settings = ImageSettings::default();
    assert_eq!(image.size, Size::new(300.0, 200.0));
    assert_eq!(
        image.position,
        Point::new(
            settings.canvas_size.width / 2.0,
            settings.canvas_size.height / 2.0
        )
    );
    assert!(fixture.images.contains_file(&image.image_name));
    assert_eq!(fixture.stored_page().images, vec![image]);
}

#[tokio::test]
async fn add_image_honours_explicit_placement() {
    let fixture = Fixture::new();
    let mut session = fixture.open();
    let placement = ImagePlacement {
        position: Point::new(10.0, 20.0),
        size: Size::new(50.0, 60.0),
    };

    let image = session.add_image(png_bytes(8, 8), Some(placement)).await.unwrap();

    assert_eq!(image.position, placement.position);
    assert_eq!(image.size, placement.size);
}

#[tokio::test]
async fn add_image_reports_storage_failures() {
    let fixture = Fixture::new();
    let mut session = fixture.open();

    let err = session.add_image(b"not an image".to_vec(), None).await.unwrap_err();
    assert!(matches!(err, PageSessionError::Image(_)), "unexpected: {err}");
    assert!(fixture.stored_page().images.is_empty());

    fs::write(fixture.images.dir(), b"occupied").unwrap();
    let err = session.set_background_image(png_bytes(4, 4)).await.unwrap_err();
    assert!(matches!(err, PageSessionError::Image(_)), "unexpected: {err}");
    assert_eq!(fixture.stored_page().background_type, BackgroundType::Blank);
}

#[tokio::test]
async fn remove_image_deletes_entry_and_file() {
    let fixture = Fixture::new();
    let mut session = fixture.open();
    let kept = session.add_image(png_bytes(8, 8), None).await.unwrap();
    let removed = session.add_image(png_bytes(8, 8), None).await.unwrap();

    session.remove_image(removed.id).unwrap();

    let stored = fixture.stored_page();
    assert!(stored.image(removed.id).is_none());
    assert_eq!(stored.images, vec![kept.clone()]);
    assert!(!fixture.images.contains_file(&removed.image_name));
    assert!(fixture.images.contains_file(&kept.image_name));

    let err = session.remove_image(removed.id).unwrap_err();
    assert!(matches!(err, PageSessionError::ImageNotFound(id) if id == removed.id));
}

#[tokio::test]
async fn move_and_resize_update_placement() {
    let fixture = Fixture::new();
    let mut session = fixture.open();
    let image = session.add_image(png_bytes(8, 8), None).await.unwrap();

    session.move_image(image.id, Point::new(1.0, 2.0)).unwrap();
    session.resize_image(image.id, Size::new(3.0, 4.0)).unwrap();

    let stored = fixture.stored_page();
    let placed = stored.image(image.id).unwrap();
    assert_eq!(placed.position, Point::new(1.0, 2.0));
    assert_eq!(placed.size, Size::new(3.0, 4.0));
}

#[test]
fn edits_merge_with_concurrent_sessions_on_same_notebook() {
    let fixture = Fixture::new();
    let service = NotebookService::new(Arc::clone(&fixture.store));
    let other_page = service
        .add_page(fixture.notebook_id, BackgroundType::Blank)
        .unwrap();

    let mut first = fixture.open();
    let mut second = PageSession::open(
        Arc::clone(&fixture.store),
        fixture.images.clone(),
        Arc::new(OpaqueInkCodec),
        fixture.notebook_id,
        other_page.id,
    )
    .unwrap();

    first.set_background_type(BackgroundType::Grid).unwrap();
    second.set_background_type(BackgroundType::Lined).unwrap();

    let notebook = fixture.store.notebook(fixture.notebook_id).unwrap();
    assert_eq!(
        notebook.page(fixture.page_id).unwrap().background_type,
        BackgroundType::Grid
    );
    assert_eq!(
        notebook.page(other_page.id).unwrap().background_type,
        BackgroundType::Lined
    );
}

#[test]
fn edits_fail_once_page_is_deleted_elsewhere() {
    let fixture = Fixture::new();
    let mut session = fixture.open();
    NotebookService::new(Arc::clone(&fixture.store))
        .delete_page(fixture.notebook_id, fixture.page_id)
        .unwrap();

    let err = session.set_background_type(BackgroundType::Grid).unwrap_err();
    assert!(matches!(err, PageSessionError::PageNotFound(id) if id == fixture.page_id));
}

#[test]
fn open_rejects_unknown_page() {
    let fixture = Fixture::new();
    let missing = uuid::Uuid::new_v4();

    let result = PageSession::open(
        Arc::clone(&fixture.store),
        fixture.images.clone(),
        Arc::new(OpaqueInkCodec),
        fixture.notebook_id,
        missing,
    );
    assert!(matches!(result, Err(PageSessionError::PageNotFound(id)) if id == missing));
}

#[tokio::test]
async fn dangling_image_reference_resolves_to_placeholder() {
    let fixture = Fixture::new();
    let mut session = fixture.open();
    let image = session.add_image(png_bytes(8, 8), None).await.unwrap();

    assert!(matches!(
        session.resolve_image(&image.image_name).await,
        ImageSlot::Ready(_)
    ));

    fixture.images.delete(&image.image_name);
    assert!(matches!(
        session.resolve_image(&image.image_name).await,
        ImageSlot::Placeholder
    ));
}

#[tokio::test]
async fn closing_cancels_in_flight_loads() {
    let fixture = Fixture::new();
    let mut session = fixture.open();
    let image = session.add_image(png_bytes(8, 8), None).await.unwrap();
    fixture.images.clear();

    let task = session.load_image(&image.image_name);
    let token = task.cancel_token();
    session.close().unwrap();

    assert!(token.is_cancelled());
    let _ = task.wait().await;
}

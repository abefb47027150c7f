//! Core domain logic for InkNote.
//! This crate owns the notebook model, its persistence and page editing.

pub mod config;
pub mod images;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use config::{ImageSettings, StorageConfig};
pub use images::{CancelToken, ImageFileCache, ImageLoadTask, ImageStoreError, StoredImage};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::geometry::{Point, Size};
pub use model::notebook::{Notebook, NotebookId, DEFAULT_NOTEBOOK_NAME};
pub use model::page::{BackgroundLayer, BackgroundType, Page, PageId, PageImage, PageImageId};
pub use service::ink::{InkCodec, InkDecodeError, InkDrawing, OpaqueInkCodec};
pub use service::notebook_service::{NotebookService, NotebookServiceError, ServiceResult};
pub use service::page_session::{
    ImagePlacement, ImageSlot, InkState, PageSession, PageSessionError, SessionResult,
};
pub use store::{JsonNotebookStore, NotebookRepository, StoreChange};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

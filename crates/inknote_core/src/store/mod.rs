//! Notebook persistence.
//!
//! # Responsibility
//! - Define the repository contract every controller depends on.
//! - Own the canonical notebook collection and its single JSON document.
//!
//! # Invariants
//! - Every mutation (`add`/`update`/`delete`) saves the whole collection.
//! - Load and save failures are logged, never propagated: a corrupt document
//!   resets the collection instead of failing startup.
//!
//! # See also
//! - `json_store` for the file-backed implementation.

use crate::model::notebook::{Notebook, NotebookId};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

mod document;
pub mod json_store;

pub use json_store::JsonNotebookStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Internal document I/O failure. Surfaced only through logs.
#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Encode(serde_json::Error),
    Decode(serde_json::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "io error at `{}`: {source}", path.display()),
            Self::Encode(err) => write!(f, "failed to encode notebook document: {err}"),
            Self::Decode(err) => write!(f, "failed to decode notebook document: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Encode(err) | Self::Decode(err) => Some(err),
        }
    }
}

/// Change notification published after each applied mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Reloaded,
    Added(NotebookId),
    Updated(NotebookId),
    Deleted(NotebookId),
}

/// Repository interface over the notebook collection.
///
/// Reads return owned snapshots; callers mutate a copy and hand it back
/// through `update`.
pub trait NotebookRepository {
    fn notebooks(&self) -> Vec<Notebook>;
    fn notebook(&self, id: NotebookId) -> Option<Notebook>;
    fn add(&self, notebook: Notebook);
    fn update(&self, notebook: Notebook);
    fn delete(&self, id: NotebookId);
    fn save(&self);
}

impl<T: NotebookRepository + ?Sized> NotebookRepository for Arc<T> {
    fn notebooks(&self) -> Vec<Notebook> {
        (**self).notebooks()
    }

    fn notebook(&self, id: NotebookId) -> Option<Notebook> {
        (**self).notebook(id)
    }

    fn add(&self, notebook: Notebook) {
        (**self).add(notebook)
    }

    fn update(&self, notebook: Notebook) {
        (**self).update(notebook)
    }

    fn delete(&self, id: NotebookId) {
        (**self).delete(id)
    }

    fn save(&self) {
        (**self).save()
    }
}

impl<T: NotebookRepository + ?Sized> NotebookRepository for &T {
    fn notebooks(&self) -> Vec<Notebook> {
        (**self).notebooks()
    }

    fn notebook(&self, id: NotebookId) -> Option<Notebook> {
        (**self).notebook(id)
    }

    fn add(&self, notebook: Notebook) {
        (**self).add(notebook)
    }

    fn update(&self, notebook: Notebook) {
        (**self).update(notebook)
    }

    fn delete(&self, id: NotebookId) {
        (**self).delete(id)
    }

    fn save(&self) {
        (**self).save()
    }
}

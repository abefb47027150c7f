//! File-backed notebook store.
//!
//! # Responsibility
//! - Hold the canonical in-memory notebook collection.
//! - Mirror every mutation to one JSON document on disk.
//! - Publish change notifications to subscribers.
//!
//! # Invariants
//! - The collection lock is held only for in-memory access, never across
//!   document writes. Overlapping saves are last-write-wins; each one
//!   carries the latest applied state.
//! - A failed save keeps the in-memory mutation.

use super::document::{read_document, write_document_atomic};
use super::{NotebookRepository, StoreChange, StoreError};
use crate::model::notebook::{Notebook, NotebookId};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// JSON document store for the notebook collection.
pub struct JsonNotebookStore {
    path: PathBuf,
    notebooks: Mutex<Vec<Notebook>>,
    changes: broadcast::Sender<StoreChange>,
}

impl JsonNotebookStore {
    /// Opens the store at `path` and loads the document synchronously.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self::with_notebooks(path.into(), Vec::new());
        store.load();
        store
    }

    /// Opens the store, reading the document on the blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open_in_background(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let read_path = path.clone();
        let notebooks = match tokio::task::spawn_blocking(move || read_document(&read_path)).await
        {
            Ok(notebooks) => notebooks,
            Err(err) => {
                error!(
                    "event=store_load module=store status=error action=reset_collection error={}",
                    err
                );
                Vec::new()
            }
        };
        Self::with_notebooks(path, notebooks)
    }

    fn with_notebooks(path: PathBuf, notebooks: Vec<Notebook>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path,
            notebooks: Mutex::new(notebooks),
            changes,
        }
    }

    pub fn document_path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the document, replacing the in-memory collection.
    ///
    /// A missing document yields an empty collection; a corrupt one is
    /// logged and also yields an empty collection.
    pub fn load(&self) {
        let notebooks = read_document(&self.path);
        *self.collection() = notebooks;
        self.notify(StoreChange::Reloaded);
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    pub fn len(&self) -> usize {
        self.collection().len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection().is_empty()
    }

    fn collection(&self) -> MutexGuard<'_, Vec<Notebook>> {
        self.notebooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, change: StoreChange) {
        // No receivers is fine; nobody is observing yet.
        let _ = self.changes.send(change);
    }

    fn try_save(&self) -> Result<usize, StoreError> {
        let encoded = {
            let notebooks = self.collection();
            serde_json::to_vec_pretty(&*notebooks).map_err(StoreError::Encode)?
        };
        write_document_atomic(&self.path, &encoded)?;
        Ok(encoded.len())
    }
}

impl NotebookRepository for JsonNotebookStore {
    fn notebooks(&self) -> Vec<Notebook> {
        self.collection().clone()
    }

    fn notebook(&self, id: NotebookId) -> Option<Notebook> {
        self.collection()
            .iter()
            .find(|notebook| notebook.id == id)
            .cloned()
    }

    fn add(&self, notebook: Notebook) {
        let id = notebook.id;
        self.collection().push(notebook);
        self.save();
        self.notify(StoreChange::Added(id));
    }

    fn update(&self, notebook: Notebook) {
        let id = notebook.id;
        {
            let mut notebooks = self.collection();
            let Some(slot) = notebooks.iter_mut().find(|existing| existing.id == id) else {
                warn!(
                    "event=store_update module=store status=skipped reason=unknown_notebook notebook_id={}",
                    id
                );
                return;
            };
            *slot = notebook;
        }
        self.save();
        self.notify(StoreChange::Updated(id));
    }

    fn delete(&self, id: NotebookId) {
        let removed = {
            let mut notebooks = self.collection();
            let before = notebooks.len();
            notebooks.retain(|notebook| notebook.id != id);
            before != notebooks.len()
        };
        if !removed {
            debug!(
                "event=store_delete module=store status=noop reason=unknown_notebook notebook_id={}",
                id
            );
        }
        self.save();
        if removed {
            self.notify(StoreChange::Deleted(id));
        }
    }

    fn save(&self) {
        let started_at = Instant::now();
        match self.try_save() {
            Ok(bytes) => info!(
                "event=store_save module=store status=ok bytes={} duration_ms={}",
                bytes,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=store_save module=store status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::JsonNotebookStore;
    use crate::model::notebook::Notebook;
    use crate::store::{NotebookRepository, StoreChange};

    #[test]
    fn mutations_are_published_to_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonNotebookStore::open(dir.path().join("notebooks.json"));
        let mut changes = store.subscribe();

        let notebook = Notebook::new("Sketches");
        let id = notebook.id;
        store.add(notebook.clone());
        store.update(notebook);
        store.delete(id);

        assert_eq!(changes.try_recv().unwrap(), StoreChange::Added(id));
        assert_eq!(changes.try_recv().unwrap(), StoreChange::Updated(id));
        assert_eq!(changes.try_recv().unwrap(), StoreChange::Deleted(id));
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn update_of_unknown_notebook_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonNotebookStore::open(dir.path().join("notebooks.json"));
        store.add(Notebook::new("Kept"));

        store.update(Notebook::new("Stranger"));

        let names: Vec<_> = store.notebooks().into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["Kept".to_string()]);
    }
}

//! Notebook domain model.
//!
//! # Responsibility
//! - Define the top-level container of ordered pages.
//!
//! # Invariants
//! - `id` is stable and never reassigned after creation.
//! - Pages are owned by exactly one notebook; lookups are by page id.

use crate::model::page::{Page, PageId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotebookId = Uuid;

/// Name substituted when a notebook is created or renamed with a blank name.
pub const DEFAULT_NOTEBOOK_NAME: &str = "Untitled Notebook";

fn default_notebook_name() -> String {
    DEFAULT_NOTEBOOK_NAME.to_string()
}

/// Top-level user-visible container of ordered pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub id: NotebookId,
    #[serde(default = "default_notebook_name")]
    pub name: String,
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl Default for Notebook {
    fn default() -> Self {
        Self::new(DEFAULT_NOTEBOOK_NAME)
    }
}

impl Notebook {
    /// Creates an empty notebook with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            pages: Vec::new(),
        }
    }

    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.iter().find(|page| page.id == id)
    }

    pub fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.iter_mut().find(|page| page.id == id)
    }

    pub fn page_index(&self, id: PageId) -> Option<usize> {
        self.pages.iter().position(|page| page.id == id)
    }

    /// Replaces the page with the same id.
    ///
    /// Returns `false` (and leaves the notebook untouched) when no page has
    /// that id.
    pub fn replace_page(&mut self, page: Page) -> bool {
        match self.page_mut(page.id) {
            Some(slot) => {
                *slot = page;
                true
            }
            None => false,
        }
    }
}

//! Notebook collection use-case service.
//!
//! # Responsibility
//! - Provide notebook create/rename/delete for the list view.
//! - Provide page add/delete/reorder for the notebook view.
//!
//! # Invariants
//! - Blank names are replaced by `DEFAULT_NOTEBOOK_NAME`.
//! - Every successful call ends in exactly one store mutation.

use crate::model::notebook::{Notebook, NotebookId, DEFAULT_NOTEBOOK_NAME};
use crate::model::page::{BackgroundType, Page, PageId};
use crate::store::NotebookRepository;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, NotebookServiceError>;

/// Errors from notebook service operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotebookServiceError {
    NotebookNotFound(NotebookId),
    PageNotFound(PageId),
    /// Reorder source index is past the end of the page list.
    PageIndexOutOfRange { index: usize, len: usize },
}

impl Display for NotebookServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotebookNotFound(id) => write!(f, "notebook not found: {id}"),
            Self::PageNotFound(id) => write!(f, "page not found: {id}"),
            Self::PageIndexOutOfRange { index, len } => {
                write!(f, "page index {index} out of range for {len} page(s)")
            }
        }
    }
}

impl Error for NotebookServiceError {}

/// Notebook service facade over a repository implementation.
pub struct NotebookService<R: NotebookRepository> {
    repo: R,
}

impl<R: NotebookRepository> NotebookService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn list_notebooks(&self) -> Vec<Notebook> {
        self.repo.notebooks()
    }

    pub fn notebook(&self, id: NotebookId) -> Option<Notebook> {
        self.repo.notebook(id)
    }

    /// Creates an empty notebook; blank names become the default name.
    pub fn create_notebook(&self, name: &str) -> Notebook {
        let notebook = Notebook::new(normalize_notebook_name(name));
        self.repo.add(notebook.clone());
        notebook
    }

    pub fn rename_notebook(&self, id: NotebookId, name: &str) -> ServiceResult<Notebook> {
        let mut notebook = self.require_notebook(id)?;
        notebook.name = normalize_notebook_name(name);
        self.repo.update(notebook.clone());
        Ok(notebook)
    }

    pub fn delete_notebook(&self, id: NotebookId) -> ServiceResult<()> {
        self.require_notebook(id)?;
        self.repo.delete(id);
        Ok(())
    }

    /// Appends a new page with the given background.
    pub fn add_page(
        &self,
        notebook_id: NotebookId,
        background_type: BackgroundType,
    ) -> ServiceResult<Page> {
        let mut notebook = self.require_notebook(notebook_id)?;
        let page = Page::new(background_type);
        notebook.pages.push(page.clone());
        self.repo.update(notebook);
        Ok(page)
    }

    pub fn delete_page(&self, notebook_id: NotebookId, page_id: PageId) -> ServiceResult<()> {
        let mut notebook = self.require_notebook(notebook_id)?;
        let index = notebook
            .page_index(page_id)
            .ok_or(NotebookServiceError::PageNotFound(page_id))?;
        notebook.pages.remove(index);
        self.repo.update(notebook);
        Ok(())
    }

    /// Moves the page at `from` so it ends up at index `to`.
    ///
    /// `to` is clamped to the last index. Moving 0 to 2 in `[a, b, c]`
    /// yields `[b, c, a]`.
    pub fn reorder_pages(
        &self,
        notebook_id: NotebookId,
        from: usize,
        to: usize,
    ) -> ServiceResult<Vec<PageId>> {
        let mut notebook = self.require_notebook(notebook_id)?;
        let len = notebook.pages.len();
        if from >= len {
            return Err(NotebookServiceError::PageIndexOutOfRange { index: from, len });
        }
        let page = notebook.pages.remove(from);
        let target = to.min(notebook.pages.len());
        notebook.pages.insert(target, page);

        let order = notebook.pages.iter().map(|page| page.id).collect();
        self.repo.update(notebook);
        Ok(order)
    }

    fn require_notebook(&self, id: NotebookId) -> ServiceResult<Notebook> {
        self.repo
            .notebook(id)
            .ok_or(NotebookServiceError::NotebookNotFound(id))
    }
}

/// Trims `name`, substituting the default name when nothing remains.
pub fn normalize_notebook_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        DEFAULT_NOTEBOOK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_notebook_name;

    #[test]
    fn blank_names_fall_back_to_default() {
        assert_eq!(normalize_notebook_name("   "), "Untitled Notebook");
        assert_eq!(normalize_notebook_name("\t\n"), "Untitled Notebook");
        assert_eq!(normalize_notebook_name("  Math  "), "Math");
    }
}

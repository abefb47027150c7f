//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `inknote_core` linkage.
//! - Print a deterministic summary of the notebook document.

use inknote_core::{JsonNotebookStore, NotebookRepository, StorageConfig};

fn main() {
    println!("inknote_core ping={}", inknote_core::ping());
    println!("inknote_core version={}", inknote_core::core_version());

    let config = StorageConfig::from_env();
    let store = JsonNotebookStore::open(config.document_path());
    println!("document={}", store.document_path().display());
    for notebook in store.notebooks() {
        println!(
            "notebook id={} name={:?} pages={}",
            notebook.id,
            notebook.name,
            notebook.pages.len()
        );
    }
}

//! Notebook document file access.
//!
//! # Invariants
//! - Writes replace the document via temp file + rename, never in place.
//! - Reads never fail: missing means empty, corrupt means reset.

use super::{StoreError, StoreResult};
use crate::model::notebook::Notebook;
use log::{error, info};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Reads the notebook collection, substituting an empty one on any failure.
pub(super) fn read_document(path: &Path) -> Vec<Notebook> {
    match try_read_document(path) {
        Ok(Some(notebooks)) => {
            info!(
                "event=store_load module=store status=ok notebooks={}",
                notebooks.len()
            );
            notebooks
        }
        Ok(None) => {
            info!("event=store_load module=store status=ok reason=missing_document notebooks=0");
            Vec::new()
        }
        Err(err) => {
            error!(
                "event=store_load module=store status=error action=reset_collection error={}",
                err
            );
            Vec::new()
        }
    }
}

fn try_read_document(path: &Path) -> StoreResult<Option<Vec<Notebook>>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(StoreError::Decode)
}

/// Replaces the document at `path` with `contents`.
pub(super) fn write_document_atomic(path: &Path, contents: &[u8]) -> StoreResult<()> {
    let Some(parent) = path.parent() else {
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source: io::Error::other("document path has no parent"),
        });
    };
    let Some(file_name) = path.file_name() else {
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source: io::Error::other("document path has no file name"),
        });
    };

    fs::create_dir_all(parent).map_err(|source| StoreError::Io {
        path: parent.to_path_buf(),
        source,
    })?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let tmp_path = parent.join(format!(
        ".{}.tmp.{}.{}",
        file_name.to_string_lossy(),
        std::process::id(),
        nanos
    ));

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)
        .map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;

    let written = file.write_all(contents).and_then(|()| file.sync_all());
    drop(file);
    if let Err(source) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::Io {
            path: tmp_path,
            source,
        });
    }

    if let Err(source) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{read_document, write_document_atomic};
    use std::fs;

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notebooks.json");

        write_document_atomic(&path, b"[]").unwrap();
        write_document_atomic(&path, b"[ ]").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(fs::read(&path).unwrap(), b"[ ]");
    }

    #[test]
    fn unreadable_document_resets_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notebooks.json");
        fs::write(&path, b"{ not json").unwrap();

        assert!(read_document(&path).is_empty());
    }
}

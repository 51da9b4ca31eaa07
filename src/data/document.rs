//! Whole-document JSON persistence
//!
//! A document is never edited in place: every save writes a sibling
//! temporary file, syncs it, and renames it over the original.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Document persistence errors
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Filesystem failure
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Document could not be encoded or decoded
    #[error("Malformed document {path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl DocumentError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn codec(path: &Path, source: serde_json::Error) -> Self {
        Self::Codec {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Temporary path used while rewriting `path`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read a document, returning `T::default()` when the file does not exist
pub async fn read_document<T>(path: &Path) -> Result<T, DocumentError>
where
    T: DeserializeOwned + Default,
{
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(DocumentError::io(path, e)),
    };

    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }

    serde_json::from_slice(&bytes).map_err(|e| DocumentError::codec(path, e))
}

/// Atomically replace the document at `path` with `value`
pub async fn write_document<T>(path: &Path, value: &T) -> Result<(), DocumentError>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_vec_pretty(value).map_err(|e| DocumentError::codec(path, e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| DocumentError::io(parent, e))?;
    }

    let tmp = temp_path(path);
    let mut file = fs::File::create(&tmp)
        .await
        .map_err(|e| DocumentError::io(&tmp, e))?;
    file.write_all(&json)
        .await
        .map_err(|e| DocumentError::io(&tmp, e))?;
    file.sync_all()
        .await
        .map_err(|e| DocumentError::io(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path)
        .await
        .map_err(|e| DocumentError::io(path, e))?;

    tracing::debug!(path = %path.display(), bytes = json.len(), "Document written");
    Ok(())
}

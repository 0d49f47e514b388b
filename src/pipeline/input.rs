//! Input units: one user-selected file, content loaded on demand.
//!
//! Selecting a file only records its name and size. The bytes are read when
//! the resource loader asks for them, so a batch of large files costs nothing
//! until the run reaches each unit in turn.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
enum Source {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// One user-supplied source file before decoding.
#[derive(Debug, Clone)]
pub struct InputUnit {
    name: String,
    size: u64,
    source: Source,
}

impl InputUnit {
    /// Record a file on disk. Reads metadata only.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| ConvertError::unreadable(&name, e))?;
        if !meta.is_file() {
            return Err(ConvertError::unreadable(&name, "not a regular file"));
        }

        debug!("Selected {} ({} bytes)", path.display(), meta.len());
        Ok(Self {
            name,
            size: meta.len(),
            source: Source::Path(path.to_path_buf()),
        })
    }

    /// Wrap bytes already in memory.
    ///
    /// Any directory part of `name` is dropped; only the final component is
    /// kept.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: file_name_only(&name.into()),
            size: bytes.len() as u64,
            source: Source::Memory(bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// The name up to the first `.`; the full name if that prefix is empty.
    pub fn base_name(&self) -> &str {
        match self.name.split('.').next() {
            Some(stem) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    /// Read the raw content.
    pub async fn read(&self) -> Result<Vec<u8>, ConvertError> {
        let bytes = match &self.source {
            Source::Memory(b) => b.to_vec(),
            Source::Path(p) => tokio::fs::read(p)
                .await
                .map_err(|e| ConvertError::unreadable(&self.name, e))?,
        };
        if bytes.is_empty() {
            return Err(ConvertError::unreadable(&self.name, "file is empty"));
        }
        Ok(bytes)
    }
}

fn file_name_only(name: &str) -> String {
    match name.rsplit(['/', '\\']).next() {
        Some(last) if !last.is_empty() && last != "." && last != ".." => last.to_string(),
        _ => "input".to_string(),
    }
}

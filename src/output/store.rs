use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// MIME type of every produced artifact
pub const OUTPUT_MIME_TYPE: &str = "audio/mpeg";

/// Revocable reference to produced bytes
///
/// Once revoked, the handle no longer resolves to anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputHandle(Uuid);

impl fmt::Display for OutputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output:{}", self.0)
    }
}

/// Bytes held by the store
#[derive(Debug, Clone)]
pub struct Blob {
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

/// Registry of produced outputs, addressed by [`OutputHandle`]
#[derive(Debug, Clone, Default)]
pub struct OutputStore {
    blobs: Arc<RwLock<HashMap<OutputHandle, Blob>>>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `bytes` and return a handle to them
    pub fn create(&self, bytes: Vec<u8>, mime_type: &str) -> OutputHandle {
        let handle = OutputHandle(Uuid::new_v4());
        let size = bytes.len();

        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                handle,
                Blob {
                    mime_type: mime_type.to_string(),
                    bytes: bytes.into(),
                },
            );

        debug!("Created {} ({} bytes, {})", handle, size, mime_type);
        handle
    }

    /// Look up the bytes behind a handle
    pub fn resolve(&self, handle: &OutputHandle) -> Option<Blob> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .cloned()
    }

    /// Release the bytes behind a handle; returns whether it was live
    pub fn revoke(&self, handle: &OutputHandle) -> bool {
        let removed = self
            .blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle)
            .is_some();

        if removed {
            debug!("Revoked {}", handle);
        }
        removed
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A produced file ready to be saved under its output name
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl Download {
    /// Write the file into `dir`, returning the written path
    pub async fn save(&self, dir: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
        use anyhow::Context;

        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Saved {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

//! Source retrieval for the coordinator
//!
//! The coordinator never reads files directly. It asks the [`SourceProvider`]
//! it was constructed with, which lets an editor hand in the contents of
//! unsaved buffers instead of what is on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::paths;

/// Capability returning the current contents of a file
pub trait SourceProvider: Send + Sync {
    /// Return the bytes to parse for `path`, or `None` to let the engine read
    /// the file itself.
    fn read_source(&self, path: &Path) -> Option<Vec<u8>>;
}

/// Reads sources straight from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemSource;

impl SourceProvider for FileSystemSource {
    fn read_source(&self, path: &Path) -> Option<Vec<u8>> {
        match std::fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!("Cannot read {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Provider that never supplies bytes; the engine reads files on its own
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineReadsSource;

impl SourceProvider for EngineReadsSource {
    fn read_source(&self, _path: &Path) -> Option<Vec<u8>> {
        None
    }
}

/// Unsaved editor buffers layered over another provider
///
/// Buffers are keyed by the lexically normalized path, the same identity the
/// coordinator asks for, so `dir/../a.c` and `./a.c` name the same buffer.
pub struct BufferOverlay {
    buffers: RwLock<HashMap<PathBuf, Arc<[u8]>>>,
    fallback: Arc<dyn SourceProvider>,
}

impl BufferOverlay {
    /// Create an overlay falling back to the filesystem
    pub fn new() -> Self {
        Self::with_fallback(Arc::new(FileSystemSource))
    }

    /// Create an overlay over an arbitrary provider
    pub fn with_fallback(fallback: Arc<dyn SourceProvider>) -> Self {
        Self {
            buffers: RwLock::new(HashMap::new()),
            fallback,
        }
    }

    /// Set (or replace) the in-memory contents of a file
    pub fn set_buffer(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        let contents: Vec<u8> = contents.into();
        let path = paths::normalize(&path.into());
        self.buffers.write().insert(path, contents.into());
    }

    /// Drop the in-memory contents of a file (e.g. after saving or closing)
    pub fn clear_buffer(&self, path: &Path) -> bool {
        self.buffers.write().remove(&paths::normalize(path)).is_some()
    }

    /// Check if a file currently has an unsaved buffer
    pub fn has_buffer(&self, path: &Path) -> bool {
        self.buffers.read().contains_key(&paths::normalize(path))
    }

    /// Number of open buffers
    pub fn len(&self) -> usize {
        self.buffers.read().len()
    }

    /// Check if no buffers are open
    pub fn is_empty(&self) -> bool {
        self.buffers.read().is_empty()
    }
}

impl Default for BufferOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceProvider for BufferOverlay {
    fn read_source(&self, path: &Path) -> Option<Vec<u8>> {
        if let Some(buffer) = self.buffers.read().get(&paths::normalize(path)) {
            return Some(buffer.to_vec());
        }
        self.fallback.read_source(path)
    }
}

impl std::fmt::Debug for BufferOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferOverlay")
            .field("buffers", &self.len())
            .finish()
    }
}

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::BlobStore;
use crate::errors::StorageFault;

// ---

/// Static assets served from a directory tree; URL paths map onto files below `root`.
#[derive(Debug, Clone)]
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    // ---
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a URL path below the root. Anything but plain segments is refused.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        // ---
        let mut path = self.root.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(segment) => path.push(segment),
                Component::CurDir => {}
                _ => return None,
            }
        }
        (path != self.root).then_some(path)
    }
}

impl BlobStore for DirBlobStore {
    fn fetch(&self, url_path: &str) -> Result<Vec<u8>, StorageFault> {
        // ---
        let path = self
            .map_path(url_path)
            .ok_or_else(|| StorageFault::NotFound {
                path: PathBuf::from(url_path),
            })?;
        if !path.is_file() {
            return Err(StorageFault::NotFound { path });
        }
        fs::read(&path).map_err(|e| StorageFault::io("read", path, e))
    }
}

//! Directory-backed object store.
//!
//! Containers are subdirectories of the store root and keys are file paths
//! relative to their container. Ranges are served from a memory map of the
//! requested window of the file.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use memmap2::{Mmap, MmapOptions};

use super::{ObjectMetadata, ObjectStore};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, container: &str, key: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(container).join(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(StoreError::AccessDenied {
                container: container.to_string(),
                key: key.to_string(),
                message: "path leaves the store root".into(),
            });
        }
        Ok(self.root.join(relative))
    }

    fn map_error(err: io::Error, container: &str, key: &str) -> StoreError {
        match err.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            },
            io::ErrorKind::PermissionDenied => StoreError::AccessDenied {
                container: container.to_string(),
                key: key.to_string(),
                message: err.to_string(),
            },
            _ => StoreError::Io(err),
        }
    }
}

/// Owned reader over a mapped window of a file.
struct MappedRange {
    map: Mmap,
    pos: usize,
}

impl Read for MappedRange {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.map[self.pos..];
        let len = buf.len().min(remaining.len());
        buf[..len].copy_from_slice(&remaining[..len]);
        self.pos += len;
        Ok(len)
    }
}

impl ObjectStore for LocalStore {
    fn metadata(&self, container: &str, key: &str) -> StoreResult<ObjectMetadata> {
        let path = self.resolve(container, key)?;
        let meta = fs::metadata(&path).map_err(|e| Self::map_error(e, container, key))?;
        if !meta.is_file() {
            return Err(StoreError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            });
        }
        Ok(ObjectMetadata { length: meta.len() })
    }

    fn get_range(
        &self,
        container: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> StoreResult<Box<dyn Read + Send>> {
        let path = self.resolve(container, key)?;
        let file = File::open(&path).map_err(|e| Self::map_error(e, container, key))?;
        let file_len = file.metadata()?.len();
        if start > end || start >= file_len {
            return Err(StoreError::Transport(format!(
                "range {start}-{end} not satisfiable for {} ({file_len} bytes)",
                path.display()
            )));
        }
        let end = end.min(file_len - 1);
        let len = usize::try_from(end - start + 1)
            .map_err(|_| StoreError::Transport(format!("range {start}-{end} too large to map")))?;

        // Safety: objects are treated as immutable while a session reads them.
        let map = unsafe { MmapOptions::new().offset(start).len(len).map(&file)? };
        Ok(Box::new(MappedRange { map, pos: 0 }))
    }
}

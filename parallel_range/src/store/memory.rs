use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{ObjectMetadata, ObjectStore};
use crate::error::{StoreError, StoreResult};

/// Object store held entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<(String, String), Arc<Vec<u8>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `data` under `container/key`, replacing any previous object.
    pub fn insert(&self, container: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .insert((container.to_string(), key.to_string()), Arc::new(data.into()));
    }

    fn object(&self, container: &str, key: &str) -> StoreResult<Arc<Vec<u8>>> {
        self.objects
            .read()
            .get(&(container.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            })
    }
}

/// Reader over a shared slice of an in-memory object.
struct SharedSlice {
    data: Arc<Vec<u8>>,
    pos: usize,
    end: usize,
}

impl Read for SharedSlice {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let len = buf.len().min(self.end - self.pos);
        buf[..len].copy_from_slice(&self.data[self.pos..self.pos + len]);
        self.pos += len;
        Ok(len)
    }
}

impl ObjectStore for MemoryStore {
    fn metadata(&self, container: &str, key: &str) -> StoreResult<ObjectMetadata> {
        let data = self.object(container, key)?;
        Ok(ObjectMetadata {
            length: data.len() as u64,
        })
    }

    fn get_range(
        &self,
        container: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> StoreResult<Box<dyn Read + Send>> {
        let data = self.object(container, key)?;
        let len = data.len() as u64;
        if start > end || start >= len {
            return Err(StoreError::Transport(format!(
                "range {start}-{end} not satisfiable for object of {len} bytes"
            )));
        }
        // Like an HTTP range request, an end past the object is cut short.
        let end = end.min(len - 1);
        Ok(Box::new(SharedSlice {
            data,
            pos: start as usize,
            end: end as usize + 1,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_and_range() {
        let store = MemoryStore::new();
        store.insert("bucket", "key", (0u8..100).collect::<Vec<_>>());

        assert_eq!(store.metadata("bucket", "key").unwrap().length, 100);

        let mut out = Vec::new();
        store
            .get_range("bucket", "key", 10, 19)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, (10u8..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_range_over_large_object() {
        let store = MemoryStore::new();
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        store.insert("bucket", "big", data.clone());

        let mut out = Vec::new();
        store
            .get_range("bucket", "big", 5000, 9999)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, &data[5000..]);
    }

    #[test]
    fn test_missing_object() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.metadata("bucket", "nope"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_range_past_end_is_cut_short() {
        let store = MemoryStore::new();
        store.insert("bucket", "key", vec![7u8; 10]);

        let mut out = Vec::new();
        store
            .get_range("bucket", "key", 5, 100)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out.len(), 5);
        assert!(store.get_range("bucket", "key", 10, 20).is_err());
    }
}

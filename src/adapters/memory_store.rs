//! In-memory storage adapter.
//!
//! Backs [`StoragePort`] with a plain map. Used by the host simulation
//! binary and by tests; a real build swaps in an EEPROM- or flash-backed
//! adapter with the same trait.

use std::collections::HashMap;

use crate::app::ports::{StorageError, StoragePort};

/// Volatile key-value store with the same semantics as the persistent one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<(String, String), Vec<u8>>,
    /// When set, every write fails. Lets tests exercise save-failure paths.
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StoragePort for MemoryStore {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self
            .entries
            .get(&(namespace.to_owned(), key.to_owned()))
            .ok_or(StorageError::NotFound)?;
        if data.len() > buf.len() {
            return Err(StorageError::IoError);
        }
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.entries
            .insert((namespace.to_owned(), key.to_owned()), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.entries.remove(&(namespace.to_owned(), key.to_owned()));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.entries
            .contains_key(&(namespace.to_owned(), key.to_owned()))
    }
}

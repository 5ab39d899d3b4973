//! In-memory secret store.
//!
//! Backs tests and the `memory` backend. Nothing is persisted; contents
//! die with the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::StoreError;

#[derive(Clone, Default)]
pub struct MemoryStore {
    items: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let items = self.items.lock().expect("memory store poisoned");
        items.get(key).cloned().ok_or(StoreError::NotFound)
    }

    pub fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut items = self.items.lock().expect("memory store poisoned");
        items.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut items = self.items.lock().expect("memory store poisoned");
        items.remove(key).map(|_| ()).ok_or(StoreError::NotFound)
    }

    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let items = self.items.lock().expect("memory store poisoned");
        let mut keys: Vec<String> = items.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

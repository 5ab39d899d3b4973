//! OS-native secret store, via the `keyring` crate.
//!
//! The crate routes to the platform store (macOS Keychain, Linux kernel
//! keyutils, Windows Credential Manager). Entries are scoped under a
//! configurable service name so multiple vaults on one machine never
//! collide.
//!
//! The platform stores cannot enumerate entries, so this back end keeps a
//! JSON index of its keys in a reserved entry and updates it on every
//! write and delete. `keys()` reads the index.

use keyring::Entry;

use super::StoreError;

/// Reserved entry holding the JSON list of keys in this store.
const INDEX_KEY: &str = "__aws-vault-index__";

const DEFAULT_SERVICE: &str = "aws-vault";

pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Create a store scoped to `service` (default `aws-vault`).
    pub fn new(service: Option<&str>) -> Self {
        Self {
            service: service.unwrap_or(DEFAULT_SERVICE).to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service, key).map_err(map_err)
    }

    /// Check whether the platform store actually works, with a write/read/
    /// delete round trip. Catches the crate falling back to a mock store.
    pub fn probe(&self) -> bool {
        let Ok(entry) = Entry::new(&self.service, "__aws-vault-probe__") else {
            return false;
        };
        if entry.set_secret(b"probe").is_err() {
            return false;
        }
        let ok = entry.get_secret().map(|v| v == b"probe").unwrap_or(false);
        let _ = entry.delete_credential();
        ok
    }

    pub fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.entry(key)?.get_secret().map_err(map_err)
    }

    pub fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entry(key)?.set_secret(value).map_err(map_err)?;
        self.update_index(|keys| {
            if !keys.iter().any(|k| k.as_str() == key) {
                keys.push(key.to_string());
            }
        })
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entry(key)?.delete_credential().map_err(map_err)?;
        self.update_index(|keys| keys.retain(|k| k.as_str() != key))
    }

    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = self.read_index()?;
        keys.sort();
        Ok(keys)
    }

    fn read_index(&self) -> Result<Vec<String>, StoreError> {
        match self.entry(INDEX_KEY)?.get_secret() {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Integrity(format!("corrupt keyring index: {}", e))),
            Err(keyring::Error::NoEntry) => Ok(Vec::new()),
            Err(e) => Err(map_err(e)),
        }
    }

    fn update_index(&self, mutate: impl FnOnce(&mut Vec<String>)) -> Result<(), StoreError> {
        let mut keys = self.read_index()?;
        mutate(&mut keys);
        let bytes = serde_json::to_vec(&keys)
            .map_err(|e| StoreError::Other(format!("serializing keyring index: {}", e)))?;
        self.entry(INDEX_KEY)?.set_secret(&bytes).map_err(map_err)
    }
}

fn map_err(e: keyring::Error) -> StoreError {
    match e {
        keyring::Error::NoEntry => StoreError::NotFound,
        keyring::Error::NoStorageAccess(e) => StoreError::Locked(e.to_string()),
        keyring::Error::PlatformFailure(e) => StoreError::Unavailable(e.to_string()),
        other => StoreError::Other(other.to_string()),
    }
}

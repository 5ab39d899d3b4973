//! Secret-store abstraction.
//!
//! A uniform key/value interface over platform secret back ends. Keys are
//! opaque strings, values are byte strings. The back end is selected once
//! (flag or `AWS_VAULT_BACKEND`) and fixed for the lifetime of the process.
//!
//! Back ends:
//! - `keychain` -- the OS-native store (macOS Keychain, Linux Secret
//!   Service, Windows Credential Manager) via the `keyring` crate
//! - `pass` -- the standard unix password store
//! - `file` -- age-encrypted files, passphrase-protected
//! - `memory` -- a process-local map, for tests and throwaway use

mod file;
mod keyring;
mod memory;
mod pass;

pub use self::file::FileStore;
pub use self::keyring::KeyringStore;
pub use self::memory::MemoryStore;
pub use self::pass::PassStore;

use std::fmt;
use std::path::PathBuf;

/// Categorised secret-store failure.
#[derive(Debug)]
pub enum StoreError {
    /// The key does not exist.
    NotFound,
    /// The store exists but is locked and could not be unlocked.
    Locked(String),
    /// The back end is not usable in this environment.
    Unavailable(String),
    /// Stored data could not be decrypted or parsed.
    Integrity(String),
    /// Any other failure.
    Other(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "not found"),
            StoreError::Locked(msg) => write!(f, "store is locked: {}", msg),
            StoreError::Unavailable(msg) => write!(f, "backend unavailable: {}", msg),
            StoreError::Integrity(msg) => write!(f, "integrity failure: {}", msg),
            StoreError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Settings that pick and parameterise a back end.
///
/// Defaults mirror the environment variables in the CLI surface:
/// `AWS_VAULT_BACKEND`, `AWS_VAULT_KEYCHAIN_NAME`, `AWS_VAULT_FILE_DIR`,
/// `AWS_VAULT_PASS_PREFIX`, `AWS_VAULT_PASS_CMD`.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub backend: Option<String>,
    pub keychain_name: Option<String>,
    pub file_dir: Option<PathBuf>,
    pub pass_prefix: Option<String>,
    pub pass_cmd: Option<String>,
}

/// The selected secret store. Back ends are a closed set of variants; one
/// is chosen at startup and used for the whole process.
pub enum SecretStore {
    Keyring(KeyringStore),
    File(FileStore),
    Pass(PassStore),
    Memory(MemoryStore),
}

/// Back-end names accepted by `--backend`, most preferred first.
pub fn available_backends() -> &'static [&'static str] {
    &["keychain", "pass", "file", "memory"]
}

impl SecretStore {
    /// Open the back end named by `config.backend` (default: `keychain`).
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let backend = config.backend.as_deref().unwrap_or("keychain");
        match backend {
            // All the OS-native stores route through the keyring crate,
            // which picks the platform implementation itself.
            "keychain" | "keyring" | "secret-service" | "kwallet" | "wincred" => Ok(
                SecretStore::Keyring(KeyringStore::new(config.keychain_name.as_deref())),
            ),
            "pass" => Ok(SecretStore::Pass(PassStore::new(
                config.pass_prefix.as_deref(),
                config.pass_cmd.as_deref(),
            ))),
            "file" => Ok(SecretStore::File(FileStore::new(config.file_dir.clone())?)),
            "memory" => Ok(SecretStore::Memory(MemoryStore::new())),
            other => Err(StoreError::Unavailable(format!(
                "unknown backend '{}', expected one of {:?}",
                other,
                available_backends()
            ))),
        }
    }

    /// Name of the selected back end, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            SecretStore::Keyring(_) => "keychain",
            SecretStore::File(_) => "file",
            SecretStore::Pass(_) => "pass",
            SecretStore::Memory(_) => "memory",
        }
    }

    pub fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        match self {
            SecretStore::Keyring(s) => s.get(key),
            SecretStore::File(s) => s.get(key),
            SecretStore::Pass(s) => s.get(key),
            SecretStore::Memory(s) => s.get(key),
        }
    }

    pub fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        match self {
            SecretStore::Keyring(s) => s.set(key, value),
            SecretStore::File(s) => s.set(key, value),
            SecretStore::Pass(s) => s.set(key, value),
            SecretStore::Memory(s) => s.set(key, value),
        }
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        match self {
            SecretStore::Keyring(s) => s.remove(key),
            SecretStore::File(s) => s.remove(key),
            SecretStore::Pass(s) => s.remove(key),
            SecretStore::Memory(s) => s.remove(key),
        }
    }

    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        match self {
            SecretStore::Keyring(s) => s.keys(),
            SecretStore::File(s) => s.keys(),
            SecretStore::Pass(s) => s.keys(),
            SecretStore::Memory(s) => s.keys(),
        }
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = self.keys()?;
        keys.retain(|k| k.starts_with(prefix));
        Ok(keys)
    }
}

/// Encode a store key into a string safe for filenames and pass entry
/// paths. Reversible: alphanumerics and `-_.` pass through, everything
/// else becomes `%XX`.
pub(crate) fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Inverse of [`escape_key`]. Returns `None` for malformed input.
pub(crate) fn unescape_key(escaped: &str) -> Option<String> {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hexpair = escaped.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hexpair, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

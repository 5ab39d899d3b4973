//! Encrypted-file secret store.
//!
//! The fallback for machines without a usable OS store. Each key becomes
//! one age-encrypted file (scrypt passphrase, compatible with the age CLI)
//! under the store directory, default `~/.awsvault/keys/`, overridable via
//! `AWS_VAULT_FILE_DIR`.
//!
//! The passphrase comes from `AWS_VAULT_FILE_PASSPHRASE` when set,
//! otherwise from a hidden prompt. It is cached after first use so one
//! invocation never prompts twice.

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use age::secrecy::SecretString;

use super::{StoreError, escape_key, unescape_key};

const PASSPHRASE_ENV: &str = "AWS_VAULT_FILE_PASSPHRASE";
const FILE_DIR_ENV: &str = "AWS_VAULT_FILE_DIR";

pub struct FileStore {
    dir: PathBuf,
    // Prompt-once cache for the store passphrase.
    passphrase: Mutex<Option<SecretString>>,
}

impl FileStore {
    /// Open (creating if needed) the store directory.
    pub fn new(dir: Option<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir
            .or_else(|| std::env::var(FILE_DIR_ENV).ok().map(PathBuf::from))
            .or_else(|| dirs::home_dir().map(|h| h.join(".awsvault").join("keys")))
            .ok_or_else(|| {
                StoreError::Unavailable("cannot determine file store directory".into())
            })?;
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Unavailable(format!("creating {}: {}", dir.display(), e)))?;
        Ok(Self {
            dir,
            passphrase: Mutex::new(None),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(escape_key(key))
    }

    fn passphrase(&self) -> Result<SecretString, StoreError> {
        let mut cached = self.passphrase.lock().expect("passphrase cache poisoned");
        if let Some(p) = cached.as_ref() {
            return Ok(p.clone());
        }
        let passphrase = if let Ok(p) = std::env::var(PASSPHRASE_ENV) {
            SecretString::from(p)
        } else {
            eprint!("Enter passphrase to unlock {}: ", self.dir.display());
            std::io::stderr().flush().ok();
            let p = rpassword::read_password()
                .map_err(|e| StoreError::Locked(format!("reading passphrase: {}", e)))?;
            if p.is_empty() {
                return Err(StoreError::Locked("passphrase cannot be empty".into()));
            }
            SecretString::from(p)
        };
        *cached = Some(passphrase.clone());
        Ok(passphrase)
    }

    pub fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Err(StoreError::NotFound);
        }
        let encrypted = fs::read(&path).map_err(|e| StoreError::Other(e.to_string()))?;
        decrypt(&encrypted, self.passphrase()?)
    }

    pub fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let encrypted = encrypt(value, self.passphrase()?)?;
        fs::write(self.path_for(key), encrypted).map_err(|e| StoreError::Other(e.to_string()))
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Err(StoreError::NotFound);
        }
        fs::remove_file(path).map_err(|e| StoreError::Other(e.to_string()))
    }

    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::Other(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Other(e.to_string()))?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(key) = unescape_key(name) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn encrypt(data: &[u8], passphrase: SecretString) -> Result<Vec<u8>, StoreError> {
    let encryptor = age::Encryptor::with_user_passphrase(passphrase);
    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| StoreError::Other(e.to_string()))?;
    writer
        .write_all(data)
        .and_then(|_| writer.finish().map(|_| ()))
        .map_err(|e| StoreError::Other(e.to_string()))?;
    Ok(encrypted)
}

fn decrypt(encrypted: &[u8], passphrase: SecretString) -> Result<Vec<u8>, StoreError> {
    let decryptor = age::Decryptor::new(encrypted)
        .map_err(|e| StoreError::Integrity(format!("not an age file: {}", e)))?;
    let identity = age::scrypt::Identity::new(passphrase);
    let mut reader = decryptor
        .decrypt(std::iter::once(&identity as &dyn age::Identity))
        .map_err(|e| StoreError::Integrity(format!("decryption failed: {}", e)))?;
    let mut decrypted = Vec::new();
    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| StoreError::Integrity(e.to_string()))?;
    Ok(decrypted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(Some(dir.path().join("keys"))).unwrap();
        // Pre-seed the passphrase so tests never prompt.
        *store.passphrase.lock().unwrap() = Some(SecretString::from("test-passphrase".to_string()));
        (dir, store)
    }

    #[test]
    fn test_roundtrip() {
        let (_dir, store) = test_store();
        store.set("session:prod:abcd", b"payload").unwrap();
        assert_eq!(store.get("session:prod:abcd").unwrap(), b"payload");
    }

    #[test]
    fn test_missing_key() {
        let (_dir, store) = test_store();
        assert!(matches!(store.get("absent"), Err(StoreError::NotFound)));
        assert!(matches!(store.remove("absent"), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_keys_decode_filenames() {
        let (_dir, store) = test_store();
        store.set("prod", b"a").unwrap();
        store.set("session:prod:1234", b"b").unwrap();
        assert_eq!(
            store.keys().unwrap(),
            vec!["prod".to_string(), "session:prod:1234".to_string()]
        );
    }

    #[test]
    fn test_wrong_passphrase_is_integrity_failure() {
        let (_dir, store) = test_store();
        store.set("prod", b"a").unwrap();
        *store.passphrase.lock().unwrap() = Some(SecretString::from("wrong".to_string()));
        assert!(matches!(store.get("prod"), Err(StoreError::Integrity(_))));
    }

    #[test]
    fn test_encrypted_on_disk() {
        let (_dir, store) = test_store();
        store.set("prod", b"supersecret").unwrap();
        let raw = fs::read(store.path_for("prod")).unwrap();
        assert!(!raw.windows(b"supersecret".len()).any(|w| w == &b"supersecret"[..]));
    }
}

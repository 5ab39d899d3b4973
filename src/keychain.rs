//! Typed credential operations over the secret store.
//!
//! The store itself only knows opaque keys and byte values; this facade
//! understands the three value schemas the vault persists:
//!
//! - long-lived access keys, keyed by profile name
//! - session snapshots, keyed by `session:{profile}:{fingerprint}`
//! - SSO client registrations and access tokens, keyed by
//!   `sso-token:{start_url}`
//!
//! Removing a profile also removes every session entry under the
//! profile's prefix, so stale sessions never outlive their principal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::creds::CredentialSnapshot;
use crate::error::{Error, Result};
use crate::store::{SecretStore, StoreError};

/// Reserved namespace for session snapshots.
const SESSION_PREFIX: &str = "session:";

/// Reserved namespace for SSO registrations and tokens.
const SSO_TOKEN_PREFIX: &str = "sso-token:";

/// A cached SSO client registration and (optionally) the access token
/// minted through it, stored per start URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoRegistration {
    pub client_id: String,
    pub client_secret: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub registration_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token_expires_at: Option<DateTime<Utc>>,
}

pub struct CredentialKeyring {
    store: SecretStore,
}

impl CredentialKeyring {
    pub fn new(store: SecretStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SecretStore {
        &self.store
    }

    fn session_key(cache_key: &str) -> String {
        format!("{}{}", SESSION_PREFIX, cache_key)
    }

    fn sso_key(start_url: &str) -> String {
        format!("{}{}", SSO_TOKEN_PREFIX, normalize_start_url(start_url))
    }

    // ── Long-lived credentials ─────────────────────────────────────────

    /// Whether long-lived credentials are stored for `profile`.
    pub fn has(&self, profile: &str) -> Result<bool> {
        match self.store.get(profile) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch the long-lived credentials for `profile`.
    pub fn get(&self, profile: &str) -> Result<CredentialSnapshot> {
        let bytes = match self.store.get(profile) {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound) => {
                return Err(Error::CredentialsMissing(profile.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let snapshot: CredentialSnapshot = serde_json::from_slice(&bytes)?;
        Ok(snapshot)
    }

    /// Store long-lived credentials for `profile`. Session tokens and
    /// expiries never belong in a long-lived entry and are dropped.
    pub fn set(&self, profile: &str, creds: &CredentialSnapshot) -> Result<()> {
        let long_lived = CredentialSnapshot::long_lived(
            creds.access_key_id.clone(),
            creds.secret_access_key.clone(),
        );
        let bytes = serde_json::to_vec(&long_lived)?;
        self.store.set(profile, &bytes)?;
        Ok(())
    }

    /// Remove the long-lived credentials for `profile`, cascading over
    /// every session entry under the profile's prefix.
    pub fn remove(&self, profile: &str) -> Result<()> {
        self.store.remove(profile)?;
        self.session_clear(Some(profile))?;
        Ok(())
    }

    /// Names of profiles that have long-lived credentials stored.
    pub fn profiles_with_credentials(&self) -> Result<Vec<String>> {
        let keys = self.store.keys()?;
        Ok(keys
            .into_iter()
            .filter(|k| !k.starts_with(SESSION_PREFIX) && !k.starts_with(SSO_TOKEN_PREFIX))
            .collect())
    }

    // ── Session snapshots ──────────────────────────────────────────────

    /// Fetch a session snapshot by cache key. `Ok(None)` on miss.
    pub fn session_get(&self, cache_key: &str) -> Result<Option<CredentialSnapshot>> {
        match self.store.get(&Self::session_key(cache_key)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn session_put(&self, cache_key: &str, snapshot: &CredentialSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.store.set(&Self::session_key(cache_key), &bytes)?;
        Ok(())
    }

    pub fn session_remove(&self, cache_key: &str) -> Result<()> {
        self.store.remove(&Self::session_key(cache_key))?;
        Ok(())
    }

    /// Cache keys of all stored sessions (namespace prefix stripped).
    pub fn session_keys(&self) -> Result<Vec<String>> {
        let keys = self.store.keys_with_prefix(SESSION_PREFIX)?;
        Ok(keys
            .into_iter()
            .map(|k| k[SESSION_PREFIX.len()..].to_string())
            .collect())
    }

    /// Remove session entries: all of them, or only those belonging to
    /// one profile. Returns the number removed.
    pub fn session_clear(&self, profile: Option<&str>) -> Result<usize> {
        let prefix = match profile {
            Some(name) => format!("{}{}:", SESSION_PREFIX, name),
            None => SESSION_PREFIX.to_string(),
        };
        let keys = self.store.keys_with_prefix(&prefix)?;
        let mut removed = 0;
        for key in keys {
            match self.store.remove(&key) {
                Ok(()) | Err(StoreError::NotFound) => removed += 1,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    // ── SSO registrations and tokens ───────────────────────────────────

    pub fn sso_token_get(&self, start_url: &str) -> Result<Option<SsoRegistration>> {
        match self.store.get(&Self::sso_key(start_url)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn sso_token_put(&self, start_url: &str, registration: &SsoRegistration) -> Result<()> {
        let bytes = serde_json::to_vec(registration)?;
        self.store.set(&Self::sso_key(start_url), &bytes)?;
        Ok(())
    }

    pub fn sso_token_clear(&self, start_url: &str) -> Result<()> {
        match self.store.remove(&Self::sso_key(start_url)) {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Start URLs are case-insensitive hosts with an optional trailing slash;
/// normalise so one portal maps to one cache entry.
pub fn normalize_start_url(start_url: &str) -> String {
    start_url.trim().trim_end_matches('/').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn test_keyring() -> CredentialKeyring {
        CredentialKeyring::new(SecretStore::Memory(MemoryStore::new()))
    }

    #[test]
    fn test_long_lived_roundtrip() {
        let keyring = test_keyring();
        let creds = CredentialSnapshot::long_lived("AKIAEXAMPLE", "secret");
        keyring.set("prod", &creds).unwrap();
        assert!(keyring.has("prod").unwrap());
        assert_eq!(keyring.get("prod").unwrap(), creds);
    }

    #[test]
    fn test_set_strips_session_fields() {
        let keyring = test_keyring();
        let creds = CredentialSnapshot {
            access_key_id: "AKIAEXAMPLE".into(),
            secret_access_key: "secret".into(),
            session_token: Some("token".into()),
            expiration: Some(Utc::now()),
        };
        keyring.set("prod", &creds).unwrap();
        let stored = keyring.get("prod").unwrap();
        assert!(stored.session_token.is_none());
        assert!(stored.expiration.is_none());
    }

    #[test]
    fn test_get_missing_is_credentials_missing() {
        let keyring = test_keyring();
        assert!(matches!(
            keyring.get("nope"),
            Err(Error::CredentialsMissing(_))
        ));
    }

    #[test]
    fn test_remove_cascades_sessions() {
        let keyring = test_keyring();
        let creds = CredentialSnapshot::long_lived("AKIAEXAMPLE", "secret");
        let session = CredentialSnapshot {
            session_token: Some("t".into()),
            expiration: Some(Utc::now()),
            ..creds.clone()
        };
        keyring.set("prod", &creds).unwrap();
        keyring.set("dev", &creds).unwrap();
        keyring.session_put("prod:aaaa", &session).unwrap();
        keyring.session_put("prod:bbbb", &session).unwrap();
        keyring.session_put("dev:cccc", &session).unwrap();

        keyring.remove("prod").unwrap();

        assert!(!keyring.has("prod").unwrap());
        assert!(keyring.session_get("prod:aaaa").unwrap().is_none());
        assert!(keyring.session_get("prod:bbbb").unwrap().is_none());
        // Other profiles' sessions are untouched.
        assert!(keyring.session_get("dev:cccc").unwrap().is_some());
    }

    #[test]
    fn test_profiles_excludes_reserved_namespaces() {
        let keyring = test_keyring();
        let creds = CredentialSnapshot::long_lived("AKIAEXAMPLE", "secret");
        keyring.set("prod", &creds).unwrap();
        keyring.session_put("prod:aaaa", &creds).unwrap();
        keyring
            .sso_token_put(
                "https://corp.awsapps.com/start",
                &SsoRegistration {
                    client_id: "cid".into(),
                    client_secret: "cs".into(),
                    registration_expires_at: None,
                    access_token: None,
                    token_expires_at: None,
                },
            )
            .unwrap();

        assert_eq!(keyring.profiles_with_credentials().unwrap(), vec!["prod"]);
    }

    #[test]
    fn test_sso_token_keyed_by_normalized_url() {
        let keyring = test_keyring();
        let reg = SsoRegistration {
            client_id: "cid".into(),
            client_secret: "cs".into(),
            registration_expires_at: None,
            access_token: Some("tok".into()),
            token_expires_at: None,
        };
        keyring
            .sso_token_put("https://Corp.awsapps.com/start/", &reg)
            .unwrap();
        let fetched = keyring
            .sso_token_get("https://corp.awsapps.com/start")
            .unwrap()
            .unwrap();
        assert_eq!(fetched.access_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_session_clear_scoped() {
        let keyring = test_keyring();
        let creds = CredentialSnapshot::long_lived("AKIAEXAMPLE", "secret");
        keyring.session_put("prod:aaaa", &creds).unwrap();
        keyring.session_put("dev:bbbb", &creds).unwrap();

        assert_eq!(keyring.session_clear(Some("prod")).unwrap(), 1);
        assert_eq!(keyring.session_keys().unwrap(), vec!["dev:bbbb"]);

        assert_eq!(keyring.session_clear(None).unwrap(), 1);
        assert!(keyring.session_keys().unwrap().is_empty());
    }
}

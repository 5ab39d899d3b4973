//! The session cache and the cache-key fingerprint.
//!
//! A thin wrapper over the credential keyring plus a clock. Reads yield a
//! snapshot only while its expiry clears a small refresh margin, so a
//! session is never handed out moments before it dies. Storage errors on
//! read degrade to a miss; errors on write are only warned about -- a
//! broken cache must never break a derivation.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::ProfileConfig;
use crate::creds::CredentialSnapshot;
use crate::keychain::{CredentialKeyring, normalize_start_url};

/// Seconds of headroom: a session this close to expiry counts as stale.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Length of the hex fingerprint in a cache key.
const FINGERPRINT_LENGTH: usize = 16;

/// Derive the cache key for a resolved profile and derivation strategy.
///
/// Every input that affects the derivation feeds the fingerprint -- the
/// strategy included, since one profile can hold several session kinds at
/// once along a role chain -- so two requests with equal keys yield
/// equivalent credentials within their lifetimes. Inputs are trimmed, and
/// the case-insensitive ones are lower-cased, before hashing; the profile
/// name prefixes the key so a profile's sessions can be purged together.
pub fn cache_key(config: &ProfileConfig, kind: &str) -> String {
    fn norm(value: &Option<String>) -> String {
        value.as_deref().unwrap_or("").trim().to_string()
    }

    let mut tags: Vec<String> = config
        .session_tags
        .iter()
        .map(|(k, v)| format!("{}={}", k.trim(), v.trim()))
        .collect();
    tags.sort();
    let mut transitive: Vec<String> = config
        .transitive_session_tags
        .iter()
        .map(|t| t.trim().to_string())
        .collect();
    transitive.sort();

    let parts = [
        config.profile_name.trim().to_string(),
        kind.trim().to_string(),
        norm(&config.role_arn),
        norm(&config.role_session_name),
        config
            .duration_seconds
            .map(|d| d.to_string())
            .unwrap_or_default(),
        norm(&config.mfa_serial),
        norm(&config.external_id),
        tags.join(","),
        transitive.join(","),
        norm(&config.source_identity),
        config
            .sso_start_url
            .as_deref()
            .map(normalize_start_url)
            .unwrap_or_default(),
        norm(&config.sso_account_id),
        norm(&config.sso_role_name),
    ];

    let mut hasher = Sha256::new();
    for part in &parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\n");
    }
    let fingerprint = hex::encode(hasher.finalize());

    format!(
        "{}:{}",
        config.profile_name.trim(),
        &fingerprint[..FINGERPRINT_LENGTH]
    )
}

/// Snapshot store keyed by cache key, with expiry semantics.
#[derive(Clone)]
pub struct SessionCache {
    keyring: Arc<CredentialKeyring>,
    clock: Arc<dyn Clock>,
}

impl SessionCache {
    pub fn new(keyring: Arc<CredentialKeyring>, clock: Arc<dyn Clock>) -> Self {
        Self { keyring, clock }
    }

    /// Fetch a live session for `cache_key`, or `None` on miss or stale.
    pub fn get(&self, cache_key: &str) -> Option<CredentialSnapshot> {
        let snapshot = match self.keyring.session_get(cache_key) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(e) => {
                debug!("session cache read for {} failed, treating as miss: {}", cache_key, e);
                return None;
            }
        };
        if !snapshot.valid_at(self.clock.now(), REFRESH_MARGIN_SECS) {
            debug!("session cache entry {} is stale, purging", cache_key);
            if let Err(e) = self.keyring.session_remove(cache_key) {
                debug!("purging stale session {} failed: {}", cache_key, e);
            }
            return None;
        }
        debug!("re-using cached session for {}", cache_key);
        Some(snapshot)
    }

    /// Store a session snapshot unconditionally.
    pub fn put(&self, cache_key: &str, snapshot: &CredentialSnapshot) {
        if let Err(e) = self.keyring.session_put(cache_key, snapshot) {
            warn!("failed to cache session for {}: {}", cache_key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::{MemoryStore, SecretStore};
    use chrono::{Duration, Utc};

    fn fixture() -> (Arc<CredentialKeyring>, SessionCache, chrono::DateTime<Utc>) {
        let now = Utc::now();
        let keyring = Arc::new(CredentialKeyring::new(SecretStore::Memory(MemoryStore::new())));
        let cache = SessionCache::new(keyring.clone(), Arc::new(FixedClock::new(now)));
        (keyring, cache, now)
    }

    fn session(expires_in_secs: i64, now: chrono::DateTime<Utc>) -> CredentialSnapshot {
        CredentialSnapshot {
            access_key_id: "ASIAEXAMPLE".into(),
            secret_access_key: "secret".into(),
            session_token: Some("token".into()),
            expiration: Some(now + Duration::seconds(expires_in_secs)),
        }
    }

    #[test]
    fn test_hit_within_expiry() {
        let (_keyring, cache, now) = fixture();
        let snapshot = session(3600, now);
        cache.put("prod:abcd", &snapshot);
        assert_eq!(cache.get("prod:abcd"), Some(snapshot));
    }

    #[test]
    fn test_miss_on_absent() {
        let (_keyring, cache, _now) = fixture();
        assert_eq!(cache.get("prod:abcd"), None);
    }

    #[test]
    fn test_stale_within_refresh_margin() {
        let (keyring, cache, now) = fixture();
        cache.put("prod:abcd", &session(REFRESH_MARGIN_SECS - 1, now));
        assert_eq!(cache.get("prod:abcd"), None);
        // Stale entries are purged on read.
        assert!(keyring.session_get("prod:abcd").unwrap().is_none());
    }

    #[test]
    fn test_cache_key_stability() {
        let mut config = ProfileConfig {
            profile_name: "prod".into(),
            role_arn: Some("arn:aws:iam::1:role/x".into()),
            ..Default::default()
        };
        let first = cache_key(&config, "AssumeRole");
        assert_eq!(first, cache_key(&config, "AssumeRole"));
        assert!(first.starts_with("prod:"));

        config.mfa_serial = Some("arn:aws:iam::1:mfa/u".into());
        assert_ne!(first, cache_key(&config, "AssumeRole"));
    }

    #[test]
    fn test_cache_key_distinguishes_kinds() {
        let config = ProfileConfig {
            profile_name: "source".into(),
            role_arn: Some("arn:aws:iam::1:role/source".into()),
            mfa_serial: Some("arn:aws:iam::1:mfa/u".into()),
            ..Default::default()
        };
        // One profile can hold a GetSessionToken session and an
        // AssumeRole session at once; they must not alias.
        assert_ne!(
            cache_key(&config, "GetSessionToken"),
            cache_key(&config, "AssumeRole")
        );
    }

    #[test]
    fn test_cache_key_normalizes_case_insensitive_inputs() {
        let config = |url: &str| ProfileConfig {
            profile_name: "sso".into(),
            sso_start_url: Some(url.into()),
            sso_account_id: Some("111".into()),
            sso_role_name: Some("Admin".into()),
            ..Default::default()
        };
        assert_eq!(
            cache_key(&config("https://Corp.awsapps.com/start/"), "SSORoleCredentials"),
            cache_key(&config("https://corp.awsapps.com/start"), "SSORoleCredentials")
        );
    }

    #[test]
    fn test_cache_key_tag_order_irrelevant() {
        let config = |tags: Vec<(&str, &str)>| ProfileConfig {
            profile_name: "p".into(),
            session_tags: tags
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        };
        assert_eq!(
            cache_key(&config(vec![("a", "1"), ("b", "2")]), "AssumeRole"),
            cache_key(&config(vec![("b", "2"), ("a", "1")]), "AssumeRole")
        );
    }
}

//! The session-cache wrapper.
//!
//! Consults the cache before the wrapped provider runs, and stores any
//! expiring snapshot it produces. A mutex serialises concurrent `get`s so
//! at most one derivation runs per cache key; other keys (other wrapper
//! instances) proceed in parallel.

use tokio::sync::Mutex;

use crate::creds::CredentialSnapshot;
use crate::error::Result;
use crate::provider::{ProvideCredentials, TempCredentialsProvider};
use crate::session::SessionCache;

pub struct CachedSessionProvider {
    cache: SessionCache,
    cache_key: String,
    inner: Box<TempCredentialsProvider>,
    lock: Mutex<()>,
}

impl std::fmt::Debug for CachedSessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSessionProvider")
            .field("cache_key", &self.cache_key)
            .field("inner", &self.inner)
            .finish()
    }
}

impl CachedSessionProvider {
    pub fn new(cache: SessionCache, cache_key: String, inner: Box<TempCredentialsProvider>) -> Self {
        Self {
            cache,
            cache_key,
            inner,
            lock: Mutex::new(()),
        }
    }

    pub fn inner(&self) -> &TempCredentialsProvider {
        &self.inner
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub async fn get(&self) -> Result<CredentialSnapshot> {
        let _guard = self.lock.lock().await;

        if let Some(snapshot) = self.cache.get(&self.cache_key) {
            return Ok(snapshot);
        }

        let snapshot = self.inner.get().await?;
        // Outputs without an expiry (e.g. a credential process handing
        // out long-lived keys) are never cached.
        if snapshot.is_session() {
            self.cache.put(&self.cache_key, &snapshot);
        }
        Ok(snapshot)
    }
}

//! Short-lived credential providers.
//!
//! The provider set is closed and known at design time: one variant per
//! derivation strategy, plus the caching wrapper. [`ProvideCredentials`]
//! is the uniform capability over the variants; each `get()` yields a
//! dated [`CredentialSnapshot`] and is idempotent within the lifetime of
//! its cached snapshot.

mod assume_role;
mod cached;
mod factory;
mod keyring;
mod process;
mod session_token;
mod sso;
mod web_identity;

pub use self::assume_role::{AssumeRoleBase, AssumeRoleProvider};
pub use self::cached::CachedSessionProvider;
pub use self::factory::{TempCredentialsCreator, new_temp_credentials_provider};
pub use self::keyring::KeyringProvider;
pub use self::process::CredentialProcessProvider;
pub use self::session_token::SessionTokenProvider;
pub use self::sso::SsoRoleCredentialsProvider;
pub use self::web_identity::{AssumeRoleWithWebIdentityProvider, WebIdentityTokenSource};

use async_trait::async_trait;
use chrono::Utc;

use crate::config::ProfileConfig;
use crate::creds::CredentialSnapshot;
use crate::error::Result;
use crate::sts::StsEndpoint;

/// Uniform `get()` capability over the provider variants.
#[async_trait]
pub trait ProvideCredentials: Send + Sync {
    async fn get(&self) -> Result<CredentialSnapshot>;
}

/// A composed short-lived credential provider.
#[derive(Debug)]
pub enum TempCredentialsProvider {
    Keyring(KeyringProvider),
    SessionToken(SessionTokenProvider),
    AssumeRole(AssumeRoleProvider),
    WebIdentity(AssumeRoleWithWebIdentityProvider),
    CredentialProcess(CredentialProcessProvider),
    SsoRole(SsoRoleCredentialsProvider),
    Cached(CachedSessionProvider),
}

impl TempCredentialsProvider {
    /// The name of the leaf strategy, drilling through the cache wrapper.
    /// These names appear verbatim in the decision-engine log lines.
    pub fn strategy(&self) -> &'static str {
        match self {
            TempCredentialsProvider::Keyring(_) => "stored credentials",
            TempCredentialsProvider::SessionToken(_) => "GetSessionToken",
            TempCredentialsProvider::AssumeRole(_) => "AssumeRole",
            TempCredentialsProvider::WebIdentity(_) => "AssumeRoleWithWebIdentity",
            TempCredentialsProvider::CredentialProcess(_) => "CredentialProcess",
            TempCredentialsProvider::SsoRole(_) => "SSORoleCredentials",
            TempCredentialsProvider::Cached(cached) => cached.inner().strategy(),
        }
    }

    /// Whether the provider is wrapped with the session cache.
    pub fn is_cached(&self) -> bool {
        matches!(self, TempCredentialsProvider::Cached(_))
    }
}

#[async_trait]
impl ProvideCredentials for TempCredentialsProvider {
    async fn get(&self) -> Result<CredentialSnapshot> {
        match self {
            TempCredentialsProvider::Keyring(p) => p.get(),
            TempCredentialsProvider::SessionToken(p) => p.get().await,
            TempCredentialsProvider::AssumeRole(p) => p.get().await,
            TempCredentialsProvider::WebIdentity(p) => p.get().await,
            TempCredentialsProvider::CredentialProcess(p) => p.get().await,
            TempCredentialsProvider::SsoRole(p) => p.get().await,
            TempCredentialsProvider::Cached(p) => p.get().await,
        }
    }
}

/// Endpoint settings a provider inherits from its profile.
pub(crate) fn endpoint_for(config: &ProfileConfig) -> StsEndpoint {
    StsEndpoint {
        region: config.region.clone(),
        sts_regional_endpoints: config.sts_regional_endpoints.clone(),
    }
}

/// Default role-session name when the profile does not set one.
pub(crate) fn default_session_name() -> String {
    format!("aws-vault-{}", Utc::now().timestamp())
}

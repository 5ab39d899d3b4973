//! The decision engine: picks exactly one provider per resolved profile.
//!
//! Rules, first match wins:
//!
//! 1. web identity token (file or process) with a role -- AssumeRoleWithWebIdentity
//! 2. `credential_process` -- CredentialProcess
//! 3. `sso_account_id` + `sso_role_name` -- SSORoleCredentials
//! 4. `source_profile` -- resolve the source recursively; a role on the
//!    current profile is then assumed on top of it. A source feeding a
//!    chained role with MFA is primed with GetSessionToken first, so the
//!    MFA context survives the chain.
//! 5. a role without a source -- AssumeRole over the profile's own stored
//!    keys (MFA, when present, rides on the AssumeRole call itself) or
//!    over `credential_source`
//! 6. stored keys with `mfa_serial`, sessions enabled -- GetSessionToken
//! 7. otherwise -- stored credentials as-is
//!
//! Each decision is logged as `profile <name>: using <strategy>`; these
//! lines, and their order along a chain, are load-bearing. Providers
//! whose output expires are wrapped with the session cache unless caching
//! is off globally or for the profile.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::{CredentialSource, ProfileConfig};
use crate::error::{Error, Result};
use crate::keychain::CredentialKeyring;
use crate::provider::{
    AssumeRoleBase, AssumeRoleProvider, AssumeRoleWithWebIdentityProvider, CachedSessionProvider,
    CredentialProcessProvider, KeyringProvider, SessionTokenProvider, SsoRoleCredentialsProvider,
    TempCredentialsProvider, WebIdentityTokenSource,
};
use crate::session::{SessionCache, cache_key};
use crate::sts::{SsoOps, StsOps};

/// Default lifetime for AssumeRole and for sessions feeding a chain.
const DEFAULT_DURATION_SECS: u32 = 3_600;

/// Default lifetime for a top-level GetSessionToken session (8 h).
const DEFAULT_SESSION_DURATION_SECS: u32 = 28_800;

/// Builds a [`TempCredentialsProvider`] for a resolved profile.
pub struct TempCredentialsCreator {
    keyring: Arc<CredentialKeyring>,
    sts: Arc<dyn StsOps>,
    sso: Arc<dyn SsoOps>,
    clock: Arc<dyn Clock>,
    use_session_cache: bool,
    expand_tilde_in_paths: bool,
    disable_sessions_for_profiles: HashSet<String>,
    // Serial already satisfied by a GetSessionToken along the current
    // chain; AssumeRole calls with the same serial skip MFA.
    chained_mfa: Option<String>,
}

impl TempCredentialsCreator {
    pub fn new(
        keyring: Arc<CredentialKeyring>,
        sts: Arc<dyn StsOps>,
        sso: Arc<dyn SsoOps>,
    ) -> Self {
        Self {
            keyring,
            sts,
            sso,
            clock: Arc::new(SystemClock),
            use_session_cache: true,
            expand_tilde_in_paths: true,
            disable_sessions_for_profiles: HashSet::new(),
            chained_mfa: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_session_cache(mut self, enabled: bool) -> Self {
        self.use_session_cache = enabled;
        self
    }

    pub fn with_tilde_expansion(mut self, enabled: bool) -> Self {
        self.expand_tilde_in_paths = enabled;
        self
    }

    /// Disable sessions (GetSessionToken and cache wrapping) for a profile.
    pub fn disable_sessions_for(mut self, profile: impl Into<String>) -> Self {
        self.disable_sessions_for_profiles.insert(profile.into());
        self
    }

    /// Select and compose the provider for `config`.
    pub fn provider_for_profile(
        &mut self,
        config: &ProfileConfig,
    ) -> Result<TempCredentialsProvider> {
        self.get_provider(config, false)
    }

    /// `is_role_source` is true when some descendant along the request
    /// chain assumes a role with this profile's credentials.
    fn get_provider(
        &mut self,
        config: &ProfileConfig,
        is_role_source: bool,
    ) -> Result<TempCredentialsProvider> {
        if config.has_web_identity() {
            return self.web_identity_provider(config);
        }
        if let Some(command) = &config.credential_process {
            return self.credential_process_provider(config, command.clone());
        }
        if config.has_sso_role() {
            return self.sso_role_provider(config);
        }
        if let Some(source) = &config.source_profile {
            let source_provider =
                self.get_provider(source, is_role_source || config.has_role())?;
            if config.has_role() {
                return self
                    .assume_role_provider(config, AssumeRoleBase::Provider(Box::new(source_provider)));
            }
            return Ok(source_provider);
        }
        if config.has_role() {
            let base = self.role_base(config, is_role_source)?;
            return self.assume_role_provider(config, base);
        }
        self.stored_credentials_provider(config, is_role_source)
    }

    // ── Rule 1: web identity ───────────────────────────────────────────

    fn web_identity_provider(&mut self, config: &ProfileConfig) -> Result<TempCredentialsProvider> {
        let token_source = if let Some(command) = &config.web_identity_token_process {
            WebIdentityTokenSource::Process(command.clone())
        } else if let Some(path) = &config.web_identity_token_file {
            let path = if self.expand_tilde_in_paths {
                crate::config::expand_tilde(path)
            } else {
                path.into()
            };
            WebIdentityTokenSource::File(path)
        } else {
            return Err(Error::config(format!(
                "profile {}: web identity provider without a token source",
                config.profile_name
            )));
        };

        debug!(
            "profile {}: using AssumeRoleWithWebIdentity",
            config.profile_name
        );
        let provider = AssumeRoleWithWebIdentityProvider {
            sts: self.sts.clone(),
            config: config.clone(),
            token_source,
            duration_secs: config.duration_seconds.unwrap_or(DEFAULT_DURATION_SECS),
        };
        Ok(self.wrap_with_cache(TempCredentialsProvider::WebIdentity(provider), config))
    }

    // ── Rule 2: credential process ─────────────────────────────────────

    fn credential_process_provider(
        &mut self,
        config: &ProfileConfig,
        command: String,
    ) -> Result<TempCredentialsProvider> {
        debug!("profile {}: using CredentialProcess", config.profile_name);
        let provider = CredentialProcessProvider { command };
        Ok(self.wrap_with_cache(TempCredentialsProvider::CredentialProcess(provider), config))
    }

    // ── Rule 3: SSO role ───────────────────────────────────────────────

    fn sso_role_provider(&mut self, config: &ProfileConfig) -> Result<TempCredentialsProvider> {
        let start_url = config.sso_start_url.clone().ok_or_else(|| {
            Error::config(format!(
                "profile {}: sso_account_id/sso_role_name require sso_session or sso_start_url",
                config.profile_name
            ))
        })?;
        let region = config.sso_region.clone().ok_or_else(|| {
            Error::config(format!(
                "profile {}: missing sso_region for SSO role credentials",
                config.profile_name
            ))
        })?;
        let registration_scopes = config
            .sso_session
            .as_ref()
            .and_then(|s| s.sso_registration_scopes.as_deref())
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let (Some(account_id), Some(role_name)) =
            (config.sso_account_id.clone(), config.sso_role_name.clone())
        else {
            return Err(Error::config(format!(
                "profile {}: SSO role credentials need sso_account_id and sso_role_name",
                config.profile_name
            )));
        };

        debug!("profile {}: using SSORoleCredentials", config.profile_name);
        let provider = SsoRoleCredentialsProvider {
            keyring: self.keyring.clone(),
            sso: self.sso.clone(),
            clock: self.clock.clone(),
            start_url,
            region,
            account_id,
            role_name,
            registration_scopes,
        };
        Ok(self.wrap_with_cache(TempCredentialsProvider::SsoRole(provider), config))
    }

    // ── Rules 4/5: assume role ─────────────────────────────────────────

    /// Base principal for a role profile without a source profile.
    fn role_base(
        &mut self,
        config: &ProfileConfig,
        is_role_source: bool,
    ) -> Result<AssumeRoleBase> {
        match config.credential_source {
            Some(CredentialSource::Environment) => return Ok(AssumeRoleBase::Environment),
            Some(other) => {
                return Err(Error::config(format!(
                    "profile {}: credential_source {:?} is not supported",
                    config.profile_name, other
                )));
            }
            None => {}
        }

        // A chained role must prime a session so the MFA context carries
        // into the chained AssumeRole calls. A direct role login instead
        // hands the one-time code to AssumeRole itself.
        if is_role_source && config.has_mfa() && self.sessions_enabled_logged(config) {
            let provider = self.session_token_provider(config, true)?;
            return Ok(AssumeRoleBase::Provider(Box::new(provider)));
        }

        self.require_stored_credentials(config)?;
        Ok(AssumeRoleBase::Keyring {
            keyring: self.keyring.clone(),
            profile_name: config.profile_name.clone(),
        })
    }

    fn assume_role_provider(
        &mut self,
        config: &ProfileConfig,
        base: AssumeRoleBase,
    ) -> Result<TempCredentialsProvider> {
        let mut role_config = config.clone();
        // The session along the chain already carries this serial.
        if role_config.mfa_serial.is_some() && role_config.mfa_serial == self.chained_mfa {
            role_config.mfa_serial = None;
        }

        debug!(
            "profile {}: using AssumeRole{}",
            config.profile_name,
            mfa_suffix(&role_config)
        );
        let provider = AssumeRoleProvider {
            sts: self.sts.clone(),
            base,
            duration_secs: role_config
                .duration_seconds
                .unwrap_or(DEFAULT_DURATION_SECS),
            config: role_config,
        };
        Ok(self.wrap_with_cache(TempCredentialsProvider::AssumeRole(provider), config))
    }

    // ── Rules 6/7: stored keys, with or without a session ──────────────

    fn stored_credentials_provider(
        &mut self,
        config: &ProfileConfig,
        is_role_source: bool,
    ) -> Result<TempCredentialsProvider> {
        if config.has_mfa() && self.sessions_enabled_logged(config) {
            return self.session_token_provider(config, is_role_source);
        }

        self.require_stored_credentials(config)?;
        debug!("profile {}: using stored credentials", config.profile_name);
        Ok(TempCredentialsProvider::Keyring(KeyringProvider {
            keyring: self.keyring.clone(),
            profile_name: config.profile_name.clone(),
        }))
    }

    fn session_token_provider(
        &mut self,
        config: &ProfileConfig,
        chained: bool,
    ) -> Result<TempCredentialsProvider> {
        self.require_stored_credentials(config)?;

        debug!(
            "profile {}: using GetSessionToken{}",
            config.profile_name,
            mfa_suffix(config)
        );
        if chained && let Some(serial) = &config.mfa_serial {
            self.chained_mfa = Some(serial.clone());
        }

        let duration_secs = if chained {
            config
                .assume_role_duration_seconds
                .unwrap_or(DEFAULT_DURATION_SECS)
        } else {
            config
                .duration_seconds
                .unwrap_or(DEFAULT_SESSION_DURATION_SECS)
        };
        let provider = SessionTokenProvider {
            keyring: self.keyring.clone(),
            sts: self.sts.clone(),
            config: config.clone(),
            duration_secs,
        };
        Ok(self.wrap_with_cache(TempCredentialsProvider::SessionToken(provider), config))
    }

    // ── Shared shaping ─────────────────────────────────────────────────

    fn sessions_enabled_logged(&self, config: &ProfileConfig) -> bool {
        if self
            .disable_sessions_for_profiles
            .contains(&config.profile_name)
        {
            debug!(
                "profile {}: skipping GetSessionToken because sessions are disabled for this profile",
                config.profile_name
            );
            return false;
        }
        true
    }

    /// The engine never emits a provider that would certainly fail on
    /// first use: profiles read from the keyring must have an entry.
    fn require_stored_credentials(&self, config: &ProfileConfig) -> Result<()> {
        if self.keyring.has(&config.profile_name)? {
            Ok(())
        } else {
            Err(Error::CredentialsMissing(config.profile_name.clone()))
        }
    }

    fn wrap_with_cache(
        &self,
        provider: TempCredentialsProvider,
        config: &ProfileConfig,
    ) -> TempCredentialsProvider {
        if !self.use_session_cache
            || self
                .disable_sessions_for_profiles
                .contains(&config.profile_name)
        {
            return provider;
        }
        let key = cache_key(config, provider.strategy());
        let cache = SessionCache::new(self.keyring.clone(), self.clock.clone());
        TempCredentialsProvider::Cached(CachedSessionProvider::new(cache, key, Box::new(provider)))
    }
}

fn mfa_suffix(config: &ProfileConfig) -> &'static str {
    if config.has_mfa() { " (with MFA)" } else { "" }
}

/// Convenience entry point: compose a provider for `config` with default
/// policy except for the session-cache switch.
pub fn new_temp_credentials_provider(
    config: &ProfileConfig,
    keyring: Arc<CredentialKeyring>,
    sts: Arc<dyn StsOps>,
    sso: Arc<dyn SsoOps>,
    use_session_cache: bool,
) -> Result<TempCredentialsProvider> {
    TempCredentialsCreator::new(keyring, sts, sso)
        .with_session_cache(use_session_cache)
        .provider_for_profile(config)
}

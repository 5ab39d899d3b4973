//! SSO role credentials.
//!
//! Obtains an SSO access token -- cached in the keyring per start URL, or
//! freshly minted through the OIDC device-authorization flow -- and
//! exchanges it for role credentials. The snapshot's expiry is the
//! shorter of the role credentials' and the token's lifetimes.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::creds::CredentialSnapshot;
use crate::error::{Error, Result};
use crate::keychain::{CredentialKeyring, SsoRegistration};
use crate::sts::{SsoClientRegistration, SsoOps, SsoTokenPoll};

/// Tokens this close to expiry are re-minted rather than re-used.
const TOKEN_MARGIN_SECS: i64 = 60;

pub struct SsoRoleCredentialsProvider {
    pub keyring: Arc<CredentialKeyring>,
    pub sso: Arc<dyn SsoOps>,
    pub clock: Arc<dyn Clock>,
    pub start_url: String,
    pub region: String,
    pub account_id: String,
    pub role_name: String,
    pub registration_scopes: Vec<String>,
}

impl std::fmt::Debug for SsoRoleCredentialsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsoRoleCredentialsProvider")
            .field("start_url", &self.start_url)
            .field("region", &self.region)
            .field("account_id", &self.account_id)
            .field("role_name", &self.role_name)
            .field("registration_scopes", &self.registration_scopes)
            .finish()
    }
}

impl SsoRoleCredentialsProvider {
    pub async fn get(&self) -> Result<CredentialSnapshot> {
        let (access_token, token_expires_at) = self.access_token().await?;
        let mut snapshot = self
            .sso
            .get_role_credentials(&self.region, &access_token, &self.account_id, &self.role_name)
            .await?;
        if let (Some(role_exp), Some(token_exp)) = (snapshot.expiration, token_expires_at)
            && token_exp < role_exp
        {
            snapshot.expiration = Some(token_exp);
        }
        Ok(snapshot)
    }

    /// A usable access token: the cached one when still fresh, otherwise
    /// a new one through the device flow.
    async fn access_token(&self) -> Result<(String, Option<DateTime<Utc>>)> {
        let now = self.clock.now();
        let cached = match self.keyring.sso_token_get(&self.start_url) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("reading cached SSO token for {} failed: {}", self.start_url, e);
                None
            }
        };

        if let Some(entry) = &cached
            && let Some(token) = &entry.access_token
            && let Some(expires_at) = entry.token_expires_at
            && expires_at - Duration::seconds(TOKEN_MARGIN_SECS) > now
        {
            debug!("re-using cached SSO access token for {}", self.start_url);
            return Ok((token.clone(), Some(expires_at)));
        }

        let registration = match cached.filter(|entry| {
            entry
                .registration_expires_at
                .map(|exp| exp - Duration::seconds(TOKEN_MARGIN_SECS) > now)
                .unwrap_or(false)
        }) {
            Some(entry) => SsoClientRegistration {
                client_id: entry.client_id,
                client_secret: entry.client_secret,
                expires_at: entry.registration_expires_at,
            },
            None => {
                debug!("registering SSO OIDC client for {}", self.start_url);
                self.sso
                    .register_client(&self.region, &self.registration_scopes)
                    .await?
            }
        };

        let (access_token, expires_at) = self.device_flow(&registration).await?;

        let entry = SsoRegistration {
            client_id: registration.client_id,
            client_secret: registration.client_secret,
            registration_expires_at: registration.expires_at,
            access_token: Some(access_token.clone()),
            token_expires_at: expires_at,
        };
        if let Err(e) = self.keyring.sso_token_put(&self.start_url, &entry) {
            warn!("failed to cache SSO token for {}: {}", self.start_url, e);
        }

        Ok((access_token, expires_at))
    }

    async fn device_flow(
        &self,
        registration: &SsoClientRegistration,
    ) -> Result<(String, Option<DateTime<Utc>>)> {
        let auth = self
            .sso
            .start_device_authorization(&self.region, registration, &self.start_url)
            .await?;

        let uri = auth
            .verification_uri_complete
            .as_deref()
            .unwrap_or(&auth.verification_uri);
        eprintln!("To sign in, open {} and confirm the code {}", uri, auth.user_code);

        let mut interval = auth.interval_secs.max(1);
        let mut waited = 0u64;
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(interval)).await;
            waited += interval;
            match self
                .sso
                .create_token(&self.region, registration, &auth.device_code)
                .await?
            {
                SsoTokenPoll::Ready {
                    access_token,
                    expires_in_secs,
                } => {
                    let expires_at = self.clock.now() + Duration::seconds(expires_in_secs as i64);
                    return Ok((access_token, Some(expires_at)));
                }
                SsoTokenPoll::Pending => {}
                SsoTokenPoll::SlowDown => interval += 5,
            }
            if auth.expires_in_secs > 0 && waited >= auth.expires_in_secs {
                return Err(Error::derivation(format!(
                    "device authorization for {} expired before the sign-in was confirmed",
                    self.start_url
                )));
            }
        }
    }
}

//! GetSessionToken: trade long-lived keys (plus MFA, when configured)
//! for a session-token triplet with an expiry.

use std::sync::Arc;

use crate::config::ProfileConfig;
use crate::creds::CredentialSnapshot;
use crate::error::Result;
use crate::keychain::CredentialKeyring;
use crate::mfa::resolve_mfa_entry;
use crate::provider::endpoint_for;
use crate::sts::{GetSessionTokenRequest, StsOps};

pub struct SessionTokenProvider {
    pub keyring: Arc<CredentialKeyring>,
    pub sts: Arc<dyn StsOps>,
    pub config: ProfileConfig,
    pub duration_secs: u32,
}

impl std::fmt::Debug for SessionTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokenProvider")
            .field("config", &self.config)
            .field("duration_secs", &self.duration_secs)
            .finish()
    }
}

impl SessionTokenProvider {
    pub async fn get(&self) -> Result<CredentialSnapshot> {
        let credentials = self.keyring.get(&self.config.profile_name)?;
        let mfa = if self.config.has_mfa() {
            Some(resolve_mfa_entry(&self.config).await?)
        } else {
            None
        };
        self.sts
            .get_session_token(GetSessionTokenRequest {
                credentials,
                endpoint: endpoint_for(&self.config),
                duration_secs: self.duration_secs,
                mfa,
            })
            .await
    }
}

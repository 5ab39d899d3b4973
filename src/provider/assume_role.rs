//! AssumeRole on top of a base principal.
//!
//! The base is one of: the profile's own long-lived keys, credentials
//! from the process environment (`credential_source = Environment`), or
//! the resolved provider of a source profile (role chaining).

use std::sync::Arc;

use crate::config::ProfileConfig;
use crate::creds::CredentialSnapshot;
use crate::error::{Error, Result};
use crate::keychain::CredentialKeyring;
use crate::mfa::resolve_mfa_entry;
use crate::provider::{ProvideCredentials, TempCredentialsProvider, default_session_name, endpoint_for};
use crate::sts::{AssumeRoleRequest, StsOps};

/// Where the acting principal for the AssumeRole call comes from.
pub enum AssumeRoleBase {
    Keyring {
        keyring: Arc<CredentialKeyring>,
        profile_name: String,
    },
    Environment,
    Provider(Box<TempCredentialsProvider>),
}

impl std::fmt::Debug for AssumeRoleBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssumeRoleBase::Keyring { profile_name, .. } => f
                .debug_struct("Keyring")
                .field("profile_name", profile_name)
                .finish(),
            AssumeRoleBase::Environment => write!(f, "Environment"),
            AssumeRoleBase::Provider(inner) => f.debug_tuple("Provider").field(inner).finish(),
        }
    }
}

pub struct AssumeRoleProvider {
    pub sts: Arc<dyn StsOps>,
    pub base: AssumeRoleBase,
    /// The role profile. The factory clears `mfa_serial` here when the
    /// source session already carries the MFA context.
    pub config: ProfileConfig,
    pub duration_secs: u32,
}

impl std::fmt::Debug for AssumeRoleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssumeRoleProvider")
            .field("base", &self.base)
            .field("config", &self.config)
            .field("duration_secs", &self.duration_secs)
            .finish()
    }
}

impl AssumeRoleProvider {
    pub async fn get(&self) -> Result<CredentialSnapshot> {
        let credentials = match &self.base {
            AssumeRoleBase::Keyring {
                keyring,
                profile_name,
            } => keyring.get(profile_name)?,
            AssumeRoleBase::Environment => environment_credentials()?,
            AssumeRoleBase::Provider(provider) => provider.get().await?,
        };

        let role_arn = self
            .config
            .role_arn
            .clone()
            .ok_or_else(|| Error::derivation("AssumeRole provider without role_arn"))?;
        let mfa = if self.config.has_mfa() {
            Some(resolve_mfa_entry(&self.config).await?)
        } else {
            None
        };

        self.sts
            .assume_role(AssumeRoleRequest {
                credentials,
                endpoint: endpoint_for(&self.config),
                role_arn,
                role_session_name: self
                    .config
                    .role_session_name
                    .clone()
                    .unwrap_or_else(default_session_name),
                duration_secs: self.duration_secs,
                external_id: self.config.external_id.clone(),
                mfa,
                tags: self.config.session_tags.clone(),
                transitive_tag_keys: self.config.transitive_session_tags.clone(),
                source_identity: self.config.source_identity.clone(),
            })
            .await
    }
}

/// Base credentials for `credential_source = Environment`.
fn environment_credentials() -> Result<CredentialSnapshot> {
    let access_key_id = std::env::var("AWS_ACCESS_KEY_ID");
    let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY");
    match (access_key_id, secret_access_key) {
        (Ok(access_key_id), Ok(secret_access_key)) => Ok(CredentialSnapshot {
            access_key_id,
            secret_access_key,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
            expiration: None,
        }),
        _ => Err(Error::derivation(
            "credential_source Environment requires AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY",
        )),
    }
}

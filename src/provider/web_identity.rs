//! AssumeRoleWithWebIdentity: an OIDC token (from a file or a helper
//! process) is the proof of identity for the role.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ProfileConfig;
use crate::creds::CredentialSnapshot;
use crate::error::{Error, Result};
use crate::provider::{default_session_name, endpoint_for};
use crate::sts::{AssumeRoleWithWebIdentityRequest, StsOps};
use crate::utils::shell_output;

/// Where the web-identity token comes from.
#[derive(Debug)]
pub enum WebIdentityTokenSource {
    File(PathBuf),
    Process(String),
}

impl WebIdentityTokenSource {
    async fn token(&self) -> Result<String> {
        match self {
            WebIdentityTokenSource::File(path) => {
                let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                    Error::derivation(format!(
                        "reading web identity token {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(raw.trim().to_string())
            }
            WebIdentityTokenSource::Process(command) => shell_output(command).await,
        }
    }
}

pub struct AssumeRoleWithWebIdentityProvider {
    pub sts: Arc<dyn StsOps>,
    pub config: ProfileConfig,
    pub token_source: WebIdentityTokenSource,
    pub duration_secs: u32,
}

impl std::fmt::Debug for AssumeRoleWithWebIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssumeRoleWithWebIdentityProvider")
            .field("config", &self.config)
            .field("token_source", &self.token_source)
            .field("duration_secs", &self.duration_secs)
            .finish()
    }
}

impl AssumeRoleWithWebIdentityProvider {
    pub async fn get(&self) -> Result<CredentialSnapshot> {
        let token = self.token_source.token().await?;
        if token.is_empty() {
            return Err(Error::derivation("web identity token source produced no token"));
        }
        let role_arn = self
            .config
            .role_arn
            .clone()
            .ok_or_else(|| Error::derivation("web identity provider without role_arn"))?;

        self.sts
            .assume_role_with_web_identity(AssumeRoleWithWebIdentityRequest {
                endpoint: endpoint_for(&self.config),
                role_arn,
                role_session_name: self
                    .config
                    .role_session_name
                    .clone()
                    .unwrap_or_else(default_session_name),
                duration_secs: self.duration_secs,
                web_identity_token: token,
            })
            .await
    }
}

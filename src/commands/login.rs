//! Login command handler - generate an AWS management console sign-in URL.
//!
//! Session credentials can federate directly; long-lived keys are first
//! traded for a federation token. The credentials are then exchanged for
//! a sign-in token at the federation endpoint and wrapped into a console
//! URL.

use serde::Deserialize;

use crate::config::ConfigLoader;
use crate::creds::CredentialSnapshot;
use crate::error::{Error, Result};
use crate::provider::{ProvideCredentials, TempCredentialsCreator};
use crate::sts::{GetFederationTokenRequest, StsEndpoint};

use super::Vault;

const FEDERATION_ENDPOINT: &str = "https://signin.aws.amazon.com/federation";

/// GetFederationToken accepts 900 s to 12 h; default to the maximum so a
/// console session survives a work day.
const DEFAULT_FEDERATION_DURATION_SECS: u32 = 43_200;

#[derive(Debug, Default)]
pub struct LoginOptions {
    pub mfa_token: Option<String>,
    pub duration: Option<u32>,
}

#[derive(Deserialize)]
struct SigninTokenResponse {
    #[serde(rename = "SigninToken")]
    signin_token: String,
}

pub async fn handle_login(vault: &Vault, profile: &str, opts: LoginOptions) -> Result<()> {
    let loader = ConfigLoader::new(&vault.config_file, profile);
    let mut config = loader.get_profile_config(profile)?;
    config.mfa_token = opts.mfa_token;
    config.mfa_prompt_method = vault.mfa_prompt_method.clone();

    let provider =
        TempCredentialsCreator::new(vault.keyring.clone(), vault.sts.clone(), vault.sso.clone())
            .provider_for_profile(&config)?;
    let snapshot = provider.get().await?;

    // The federation endpoint needs a session token. Long-lived keys
    // federate through GetFederationToken instead.
    let federation_creds = if snapshot.session_token.is_some() {
        snapshot
    } else {
        let mut name = profile.to_string();
        name.truncate(32);
        vault
            .sts
            .get_federation_token(GetFederationTokenRequest {
                credentials: snapshot,
                endpoint: StsEndpoint {
                    region: config.region.clone(),
                    sts_regional_endpoints: config.sts_regional_endpoints.clone(),
                },
                name,
                duration_secs: opts.duration.unwrap_or(DEFAULT_FEDERATION_DURATION_SECS),
            })
            .await?
    };

    let signin_token = fetch_signin_token(&federation_creds).await?;
    println!("{}", login_url(&signin_token, config.region.as_deref())?);
    Ok(())
}

async fn fetch_signin_token(creds: &CredentialSnapshot) -> Result<String> {
    let session = serde_json::json!({
        "sessionId": creds.access_key_id,
        "sessionKey": creds.secret_access_key,
        "sessionToken": creds.session_token.as_deref().unwrap_or(""),
    });

    let response = reqwest::Client::new()
        .get(FEDERATION_ENDPOINT)
        .query(&[
            ("Action", "getSigninToken"),
            ("Session", &session.to_string()),
        ])
        .send()
        .await
        .map_err(|e| Error::derivation(format!("requesting sign-in token: {}", e)))?;

    if !response.status().is_success() {
        return Err(Error::derivation(format!(
            "federation endpoint returned {}",
            response.status()
        )));
    }

    let body: SigninTokenResponse = response
        .json()
        .await
        .map_err(|e| Error::derivation(format!("parsing sign-in token response: {}", e)))?;
    Ok(body.signin_token)
}

fn login_url(signin_token: &str, region: Option<&str>) -> Result<String> {
    let destination = match region {
        Some(region) => format!(
            "https://{}.console.aws.amazon.com/console/home?region={}",
            region, region
        ),
        None => "https://console.aws.amazon.com/".to_string(),
    };
    let url = reqwest::Url::parse_with_params(
        FEDERATION_ENDPOINT,
        &[
            ("Action", "login"),
            ("Issuer", "aws-vault"),
            ("Destination", destination.as_str()),
            ("SigninToken", signin_token),
        ],
    )
    .map_err(|e| Error::Other(format!("building login URL: {}", e)))?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url_encodes_destination() {
        let url = login_url("TOKEN", Some("eu-west-1")).unwrap();
        assert!(url.starts_with(FEDERATION_ENDPOINT));
        assert!(url.contains("SigninToken=TOKEN"));
        assert!(url.contains("eu-west-1.console.aws.amazon.com"));
        // The destination URL must be percent-encoded inside the query.
        assert!(!url.contains("home?region"));
    }
}

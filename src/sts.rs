//! Abstract contracts for the AWS operations the providers invoke, plus
//! the SDK-backed implementations.
//!
//! Providers never talk to the SDK directly; they speak to [`StsOps`],
//! [`SsoOps`] and [`IamOps`]. The adapters here build a client per call
//! from an explicit [`CredentialSnapshot`] and region, so the acting
//! principal is always exactly the one the decision engine chose --
//! ambient environment credentials are never picked up by accident.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_types::SdkConfig;
use aws_types::region::Region;
use chrono::{DateTime, Utc};

use crate::creds::CredentialSnapshot;
use crate::error::{Error, Result};

const SESSION_NAME: &str = "aws-vault";

/// An MFA serial and the one-time code to present with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaEntry {
    pub serial: String,
    pub token: String,
}

/// Endpoint/region settings shared by every STS request.
#[derive(Debug, Clone, Default)]
pub struct StsEndpoint {
    pub region: Option<String>,
    /// `regional` (default) or `legacy` for the global endpoint.
    pub sts_regional_endpoints: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GetSessionTokenRequest {
    pub credentials: CredentialSnapshot,
    pub endpoint: StsEndpoint,
    pub duration_secs: u32,
    pub mfa: Option<MfaEntry>,
}

#[derive(Debug, Clone)]
pub struct AssumeRoleRequest {
    pub credentials: CredentialSnapshot,
    pub endpoint: StsEndpoint,
    pub role_arn: String,
    pub role_session_name: String,
    pub duration_secs: u32,
    pub external_id: Option<String>,
    pub mfa: Option<MfaEntry>,
    pub tags: Vec<(String, String)>,
    pub transitive_tag_keys: Vec<String>,
    pub source_identity: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AssumeRoleWithWebIdentityRequest {
    pub endpoint: StsEndpoint,
    pub role_arn: String,
    pub role_session_name: String,
    pub duration_secs: u32,
    pub web_identity_token: String,
}

#[derive(Debug, Clone)]
pub struct GetFederationTokenRequest {
    pub credentials: CredentialSnapshot,
    pub endpoint: StsEndpoint,
    pub name: String,
    pub duration_secs: u32,
}

/// The security-token-service operations the providers need.
#[async_trait]
pub trait StsOps: Send + Sync {
    async fn get_session_token(&self, req: GetSessionTokenRequest) -> Result<CredentialSnapshot>;
    async fn assume_role(&self, req: AssumeRoleRequest) -> Result<CredentialSnapshot>;
    async fn assume_role_with_web_identity(
        &self,
        req: AssumeRoleWithWebIdentityRequest,
    ) -> Result<CredentialSnapshot>;
    async fn get_federation_token(&self, req: GetFederationTokenRequest)
    -> Result<CredentialSnapshot>;
}

/// A registered SSO OIDC client.
#[derive(Debug, Clone)]
pub struct SsoClientRegistration {
    pub client_id: String,
    pub client_secret: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// An in-flight device authorization.
#[derive(Debug, Clone)]
pub struct SsoDeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
    pub interval_secs: u64,
    pub expires_in_secs: u64,
}

/// One poll of the device-code token endpoint.
#[derive(Debug, Clone)]
pub enum SsoTokenPoll {
    Pending,
    SlowDown,
    Ready {
        access_token: String,
        expires_in_secs: u64,
    },
}

/// The single-sign-on operations: OIDC device flow and role credentials.
#[async_trait]
pub trait SsoOps: Send + Sync {
    async fn register_client(
        &self,
        region: &str,
        scopes: &[String],
    ) -> Result<SsoClientRegistration>;
    async fn start_device_authorization(
        &self,
        region: &str,
        registration: &SsoClientRegistration,
        start_url: &str,
    ) -> Result<SsoDeviceAuthorization>;
    async fn create_token(
        &self,
        region: &str,
        registration: &SsoClientRegistration,
        device_code: &str,
    ) -> Result<SsoTokenPoll>;
    async fn get_role_credentials(
        &self,
        region: &str,
        access_token: &str,
        account_id: &str,
        role_name: &str,
    ) -> Result<CredentialSnapshot>;
}

/// The IAM operations behind `rotate`.
#[async_trait]
pub trait IamOps: Send + Sync {
    async fn create_access_key(
        &self,
        credentials: &CredentialSnapshot,
        region: Option<&str>,
    ) -> Result<CredentialSnapshot>;
    async fn delete_access_key(
        &self,
        credentials: &CredentialSnapshot,
        region: Option<&str>,
        access_key_id: &str,
    ) -> Result<()>;
}

/// Region fallback for requests that did not resolve one from the
/// profile: the standard environment variables, then us-east-1.
pub fn default_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}

fn sdk_config(credentials: Option<&CredentialSnapshot>, region: Option<&str>) -> SdkConfig {
    let mut builder = SdkConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(
            region.map(str::to_string).unwrap_or_else(default_region),
        ));
    if let Some(creds) = credentials {
        builder = builder.credentials_provider(SharedCredentialsProvider::new(Credentials::new(
            creds.access_key_id.clone(),
            creds.secret_access_key.clone(),
            creds.session_token.clone(),
            None,
            SESSION_NAME,
        )));
    }
    builder.build()
}

fn convert_sts_credentials(creds: &aws_sdk_sts::types::Credentials) -> CredentialSnapshot {
    let expiration = creds.expiration();
    CredentialSnapshot {
        access_key_id: creds.access_key_id().to_string(),
        secret_access_key: creds.secret_access_key().to_string(),
        session_token: Some(creds.session_token().to_string()),
        expiration: DateTime::from_timestamp(expiration.secs(), expiration.subsec_nanos()),
    }
}

/// [`StsOps`] over the real AWS SDK.
#[derive(Debug, Clone, Default)]
pub struct StsClient;

impl StsClient {
    pub fn new() -> Self {
        Self
    }

    fn client(
        &self,
        credentials: Option<&CredentialSnapshot>,
        endpoint: &StsEndpoint,
    ) -> aws_sdk_sts::Client {
        let config = sdk_config(credentials, endpoint.region.as_deref());
        if endpoint.sts_regional_endpoints.as_deref() == Some("legacy") {
            let conf = aws_sdk_sts::config::Builder::from(&config)
                .endpoint_url("https://sts.amazonaws.com")
                .build();
            aws_sdk_sts::Client::from_conf(conf)
        } else {
            aws_sdk_sts::Client::new(&config)
        }
    }
}

#[async_trait]
impl StsOps for StsClient {
    async fn get_session_token(&self, req: GetSessionTokenRequest) -> Result<CredentialSnapshot> {
        let client = self.client(Some(&req.credentials), &req.endpoint);
        let mut call = client
            .get_session_token()
            .duration_seconds(req.duration_secs as i32);
        if let Some(mfa) = req.mfa {
            call = call.serial_number(mfa.serial).token_code(mfa.token);
        }
        let resp = call
            .send()
            .await
            .map_err(|e| Error::sts(DisplayErrorContext(&e)))?;
        let creds = resp
            .credentials()
            .ok_or_else(|| Error::derivation("GetSessionToken returned no credentials"))?;
        Ok(convert_sts_credentials(creds))
    }

    async fn assume_role(&self, req: AssumeRoleRequest) -> Result<CredentialSnapshot> {
        let client = self.client(Some(&req.credentials), &req.endpoint);
        let mut call = client
            .assume_role()
            .role_arn(&req.role_arn)
            .role_session_name(&req.role_session_name)
            .duration_seconds(req.duration_secs as i32)
            .set_external_id(req.external_id)
            .set_source_identity(req.source_identity);
        if let Some(mfa) = req.mfa {
            call = call.serial_number(mfa.serial).token_code(mfa.token);
        }
        for (key, value) in req.tags {
            let tag = aws_sdk_sts::types::Tag::builder()
                .key(key)
                .value(value)
                .build()
                .map_err(|e| Error::derivation(format!("invalid session tag: {}", e)))?;
            call = call.tags(tag);
        }
        for key in req.transitive_tag_keys {
            call = call.transitive_tag_keys(key);
        }
        let resp = call
            .send()
            .await
            .map_err(|e| Error::sts(DisplayErrorContext(&e)))?;
        let creds = resp
            .credentials()
            .ok_or_else(|| Error::derivation("AssumeRole returned no credentials"))?;
        Ok(convert_sts_credentials(creds))
    }

    async fn assume_role_with_web_identity(
        &self,
        req: AssumeRoleWithWebIdentityRequest,
    ) -> Result<CredentialSnapshot> {
        // Unsigned operation: the token is the whole proof of identity.
        let client = self.client(None, &req.endpoint);
        let resp = client
            .assume_role_with_web_identity()
            .role_arn(&req.role_arn)
            .role_session_name(&req.role_session_name)
            .web_identity_token(&req.web_identity_token)
            .duration_seconds(req.duration_secs as i32)
            .send()
            .await
            .map_err(|e| Error::sts(DisplayErrorContext(&e)))?;
        let creds = resp.credentials().ok_or_else(|| {
            Error::derivation("AssumeRoleWithWebIdentity returned no credentials")
        })?;
        Ok(convert_sts_credentials(creds))
    }

    async fn get_federation_token(
        &self,
        req: GetFederationTokenRequest,
    ) -> Result<CredentialSnapshot> {
        let client = self.client(Some(&req.credentials), &req.endpoint);
        let resp = client
            .get_federation_token()
            .name(&req.name)
            .duration_seconds(req.duration_secs as i32)
            .send()
            .await
            .map_err(|e| Error::sts(DisplayErrorContext(&e)))?;
        let creds = resp
            .credentials()
            .ok_or_else(|| Error::derivation("GetFederationToken returned no credentials"))?;
        Ok(convert_sts_credentials(creds))
    }
}

/// [`SsoOps`] over the real AWS SDK.
#[derive(Debug, Clone, Default)]
pub struct SsoClient;

impl SsoClient {
    pub fn new() -> Self {
        Self
    }

    fn oidc_client(&self, region: &str) -> aws_sdk_ssooidc::Client {
        aws_sdk_ssooidc::Client::new(&sdk_config(None, Some(region)))
    }
}

#[async_trait]
impl SsoOps for SsoClient {
    async fn register_client(
        &self,
        region: &str,
        scopes: &[String],
    ) -> Result<SsoClientRegistration> {
        let mut call = self
            .oidc_client(region)
            .register_client()
            .client_name(SESSION_NAME)
            .client_type("public");
        for scope in scopes {
            call = call.scopes(scope);
        }
        let resp = call
            .send()
            .await
            .map_err(|e| Error::sts(DisplayErrorContext(&e)))?;
        Ok(SsoClientRegistration {
            client_id: resp
                .client_id()
                .ok_or_else(|| Error::derivation("RegisterClient returned no client id"))?
                .to_string(),
            client_secret: resp
                .client_secret()
                .ok_or_else(|| Error::derivation("RegisterClient returned no client secret"))?
                .to_string(),
            expires_at: DateTime::from_timestamp(resp.client_secret_expires_at(), 0),
        })
    }

    async fn start_device_authorization(
        &self,
        region: &str,
        registration: &SsoClientRegistration,
        start_url: &str,
    ) -> Result<SsoDeviceAuthorization> {
        let resp = self
            .oidc_client(region)
            .start_device_authorization()
            .client_id(&registration.client_id)
            .client_secret(&registration.client_secret)
            .start_url(start_url)
            .send()
            .await
            .map_err(|e| Error::sts(DisplayErrorContext(&e)))?;
        Ok(SsoDeviceAuthorization {
            device_code: resp
                .device_code()
                .ok_or_else(|| Error::derivation("device authorization returned no device code"))?
                .to_string(),
            user_code: resp.user_code().unwrap_or_default().to_string(),
            verification_uri: resp.verification_uri().unwrap_or_default().to_string(),
            verification_uri_complete: resp.verification_uri_complete().map(str::to_string),
            interval_secs: resp.interval().max(1) as u64,
            expires_in_secs: resp.expires_in().max(0) as u64,
        })
    }

    async fn create_token(
        &self,
        region: &str,
        registration: &SsoClientRegistration,
        device_code: &str,
    ) -> Result<SsoTokenPoll> {
        let result = self
            .oidc_client(region)
            .create_token()
            .client_id(&registration.client_id)
            .client_secret(&registration.client_secret)
            .grant_type("urn:ietf:params:oauth:grant-type:device_code")
            .device_code(device_code)
            .send()
            .await;
        match result {
            Ok(resp) => Ok(SsoTokenPoll::Ready {
                access_token: resp
                    .access_token()
                    .ok_or_else(|| Error::derivation("CreateToken returned no access token"))?
                    .to_string(),
                expires_in_secs: resp.expires_in().max(0) as u64,
            }),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_authorization_pending_exception() {
                    Ok(SsoTokenPoll::Pending)
                } else if service_err.is_slow_down_exception() {
                    Ok(SsoTokenPoll::SlowDown)
                } else {
                    Err(Error::sts(DisplayErrorContext(&service_err)))
                }
            }
        }
    }

    async fn get_role_credentials(
        &self,
        region: &str,
        access_token: &str,
        account_id: &str,
        role_name: &str,
    ) -> Result<CredentialSnapshot> {
        let client = aws_sdk_sso::Client::new(&sdk_config(None, Some(region)));
        let resp = client
            .get_role_credentials()
            .access_token(access_token)
            .account_id(account_id)
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| Error::sts(DisplayErrorContext(&e)))?;
        let creds = resp
            .role_credentials()
            .ok_or_else(|| Error::derivation("GetRoleCredentials returned no credentials"))?;
        Ok(CredentialSnapshot {
            access_key_id: creds
                .access_key_id()
                .ok_or_else(|| Error::derivation("GetRoleCredentials returned no access key"))?
                .to_string(),
            secret_access_key: creds
                .secret_access_key()
                .ok_or_else(|| Error::derivation("GetRoleCredentials returned no secret key"))?
                .to_string(),
            session_token: creds.session_token().map(str::to_string),
            expiration: DateTime::<Utc>::from_timestamp_millis(creds.expiration()),
        })
    }
}

/// [`IamOps`] over the real AWS SDK.
#[derive(Debug, Clone, Default)]
pub struct IamClient;

impl IamClient {
    pub fn new() -> Self {
        Self
    }

    fn client(&self, credentials: &CredentialSnapshot, region: Option<&str>) -> aws_sdk_iam::Client {
        aws_sdk_iam::Client::new(&sdk_config(Some(credentials), region))
    }
}

#[async_trait]
impl IamOps for IamClient {
    async fn create_access_key(
        &self,
        credentials: &CredentialSnapshot,
        region: Option<&str>,
    ) -> Result<CredentialSnapshot> {
        let resp = self
            .client(credentials, region)
            .create_access_key()
            .send()
            .await
            .map_err(|e| Error::sts(DisplayErrorContext(&e)))?;
        let key = resp
            .access_key()
            .ok_or_else(|| Error::derivation("CreateAccessKey returned no key"))?;
        Ok(CredentialSnapshot::long_lived(
            key.access_key_id(),
            key.secret_access_key(),
        ))
    }

    async fn delete_access_key(
        &self,
        credentials: &CredentialSnapshot,
        region: Option<&str>,
        access_key_id: &str,
    ) -> Result<()> {
        self.client(credentials, region)
            .delete_access_key()
            .access_key_id(access_key_id)
            .send()
            .await
            .map_err(|e| Error::sts(DisplayErrorContext(&e)))?;
        Ok(())
    }
}

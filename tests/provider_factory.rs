//! Integration tests for the provider decision engine.
//!
//! These drive the factory with the in-memory store and mock STS/SSO
//! operations, asserting on the selected provider variants and on the
//! decision log lines -- the lines and their order are part of the
//! engine's contract.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use aws_vault::config::{ConfigFile, ConfigLoader, ProfileConfig};
use aws_vault::creds::CredentialSnapshot;
use aws_vault::error::Result;
use aws_vault::keychain::CredentialKeyring;
use aws_vault::provider::{ProvideCredentials, TempCredentialsCreator, TempCredentialsProvider};
use aws_vault::store::{MemoryStore, SecretStore};
use aws_vault::sts::{
    AssumeRoleRequest, AssumeRoleWithWebIdentityRequest, GetFederationTokenRequest,
    GetSessionTokenRequest, SsoClientRegistration, SsoDeviceAuthorization, SsoOps, SsoTokenPoll,
    StsOps,
};

// ── Log capture ────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct LogBuffer {
    buf: Arc<Mutex<Vec<u8>>>,
}

struct LogWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl std::io::Write for LogWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            buf: self.buf.clone(),
        }
    }
}

/// Run `f` with a DEBUG-level subscriber and return its output alongside
/// the captured log text.
fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .without_time()
        .with_ansi(false)
        .with_writer(buffer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8(buffer.buf.lock().unwrap().clone()).unwrap();
    (result, logs)
}

// ── Mock AWS operations ────────────────────────────────────────────────

/// Records the operations invoked, in order, and mints a distinct token
/// per call so cache behaviour is observable.
#[derive(Default)]
struct MockSts {
    calls: Mutex<Vec<String>>,
    counter: AtomicU32,
}

impl MockSts {
    fn session(&self, kind: &str) -> CredentialSnapshot {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        CredentialSnapshot {
            access_key_id: format!("ASIA{}{}", kind, n),
            secret_access_key: format!("secret{}", n),
            session_token: Some(format!("token{}", n)),
            expiration: Some(Utc::now() + Duration::hours(1)),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StsOps for MockSts {
    async fn get_session_token(&self, req: GetSessionTokenRequest) -> Result<CredentialSnapshot> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("GetSessionToken(mfa={})", req.mfa.is_some()));
        Ok(self.session("GST"))
    }

    async fn assume_role(&self, req: AssumeRoleRequest) -> Result<CredentialSnapshot> {
        self.calls.lock().unwrap().push(format!(
            "AssumeRole({},mfa={})",
            req.role_arn,
            req.mfa.is_some()
        ));
        Ok(self.session("AR"))
    }

    async fn assume_role_with_web_identity(
        &self,
        req: AssumeRoleWithWebIdentityRequest,
    ) -> Result<CredentialSnapshot> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("AssumeRoleWithWebIdentity({})", req.role_arn));
        Ok(self.session("WI"))
    }

    async fn get_federation_token(
        &self,
        req: GetFederationTokenRequest,
    ) -> Result<CredentialSnapshot> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("GetFederationToken({})", req.name));
        Ok(self.session("FED"))
    }
}

struct MockSso;

#[async_trait]
impl SsoOps for MockSso {
    async fn register_client(
        &self,
        _region: &str,
        _scopes: &[String],
    ) -> Result<SsoClientRegistration> {
        Ok(SsoClientRegistration {
            client_id: "client".into(),
            client_secret: "secret".into(),
            expires_at: Some(Utc::now() + Duration::days(30)),
        })
    }

    async fn start_device_authorization(
        &self,
        _region: &str,
        _registration: &SsoClientRegistration,
        _start_url: &str,
    ) -> Result<SsoDeviceAuthorization> {
        Ok(SsoDeviceAuthorization {
            device_code: "device".into(),
            user_code: "CODE".into(),
            verification_uri: "https://device.sso.example/".into(),
            verification_uri_complete: None,
            interval_secs: 1,
            expires_in_secs: 60,
        })
    }

    async fn create_token(
        &self,
        _region: &str,
        _registration: &SsoClientRegistration,
        _device_code: &str,
    ) -> Result<SsoTokenPoll> {
        Ok(SsoTokenPoll::Ready {
            access_token: "sso-access-token".into(),
            expires_in_secs: 28_800,
        })
    }

    async fn get_role_credentials(
        &self,
        _region: &str,
        _access_token: &str,
        account_id: &str,
        role_name: &str,
    ) -> Result<CredentialSnapshot> {
        Ok(CredentialSnapshot {
            access_key_id: format!("ASIA{}", account_id),
            secret_access_key: "secret".into(),
            session_token: Some(format!("sso-{}", role_name)),
            expiration: Some(Utc::now() + Duration::hours(1)),
        })
    }
}

// ── Fixture plumbing ───────────────────────────────────────────────────

struct Fixture {
    keyring: Arc<CredentialKeyring>,
    sts: Arc<MockSts>,
    sso: Arc<MockSso>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            keyring: Arc::new(CredentialKeyring::new(SecretStore::Memory(MemoryStore::new()))),
            sts: Arc::new(MockSts::default()),
            sso: Arc::new(MockSso),
        }
    }

    fn store_credentials(&self, profile: &str) {
        self.keyring
            .set(
                profile,
                &CredentialSnapshot::long_lived("AKIAEXAMPLE", "secret"),
            )
            .unwrap();
    }

    fn creator(&self) -> TempCredentialsCreator {
        TempCredentialsCreator::new(self.keyring.clone(), self.sts.clone(), self.sso.clone())
    }
}

fn resolve(config_text: &str, profile: &str) -> ProfileConfig {
    let file = ConfigFile::parse(config_text).unwrap();
    ConfigLoader::new(&file, profile)
        .get_profile_config(profile)
        .unwrap()
}

// ── Seed scenarios ─────────────────────────────────────────────────────

#[test]
fn test_web_identity_with_role_yields_web_identity_provider() {
    let config = resolve(
        "[profile role2]\n\
         role_arn = arn:aws:iam::33333333333:role/role2\n\
         web_identity_token_process = oidccli raw\n",
        "role2",
    );
    let fixture = Fixture::new();

    let provider = fixture
        .creator()
        .with_session_cache(false)
        .provider_for_profile(&config)
        .unwrap();
    assert!(matches!(provider, TempCredentialsProvider::WebIdentity(_)));

    // With the cache on, the wrapper keeps the strategy observable.
    let cached = fixture.creator().provider_for_profile(&config).unwrap();
    assert!(cached.is_cached());
    assert_eq!(cached.strategy(), "AssumeRoleWithWebIdentity");
}

#[test]
fn test_credential_process_wins_over_mfa_serial() {
    let config = resolve(
        "[profile my-shared-base-profile]\n\
         credential_process = aws-vault exec my-shared-base-profile -j\n\
         mfa_serial = arn:aws:iam::1234567890:mfa/danielholz\n\
         region = eu-west-1\n\
         \n\
         [profile profile-with-role]\n\
         source_profile = my-shared-base-profile\n\
         include_profile = my-shared-base-profile\n\
         region = eu-west-1\n\
         role_arn = arn:aws:iam::12345678901:role/allow-view-only-access-from-other-accounts\n",
        "my-shared-base-profile",
    );
    let fixture = Fixture::new();

    let provider = fixture
        .creator()
        .with_session_cache(false)
        .provider_for_profile(&config)
        .unwrap();
    assert!(matches!(
        provider,
        TempCredentialsProvider::CredentialProcess(_)
    ));
}

#[test]
fn test_web_identity_wins_over_credential_process() {
    let config = resolve(
        "[profile both]\n\
         role_arn = arn:aws:iam::33333333333:role/both\n\
         web_identity_token_process = oidccli raw\n\
         credential_process = helper --json\n",
        "both",
    );
    let fixture = Fixture::new();

    let provider = fixture
        .creator()
        .with_session_cache(false)
        .provider_for_profile(&config)
        .unwrap();
    assert!(matches!(provider, TempCredentialsProvider::WebIdentity(_)));
}

#[test]
fn test_source_profile_without_role_yields_source_sso_provider() {
    let config = resolve(
        "[profile test]\n\
         source_profile = dev\n\
         region = ap-northeast-2\n\
         \n\
         [profile dev]\n\
         sso_session = common\n\
         sso_account_id = 2160xxxx\n\
         sso_role_name = AdministratorAccess\n\
         region = ap-northeast-2\n\
         output = json\n\
         \n\
         [default]\n\
         sso_session = common\n\
         sso_account_id = 3701xxxx\n\
         sso_role_name = AdministratorAccess\n\
         region = ap-northeast-2\n\
         output = json\n\
         \n\
         [sso-session common]\n\
         sso_start_url = https://xxxx.awsapps.com/start\n\
         sso_region = ap-northeast-2\n\
         sso_registration_scopes = sso:account:access\n",
        "test",
    );
    let fixture = Fixture::new();

    let provider = fixture
        .creator()
        .with_session_cache(false)
        .provider_for_profile(&config)
        .unwrap();
    let TempCredentialsProvider::SsoRole(sso) = provider else {
        panic!("expected an SSO role provider");
    };
    // The account comes from the source profile, not from [default].
    assert_eq!(sso.account_id, "2160xxxx");
    assert_eq!(sso.role_name, "AdministratorAccess");
}

// ── Log-order laws ─────────────────────────────────────────────────────

#[test]
fn test_direct_role_with_mfa_skips_get_session_token() {
    let mut config = resolve(
        "[profile role1]\n\
         role_arn = arn:aws:iam::111111111111:role/role1\n\
         mfa_serial = arn:aws:iam::111111111111:mfa/user\n",
        "role1",
    );
    config.mfa_token = Some("123456".into());

    let fixture = Fixture::new();
    fixture.store_credentials("role1");

    let (result, logs) = capture_logs(|| {
        fixture
            .creator()
            .with_session_cache(false)
            .provider_for_profile(&config)
    });
    result.unwrap();

    assert!(
        !logs.contains("profile role1: using GetSessionToken"),
        "did not expect GetSessionToken for non-chained role profile, logs:\n{}",
        logs
    );
    assert!(
        logs.contains("profile role1: using AssumeRole"),
        "expected AssumeRole with MFA, logs:\n{}",
        logs
    );
}

#[test]
fn test_role_chaining_with_mfa_primes_session_then_assumes() {
    let mut config = resolve(
        "[profile source]\n\
         role_arn = arn:aws:iam::111111111111:role/source\n\
         mfa_serial = arn:aws:iam::111111111111:mfa/user\n\
         \n\
         [profile target]\n\
         source_profile = source\n\
         role_arn = arn:aws:iam::222222222222:role/target\n\
         mfa_serial = arn:aws:iam::111111111111:mfa/user\n",
        "target",
    );
    config.mfa_token = Some("123456".into());
    config.source_profile.as_mut().unwrap().mfa_token = Some("123456".into());

    let fixture = Fixture::new();
    fixture.store_credentials("source");

    let (result, logs) = capture_logs(|| {
        fixture
            .creator()
            .with_session_cache(false)
            .provider_for_profile(&config)
    });
    result.unwrap();

    let idx_session = logs.find("profile source: using GetSessionToken");
    let idx_source_assume = logs.find("profile source: using AssumeRole");
    let idx_target_assume = logs.find("profile target: using AssumeRole");
    let (Some(idx_session), Some(idx_source_assume), Some(idx_target_assume)) =
        (idx_session, idx_source_assume, idx_target_assume)
    else {
        panic!(
            "expected source GetSessionToken then source/target AssumeRole, logs:\n{}",
            logs
        );
    };
    assert!(
        idx_session < idx_source_assume && idx_source_assume < idx_target_assume,
        "unexpected flow order, logs:\n{}",
        logs
    );
}

#[test]
fn test_role_source_chained_to_non_role_leaf_is_not_role_chaining() {
    let mut config = resolve(
        "[profile role_source]\n\
         role_arn = arn:aws:iam::111111111111:role/role-source\n\
         mfa_serial = arn:aws:iam::111111111111:mfa/user\n\
         \n\
         [profile leaf]\n\
         source_profile = role_source\n",
        "leaf",
    );
    config.mfa_prompt_method = Some("terminal".into());
    config.source_profile.as_mut().unwrap().mfa_token = Some("123456".into());

    let fixture = Fixture::new();
    fixture.store_credentials("role_source");

    let (result, logs) = capture_logs(|| {
        fixture
            .creator()
            .with_session_cache(false)
            .provider_for_profile(&config)
    });
    result.unwrap();

    assert!(
        !logs.contains("profile role_source: using GetSessionToken"),
        "did not expect GetSessionToken for role source chained to non-role target, logs:\n{}",
        logs
    );
    assert!(
        logs.contains("profile role_source: using AssumeRole"),
        "expected role_source to AssumeRole with MFA, logs:\n{}",
        logs
    );
}

#[test]
fn test_non_role_source_primes_session_before_target_assume() {
    let mut config = resolve(
        "[profile user]\n\
         mfa_serial = arn:aws:iam::111111111111:mfa/user\n\
         \n\
         [profile target]\n\
         source_profile = user\n\
         role_arn = arn:aws:iam::222222222222:role/target\n\
         mfa_serial = arn:aws:iam::111111111111:mfa/user\n",
        "target",
    );
    config.mfa_token = Some("123456".into());
    config.source_profile.as_mut().unwrap().mfa_token = Some("123456".into());

    let fixture = Fixture::new();
    fixture.store_credentials("user");

    let (result, logs) = capture_logs(|| {
        fixture
            .creator()
            .with_session_cache(false)
            .provider_for_profile(&config)
    });
    result.unwrap();

    let idx_session = logs.find("profile user: using GetSessionToken");
    let idx_assume = logs.find("profile target: using AssumeRole");
    let (Some(idx_session), Some(idx_assume)) = (idx_session, idx_assume) else {
        panic!(
            "expected user GetSessionToken and target AssumeRole, logs:\n{}",
            logs
        );
    };
    assert!(
        idx_session < idx_assume,
        "unexpected flow order, logs:\n{}",
        logs
    );
}

#[test]
fn test_disabled_sessions_for_non_role_profile_returns_stored_credentials() {
    let mut config = resolve(
        "[profile base]\n\
         mfa_serial = arn:aws:iam::111111111111:mfa/user\n",
        "base",
    );
    config.mfa_token = Some("123456".into());

    let fixture = Fixture::new();
    fixture.store_credentials("base");

    let (result, logs) = capture_logs(|| {
        fixture
            .creator()
            .with_session_cache(false)
            .disable_sessions_for("base")
            .provider_for_profile(&config)
    });
    let provider = result.unwrap();

    assert!(
        logs.contains(
            "profile base: skipping GetSessionToken because sessions are disabled for this profile"
        ),
        "expected disabled session skip log, logs:\n{}",
        logs
    );
    assert!(
        matches!(provider, TempCredentialsProvider::Keyring(_)),
        "expected stored credentials when sessions are disabled for a non-role profile"
    );
}

// ── Derivation behaviour ───────────────────────────────────────────────

#[tokio::test]
async fn test_chained_derivation_invokes_operations_in_contract_order() {
    let mut config = resolve(
        "[profile source]\n\
         role_arn = arn:aws:iam::111111111111:role/source\n\
         mfa_serial = arn:aws:iam::111111111111:mfa/user\n\
         \n\
         [profile target]\n\
         source_profile = source\n\
         role_arn = arn:aws:iam::222222222222:role/target\n\
         mfa_serial = arn:aws:iam::111111111111:mfa/user\n",
        "target",
    );
    config.mfa_token = Some("123456".into());
    config.source_profile.as_mut().unwrap().mfa_token = Some("123456".into());

    let fixture = Fixture::new();
    fixture.store_credentials("source");

    let provider = fixture
        .creator()
        .with_session_cache(false)
        .provider_for_profile(&config)
        .unwrap();
    provider.get().await.unwrap();

    // MFA is consumed exactly once, by the priming GetSessionToken; the
    // chained AssumeRole calls ride on the session.
    assert_eq!(
        fixture.sts.calls(),
        vec![
            "GetSessionToken(mfa=true)".to_string(),
            "AssumeRole(arn:aws:iam::111111111111:role/source,mfa=false)".to_string(),
            "AssumeRole(arn:aws:iam::222222222222:role/target,mfa=false)".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_direct_role_consumes_mfa_in_assume_role() {
    let mut config = resolve(
        "[profile role1]\n\
         role_arn = arn:aws:iam::111111111111:role/role1\n\
         mfa_serial = arn:aws:iam::111111111111:mfa/user\n",
        "role1",
    );
    config.mfa_token = Some("123456".into());

    let fixture = Fixture::new();
    fixture.store_credentials("role1");

    let provider = fixture
        .creator()
        .with_session_cache(false)
        .provider_for_profile(&config)
        .unwrap();
    provider.get().await.unwrap();

    assert_eq!(
        fixture.sts.calls(),
        vec!["AssumeRole(arn:aws:iam::111111111111:role/role1,mfa=true)".to_string()]
    );
}

#[tokio::test]
async fn test_cached_derivations_return_identical_credentials() {
    let mut config = resolve(
        "[profile role1]\n\
         role_arn = arn:aws:iam::111111111111:role/role1\n",
        "role1",
    );
    config.mfa_token = None;

    let fixture = Fixture::new();
    fixture.store_credentials("role1");

    let provider = fixture.creator().provider_for_profile(&config).unwrap();
    assert!(provider.is_cached());

    let first = provider.get().await.unwrap();
    let second = provider.get().await.unwrap();

    // Byte-for-byte equal while the cached snapshot lives; the mock
    // mints a fresh token per STS call, so equality proves the second
    // derivation never reached STS.
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    assert_eq!(fixture.sts.calls().len(), 1);

    // A fresh provider over the same keyring sees the stored session.
    let other = fixture.creator().provider_for_profile(&config).unwrap();
    let third = other.get().await.unwrap();
    assert_eq!(first, third);
    assert_eq!(fixture.sts.calls().len(), 1);
}

#[tokio::test]
async fn test_missing_stored_credentials_fail_at_construction() {
    let config = resolve(
        "[profile role1]\n\
         role_arn = arn:aws:iam::111111111111:role/role1\n",
        "role1",
    );
    let fixture = Fixture::new();

    let err = fixture
        .creator()
        .provider_for_profile(&config)
        .unwrap_err();
    assert!(err.to_string().contains("credentials missing"));
}

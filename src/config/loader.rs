//! Profile resolution.
//!
//! Walks the configuration graph to produce, for a requested profile, a
//! fully-resolved [`ProfileConfig`]: typed field values, the attached
//! SSO session, and the `source_profile` parent chain, with cycle
//! detection and validation of the role credential-source rules.

use crate::config::file::{ConfigFile, ProfileSection};
use crate::error::{Error, Result};

/// A resolved `[sso-session]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoSessionConfig {
    pub name: String,
    pub sso_start_url: String,
    pub sso_region: String,
    pub sso_registration_scopes: Option<String>,
}

/// The `credential_source` attribute of a role profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    Ec2InstanceMetadata,
    EcsContainer,
}

impl CredentialSource {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "Environment" => Ok(CredentialSource::Environment),
            "Ec2InstanceMetadata" => Ok(CredentialSource::Ec2InstanceMetadata),
            "EcsContainer" => Ok(CredentialSource::EcsContainer),
            other => Err(Error::config(format!(
                "invalid credential_source '{}' (expected Environment, Ec2InstanceMetadata or EcsContainer)",
                other
            ))),
        }
    }
}

/// A fully-resolved profile: the section's typed fields, the optional
/// source-profile parent (owned by value -- the chain is acyclic and
/// shallow), and the optional SSO session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileConfig {
    pub profile_name: String,
    /// The profile the user invoked the command with. May differ from
    /// `profile_name` along a source chain; prompts and default session
    /// names are attributed to it.
    pub active_profile: String,

    pub region: Option<String>,
    pub output: Option<String>,
    pub sts_regional_endpoints: Option<String>,

    pub mfa_serial: Option<String>,
    pub mfa_process: Option<String>,
    /// One-time code collected before derivation, if any.
    pub mfa_token: Option<String>,
    /// Selected prompt driver name, if any.
    pub mfa_prompt_method: Option<String>,

    pub role_arn: Option<String>,
    pub role_session_name: Option<String>,
    pub external_id: Option<String>,
    pub session_tags: Vec<(String, String)>,
    pub transitive_session_tags: Vec<String>,
    pub source_identity: Option<String>,
    pub duration_seconds: Option<u32>,
    pub assume_role_duration_seconds: Option<u32>,

    pub credential_process: Option<String>,
    pub credential_source: Option<CredentialSource>,
    pub web_identity_token_file: Option<String>,
    pub web_identity_token_process: Option<String>,

    pub sso_account_id: Option<String>,
    pub sso_role_name: Option<String>,
    pub sso_start_url: Option<String>,
    pub sso_region: Option<String>,
    pub sso_session: Option<SsoSessionConfig>,

    pub source_profile: Option<Box<ProfileConfig>>,
}

impl ProfileConfig {
    pub fn has_role(&self) -> bool {
        self.role_arn.is_some()
    }

    pub fn has_source_profile(&self) -> bool {
        self.source_profile.is_some()
    }

    pub fn has_mfa(&self) -> bool {
        self.mfa_serial.is_some()
    }

    pub fn has_credential_process(&self) -> bool {
        self.credential_process.is_some()
    }

    pub fn has_web_identity(&self) -> bool {
        self.web_identity_token_file.is_some() || self.web_identity_token_process.is_some()
    }

    pub fn has_sso_role(&self) -> bool {
        self.sso_account_id.is_some() && self.sso_role_name.is_some()
    }
}

/// Resolves profile names against a loaded [`ConfigFile`].
pub struct ConfigLoader<'a> {
    file: &'a ConfigFile,
    active_profile: String,
}

impl<'a> ConfigLoader<'a> {
    pub fn new(file: &'a ConfigFile, active_profile: impl Into<String>) -> Self {
        Self {
            file,
            active_profile: active_profile.into(),
        }
    }

    /// Resolve `name` into a [`ProfileConfig`].
    pub fn get_profile_config(&self, name: &str) -> Result<ProfileConfig> {
        self.resolve(name, &mut Vec::new())
    }

    fn resolve(&self, name: &str, visited: &mut Vec<String>) -> Result<ProfileConfig> {
        if visited.iter().any(|v| v == name) {
            return Err(Error::CircularProfile(name.to_string()));
        }
        visited.push(name.to_string());

        let section = self
            .file
            .profile(name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))?;

        let mut config = self.materialize(section)?;
        config.active_profile = self.active_profile.clone();

        self.attach_sso_session(section, &mut config)?;

        // Parent chain: source_profile carries credentials and role
        // chaining; include_profile (and its legacy spelling
        // parent_profile) only lends non-credential defaults.
        let include_name = section
            .get("include_profile")
            .or_else(|| section.get("parent_profile"));

        if let Some(source_name) = section.get("source_profile") {
            let parent = self.resolve(source_name, visited)?;
            inherit_defaults(&mut config, &parent);
            config.source_profile = Some(Box::new(parent));
        } else if let Some(include_name) = include_name {
            let parent = self.resolve(include_name, visited)?;
            inherit_defaults(&mut config, &parent);
        }

        validate(&config)?;
        Ok(config)
    }

    /// Materialise the section's raw strings into typed fields.
    fn materialize(&self, section: &ProfileSection) -> Result<ProfileConfig> {
        let mut config = ProfileConfig {
            profile_name: section.name().to_string(),
            region: section.get("region").map(str::to_string),
            output: section.get("output").map(str::to_string),
            mfa_serial: section.get("mfa_serial").map(str::to_string),
            mfa_process: section.get("mfa_process").map(str::to_string),
            role_arn: section.get("role_arn").map(str::to_string),
            role_session_name: section.get("role_session_name").map(str::to_string),
            external_id: section.get("external_id").map(str::to_string),
            source_identity: section.get("source_identity").map(str::to_string),
            credential_process: section.get("credential_process").map(str::to_string),
            web_identity_token_file: section.get("web_identity_token_file").map(str::to_string),
            web_identity_token_process: section
                .get("web_identity_token_process")
                .map(str::to_string),
            sso_account_id: section.get("sso_account_id").map(str::to_string),
            sso_role_name: section.get("sso_role_name").map(str::to_string),
            sso_start_url: section.get("sso_start_url").map(str::to_string),
            sso_region: section.get("sso_region").map(str::to_string),
            ..Default::default()
        };

        config.duration_seconds = parse_duration(section, "duration_seconds")?;
        config.assume_role_duration_seconds = parse_duration(section, "assume_role_duration_seconds")?;

        if let Some(raw) = section.get("session_tags") {
            config.session_tags = parse_tag_pairs(section.name(), raw)?;
        }
        if let Some(raw) = section.get("transitive_session_tags") {
            config.transitive_session_tags = parse_comma_list(raw);
        }
        if let Some(raw) = section.get("credential_source") {
            config.credential_source = Some(CredentialSource::parse(raw)?);
        }
        if let Some(raw) = section.get("sts_regional_endpoints") {
            if raw != "regional" && raw != "legacy" {
                return Err(Error::config(format!(
                    "profile {}: sts_regional_endpoints must be 'regional' or 'legacy', got '{}'",
                    section.name(),
                    raw
                )));
            }
            config.sts_regional_endpoints = Some(raw.to_string());
        }

        Ok(config)
    }

    fn attach_sso_session(&self, section: &ProfileSection, config: &mut ProfileConfig) -> Result<()> {
        let Some(session_name) = section.get("sso_session") else {
            return Ok(());
        };
        let session = self
            .file
            .sso_session(session_name)
            .ok_or_else(|| Error::UnknownSsoSession(session_name.to_string()))?;

        let start_url = session.sso_start_url().ok_or_else(|| {
            Error::config(format!("sso-session {}: missing sso_start_url", session_name))
        })?;
        let region = session.sso_region().ok_or_else(|| {
            Error::config(format!("sso-session {}: missing sso_region", session_name))
        })?;

        if config.sso_account_id.is_none() || config.sso_role_name.is_none() {
            return Err(Error::config(format!(
                "profile {}: sso_session requires sso_account_id and sso_role_name",
                config.profile_name
            )));
        }

        // The session's parameters stand in for the inline fields.
        if config.sso_start_url.is_none() {
            config.sso_start_url = Some(start_url.to_string());
        }
        if config.sso_region.is_none() {
            config.sso_region = Some(region.to_string());
        }
        config.sso_session = Some(SsoSessionConfig {
            name: session.name().to_string(),
            sso_start_url: start_url.to_string(),
            sso_region: region.to_string(),
            sso_registration_scopes: session.sso_registration_scopes().map(str::to_string),
        });
        Ok(())
    }
}

/// Non-credential defaults a child picks up from its parent when it does
/// not set them itself.
fn inherit_defaults(child: &mut ProfileConfig, parent: &ProfileConfig) {
    if child.region.is_none() {
        child.region = parent.region.clone();
    }
    if child.output.is_none() {
        child.output = parent.output.clone();
    }
    if child.mfa_serial.is_none() {
        child.mfa_serial = parent.mfa_serial.clone();
    }
    if child.sts_regional_endpoints.is_none() {
        child.sts_regional_endpoints = parent.sts_regional_endpoints.clone();
    }
}

/// When `role_arn` is set, exactly one credential source may determine
/// the acting principal; web identity is meaningless without a role.
fn validate(config: &ProfileConfig) -> Result<()> {
    if config.has_web_identity() && !config.has_role() {
        return Err(Error::config(format!(
            "profile {}: web_identity_token_file/web_identity_token_process require role_arn",
            config.profile_name
        )));
    }
    if config.has_role() {
        let mut sources = Vec::new();
        if config.has_source_profile() {
            sources.push("source_profile");
        }
        if config.credential_source.is_some() {
            sources.push("credential_source");
        }
        if config.has_web_identity() {
            sources.push("web_identity_token_file/web_identity_token_process");
        }
        if sources.len() > 1 {
            return Err(Error::MutuallyExclusiveCredentialSource(format!(
                "profile {} sets {}",
                config.profile_name,
                sources.join(" and ")
            )));
        }
    }
    Ok(())
}

fn parse_duration(section: &ProfileSection, key: &str) -> Result<Option<u32>> {
    match section.get(key) {
        Some(raw) => raw.parse::<u32>().map(Some).map_err(|_| {
            Error::config(format!(
                "profile {}: {} must be a number of seconds, got '{}'",
                section.name(),
                key,
                raw
            ))
        }),
        None => Ok(None),
    }
}

fn parse_comma_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_tag_pairs(profile: &str, raw: &str) -> Result<Vec<(String, String)>> {
    let mut tags = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((key, value)) = part.split_once('=') else {
            return Err(Error::config(format!(
                "profile {}: session_tags entry '{}' is not key=value",
                profile, part
            )));
        };
        tags.push((key.trim().to_string(), value.trim().to_string()));
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(text: &str) -> ConfigFile {
        ConfigFile::parse(text).unwrap()
    }

    #[test]
    fn test_profile_not_found() {
        let file = load("[profile a]\nregion = us-east-1\n");
        let loader = ConfigLoader::new(&file, "missing");
        assert!(matches!(
            loader.get_profile_config("missing"),
            Err(Error::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_source_profile_chain() {
        let file = load(
            "[profile base]\nregion = us-east-1\nmfa_serial = arn:aws:iam::1:mfa/u\n\n\
             [profile app]\nsource_profile = base\nrole_arn = arn:aws:iam::1:role/app\n",
        );
        let loader = ConfigLoader::new(&file, "app");
        let config = loader.get_profile_config("app").unwrap();

        assert_eq!(config.profile_name, "app");
        let parent = config.source_profile.as_ref().unwrap();
        assert_eq!(parent.profile_name, "base");
        // mfa_serial and region flow down the source chain when unset.
        assert_eq!(config.mfa_serial.as_deref(), Some("arn:aws:iam::1:mfa/u"));
        assert_eq!(config.region.as_deref(), Some("us-east-1"));
    }

    #[test]
    fn test_include_profile_inherits_without_chaining() {
        let file = load(
            "[profile shared]\nregion = eu-west-1\noutput = json\nrole_arn = arn:aws:iam::1:role/x\n\n\
             [profile app]\ninclude_profile = shared\n",
        );
        let loader = ConfigLoader::new(&file, "app");
        let config = loader.get_profile_config("app").unwrap();

        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.output.as_deref(), Some("json"));
        // include_profile never becomes a credential source.
        assert!(config.source_profile.is_none());
        assert!(config.role_arn.is_none());
    }

    #[test]
    fn test_parent_profile_legacy_alias() {
        let file = load(
            "[profile shared]\nregion = eu-west-1\n\n[profile app]\nparent_profile = shared\n",
        );
        let loader = ConfigLoader::new(&file, "app");
        let config = loader.get_profile_config("app").unwrap();
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert!(config.source_profile.is_none());
    }

    #[test]
    fn test_circular_source_profile() {
        let file = load(
            "[profile a]\nsource_profile = b\n\n[profile b]\nsource_profile = a\n",
        );
        let loader = ConfigLoader::new(&file, "a");
        assert!(matches!(
            loader.get_profile_config("a"),
            Err(Error::CircularProfile(_))
        ));
    }

    #[test]
    fn test_circular_include_profile() {
        let file = load("[profile a]\ninclude_profile = a\n");
        let loader = ConfigLoader::new(&file, "a");
        assert!(matches!(
            loader.get_profile_config("a"),
            Err(Error::CircularProfile(_))
        ));
    }

    #[test]
    fn test_sso_session_attached() {
        let file = load(
            "[profile dev]\nsso_session = common\nsso_account_id = 216000000\nsso_role_name = Admin\n\n\
             [sso-session common]\nsso_start_url = https://x.awsapps.com/start\nsso_region = ap-northeast-2\nsso_registration_scopes = sso:account:access\n",
        );
        let loader = ConfigLoader::new(&file, "dev");
        let config = loader.get_profile_config("dev").unwrap();
        let session = config.sso_session.as_ref().unwrap();
        assert_eq!(session.sso_start_url, "https://x.awsapps.com/start");
        assert_eq!(config.sso_start_url.as_deref(), Some("https://x.awsapps.com/start"));
        assert_eq!(config.sso_region.as_deref(), Some("ap-northeast-2"));
    }

    #[test]
    fn test_unknown_sso_session() {
        let file = load(
            "[profile dev]\nsso_session = nope\nsso_account_id = 1\nsso_role_name = Admin\n",
        );
        let loader = ConfigLoader::new(&file, "dev");
        assert!(matches!(
            loader.get_profile_config("dev"),
            Err(Error::UnknownSsoSession(_))
        ));
    }

    #[test]
    fn test_sso_session_requires_account_and_role() {
        let file = load(
            "[profile dev]\nsso_session = common\n\n\
             [sso-session common]\nsso_start_url = https://x.awsapps.com/start\nsso_region = us-east-1\n",
        );
        let loader = ConfigLoader::new(&file, "dev");
        assert!(matches!(loader.get_profile_config("dev"), Err(Error::Config(_))));
    }

    #[test]
    fn test_mutually_exclusive_credential_sources() {
        let file = load(
            "[profile base]\nregion = us-east-1\n\n\
             [profile bad]\nrole_arn = arn:aws:iam::1:role/x\nsource_profile = base\nweb_identity_token_file = /tmp/token\n",
        );
        let loader = ConfigLoader::new(&file, "bad");
        assert!(matches!(
            loader.get_profile_config("bad"),
            Err(Error::MutuallyExclusiveCredentialSource(_))
        ));
    }

    #[test]
    fn test_web_identity_requires_role() {
        let file = load("[profile w]\nweb_identity_token_process = oidccli raw\n");
        let loader = ConfigLoader::new(&file, "w");
        assert!(matches!(loader.get_profile_config("w"), Err(Error::Config(_))));
    }

    #[test]
    fn test_typed_field_parsing() {
        let file = load(
            "[profile p]\nduration_seconds = 3600\nsession_tags = team = infra, env=prod\ntransitive_session_tags = team, env\ncredential_source = Environment\nrole_arn = arn:aws:iam::1:role/x\n",
        );
        let loader = ConfigLoader::new(&file, "p");
        let config = loader.get_profile_config("p").unwrap();
        assert_eq!(config.duration_seconds, Some(3600));
        assert_eq!(
            config.session_tags,
            vec![("team".to_string(), "infra".to_string()), ("env".to_string(), "prod".to_string())]
        );
        assert_eq!(config.transitive_session_tags, vec!["team", "env"]);
        assert_eq!(config.credential_source, Some(CredentialSource::Environment));
    }

    #[test]
    fn test_bad_duration_rejected() {
        let file = load("[profile p]\nduration_seconds = soon\n");
        let loader = ConfigLoader::new(&file, "p");
        assert!(matches!(loader.get_profile_config("p"), Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_session_tags_rejected() {
        let file = load("[profile p]\nsession_tags = notapair\n");
        let loader = ConfigLoader::new(&file, "p");
        assert!(matches!(loader.get_profile_config("p"), Err(Error::Config(_))));
    }

    #[test]
    fn test_active_profile_recorded() {
        let file = load("[profile base]\nregion = us-east-1\n\n[profile app]\nsource_profile = base\n");
        let loader = ConfigLoader::new(&file, "app");
        let config = loader.get_profile_config("app").unwrap();
        assert_eq!(config.active_profile, "app");
        assert_eq!(config.source_profile.unwrap().active_profile, "app");
    }
}

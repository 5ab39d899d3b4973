//! Child-process environment construction.
//!
//! `exec` hands derived credentials to the child exclusively through
//! environment variables. Inherited credential variables are stripped
//! first so the child never sees a stale or conflicting identity.

use crate::creds::CredentialSnapshot;

/// Credential variables removed from the inherited environment before the
/// derived set is applied.
pub const STRIPPED_VARS: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_SECURITY_TOKEN",
    "AWS_CREDENTIAL_EXPIRATION",
    "AWS_PROFILE",
    "AWS_DEFAULT_PROFILE",
];

/// The variables a child receives for a derived snapshot.
pub fn environment_for(
    profile_name: &str,
    region: Option<&str>,
    snapshot: &CredentialSnapshot,
) -> Vec<(String, String)> {
    let mut vars = vec![
        ("AWS_VAULT".to_string(), profile_name.to_string()),
        (
            "AWS_ACCESS_KEY_ID".to_string(),
            snapshot.access_key_id.clone(),
        ),
        (
            "AWS_SECRET_ACCESS_KEY".to_string(),
            snapshot.secret_access_key.clone(),
        ),
    ];
    if let Some(token) = &snapshot.session_token {
        vars.push(("AWS_SESSION_TOKEN".to_string(), token.clone()));
    }
    if let Some(expiration) = snapshot.expiration {
        vars.push((
            "AWS_CREDENTIAL_EXPIRATION".to_string(),
            expiration.to_rfc3339(),
        ));
    }
    if let Some(region) = region {
        vars.push(("AWS_REGION".to_string(), region.to_string()));
        vars.push(("AWS_DEFAULT_REGION".to_string(), region.to_string()));
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_long_lived_environment() {
        let snapshot = CredentialSnapshot::long_lived("AKIAEXAMPLE", "secret");
        let vars = environment_for("prod", None, &snapshot);
        let names: Vec<&str> = vars.iter().map(|(k, _)| k.as_str()).collect();
        assert!(names.contains(&"AWS_VAULT"));
        assert!(names.contains(&"AWS_ACCESS_KEY_ID"));
        assert!(!names.contains(&"AWS_SESSION_TOKEN"));
        assert!(!names.contains(&"AWS_CREDENTIAL_EXPIRATION"));
        assert!(!names.contains(&"AWS_REGION"));
    }

    #[test]
    fn test_session_environment() {
        let snapshot = CredentialSnapshot {
            access_key_id: "ASIAEXAMPLE".into(),
            secret_access_key: "secret".into(),
            session_token: Some("token".into()),
            expiration: Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap()),
        };
        let vars = environment_for("prod", Some("eu-west-1"), &snapshot);
        let get = |name: &str| {
            vars.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("AWS_VAULT"), Some("prod"));
        assert_eq!(get("AWS_SESSION_TOKEN"), Some("token"));
        assert_eq!(get("AWS_REGION"), Some("eu-west-1"));
        assert_eq!(get("AWS_DEFAULT_REGION"), Some("eu-west-1"));
        assert_eq!(
            get("AWS_CREDENTIAL_EXPIRATION"),
            Some("2030-01-02T03:04:05+00:00")
        );
    }
}

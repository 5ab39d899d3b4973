//! Credential value types shared by the keyring, the session cache, and
//! every provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A dated set of AWS credentials.
///
/// Snapshots without an expiry are long-lived access keys; snapshots with
/// an expiry are session credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSnapshot {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expiration: Option<DateTime<Utc>>,
}

impl CredentialSnapshot {
    /// A long-lived access-key pair with no session token and no expiry.
    pub fn long_lived(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expiration: None,
        }
    }

    /// Whether these are session credentials (carry an expiry).
    pub fn is_session(&self) -> bool {
        self.expiration.is_some()
    }

    /// Whether the snapshot is still valid at `now`, with `margin` seconds
    /// of headroom. Snapshots without an expiry never expire.
    pub fn valid_at(&self, now: DateTime<Utc>, margin_secs: i64) -> bool {
        match self.expiration {
            Some(exp) => exp - chrono::Duration::seconds(margin_secs) > now,
            None => true,
        }
    }
}

/// The JSON document exchanged with `credential_process` helpers and
/// printed by `exec --json`.
///
/// `Version` must be 1. `Expiration` is RFC 3339 when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialProcessDocument {
    #[serde(rename = "Version")]
    pub version: i32,
    #[serde(rename = "AccessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "SessionToken", skip_serializing_if = "Option::is_none", default)]
    pub session_token: Option<String>,
    #[serde(rename = "Expiration", skip_serializing_if = "Option::is_none", default)]
    pub expiration: Option<String>,
}

impl CredentialProcessDocument {
    /// Parse and validate a credential-process document.
    pub fn parse(json: &str) -> Result<Self> {
        let doc: CredentialProcessDocument = serde_json::from_str(json)?;
        if doc.version != 1 {
            return Err(Error::derivation(format!(
                "credential process document has unsupported Version {} (expected 1)",
                doc.version
            )));
        }
        Ok(doc)
    }

    /// Convert into a snapshot, parsing the RFC 3339 expiry if present.
    pub fn into_snapshot(self) -> Result<CredentialSnapshot> {
        let expiration = match self.expiration {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| {
                        Error::derivation(format!("invalid Expiration '{}': {}", raw, e))
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };
        Ok(CredentialSnapshot {
            access_key_id: self.access_key_id,
            secret_access_key: self.secret_access_key,
            session_token: self.session_token,
            expiration,
        })
    }

    /// Build the document from a snapshot, for `exec --json` output.
    pub fn from_snapshot(snapshot: &CredentialSnapshot) -> Self {
        Self {
            version: 1,
            access_key_id: snapshot.access_key_id.clone(),
            secret_access_key: snapshot.secret_access_key.clone(),
            session_token: snapshot.session_token.clone(),
            expiration: snapshot.expiration.map(|e| e.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_lived_snapshot() {
        let snap = CredentialSnapshot::long_lived("AKIAEXAMPLE", "secret");
        assert!(!snap.is_session());
        assert!(snap.valid_at(Utc::now(), 60));
    }

    #[test]
    fn test_valid_at_respects_margin() {
        let now = Utc::now();
        let snap = CredentialSnapshot {
            access_key_id: "AKIAEXAMPLE".into(),
            secret_access_key: "secret".into(),
            session_token: Some("token".into()),
            expiration: Some(now + chrono::Duration::seconds(30)),
        };
        assert!(snap.valid_at(now, 0));
        assert!(!snap.valid_at(now, 60));
    }

    #[test]
    fn test_process_document_version_check() {
        let err = CredentialProcessDocument::parse(
            r#"{"Version":2,"AccessKeyId":"a","SecretAccessKey":"b"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Version"));
    }

    #[test]
    fn test_process_document_optional_fields() {
        let doc = CredentialProcessDocument::parse(
            r#"{"Version":1,"AccessKeyId":"a","SecretAccessKey":"b"}"#,
        )
        .unwrap();
        let snap = doc.into_snapshot().unwrap();
        assert_eq!(snap.access_key_id, "a");
        assert!(snap.session_token.is_none());
        assert!(snap.expiration.is_none());
    }

    #[test]
    fn test_process_document_expiration_parsing() {
        let doc = CredentialProcessDocument::parse(
            r#"{"Version":1,"AccessKeyId":"a","SecretAccessKey":"b","SessionToken":"t","Expiration":"2030-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        let snap = doc.into_snapshot().unwrap();
        assert!(snap.is_session());
        assert_eq!(snap.expiration.unwrap().to_rfc3339(), "2030-01-02T03:04:05+00:00");
    }

    #[test]
    fn test_process_document_invalid_expiration() {
        let doc = CredentialProcessDocument::parse(
            r#"{"Version":1,"AccessKeyId":"a","SecretAccessKey":"b","Expiration":"tomorrow"}"#,
        )
        .unwrap();
        assert!(doc.into_snapshot().is_err());
    }
}

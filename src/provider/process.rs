//! CredentialProcess: run the configured helper and parse its JSON
//! credential document.

use crate::creds::{CredentialProcessDocument, CredentialSnapshot};
use crate::error::Result;
use crate::utils::shell_output;

#[derive(Debug)]
pub struct CredentialProcessProvider {
    pub command: String,
}

impl CredentialProcessProvider {
    pub async fn get(&self) -> Result<CredentialSnapshot> {
        let stdout = shell_output(&self.command).await?;
        let document = CredentialProcessDocument::parse(&stdout)?;
        document.into_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parses_helper_output() {
        let provider = CredentialProcessProvider {
            command: r#"echo '{"Version":1,"AccessKeyId":"AKIAEXAMPLE","SecretAccessKey":"s","SessionToken":"t","Expiration":"2030-01-01T00:00:00Z"}'"#
                .to_string(),
        };
        let snapshot = provider.get().await.unwrap();
        assert_eq!(snapshot.access_key_id, "AKIAEXAMPLE");
        assert!(snapshot.is_session());
    }

    #[tokio::test]
    async fn test_helper_failure_is_derivation_error() {
        let provider = CredentialProcessProvider {
            command: "exit 1".to_string(),
        };
        assert!(provider.get().await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_wrong_version() {
        let provider = CredentialProcessProvider {
            command: r#"echo '{"Version":7,"AccessKeyId":"a","SecretAccessKey":"s"}'"#.to_string(),
        };
        assert!(provider.get().await.is_err());
    }
}

//! Rotate command handler - replace a profile's long-lived access key.
//!
//! Creates the new key with the old credentials, stores it, then deletes
//! the old key using the new credentials -- proving the new key works
//! before the old one disappears. IAM is eventually consistent, so the
//! delete is retried while the new key propagates.

use std::time::Duration;

use tracing::debug;

use crate::config::ConfigLoader;
use crate::error::{Error, Result};

use super::Vault;

const DELETE_ATTEMPTS: u32 = 8;
const DELETE_RETRY_DELAY: Duration = Duration::from_secs(5);

pub async fn handle_rotate(vault: &Vault, profile: &str) -> Result<()> {
    let old = vault.keyring.get(profile)?;

    // The profile may exist only in the store, not in the config file.
    let region = match ConfigLoader::new(&vault.config_file, profile).get_profile_config(profile) {
        Ok(config) => config.region,
        Err(Error::ProfileNotFound(_)) => None,
        Err(e) => return Err(e),
    };

    println!("Rotating credentials for profile {} (this takes a little while)", profile);

    let new = vault.iam.create_access_key(&old, region.as_deref()).await?;
    vault.keyring.set(profile, &new)?;
    println!("Created new access key {}", new.access_key_id);

    let mut attempt = 0;
    loop {
        attempt += 1;
        match vault
            .iam
            .delete_access_key(&new, region.as_deref(), &old.access_key_id)
            .await
        {
            Ok(()) => break,
            Err(e) if attempt < DELETE_ATTEMPTS => {
                debug!(
                    "deleting old access key failed (attempt {}), retrying: {}",
                    attempt, e
                );
                tokio::time::sleep(DELETE_RETRY_DELAY).await;
            }
            Err(e) => {
                return Err(Error::derivation(format!(
                    "the new key {} is stored, but deleting the old key {} failed: {}",
                    new.access_key_id, old.access_key_id, e
                )));
            }
        }
    }

    // Sessions derived from the old key are dead weight now.
    vault.keyring.session_clear(Some(profile))?;

    println!("Finished rotating credentials for profile {}", profile);
    Ok(())
}

//! Import command handler - read a key pair out of a shared-credentials
//! file and store it as a long-lived entry.

use std::path::PathBuf;

use crate::config::ConfigFile;
use crate::creds::CredentialSnapshot;
use crate::error::{Error, Result};

use super::Vault;

fn default_credentials_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".aws").join("credentials"))
        .unwrap_or_else(|| PathBuf::from(".aws/credentials"))
}

pub fn handle_import(vault: &Vault, profile: &str, file: Option<PathBuf>) -> Result<()> {
    let path = file.unwrap_or_else(default_credentials_path);
    if !path.exists() {
        return Err(Error::config(format!(
            "credentials file {} does not exist",
            path.display()
        )));
    }

    // The credentials file shares the INI shape, with bare section names.
    let credentials = ConfigFile::load(&path)?;
    let section = credentials
        .profile(profile)
        .ok_or_else(|| Error::ProfileNotFound(profile.to_string()))?;

    let access_key_id = section.get("aws_access_key_id").ok_or_else(|| {
        Error::config(format!("profile {}: missing aws_access_key_id", profile))
    })?;
    let secret_access_key = section.get("aws_secret_access_key").ok_or_else(|| {
        Error::config(format!("profile {}: missing aws_secret_access_key", profile))
    })?;

    let creds = CredentialSnapshot::long_lived(access_key_id, secret_access_key);
    vault.keyring.set(profile, &creds)?;
    println!(
        "Imported credentials for profile {} from {}",
        profile,
        path.display()
    );
    println!(
        "The key pair is still present in {}; remove it to keep the store authoritative",
        path.display()
    );
    Ok(())
}

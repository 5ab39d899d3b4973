//! Add command handler - store long-lived credentials for a profile.

use std::io::{self, Write};

use crate::config::ProfileSection;
use crate::creds::CredentialSnapshot;
use crate::error::{Error, Result};

use super::Vault;

/// Handle the add command. Prompts for the key pair (hidden input for
/// the secret) unless `from_env` reads it from the environment.
pub fn handle_add(vault: &mut Vault, profile: &str, from_env: bool, no_config: bool) -> Result<()> {
    let (access_key_id, secret_access_key) = if from_env {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| Error::prompt("--env requires AWS_ACCESS_KEY_ID to be set"))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| Error::prompt("--env requires AWS_SECRET_ACCESS_KEY to be set"))?;
        (access_key_id, secret_access_key)
    } else {
        (
            prompt_line(&format!("Enter Access Key ID for profile {}: ", profile))?,
            prompt_secret("Enter Secret Access Key: ")?,
        )
    };

    if access_key_id.is_empty() || secret_access_key.is_empty() {
        return Err(Error::prompt("access key id and secret may not be empty"));
    }

    let creds = CredentialSnapshot::long_lived(access_key_id, secret_access_key);
    vault.keyring.set(profile, &creds)?;
    println!(
        "Added credentials for profile {} to the {} backend",
        profile,
        vault.keyring.store().kind()
    );

    // Offer the profile a home in the config file so it resolves later.
    if !no_config && vault.config_file.profile(profile).is_none() {
        vault.config_file.add_profile(ProfileSection::new(profile));
        vault.config_file.save()?;
        if let Some(path) = vault.config_file.path() {
            println!("Added profile {} to {}", profile, path.display());
        }
    }

    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_secret(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let secret = rpassword::read_password().map_err(|e| Error::prompt(e.to_string()))?;
    eprintln!();
    Ok(secret.trim().to_string())
}

//! List command handler - profiles, stored credentials, cached sessions.

use std::collections::BTreeSet;

use crate::error::Result;

use super::Vault;

#[derive(Debug, Default)]
pub struct ListOptions {
    pub profiles_only: bool,
    pub credentials_only: bool,
    pub sessions_only: bool,
}

pub fn handle_list(vault: &Vault, opts: ListOptions) -> Result<()> {
    let stored = vault.keyring.profiles_with_credentials()?;
    let sessions = vault.keyring.session_keys()?;

    if opts.profiles_only {
        for name in vault.config_file.profile_names() {
            println!("{}", name);
        }
        return Ok(());
    }
    if opts.credentials_only {
        for name in &stored {
            println!("{}", name);
        }
        return Ok(());
    }
    if opts.sessions_only {
        for key in &sessions {
            println!("{}", key);
        }
        return Ok(());
    }

    // Union of configured profiles and profiles that only exist in the
    // store, one row each.
    let mut names: BTreeSet<String> = vault.config_file.profile_names().into_iter().collect();
    names.extend(stored.iter().cloned());

    println!("{:<24} {:<12} {}", "Profile", "Credentials", "Sessions");
    println!("{:<24} {:<12} {}", "=======", "===========", "========");
    for name in names {
        let has_credentials = stored.contains(&name);
        let session_count = sessions
            .iter()
            .filter(|key| key.starts_with(&format!("{}:", name)))
            .count();
        println!(
            "{:<24} {:<12} {}",
            name,
            if has_credentials { "stored" } else { "-" },
            if session_count > 0 {
                session_count.to_string()
            } else {
                "-".to_string()
            }
        );
    }
    Ok(())
}

//! Clear command handler - purge cached sessions.

use crate::error::Result;

use super::Vault;

pub fn handle_clear(vault: &Vault, profile: Option<&str>) -> Result<()> {
    let removed = vault.keyring.session_clear(profile)?;
    match profile {
        Some(profile) => println!("Cleared {} session(s) for profile {}", removed, profile),
        None => println!("Cleared {} session(s)", removed),
    }
    Ok(())
}

//! Remove command handler - delete stored credentials and sessions.

use crate::error::Result;

use super::Vault;

pub fn handle_remove(vault: &Vault, profile: &str, sessions_only: bool) -> Result<()> {
    if sessions_only {
        let removed = vault.keyring.session_clear(Some(profile))?;
        println!("Deleted {} session(s) for profile {}", removed, profile);
        return Ok(());
    }

    // Removing the principal cascades over its cached sessions.
    vault.keyring.remove(profile)?;
    println!("Deleted credentials for profile {}", profile);
    Ok(())
}

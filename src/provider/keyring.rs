//! Long-lived credentials straight from the keyring, no expiry.

use std::sync::Arc;

use crate::creds::CredentialSnapshot;
use crate::error::Result;
use crate::keychain::CredentialKeyring;

pub struct KeyringProvider {
    pub keyring: Arc<CredentialKeyring>,
    pub profile_name: String,
}

impl std::fmt::Debug for KeyringProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringProvider")
            .field("profile_name", &self.profile_name)
            .finish()
    }
}

impl KeyringProvider {
    pub fn get(&self) -> Result<CredentialSnapshot> {
        self.keyring.get(&self.profile_name)
    }
}

//! aws-vault - a vault for securely storing and accessing AWS
//! credentials in development environments.
//!
//! Long-lived access keys live in an OS-provided secret store; on demand
//! the vault derives short-lived session credentials through session
//! tokens, role assumption (with and without MFA), web-identity
//! federation, SSO role credentials, or user-provided credential
//! subprocesses, and hands them to child processes via the environment.
//!
//! # Architecture
//!
//! - [`store`] -- the secret-store backends (OS keychain, pass,
//!   encrypted file, memory) behind one key/value interface
//! - [`keychain`] -- typed credential schemas over the store
//! - [`config`] -- the `~/.aws/config` model and the profile resolver
//! - [`session`] -- the session cache and cache-key fingerprints
//! - [`provider`] -- the decision engine and one provider per
//!   derivation strategy, all exposing a uniform async `get()`
//! - [`sts`] -- abstract contracts for the AWS calls, with SDK adapters
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use aws_vault::{
//!     ConfigFile, ConfigLoader, CredentialKeyring, SecretStore, StoreConfig,
//!     provider::{ProvideCredentials, TempCredentialsCreator},
//!     sts::{SsoClient, StsClient},
//! };
//!
//! #[tokio::main]
//! async fn main() -> aws_vault::Result<()> {
//!     let store = SecretStore::open(&StoreConfig::default())?;
//!     let keyring = Arc::new(CredentialKeyring::new(store));
//!     let config_file = ConfigFile::load_from_env()?;
//!
//!     let config = ConfigLoader::new(&config_file, "prod").get_profile_config("prod")?;
//!     let provider =
//!         TempCredentialsCreator::new(keyring, Arc::new(StsClient::new()), Arc::new(SsoClient::new()))
//!             .provider_for_profile(&config)?;
//!     let snapshot = provider.get().await?;
//!     println!("{}", snapshot.access_key_id);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod creds;
pub mod env;
pub mod error;
pub mod keychain;
pub mod mfa;
pub mod provider;
pub mod session;
pub mod store;
pub mod sts;
pub mod utils;

// Re-export commonly used types at the crate root
pub use config::{ConfigFile, ConfigLoader, ProfileConfig};
pub use creds::CredentialSnapshot;
pub use error::{Error, Result};
pub use keychain::CredentialKeyring;
pub use provider::{
    ProvideCredentials, TempCredentialsCreator, TempCredentialsProvider,
    new_temp_credentials_provider,
};
pub use store::{SecretStore, StoreConfig};

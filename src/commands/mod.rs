//! Command handlers for the aws-vault CLI.
//!
//! Handlers are thin over the library: they resolve a profile, compose a
//! provider, and present the result. Shared process state lives in
//! [`Vault`].

mod add;
mod clear;
mod exec;
mod import;
mod list;
mod login;
mod remove;
mod rotate;

pub use add::handle_add;
pub use clear::handle_clear;
pub use exec::{ExecOptions, handle_exec};
pub use import::handle_import;
pub use list::{ListOptions, handle_list};
pub use login::{LoginOptions, handle_login};
pub use remove::handle_remove;
pub use rotate::handle_rotate;

use std::sync::Arc;

use crate::config::ConfigFile;
use crate::keychain::CredentialKeyring;
use crate::sts::{IamOps, SsoOps, StsOps};

/// Process-wide state shared by every handler: the opened secret store,
/// the loaded config file, and the AWS operation clients.
pub struct Vault {
    pub keyring: Arc<CredentialKeyring>,
    pub config_file: ConfigFile,
    pub sts: Arc<dyn StsOps>,
    pub sso: Arc<dyn SsoOps>,
    pub iam: Arc<dyn IamOps>,
    /// Prompt driver name recorded on resolved profiles.
    pub mfa_prompt_method: Option<String>,
}

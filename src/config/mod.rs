//! The AWS shared-config model and the profile resolver.

mod file;
mod loader;

pub use file::{ConfigFile, ProfileSection, SsoSessionSection, default_config_path};
pub use loader::{ConfigLoader, CredentialSource, ProfileConfig, SsoSessionConfig};

use std::path::PathBuf;

/// Expand a leading tilde to the user's home directory.
/// Handles both "~" alone and "~/path/to/something" patterns.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

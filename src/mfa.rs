//! MFA one-time-code sourcing.
//!
//! The resolver may carry a token collected up front (`MfaToken`); failing
//! that, a configured `mfa_process` is executed and its stdout is the
//! code. Interactive prompting is the CLI's concern, not the core's: when
//! neither source yields a code the derivation fails with a hint.

use tracing::debug;

use crate::config::ProfileConfig;
use crate::error::{Error, Result};
use crate::sts::MfaEntry;
use crate::utils::shell_output;

/// Produce the [`MfaEntry`] for a profile that requires MFA.
///
/// The token is consumed at most once per derivation; callers must not
/// retry with the same entry.
pub async fn resolve_mfa_entry(config: &ProfileConfig) -> Result<MfaEntry> {
    let serial = config
        .mfa_serial
        .clone()
        .ok_or_else(|| Error::derivation("MFA requested for a profile without mfa_serial"))?;

    if let Some(token) = &config.mfa_token {
        return Ok(MfaEntry {
            serial,
            token: token.trim().to_string(),
        });
    }

    if let Some(process) = &config.mfa_process {
        debug!("profile {}: obtaining MFA code from mfa_process", config.profile_name);
        let token = shell_output(process).await?;
        if token.is_empty() {
            return Err(Error::derivation(format!(
                "mfa_process `{}` produced no code",
                process
            )));
        }
        return Ok(MfaEntry { serial, token });
    }

    Err(Error::derivation(format!(
        "profile {}: an MFA code is required for {} but none was provided (pass one with --mfa-token or configure mfa_process)",
        config.active_profile, serial
    )))
}

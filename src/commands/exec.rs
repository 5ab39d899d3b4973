//! Exec command handler - run a command with derived credentials.

use std::process::Command;

use crate::config::ConfigLoader;
use crate::creds::CredentialProcessDocument;
use crate::env::{STRIPPED_VARS, environment_for};
use crate::error::{Error, Result};
use crate::provider::{ProvideCredentials, TempCredentialsCreator};

use super::Vault;

#[derive(Debug, Default)]
pub struct ExecOptions {
    pub json: bool,
    pub no_session: bool,
    pub duration: Option<u32>,
    pub mfa_token: Option<String>,
    pub region: Option<String>,
    pub command: Vec<String>,
}

/// Handle the exec command. Returns the child's exit code (0 for --json).
pub async fn handle_exec(vault: &Vault, profile: &str, opts: ExecOptions) -> Result<i32> {
    let loader = ConfigLoader::new(&vault.config_file, profile);
    let mut config = loader.get_profile_config(profile)?;
    config.mfa_token = opts.mfa_token;
    config.mfa_prompt_method = vault.mfa_prompt_method.clone();
    if opts.region.is_some() {
        config.region = opts.region;
    }
    if opts.duration.is_some() {
        config.duration_seconds = opts.duration;
    }

    let mut creator =
        TempCredentialsCreator::new(vault.keyring.clone(), vault.sts.clone(), vault.sso.clone());
    if opts.no_session {
        creator = creator.disable_sessions_for(profile);
    }
    let provider = creator.provider_for_profile(&config)?;
    let snapshot = provider.get().await?;

    if opts.json {
        let document = CredentialProcessDocument::from_snapshot(&snapshot);
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(0);
    }

    let (program, args) = match opts.command.split_first() {
        Some((program, args)) => (program.clone(), args.to_vec()),
        None => {
            let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
            eprintln!("Starting subshell {}, use `exit` to exit the session", shell);
            (shell, Vec::new())
        }
    };

    let mut child = Command::new(&program);
    child.args(&args);
    for var in STRIPPED_VARS {
        child.env_remove(var);
    }
    child.envs(environment_for(profile, config.region.as_deref(), &snapshot));

    let status = child
        .status()
        .map_err(|e| Error::Other(format!("running {}: {}", program, e)))?;
    Ok(status.code().unwrap_or(1))
}

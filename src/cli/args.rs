//! CLI argument parsing structures.

use clap::{Args, Parser};
use std::path::PathBuf;

use super::commands::Commands;

/// Main CLI structure for aws-vault.
#[derive(Parser, Debug)]
#[command(name = "aws-vault")]
#[command(about = "A vault for securely storing and accessing AWS credentials", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub globals: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands.
#[derive(Debug, Default, Args)]
pub struct GlobalArgs {
    /// Show debugging output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Secret backend to use (keychain, pass, file, memory)
    #[arg(long, global = true, env = "AWS_VAULT_BACKEND")]
    pub backend: Option<String>,

    /// Name of the keychain or secret-service collection to use
    #[arg(long = "keychain", global = true, env = "AWS_VAULT_KEYCHAIN_NAME")]
    pub keychain_name: Option<String>,

    /// Directory for the "file" backend
    #[arg(long = "file-dir", global = true, env = "AWS_VAULT_FILE_DIR")]
    pub file_dir: Option<PathBuf>,

    /// Prefix prepended to entries in the "pass" backend
    #[arg(long = "pass-prefix", global = true, env = "AWS_VAULT_PASS_PREFIX")]
    pub pass_prefix: Option<String>,

    /// Name of the pass executable
    #[arg(long = "pass-cmd", global = true, env = "AWS_VAULT_PASS_CMD")]
    pub pass_cmd: Option<String>,

    /// MFA prompt driver (recorded on the resolved profile; MFA codes
    /// themselves come from --mfa-token or a configured mfa_process)
    #[arg(long, global = true, env = "AWS_VAULT_PROMPT")]
    pub prompt: Option<String>,
}

//! Command and subcommand definitions.

use clap::Subcommand;
use std::path::PathBuf;

/// Top-level commands available in aws-vault.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add credentials for a profile to the secret store
    Add {
        /// Name of the profile
        profile: String,

        /// Read the key pair from AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY
        /// instead of prompting
        #[arg(long)]
        env: bool,

        /// Do not add the profile to the config file if it is missing
        #[arg(long)]
        no_config: bool,
    },
    /// Remove a profile's credentials (and its cached sessions) from the store
    Remove {
        /// Name of the profile
        profile: String,

        /// Only remove the profile's cached sessions, keep the master keys
        #[arg(long)]
        sessions_only: bool,
    },
    /// List profiles, stored credentials and cached sessions
    List {
        /// Only show profile names
        #[arg(long)]
        profiles: bool,

        /// Only show profiles with stored credentials
        #[arg(long)]
        credentials: bool,

        /// Only show cached session keys
        #[arg(long)]
        sessions: bool,
    },
    /// Execute a command with derived AWS credentials in its environment
    Exec {
        /// Name of the profile
        profile: String,

        /// Print a credential-process JSON document instead of running a command
        #[arg(short = 'j', long)]
        json: bool,

        /// Skip GetSessionToken and session caching for this profile
        #[arg(short = 'n', long)]
        no_session: bool,

        /// Session/role duration in seconds
        #[arg(short = 'd', long)]
        duration: Option<u32>,

        /// MFA one-time code
        #[arg(short = 't', long)]
        mfa_token: Option<String>,

        /// Override the region for this invocation
        #[arg(long)]
        region: Option<String>,

        /// The command and its arguments (defaults to $SHELL)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Generate a sign-in URL for the AWS management console
    Login {
        /// Name of the profile
        profile: String,

        /// MFA one-time code
        #[arg(short = 't', long)]
        mfa_token: Option<String>,

        /// Federation session duration in seconds
        #[arg(short = 'd', long)]
        duration: Option<u32>,
    },
    /// Rotate the long-lived access key for a profile
    Rotate {
        /// Name of the profile
        profile: String,
    },
    /// Clear cached sessions (all profiles, or one)
    Clear {
        /// Name of the profile to clear sessions for
        profile: Option<String>,
    },
    /// Import a profile's key pair from a shared-credentials file
    Import {
        /// Name of the profile
        profile: String,

        /// Credentials file to read (default: ~/.aws/credentials)
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

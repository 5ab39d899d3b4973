use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use aws_vault::cli::{Cli, Commands};
use aws_vault::commands::{
    ExecOptions, ListOptions, LoginOptions, Vault, handle_add, handle_clear, handle_exec,
    handle_import, handle_list, handle_login, handle_remove, handle_rotate,
};
use aws_vault::config::ConfigFile;
use aws_vault::error::Result;
use aws_vault::keychain::CredentialKeyring;
use aws_vault::store::{SecretStore, StoreConfig};
use aws_vault::sts::{IamClient, SsoClient, StsClient};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.globals.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let command_name = command_name(&cli.command);
    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("aws-vault {}: {}", command_name, e);
            std::process::exit(1);
        }
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Add { .. } => "add",
        Commands::Remove { .. } => "remove",
        Commands::List { .. } => "list",
        Commands::Exec { .. } => "exec",
        Commands::Login { .. } => "login",
        Commands::Rotate { .. } => "rotate",
        Commands::Clear { .. } => "clear",
        Commands::Import { .. } => "import",
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let store = SecretStore::open(&StoreConfig {
        backend: cli.globals.backend.clone(),
        keychain_name: cli.globals.keychain_name.clone(),
        file_dir: cli.globals.file_dir.clone(),
        pass_prefix: cli.globals.pass_prefix.clone(),
        pass_cmd: cli.globals.pass_cmd.clone(),
    })?;

    let mut vault = Vault {
        keyring: Arc::new(CredentialKeyring::new(store)),
        config_file: ConfigFile::load_from_env()?,
        sts: Arc::new(StsClient::new()),
        sso: Arc::new(SsoClient::new()),
        iam: Arc::new(IamClient::new()),
        mfa_prompt_method: cli.globals.prompt.clone(),
    };

    match cli.command {
        Commands::Add {
            profile,
            env,
            no_config,
        } => {
            handle_add(&mut vault, &profile, env, no_config)?;
            Ok(0)
        }
        Commands::Remove {
            profile,
            sessions_only,
        } => {
            handle_remove(&vault, &profile, sessions_only)?;
            Ok(0)
        }
        Commands::List {
            profiles,
            credentials,
            sessions,
        } => {
            handle_list(
                &vault,
                ListOptions {
                    profiles_only: profiles,
                    credentials_only: credentials,
                    sessions_only: sessions,
                },
            )?;
            Ok(0)
        }
        Commands::Exec {
            profile,
            json,
            no_session,
            duration,
            mfa_token,
            region,
            command,
        } => {
            handle_exec(
                &vault,
                &profile,
                ExecOptions {
                    json,
                    no_session,
                    duration,
                    mfa_token,
                    region,
                    command,
                },
            )
            .await
        }
        Commands::Login {
            profile,
            mfa_token,
            duration,
        } => {
            handle_login(
                &vault,
                &profile,
                LoginOptions {
                    mfa_token,
                    duration,
                },
            )
            .await?;
            Ok(0)
        }
        Commands::Rotate { profile } => {
            handle_rotate(&vault, &profile).await?;
            Ok(0)
        }
        Commands::Clear { profile } => {
            handle_clear(&vault, profile.as_deref())?;
            Ok(0)
        }
        Commands::Import { profile, file } => {
            handle_import(&vault, &profile, file)?;
            Ok(0)
        }
    }
}

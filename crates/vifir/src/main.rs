//! vifir -- forensic collection from a virtualization management
//! endpoint.
//!
//! Each invocation is one session: configure, build a client, log in,
//! run the requested operation, log out. Logs go to stderr and, as
//! JSON, to `vifir.log.json` next to the collected artifacts.

mod cli;
mod commands;
mod error;

use clap::Parser;
use miette::IntoDiagnostic;
use owo_colors::OwoColorize;
use secrecy::SecretString;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use vifir_config::{Profile, Settings};
use vifir_core::Session;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = Cli::parse();

    let settings = resolve_settings(&args)?;
    std::fs::create_dir_all(&settings.output_dir).into_diagnostic()?;
    let _log_guard = init_tracing(&settings);

    eprintln!(
        "{} {} - {}",
        "[+]".green(),
        "vifir".bold(),
        env!("CARGO_PKG_VERSION")
    );

    let password = obtain_password()?;

    let mut session = Session::new();
    session
        .configure(
            settings.endpoint.clone(),
            settings.insecure,
            settings.proxy.clone(),
        )
        .map_err(CliError::from)?;
    session.build_client().map_err(CliError::from)?;
    session
        .login(&settings.username, &password)
        .await
        .map_err(CliError::from)?;

    let result = match &args.command {
        Command::Check => commands::check::run(&session).await,
        Command::Hosts => commands::inventory::hosts(&session).await,
        Command::Datacenters => commands::inventory::datacenters(&session).await,
        Command::Events { light, datacenters } => {
            commands::events::run(&session, *light, datacenters, &settings.output_dir).await
        }
        Command::Bundle { hosts } => {
            commands::bundle::run(&session, hosts, &settings.output_dir).await
        }
    };

    // Always invalidate the session, even when the operation failed.
    session.logout().await;

    result?;
    Ok(())
}

/// Merge config file, environment, and command-line flags.
fn resolve_settings(args: &Cli) -> Result<Settings, CliError> {
    let config = vifir_config::load_config(args.config.as_ref())?;
    let overrides = Profile {
        endpoint: args.endpoint.clone(),
        username: args.username.clone(),
        insecure: args.insecure,
        proxy: args.proxy.clone(),
        output_dir: args.output_dir.clone(),
    };
    Ok(config.resolve_with(args.profile.as_deref(), &overrides)?)
}

/// Password from `VIFIR_PASSWORD`, falling back to a prompt.
fn obtain_password() -> miette::Result<SecretString> {
    if let Ok(password) = std::env::var("VIFIR_PASSWORD") {
        return Ok(password.into());
    }
    let password = rpassword::prompt_password("Password: ").into_diagnostic()?;
    Ok(password.into())
}

/// Stderr logging plus a JSON log file next to the collected
/// artifacts. The guard must stay alive for the file writer to flush.
fn init_tracing(settings: &Settings) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender =
        tracing_appender::rolling::never(&settings.output_dir, "vifir.log.json");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().json().with_writer(file_writer))
        .init();
    guard
}

//! # trustline
//!
//! The three parties of an OpenID Connect trust triangle, built on
//! [`trustline_auth`]:
//!
//! - [`api`] - resource server validating bearer tokens
//! - [`web`] - relying party signing users in with Authorization Code + PKCE
//! - [`m2m`] - machine client using Client Credentials
//!
//! All clients authenticate with `private_key_jwt` using a signing key
//! injected through configuration.

pub mod api;
pub mod cli;
pub mod config;
pub mod logging;
pub mod m2m;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

pub use cli::{Cli, Command};
pub use config::{AppConfig, ConfigError};

/// Resolves on Ctrl-C or SIGTERM
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Execute the parsed command line
///
/// # Errors
///
/// Returns configuration, bootstrap and runtime failures.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_file(&cli.config)?;
    logging::init(&config.logging, cli.verbose)?;

    match cli.command {
        Command::Api => api::run(&config).await,
        Command::Web => web::run(&config).await,
        Command::M2m => m2m::run(&config).await,
    }
}

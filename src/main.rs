//! Shared Drive Admin
//!
//! Inventory and bulk-edit the permissions of Google Workspace shared drives, with a local
//! snapshot cache so that listing and querying do not repeat thousands of API calls.

mod auth;
mod cli;
mod config;
mod errors;
mod gateway;
mod models;
mod progress;
mod query;
mod reconcile;
mod store;

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::Cli;
use config::Config;
use errors::AppError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging; stdout is reserved for tables and exports
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Data directory: {:?}", config.data_dir);
    tracing::debug!("Cache backend: {:?}", config.cache_backend);

    let cancel = CancellationToken::new();
    spawn_interrupt_listener(cancel.clone());

    match cli::run(cli, config, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ (AppError::Interrupted { .. } | AppError::ListingInterrupted { .. })) => {
            tracing::warn!("{}", e);
            ExitCode::from(130)
        }
        Err(e) => {
            tracing::error!(code = e.error_code(), "{}", e);
            ExitCode::FAILURE
        }
    }
}

/// First Ctrl-C asks running fetches to stop and save what they have; a second one exits.
fn spawn_interrupt_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received, stopping after the current step (Ctrl-C again to abort)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

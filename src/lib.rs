pub mod batch;
pub mod chain;
pub mod claim;
pub mod commands;
pub mod config;
pub mod error;
pub mod failover;
pub mod gate;
pub mod notifications;
pub mod retry;
pub mod rpc;
pub mod state;
pub mod types;

#[cfg(test)]
mod testing;

use std::path::Path;
use std::sync::Arc;

use chain::{ClaimTxBuilder, FeeSource};
use config::ClaimerConfig;
use error::AppError;
use state::{AppState, Collaborators};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `info`).
/// Later calls leave the first subscriber in place.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Build the application state over JSON-RPC endpoints.
///
/// `config_path` defaults to the per-user config location. The fee read query
/// and the claim transaction builder belong to the pool program client and are
/// supplied by the host.
pub fn run(
    config_path: Option<&Path>,
    fee_source: Arc<dyn FeeSource>,
    tx_builder: Arc<dyn ClaimTxBuilder>,
) -> Result<AppState, AppError> {
    init_logging();

    let config = match config_path {
        Some(path) => ClaimerConfig::load_from(path)?,
        None => ClaimerConfig::load()?,
    };
    tracing::info!(
        "Starting fee claimer for pool group {} ({} RPC endpoints)",
        config.pool_config,
        config.rpc_endpoints.len()
    );

    let collaborators = Collaborators::with_rpc(&config, fee_source, tx_builder);
    AppState::new(config, collaborators)
}

//! Ledger server binary
//!
//! Usage: `token-ledger-server [config.toml]`. Without a path the
//! configuration is read from `TOKEN_LEDGER_*` environment variables.

use anyhow::Context;
use token_ledger::{types::format_units, Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => Config::from_env().context("loading configuration from environment")?,
    };

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting token ledger"
    );

    let ledger = Ledger::open(config).await.context("opening ledger")?;

    let snapshot = ledger.snapshot().await?;
    tracing::info!(
        symbol = %snapshot.metadata.symbol,
        total_supply = %format_units(snapshot.total_supply, snapshot.metadata.decimals),
        holders = snapshot.holders.len(),
        mode = ?snapshot.mode,
        "Ledger ready"
    );
    tracing::debug!(snapshot = %serde_json::to_string(&snapshot)?, "Ledger snapshot");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down token ledger");
    ledger.shutdown().await?;
    Ok(())
}

// relaychat server binary

use anyhow::Context;
use clap::Parser;
use relaychat::chat::{RelayCli, RelayServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = RelayCli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cli.resolve_config()?;
    let server = RelayServer::bind(config).await?;
    let handle = server.spawn()?;

    tracing::info!("relaychat running on {}", handle.local_addr());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    tracing::info!("Stopping relay");
    handle.shutdown().await?;

    Ok(())
}

use anyhow::{Context, Result};
use gateway::build_sink;
use request_connector::config::load_config;
use request_connector::{Connector, ConverterRegistry, RequestConnector};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "request_connector=info,gateway=info".into()),
        )
        .init();

    info!("Request connector starting...");

    let config_path = std::env::var("REQUEST_CONNECTOR_CONFIG")
        .unwrap_or_else(|_| "request_connector.toml".to_string());

    let config = load_config(&config_path)?;
    info!(
        config_path = %config_path,
        endpoints = config.mapping.len(),
        "Configuration loaded"
    );

    let sink = build_sink(&config.sink).context("Failed to initialize sink")?;

    let registry = ConverterRegistry::with_builtins();
    let mut connector = RequestConnector::new(config, &registry, sink);
    connector.open()?;

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    connector.shutdown().await;

    Ok(())
}

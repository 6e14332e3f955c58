//! Metarepo - Main Entry Point
//!
//! Composition root: logging, configuration, repository provisioning and the
//! HTTP server.

mod telemetry;

use anyhow::{Context, Result};
use config::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use metarepo_api_http::{HttpServer, HttpServerConfig};
use metarepo_core::domain::{load_config, RepositoryContext};
use metarepo_core::port::RepositoryProvider;
use metarepo_infra_sql::{HandlerRegistry, SqlRepositoryProvider};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const KEY_SERVER_HOST: &str = "server.host";
const KEY_SERVER_PORT: &str = "server.port";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    init_logging()?;

    info!("Metarepo v{} starting...", VERSION);

    // 2. Configuration (file from METAREPO_CONFIG, environment on top)
    let config_path = std::env::var_os("METAREPO_CONFIG").map(PathBuf::from);
    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;
    let context = RepositoryContext::from_config(&config);

    info!(
        url = %context.connection_url(),
        driver = %context.driver(),
        handler = %context.handler(),
        "Configuration loaded"
    );

    // 3. Repository provisioning
    let provider = Arc::new(SqlRepositoryProvider::new(
        HandlerRegistry::with_builtin_handlers(),
    ));
    provider
        .initialize(context)
        .await
        .context("Repository initialization failed")?;

    // 4. HTTP server
    let server = HttpServer::new(server_config(&config), provider.clone());
    let handle = server.start().await.context("HTTP server start failed")?;

    info!(addr = %handle.local_addr(), "System ready");
    info!("Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 6. Graceful shutdown
    handle.stop().await.context("HTTP server stop failed")?;
    provider.shutdown().await;

    info!("Shutdown complete.");

    Ok(())
}

/// `METAREPO_LOG_FORMAT=json` for structured output, pretty otherwise
fn init_logging() -> Result<()> {
    let log_format = std::env::var("METAREPO_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("metarepo=info,tower_http=info"))?;

    let fmt_layer = match log_format.as_str() {
        "json" => fmt::layer().json().boxed(),
        _ => fmt::layer().pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(telemetry::layer()?)
        .try_init()?;

    Ok(())
}

fn server_config(config: &Config) -> HttpServerConfig {
    let defaults = HttpServerConfig::default();

    HttpServerConfig {
        host: config.get_string(KEY_SERVER_HOST).unwrap_or(defaults.host),
        port: config
            .get_int(KEY_SERVER_PORT)
            .ok()
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(defaults.port),
    }
}

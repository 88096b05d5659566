//! guideforge server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use guideforge_core::config::AppConfig;
use guideforge_server::{AppState, create_router};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// guideforge - instruction manual authoring API
#[derive(Parser, Debug)]
#[command(name = "guideforged")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "GUIDEFORGE_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

/// Load configuration: optional TOML file, then `GUIDEFORGE_` env vars
/// (`GUIDEFORGE_AUTH__JWT_SECRET` sets `auth.jwt_secret`).
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if std::path::Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(config_path = %path, "No config file found, using defaults and environment");
    }

    figment
        .merge(Env::prefixed("GUIDEFORGE_").split("__"))
        .extract()
        .context("failed to load configuration")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("guideforge v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    let warnings = config
        .auth
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid auth configuration: {e}"))?;
    for warning in warnings {
        tracing::warn!("{warning}");
    }

    if config.server.metrics_enabled {
        guideforge_server::metrics::register_metrics();
        tracing::info!("Prometheus metrics registered");
    }

    let storage = guideforge_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend initialized");

    let metadata = guideforge_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!(backend = metadata.backend_name(), "Metadata store initialized");

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let state = AppState::new(config, storage, metadata.clone());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!("Listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    metadata.close().await;
    tracing::info!("Metadata store closed");

    served.context("server error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_without_file_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("absent.toml");
        let config = load_config(missing.to_str().unwrap()).unwrap();
        assert_eq!(config.upload.max_upload_size, 5 * 1024 * 1024);
    }

    #[test]
    fn load_config_reads_toml_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind = "0.0.0.0:9000"
metrics_enabled = true

[storage]
type = "filesystem"
path = "/srv/guideforge/uploads"

[auth]
jwt_expiration_hours = 2
"#,
        )
        .unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert!(config.server.metrics_enabled);
        assert_eq!(config.auth.jwt_expiration_hours, 2);
    }
}

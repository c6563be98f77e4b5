use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use paneboard_core::bridge::CaptureBridge;
use paneboard_core::bridge::TmuxBridge;
use paneboard_core::config::Settings;
use paneboard_core::registry::ChannelRegistry;
use paneboard_core::runtime::BridgeRuntime;
use paneboard_server::AppState;
use paneboard_server::router;

const CONFIG_ENV: &str = "PANEBOARD_CONFIG";
const DEFAULT_CONFIG: &str = "config/settings.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG));
    let settings = Arc::new(
        Settings::load(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?,
    );

    let bridge: Arc<dyn CaptureBridge> = Arc::new(TmuxBridge::new());
    let runtime = BridgeRuntime::new(settings.runtime.worker_count);
    let registry = Arc::new(
        ChannelRegistry::start(&settings, Arc::clone(&bridge), runtime.clone()).await,
    );
    let state = AppState::new(
        Arc::clone(&settings),
        Arc::clone(&registry),
        runtime,
        bridge,
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "paneboard listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    info!("shutting down");
    Ok(())
}

async fn shutdown_signal() {
    // Ctrl-C is the only shutdown path; pollers die with the process.
    let _ = tokio::signal::ctrl_c().await;
}

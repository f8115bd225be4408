//! Lattice Bridge - cross-chain bridge operation orchestrator
//!
//! Wires the EVM adapters for both chains, the operation store, and the
//! orchestration engine behind an HTTP API that creates operations and
//! serves their status.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use lattice_bridge::adapter::{ChainSide, EvmAdapter};
use lattice_bridge::config::Settings;
use lattice_bridge::metrics::MetricsServer;
use lattice_bridge::orchestrator::{AdapterPair, OrchestratorEngine, PipelineEnv};
use lattice_bridge::store::OperationStore;
use lattice_bridge::{api, error::BridgeError};

use ethers::signers::LocalWallet;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Lattice Bridge v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for chains {} -> {}",
        settings.source.name, settings.destination.name
    );

    // Load the relayer wallet
    let wallet = load_wallet(&settings)?;

    // Wire the chain adapters
    let source = EvmAdapter::new(settings.source.clone(), ChainSide::Source, wallet.clone())?;
    let destination = EvmAdapter::new(
        settings.destination.clone(),
        ChainSide::Destination,
        wallet,
    )?;
    let adapters = AdapterPair {
        source: Arc::new(source),
        destination: Arc::new(destination),
    };
    info!("Chain adapters initialized");

    // Initialize the orchestration engine
    let env = PipelineEnv::from_settings(&settings, adapters)?;
    let store = Arc::new(OperationStore::new());
    let engine = Arc::new(OrchestratorEngine::new(env, store));
    info!("Orchestration engine initialized");

    // Start API server
    let api_handle = tokio::spawn({
        let api_config = settings.api.clone();
        let engine = engine.clone();
        async move {
            if let Err(e) = api::run_server(api_config, engine).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Lattice Bridge is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    api_handle.abort();
    if let Some(handle) = metrics_handle {
        handle.abort();
    }

    info!("Lattice Bridge stopped");
    Ok(())
}

fn load_wallet(settings: &Settings) -> Result<LocalWallet> {
    let env_var = &settings.wallet.private_key_env;
    let key = std::env::var(env_var)
        .with_context(|| format!("Wallet private key env var {} not set", env_var))?;

    key.parse::<LocalWallet>()
        .map_err(|e| BridgeError::Wallet(format!("Invalid private key: {}", e)).into())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lattice_bridge=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! Canopy - Main Entry Point
//!
//! Composition root: logging, environment configuration, dependency wiring,
//! startup quota seeding, graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use canopy_api_rpc::{server::RpcServerConfig, RpcServer};
use canopy_core::application::{shutdown_channel, DeliveryQueue, QuotaTracker};
use canopy_core::domain::BatchingOptions;
use canopy_core::port::time_provider::SystemTimeProvider;
use canopy_infra_http::{HttpTransport, HttpTransportConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn batching_options_from_env() -> BatchingOptions {
    let defaults = BatchingOptions::default();
    BatchingOptions {
        max_nodes_per_request: env_parsed(
            "CANOPY_MAX_NODES_PER_REQUEST",
            defaults.max_nodes_per_request,
        ),
        max_payload_bytes: env_parsed("CANOPY_MAX_PAYLOAD_BYTES", defaults.max_payload_bytes),
        workspace_node_ceiling: env_parsed(
            "CANOPY_NODE_CEILING",
            defaults.workspace_node_ceiling,
        ),
        requests_per_second: env_parsed(
            "CANOPY_REQUESTS_PER_SECOND",
            defaults.requests_per_second,
        ),
        max_retries: env_parsed("CANOPY_MAX_RETRIES", defaults.max_retries),
        base_backoff: Duration::from_millis(env_parsed(
            "CANOPY_BASE_BACKOFF_MS",
            defaults.base_backoff.as_millis() as u64,
        )),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("canopy=info"))
        .expect("default env filter is well-formed");

    let registry = tracing_subscriber::registry().with(filter);
    match std::env::var("CANOPY_LOG_FORMAT").as_deref() {
        Ok("json") => registry.with(fmt::layer().json()).init(),
        _ => registry.with(fmt::layer().pretty()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    init_logging();
    info!("Canopy v{} starting...", VERSION);

    // 2. Load configuration
    let endpoint = std::env::var("CANOPY_ENDPOINT")
        .map_err(|_| anyhow::anyhow!("CANOPY_ENDPOINT must be set"))?;
    let api_token = std::env::var("CANOPY_API_TOKEN")
        .map_err(|_| anyhow::anyhow!("CANOPY_API_TOKEN must be set"))?;
    let rpc_port: u16 = env_parsed("CANOPY_RPC_PORT", 9433);
    let options = batching_options_from_env();

    info!(
        endpoint = %endpoint,
        max_nodes_per_request = options.max_nodes_per_request,
        requests_per_second = options.requests_per_second,
        node_ceiling = options.workspace_node_ceiling,
        "Configuration loaded"
    );

    // 3. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let transport = Arc::new(HttpTransport::new(HttpTransportConfig {
        endpoint,
        api_token,
        request_timeout: Duration::from_millis(env_parsed("CANOPY_REQUEST_TIMEOUT_MS", 30_000)),
    })?);

    let quota = Arc::new(QuotaTracker::new(options.workspace_node_ceiling));
    // Startup reconciliation against the remote store's actual count; issue
    // quota.seed.v1 to update once a fresher count is known.
    let seed: u64 = env_parsed("CANOPY_QUOTA_SEED", 0);
    if seed > 0 {
        quota.seed(seed);
    }

    let queue = Arc::new(DeliveryQueue::new(
        options,
        quota,
        transport,
        time_provider,
    ));

    // 4. Start worker (delivery loop)
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let worker = Arc::clone(&queue);
    let worker_handle = tokio::spawn(async move {
        worker.run(shutdown_rx).await;
    });

    // 5. Start JSON-RPC server
    let rpc_config = RpcServerConfig {
        port: rpc_port,
        ..Default::default()
    };
    let rpc_handle = RpcServer::new(rpc_config, Arc::clone(&queue))
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(port = rpc_port, "Ready, accepting requests");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, draining");

    // 7. Graceful shutdown
    shutdown_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    let _ = tokio::time::timeout(Duration::from_secs(5), worker_handle).await;

    info!("Shutdown complete");

    Ok(())
}

//! JSON-RPC Server
//!
//! Binds the tool-caller surface to TCP on localhost only; every registered
//! method forwards onto the shared handler.

use std::sync::Arc;

use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use tracing::info;

use canopy_core::application::DeliveryQueue;

use crate::handler::RpcHandler;
use crate::types::{CreateNodesRequest, SeedQuotaRequest, SetNameRequest, StatusRequest};

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9433;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, queue: Arc<DeliveryQueue>) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(queue)),
        }
    }

    fn build_module(handler: Arc<RpcHandler>) -> Result<RpcModule<()>, String> {
        let mut module = RpcModule::new(());

        let h = Arc::clone(&handler);
        module
            .register_async_method("nodes.create.v1", move |params, _, _| {
                let h = Arc::clone(&h);
                async move {
                    let req: CreateNodesRequest = params.parse()?;
                    h.create_nodes(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let h = Arc::clone(&handler);
        module
            .register_async_method("nodes.set_name.v1", move |params, _, _| {
                let h = Arc::clone(&h);
                async move {
                    let req: SetNameRequest = params.parse()?;
                    h.set_name(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let h = Arc::clone(&handler);
        module
            .register_async_method("queue.status.v1", move |params, _, _| {
                let h = Arc::clone(&h);
                async move {
                    // Parameterless call; tolerate absent params
                    let req: StatusRequest = params.parse().unwrap_or_default();
                    h.status(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let h = Arc::clone(&handler);
        module
            .register_async_method("quota.seed.v1", move |params, _, _| {
                let h = Arc::clone(&h);
                async move {
                    let req: SeedQuotaRequest = params.parse()?;
                    h.seed_quota(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        Ok(module)
    }

    /// Bind and serve
    ///
    /// Security: only ever listens on 127.0.0.1; the daemon is not meant to
    /// be reachable from outside the host.
    pub async fn start(self) -> Result<ServerHandle, String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!(addr = %addr, "Starting JSON-RPC server");

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("failed to bind {}: {}", addr, e))?;

        let module = Self::build_module(self.handler)?;
        let handle = server.start(module);
        info!("JSON-RPC server listening");
        Ok(handle)
    }
}

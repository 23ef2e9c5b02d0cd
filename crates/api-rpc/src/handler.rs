//! RPC Method Handlers
//!
//! Bridges JSON-RPC parameters onto the delivery queue and awaits each
//! ticket so one RPC call maps to one resolved logical request.

use std::sync::Arc;

use jsonrpsee::types::ErrorObjectOwned;
use tracing::debug;

use canopy_core::application::DeliveryQueue;
use canopy_core::domain::{DeliveryResponse, LogicalRequest, NodeSpec};

use crate::error::{code, to_rpc_error};
use crate::types::{
    CreateNodesRequest, CreateNodesResponse, SeedQuotaRequest, SeedQuotaResponse, SetNameRequest,
    SetNameResponse, StatusRequest, StatusResponse,
};

/// RPC Handler with the queue as its single dependency
pub struct RpcHandler {
    queue: Arc<DeliveryQueue>,
}

impl RpcHandler {
    pub fn new(queue: Arc<DeliveryQueue>) -> Self {
        Self { queue }
    }

    /// nodes.create.v1
    pub async fn create_nodes(
        &self,
        params: CreateNodesRequest,
    ) -> Result<CreateNodesResponse, ErrorObjectOwned> {
        let request = LogicalRequest::CreateNodes {
            parent: params.parent,
            nodes: params.nodes.into_iter().map(NodeSpec::new).collect(),
        };

        let ticket = self.queue.enqueue(request).map_err(to_rpc_error)?;
        debug!(seq = ticket.seq(), "Create request admitted");

        match ticket.wait().await.map_err(to_rpc_error)? {
            DeliveryResponse::Created { nodes } => Ok(CreateNodesResponse { nodes }),
            DeliveryResponse::Renamed { .. } => Err(ErrorObjectOwned::owned(
                code::INTERNAL_ERROR,
                "unexpected response kind for create",
                None::<()>,
            )),
        }
    }

    /// nodes.set_name.v1
    pub async fn set_name(
        &self,
        params: SetNameRequest,
    ) -> Result<SetNameResponse, ErrorObjectOwned> {
        let request = LogicalRequest::SetName {
            node: params.node,
            name: params.name,
        };

        let ticket = self.queue.enqueue(request).map_err(to_rpc_error)?;
        debug!(seq = ticket.seq(), "Rename request admitted");

        match ticket.wait().await.map_err(to_rpc_error)? {
            DeliveryResponse::Renamed { node, name } => Ok(SetNameResponse {
                node,
                name,
                renamed: true,
            }),
            DeliveryResponse::Created { .. } => Err(ErrorObjectOwned::owned(
                code::INTERNAL_ERROR,
                "unexpected response kind for rename",
                None::<()>,
            )),
        }
    }

    /// queue.status.v1
    pub async fn status(&self, _params: StatusRequest) -> Result<StatusResponse, ErrorObjectOwned> {
        let status = self.queue.status();
        Ok(StatusResponse {
            pending: status.pending,
            dispatching: status.dispatching,
            quota_used: status.quota_used,
            quota_ceiling: self.queue.quota().ceiling(),
            last_dispatch_at: status.last_dispatch_at,
        })
    }

    /// quota.seed.v1
    pub async fn seed_quota(
        &self,
        params: SeedQuotaRequest,
    ) -> Result<SeedQuotaResponse, ErrorObjectOwned> {
        self.queue.quota().seed(params.count);
        Ok(SeedQuotaResponse {
            count: self.queue.quota().current(),
        })
    }
}

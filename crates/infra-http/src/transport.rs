// HTTP Transport - delivers one compliant request to the remote store's
// single endpoint and classifies every failure as retryable or permanent

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use canopy_core::domain::{CreatedNode, LogicalRequest};
use canopy_core::port::transport::{TransportError, TransportExecutor, TransportReply};
use canopy_core::{AppError, Result};

/// Connection settings for the remote endpoint
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub endpoint: String,
    pub api_token: String,
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_token: String::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Production transport executor over reqwest
///
/// The queue hands this adapter only already-compliant requests; splitting
/// and pacing are not its concern. Its one job is the wire call plus a
/// faithful retryable/permanent classification of whatever comes back.
pub struct HttpTransport {
    config: HttpTransportConfig,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("HTTP client build failed: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Remote wire shape: one JSON object per call
    fn build_body(request: &LogicalRequest) -> Value {
        match request {
            LogicalRequest::CreateNodes { parent, nodes } => {
                let specs: Vec<&Value> = nodes.iter().map(|n| n.as_value()).collect();
                match parent {
                    Some(parent) => json!({ "targetNodeId": parent, "nodes": specs }),
                    None => json!({ "nodes": specs }),
                }
            }
            LogicalRequest::SetName { node, name } => {
                json!({ "targetNodeId": node, "setName": name })
            }
        }
    }

    /// Network errors and 408/429/5xx are retryable; any other non-success
    /// status means the remote rejected the payload itself
    fn classify_status(status: u16, body: String) -> TransportError {
        match status {
            408 | 429 | 500..=599 => TransportError::Server {
                status,
                message: body,
            },
            _ => TransportError::Rejected(format!("status {}: {}", status, body)),
        }
    }

    fn classify_send_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.config.request_timeout.as_millis() as u64)
        } else {
            TransportError::Network(err.to_string())
        }
    }

    /// Pull the confirmed node list out of a create response
    ///
    /// The remote reports the nodes it actually created, in request order;
    /// a shorter list than requested is a partial success and the queue
    /// commits quota from this count.
    fn parse_created(body: &Value) -> Vec<CreatedNode> {
        body.get("children")
            .and_then(Value::as_array)
            .map(|children| {
                children
                    .iter()
                    .filter_map(|child| {
                        let node_id = child.get("nodeId")?.as_str()?.to_string();
                        let name = child
                            .get("name")
                            .and_then(Value::as_str)
                            .map(str::to_string);
                        Some(CreatedNode { node_id, name })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl TransportExecutor for HttpTransport {
    async fn execute(&self, request: &LogicalRequest) -> std::result::Result<TransportReply, TransportError> {
        let body = Self::build_body(request);
        debug!(nodes = request.node_count(), "Dispatching request to remote store");

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = Self::classify_status(status.as_u16(), text);
            warn!(status = status.as_u16(), error = %err, "Remote call failed");
            return Err(err);
        }

        match request {
            LogicalRequest::CreateNodes { .. } => {
                let value: Value = response
                    .json()
                    .await
                    .map_err(|e| TransportError::Network(format!("invalid response body: {}", e)))?;
                Ok(TransportReply::Created {
                    nodes: Self::parse_created(&value),
                })
            }
            LogicalRequest::SetName { .. } => Ok(TransportReply::Renamed),
        }
    }
}

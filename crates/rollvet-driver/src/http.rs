//! HTTP implementation of the control plane seam.
//!
//! Speaks a small REST dialect with `{success, data, error}`
//! envelopes:
//!
//! - `POST /api/v1/deployments/{id}/rollout` — trigger an update
//! - `GET  /api/v1/rollouts/{id}` — rollout status
//! - `GET  /api/v1/deployments/{id}` — deployment info (ready replicas)

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use serde::Deserialize;
use tracing::debug;

use rollvet_core::RolloutRequest;

use crate::control_plane::{ControlPlane, ControlPlaneStatus, DriverError};

/// Control plane client over plain HTTP/1.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    /// TCP connect address, `host:port`.
    address: String,
    /// Host header value.
    host: String,
    /// Per-request deadline, so a wedged control plane cannot stall
    /// the driver's poll loop past its own deadline checks.
    request_timeout: Duration,
}

impl HttpControlPlane {
    /// Build a client for a base URL like `http://10.0.0.2:8443`.
    pub fn new(base_url: &str) -> Result<Self, DriverError> {
        let invalid = |reason: &str| DriverError::InvalidUrl {
            url: base_url.to_string(),
            reason: reason.to_string(),
        };

        let uri: http::Uri = base_url
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;

        if let Some(scheme) = uri.scheme_str() {
            if scheme != "http" {
                return Err(invalid("only http:// control planes are supported"));
            }
        }

        let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
        let host = authority.host().to_string();
        let port = authority.port_u16().unwrap_or(80);

        Ok(Self {
            address: format!("{host}:{port}"),
            host,
            request_timeout: Duration::from_secs(5),
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<(u16, Bytes), DriverError> {
        let attempt = async {
            let stream = tokio::net::TcpStream::connect(&self.address)
                .await
                .map_err(|e| DriverError::Request(e.to_string()))?;

            let io = hyper_util::rt::TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| DriverError::Request(e.to_string()))?;

            tokio::spawn(async move {
                let _ = conn.await;
            });

            let mut builder = http::Request::builder()
                .method(method)
                .uri(path)
                .header("host", &self.host)
                .header("user-agent", "rollvet-driver/0.1");
            if body.is_some() {
                builder = builder.header("content-type", "application/json");
            }
            let req = builder
                .body(Full::new(Bytes::from(body.unwrap_or_default())))
                .map_err(|e| DriverError::Request(e.to_string()))?;

            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| DriverError::Request(e.to_string()))?;

            let status = resp.status().as_u16();
            let bytes = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| DriverError::Request(e.to_string()))?
                .to_bytes();

            debug!(method, path, status, "control plane request");
            Ok((status, bytes))
        };

        tokio::time::timeout(self.request_timeout, attempt)
            .await
            .map_err(|_| DriverError::Request("request timed out".to_string()))?
    }

    /// Unwrap an API envelope, mapping `success: false` and non-2xx
    /// statuses to errors.
    fn decode<T: for<'de> Deserialize<'de>>(
        status: u16,
        body: &Bytes,
    ) -> Result<T, DriverError> {
        let envelope: Envelope<T> = serde_json::from_slice(body)
            .map_err(|e| DriverError::Decode(e.to_string()))?;

        if !(200..300).contains(&status) || !envelope.success {
            return Err(DriverError::Api {
                status,
                message: envelope
                    .error
                    .unwrap_or_else(|| "unspecified error".to_string()),
            });
        }

        envelope
            .data
            .ok_or_else(|| DriverError::Decode("missing data field".to_string()))
    }
}

/// Response envelope used by all control plane endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireRollout {
    state: String,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireDeployment {
    ready_replicas: u32,
}

/// Deployment ids are namespace-scoped ("default/api"); the slash
/// must not split the path segment.
fn encode_id(id: &str) -> String {
    id.replace('%', "%25").replace('/', "%2F")
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn trigger_update(&self, request: &RolloutRequest) -> Result<(), DriverError> {
        let path = format!(
            "/api/v1/deployments/{}/rollout",
            encode_id(&request.deployment_id)
        );
        let body = serde_json::to_vec(&serde_json::json!({
            "target_revision": request.target_revision,
            "max_surge": request.max_surge,
            "max_unavailable": request.max_unavailable,
        }))
        .map_err(|e| DriverError::Decode(e.to_string()))?;

        let (status, bytes) = self.request("POST", &path, Some(body)).await?;
        Self::decode::<serde_json::Value>(status, &bytes)?;
        Ok(())
    }

    async fn rollout_status(
        &self,
        deployment_id: &str,
    ) -> Result<ControlPlaneStatus, DriverError> {
        let path = format!("/api/v1/rollouts/{}", encode_id(deployment_id));
        let (status, bytes) = self.request("GET", &path, None).await?;
        let wire: WireRollout = Self::decode(status, &bytes)?;

        match wire.state.as_str() {
            "in_progress" => Ok(ControlPlaneStatus::InProgress),
            "complete" => Ok(ControlPlaneStatus::Complete),
            "failed" => Ok(ControlPlaneStatus::Failed {
                reason: wire
                    .reason
                    .unwrap_or_else(|| "unspecified failure".to_string()),
            }),
            other => Err(DriverError::Decode(format!(
                "unknown rollout state {other:?}"
            ))),
        }
    }

    async fn ready_replicas(&self, deployment_id: &str) -> Result<u32, DriverError> {
        let path = format!("/api/v1/deployments/{}", encode_id(deployment_id));
        let (status, bytes) = self.request("GET", &path, None).await?;
        let wire: WireDeployment = Self::decode(status, &bytes)?;
        Ok(wire.ready_replicas)
    }
}

//! Sampler — background probe loop.
//!
//! Probes the service endpoint at a fixed interval, classifies each
//! response, and records exactly one sample per tick into the shared
//! accumulator. Shutdown is cooperative: the stop signal is observed
//! only between ticks, so an in-flight probe always finishes
//! recording before `stop` returns.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http_body_util::BodyExt;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use rollvet_core::{Sample, VersionRule};

use crate::accumulator::Accumulator;
use crate::classifier::{classify, ProbeOutcome};

/// Errors raised when starting a sampler.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("invalid endpoint URL {url:?}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

/// Configuration for one sampling loop.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Full probe URL, e.g. `http://10.0.0.5:8080/health`.
    pub endpoint: String,
    /// Tick interval; independent of probe duration.
    pub interval: Duration,
    /// Per-probe deadline.
    pub timeout: Duration,
    pub version_rule: VersionRule,
}

/// Handle to a running sampler.
pub struct SamplerHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SamplerHandle {
    /// Request graceful termination and wait for it.
    ///
    /// Returns once any in-flight probe has been recorded; no sample
    /// is appended to the accumulator after this returns. The wait is
    /// bounded by the probe timeout, never indefinite.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

/// The sampling loop.
pub struct Sampler;

impl Sampler {
    /// Spawn the probe loop as a background task.
    ///
    /// Fails only on an unusable endpoint URL; probe failures at run
    /// time become Failure samples, never errors.
    pub fn start(
        config: SamplerConfig,
        accumulator: Arc<Accumulator>,
    ) -> Result<SamplerHandle, SamplerError> {
        let target = ProbeTarget::parse(&config.endpoint)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            run_sample_loop(config, target, accumulator, shutdown_rx).await;
        });

        Ok(SamplerHandle {
            shutdown_tx,
            handle,
        })
    }
}

/// Pre-parsed probe destination.
#[derive(Debug, Clone)]
struct ProbeTarget {
    /// TCP connect address, `host:port`.
    address: String,
    /// Host header value.
    host: String,
    /// Request path including query.
    path: String,
}

impl ProbeTarget {
    fn parse(endpoint: &str) -> Result<Self, SamplerError> {
        let invalid = |reason: &str| SamplerError::InvalidEndpoint {
            url: endpoint.to_string(),
            reason: reason.to_string(),
        };

        let uri: http::Uri = endpoint
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;

        if let Some(scheme) = uri.scheme_str() {
            if scheme != "http" {
                return Err(invalid("only http:// endpoints are supported"));
            }
        }

        let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
        let host = authority.host().to_string();
        let port = authority.port_u16().unwrap_or(80);

        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        Ok(Self {
            address: format!("{host}:{port}"),
            host,
            path,
        })
    }
}

async fn run_sample_loop(
    config: SamplerConfig,
    target: ProbeTarget,
    accumulator: Arc<Accumulator>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        endpoint = %config.endpoint,
        interval_ms = config.interval.as_millis() as u64,
        "sampler started"
    );

    let mut ticker = tokio::time::interval(config.interval);
    // A slow probe pushes the schedule back by at most one interval
    // instead of firing a burst of catch-up ticks.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // The probe and record complete inside this arm, so a
                // concurrent stop request cannot drop an in-flight
                // sample.
                let issued_at = epoch_millis();
                let started = Instant::now();
                let probe = probe_once(&target, config.timeout).await;
                let latency_ms = started.elapsed().as_millis() as u64;

                let classified = classify(&probe, &config.version_rule);
                debug!(
                    outcome = ?classified.outcome,
                    version = classified.version.as_deref().unwrap_or("-"),
                    latency_ms,
                    "probe recorded"
                );

                accumulator.record(Sample {
                    at_ms: issued_at,
                    outcome: classified.outcome,
                    version: classified.version,
                    latency_ms,
                });
            }
            _ = shutdown.changed() => {
                info!("sampler shutting down");
                break;
            }
        }
    }
}

/// Issue one HTTP GET against the target with a bounded deadline.
///
/// Any failure to produce a response (connect, handshake, request,
/// body read, deadline) collapses into `TransportError`.
async fn probe_once(target: &ProbeTarget, deadline: Duration) -> ProbeOutcome {
    let result = tokio::time::timeout(deadline, async {
        let stream = match tokio::net::TcpStream::connect(&target.address).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, address = %target.address, "probe connection failed");
                return ProbeOutcome::TransportError;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, address = %target.address, "probe handshake failed");
                return ProbeOutcome::TransportError;
            }
        };

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = match http::Request::builder()
            .method("GET")
            .uri(&target.path)
            .header("host", &target.host)
            .header("user-agent", "rollvet-probe/0.1")
            .body(http_body_util::Empty::<Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "probe request build failed");
                return ProbeOutcome::TransportError;
            }
        };

        let resp = match sender.send_request(req).await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(error = %e, address = %target.address, "probe request failed");
                return ProbeOutcome::TransportError;
            }
        };

        let status = resp.status().as_u16();
        match resp.into_body().collect().await {
            Ok(collected) => ProbeOutcome::Response {
                status,
                body: collected.to_bytes(),
            },
            Err(e) => {
                debug!(error = %e, "probe body read failed");
                ProbeOutcome::TransportError
            }
        }
    })
    .await;

    match result {
        Ok(outcome) => outcome,
        Err(_) => {
            debug!(address = %target.address, "probe timed out");
            ProbeOutcome::TransportError
        }
    }
}

/// Issue a single probe outside the sampling loop.
///
/// Used for pre-flight checks; the error covers only an unusable
/// endpoint URL, probe trouble classifies as a Failure.
pub async fn probe_endpoint(
    endpoint: &str,
    timeout: Duration,
    rule: &VersionRule,
) -> Result<crate::classifier::Classified, SamplerError> {
    let target = ProbeTarget::parse(endpoint)?;
    let outcome = probe_once(&target, timeout).await;
    Ok(classify(&outcome, rule))
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_target_with_port_and_path() {
        let target = ProbeTarget::parse("http://10.0.0.5:8080/health").unwrap();
        assert_eq!(target.address, "10.0.0.5:8080");
        assert_eq!(target.host, "10.0.0.5");
        assert_eq!(target.path, "/health");
    }

    #[test]
    fn parse_target_defaults() {
        let target = ProbeTarget::parse("http://svc.internal").unwrap();
        assert_eq!(target.address, "svc.internal:80");
        assert_eq!(target.path, "/");
    }

    #[test]
    fn parse_target_keeps_query() {
        let target = ProbeTarget::parse("http://svc:8080/health?deep=1").unwrap();
        assert_eq!(target.path, "/health?deep=1");
    }

    #[test]
    fn parse_rejects_https() {
        let err = ProbeTarget::parse("https://svc:8443/health").unwrap_err();
        assert!(matches!(err, SamplerError::InvalidEndpoint { .. }));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(ProbeTarget::parse("not a url").is_err());
    }

    #[tokio::test]
    async fn probe_to_closed_port_is_transport_error() {
        let target = ProbeTarget::parse("http://127.0.0.1:1/health").unwrap();
        let outcome = probe_once(&target, Duration::from_millis(200)).await;
        assert_eq!(outcome, ProbeOutcome::TransportError);
    }
}

//! HTTP control plane client tests against a stub REST API.
//!
//! Stands up an axum server speaking the `{success, data, error}`
//! envelope dialect and drives a rollout end to end through
//! `HttpControlPlane` + `RolloutDriver`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use rollvet_core::{RolloutOutcome, RolloutRequest};
use rollvet_driver::{ControlPlane, ControlPlaneStatus, DriverError, HttpControlPlane, RolloutDriver};

/// Scripted control plane behavior.
struct StubControlPlane {
    triggered: AtomicBool,
    status_polls: AtomicU64,
    /// Report `complete` after this many status polls.
    complete_after: u64,
    /// Report `failed` with this reason instead of completing.
    fail_reason: Option<String>,
    /// Reject the trigger with 404.
    reject_trigger: bool,
}

impl StubControlPlane {
    fn completing(after: u64) -> Arc<Self> {
        Arc::new(Self {
            triggered: AtomicBool::new(false),
            status_polls: AtomicU64::new(0),
            complete_after: after,
            fail_reason: None,
            reject_trigger: false,
        })
    }
}

type Stub = Arc<StubControlPlane>;

async fn trigger_rollout(
    State(stub): State<Stub>,
    Path(id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    if stub.reject_trigger {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "success": false,
                "error": format!("deployment {id} not found"),
            })),
        );
    }
    stub.triggered.store(true, Ordering::SeqCst);
    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "data": { "deployment_id": id },
        })),
    )
}

async fn rollout_status(State(stub): State<Stub>) -> Json<serde_json::Value> {
    if let Some(reason) = &stub.fail_reason {
        return Json(serde_json::json!({
            "success": true,
            "data": { "state": "failed", "reason": reason },
        }));
    }

    let polls = stub.status_polls.fetch_add(1, Ordering::SeqCst) + 1;
    let state = if stub.triggered.load(Ordering::SeqCst) && polls >= stub.complete_after {
        "complete"
    } else {
        "in_progress"
    };
    Json(serde_json::json!({
        "success": true,
        "data": { "state": state },
    }))
}

async fn get_deployment() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "data": { "ready_replicas": 3 },
    }))
}

async fn serve(stub: Stub) -> SocketAddr {
    let router = Router::new()
        .route("/api/v1/deployments/{id}/rollout", post(trigger_rollout))
        .route("/api/v1/rollouts/{id}", get(rollout_status))
        .route("/api/v1/deployments/{id}", get(get_deployment))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn request() -> RolloutRequest {
    RolloutRequest {
        deployment_id: "default/api".to_string(),
        target_revision: "2.0".to_string(),
        max_surge: 1,
        max_unavailable: 0,
    }
}

#[tokio::test]
async fn trigger_marks_control_plane() {
    let stub = StubControlPlane::completing(1);
    let addr = serve(Arc::clone(&stub)).await;
    let cp = HttpControlPlane::new(&format!("http://{addr}")).unwrap();

    cp.trigger_update(&request()).await.unwrap();
    assert!(stub.triggered.load(Ordering::SeqCst));
}

#[tokio::test]
async fn trigger_rejection_decodes_api_error() {
    let stub = Arc::new(StubControlPlane {
        triggered: AtomicBool::new(false),
        status_polls: AtomicU64::new(0),
        complete_after: 1,
        fail_reason: None,
        reject_trigger: true,
    });
    let addr = serve(stub).await;
    let cp = HttpControlPlane::new(&format!("http://{addr}")).unwrap();

    let err = cp.trigger_update(&request()).await.unwrap_err();
    match err {
        DriverError::Api { status, message } => {
            assert_eq!(status, 404);
            assert!(message.contains("default/api"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn status_decodes_states() {
    let stub = StubControlPlane::completing(2);
    let addr = serve(Arc::clone(&stub)).await;
    let cp = HttpControlPlane::new(&format!("http://{addr}")).unwrap();

    cp.trigger_update(&request()).await.unwrap();
    assert_eq!(
        cp.rollout_status("default/api").await.unwrap(),
        ControlPlaneStatus::InProgress
    );
    assert_eq!(
        cp.rollout_status("default/api").await.unwrap(),
        ControlPlaneStatus::Complete
    );
}

#[tokio::test]
async fn failed_status_carries_reason() {
    let stub = Arc::new(StubControlPlane {
        triggered: AtomicBool::new(false),
        status_polls: AtomicU64::new(0),
        complete_after: 1,
        fail_reason: Some("new instances crash-looping".to_string()),
        reject_trigger: false,
    });
    let addr = serve(stub).await;
    let cp = HttpControlPlane::new(&format!("http://{addr}")).unwrap();

    let status = cp.rollout_status("default/api").await.unwrap();
    assert_eq!(
        status,
        ControlPlaneStatus::Failed {
            reason: "new instances crash-looping".to_string()
        }
    );
}

#[tokio::test]
async fn ready_replicas_read() {
    let stub = StubControlPlane::completing(1);
    let addr = serve(stub).await;
    let cp = HttpControlPlane::new(&format!("http://{addr}")).unwrap();

    assert_eq!(cp.ready_replicas("default/api").await.unwrap(), 3);
}

#[tokio::test]
async fn driver_completes_against_http_stub() {
    let stub = StubControlPlane::completing(3);
    let addr = serve(Arc::clone(&stub)).await;
    let cp = HttpControlPlane::new(&format!("http://{addr}")).unwrap();

    let driver = RolloutDriver::new(Duration::from_secs(5), Duration::from_millis(10));
    let result = driver.run(&cp, &request()).await;

    assert_eq!(result.outcome, RolloutOutcome::Succeeded);
    assert!(stub.triggered.load(Ordering::SeqCst));
    assert!(stub.status_polls.load(Ordering::SeqCst) >= 3);
}

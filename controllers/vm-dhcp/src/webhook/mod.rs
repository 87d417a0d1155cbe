//! Admission webhook server
//!
//! Serves the VirtualMachineNetworkConfig validator over HTTP:
//! - `POST /v1/webhook/validation` - AdmissionReview in, AdmissionReview out
//! - `GET /healthz` - liveness probe
//!
//! TLS is terminated in front of this server.

pub mod vmnetcfg;

use crate::error::ControllerError;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use crds::VirtualMachineNetworkConfig;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use vmnetcfg::Validator;

/// Shared state of the webhook handlers
#[derive(Debug, Clone)]
pub struct WebhookState {
    pub validator: Validator,
}

/// Builds the webhook router
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/v1/webhook/validation", post(validate_handler))
        .route("/healthz", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Serves the webhook router on `addr` until the listener fails.
pub async fn serve(addr: SocketAddr, state: WebhookState) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::Webhook(format!("failed to bind {addr}: {e}")))?;
    info!("Admission webhook listening on {}", addr);

    let resource = Validator::resource();
    info!(
        "Validating {:?} of {} ({}, {} scope) in {}/{}",
        resource.operations,
        resource.object_kind,
        resource.names.join(","),
        resource.scope,
        resource.api_group,
        resource.api_version
    );

    axum::serve(listener, router(state))
        .await
        .map_err(|e| ControllerError::Webhook(e.to_string()))
}

async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<VirtualMachineNetworkConfig>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<VirtualMachineNetworkConfig> = match review.try_into() {
        Ok(request) => request,
        Err(e) => {
            error!("Failed to parse admission request: {}", e);
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    Json(state.validator.admit(&request).into_review())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use ipam::mock::{MockNetworkCache, test_network_attachment};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let cache = MockNetworkCache::new();
        cache.add_network_attachment(test_network_attachment("default", "bare", None));
        router(WebhookState {
            validator: Validator::new(Arc::new(cache)),
        })
    }

    #[tokio::test]
    async fn test_healthz() {
        let response = test_router()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_validation_endpoint_denies_unlabelled_network() {
        let review = json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "e911857d-c318-11e8-bbad-025000000001",
                "kind": { "group": "network.vmdhcp.io", "version": "v1alpha1", "kind": "VirtualMachineNetworkConfig" },
                "resource": { "group": "network.vmdhcp.io", "version": "v1alpha1", "resource": "virtualmachinenetworkconfigs" },
                "name": "vm-1",
                "namespace": "default",
                "operation": "CREATE",
                "userInfo": { "username": "admin" },
                "object": {
                    "apiVersion": "network.vmdhcp.io/v1alpha1",
                    "kind": "VirtualMachineNetworkConfig",
                    "metadata": { "name": "vm-1" },
                    "spec": {
                        "vmName": "vm-1",
                        "networkConfigs": [{ "networkName": "bare", "macAddress": "52:54:00:00:00:01" }]
                    }
                },
                "dryRun": false
            }
        });

        let response = test_router()
            .oneshot(
                Request::post("/v1/webhook/validation")
                    .header("content-type", "application/json")
                    .body(Body::from(review.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let review: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(review["response"]["uid"], "e911857d-c318-11e8-bbad-025000000001");
        assert_eq!(review["response"]["allowed"], false);
        assert!(
            review["response"]["status"]["message"]
                .as_str()
                .unwrap()
                .contains("default/bare")
        );
    }
}

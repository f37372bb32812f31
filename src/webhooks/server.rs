//! Admission webhook HTTP handler.
//!
//! Serves `POST /validate`. Each exchange runs:
//! content-type check → decode → policy engine → build response → encode.
//! The first failure ends the exchange with 400 (caller's fault) or 500
//! (ours or the engine's). Denials are HTTP 200 with `allowed: false`.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use tracing::{error, info, warn};

use crate::error::AdmissionError;
use crate::health::{self, HealthState};
use crate::webhooks::policy_client::{JSON_CONTENT_TYPE, PolicyClient};
use crate::webhooks::response::admit;
use crate::webhooks::review::AdmissionReview;

/// Route the API server calls
pub const VALIDATE_PATH: &str = "/validate";

/// Shared state for webhook handlers
pub struct WebhookState {
    pub policy_client: PolicyClient,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(policy_client: PolicyClient, health: Arc<HealthState>) -> Self {
        Self {
            policy_client,
            health,
        }
    }
}

/// Create the router served on every listener: `/validate` plus the probes
///
/// Review bodies are not size-capped; an UPDATE carries both `object` and
/// `oldObject`, each up to the etcd object limit.
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    let probes = health::create_router(state.health.clone());
    Router::new()
        .route(VALIDATE_PATH, post(validate))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
        .merge(probes)
}

async fn validate(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let metrics = &state.health.metrics;
    match review(&state.policy_client, metrics, &headers, &body).await {
        Ok((allowed, encoded)) => {
            metrics.record_review(if allowed { "allowed" } else { "denied" });
            (StatusCode::OK, [(CONTENT_TYPE, JSON_CONTENT_TYPE)], encoded).into_response()
        }
        Err(e) => {
            metrics.record_review(e.outcome());
            if e.is_client_error() {
                warn!(error = %e, "Rejected admission review");
            } else {
                error!(error = %e, "Failed to process admission review");
            }
            e.into_response()
        }
    }
}

/// Run one review through the pipeline, returning the verdict and the
/// encoded reply body.
async fn review(
    policy_client: &PolicyClient,
    metrics: &health::Metrics,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(bool, Vec<u8>), AdmissionError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default();
    if content_type != JSON_CONTENT_TYPE {
        return Err(AdmissionError::UnsupportedContentType(content_type));
    }

    info!(body = %String::from_utf8_lossy(body), "Review request");

    let review: AdmissionReview =
        serde_json::from_slice(body).map_err(AdmissionError::MalformedReview)?;

    let policy = policy_client
        .evaluate_timed(&review, metrics)
        .await
        .inspect_err(|_| {
            error!(uid = %review.uid(), url = %policy_client.url(), "Is the policy engine running?");
        })?;

    let review = admit(review, &policy);
    let encoded = serde_json::to_vec(&review).map_err(AdmissionError::Encode)?;

    info!(
        uid = %review.uid(),
        allowed = policy.allow,
        body = %String::from_utf8_lossy(&encoded),
        "Review response"
    );
    Ok((policy.allow, encoded))
}

//! Client for the external policy decision point.
//!
//! The review is posted as `{"input": <AdmissionReview>}` and the engine
//! answers `{"result": <AdmissionPolicy>}`. The reply is judged by its body,
//! not its status line, and a reply without a `result` is a denial. Every
//! failure to get a decodable reply is reported as
//! [`AdmissionError::PolicyUnavailable`].

use std::time::{Duration, Instant};

use axum::http::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, warn};

use crate::error::{AdmissionError, ServerError};
use crate::health::Metrics;
use crate::webhooks::review::{AdmissionPolicy, AdmissionReview, PolicyQuery, PolicyVerdict};

/// Media type for both directions of the policy exchange
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Queries the policy engine for admission verdicts.
///
/// Holds a pooled HTTP client; clones share the pool.
#[derive(Clone, Debug)]
pub struct PolicyClient {
    http: reqwest::Client,
    url: String,
}

impl PolicyClient {
    /// Create a client for the engine at `url`.
    ///
    /// With `timeout` unset, a call waits for as long as the engine takes.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ServerError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ServerError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }

    /// Engine endpoint every query is posted to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Ask the engine for a verdict on `review`. No retries.
    pub async fn evaluate(&self, review: &AdmissionReview) -> Result<AdmissionPolicy, AdmissionError> {
        let body = serde_json::to_vec(&PolicyQuery { review })
            .map_err(|e| unavailable("failed to serialize policy query", e))?;

        let response = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| unavailable("policy engine request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(uid = %review.uid(), status = %status, "Policy engine replied with error status");
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| unavailable("failed to read policy engine response", e))?;

        let verdict: PolicyVerdict = serde_json::from_slice(&bytes).map_err(|e| {
            unavailable(
                &format!("failed to decode policy engine response (status {})", status),
                e,
            )
        })?;

        debug!(
            uid = %review.uid(),
            allow = verdict.policy.allow,
            "Policy engine verdict received"
        );
        Ok(verdict.policy)
    }

    /// [`evaluate`](Self::evaluate), recording the call latency in `metrics`
    pub async fn evaluate_timed(
        &self,
        review: &AdmissionReview,
        metrics: &Metrics,
    ) -> Result<AdmissionPolicy, AdmissionError> {
        let started = Instant::now();
        let result = self.evaluate(review).await;
        metrics.record_policy_request(started.elapsed().as_secs_f64());
        result
    }
}

fn unavailable(context: &str, error: impl std::fmt::Display) -> AdmissionError {
    AdmissionError::PolicyUnavailable(format!("{}: {}", context, error))
}

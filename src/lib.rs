//! opa-admission-controller library crate
//!
//! A Kubernetes validating admission webhook that asks an Open Policy Agent
//! style engine for each verdict. This module exports the wire types, the
//! `/validate` handler, the listener manager and configuration.

pub mod config;
pub mod error;
pub mod health;
pub mod listeners;
pub mod webhooks;

pub use config::Config;
pub use error::{AdmissionError, ServerError};
pub use health::HealthState;
pub use listeners::{ServerHandle, start};

use std::sync::Arc;

use axum::Router;
use tracing::{info, warn};

use webhooks::{PolicyClient, WebhookState, create_webhook_router};

/// Build the router served by every listener.
///
/// `health` is shared with the caller so readiness can be flipped around
/// start-up and shutdown.
pub fn build_app(config: &Config, health: Arc<HealthState>) -> Result<Router, ServerError> {
    let timeout = config.policy_timeout();
    match timeout {
        Some(timeout) => info!(
            url = %config.policy_url,
            timeout_secs = timeout.as_secs(),
            "Using policy engine"
        ),
        None => warn!(
            url = %config.policy_url,
            "Using policy engine without a request timeout"
        ),
    }

    let policy_client = PolicyClient::new(config.policy_url.clone(), timeout)?;
    let state = Arc::new(WebhookState::new(policy_client, health));
    Ok(create_webhook_router(state))
}

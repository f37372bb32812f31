//! Error types for the admission webhook.
//!
//! Errors are split by blast radius:
//! - [`AdmissionError`] is local to one HTTP exchange and maps to a status code
//! - [`ServerError`] is fatal to the process (listener bind/serve, TLS material)

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure while handling a single admission review exchange
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// Content-Type header was missing or not `application/json`
    #[error("Unexpected content type \"{0}\"")]
    UnsupportedContentType(String),

    /// Request body could not be decoded as an AdmissionReview
    #[error("Error deserializing request: {0}")]
    MalformedReview(#[source] serde_json::Error),

    /// Policy engine could not produce a verdict (unreachable, timed out, or
    /// replied with a body that is not a verdict envelope)
    #[error("Policy evaluation unavailable: {0}")]
    PolicyUnavailable(String),

    /// The populated review could not be serialized
    #[error("Error serializing response: {0}")]
    Encode(#[source] serde_json::Error),
}

impl AdmissionError {
    /// HTTP status code reported to the API server for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdmissionError::UnsupportedContentType(_) | AdmissionError::MalformedReview(_) => {
                StatusCode::BAD_REQUEST
            }
            AdmissionError::PolicyUnavailable(_) | AdmissionError::Encode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Check if the caller sent something we could not accept
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Metrics label for this failure
    pub fn outcome(&self) -> &'static str {
        if self.is_client_error() {
            "bad_request"
        } else {
            "internal_error"
        }
    }
}

impl IntoResponse for AdmissionError {
    /// Only the canonical reason phrase is sent back; details stay in the log.
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = status.canonical_reason().unwrap_or("Error");
        (status, body).into_response()
    }
}

/// Errors that stop the webhook server
#[derive(Error, Debug)]
pub enum ServerError {
    /// TLS certificate or key could not be loaded
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// A listener could not bind its port
    #[error("{listener} listener failed to bind: {source}")]
    Bind {
        listener: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A listener stopped serving with an error
    #[error("{listener} listener failed: {source}")]
    Serve {
        listener: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A listener task panicked or was cancelled
    #[error("{listener} listener task aborted: {message}")]
    Aborted {
        listener: &'static str,
        message: String,
    },

    /// The policy engine HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

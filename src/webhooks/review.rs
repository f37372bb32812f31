//! Wire types for the admission API and the policy engine.
//!
//! These are the JSON contracts on both sides of the webhook:
//! - [`AdmissionReview`] is exchanged with the Kubernetes API server
//! - [`PolicyQuery`] / [`PolicyVerdict`] are exchanged with the policy engine
//!
//! The request body of a review is kept opaque apart from its UID, so the
//! policy engine sees everything the API server sent and the outbound review
//! echoes the request unchanged.

use kube::core::response::{Status, StatusSummary};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Machine-readable reason attached to denied reviews
pub const REASON_FORBIDDEN: &str = "Forbidden";

/// HTTP-equivalent code attached to denied reviews
pub const CODE_FORBIDDEN: u16 = 403;

/// Admission review envelope as sent and expected by the API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// The object admission being asked about
    pub request: AdmissionRequest,
    /// The verdict, populated before the review is sent back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

impl AdmissionReview {
    /// UID of the request, the sole link between query and reply
    pub fn uid(&self) -> &str {
        &self.request.uid
    }
}

/// The request half of a review.
///
/// Only `uid` is interpreted here; everything else (`kind`, `operation`,
/// `object`, `userInfo`, ...) is carried through as-is. A missing `uid` reads
/// as empty and is still copied into the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionRequest {
    #[serde(default)]
    pub uid: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl AdmissionRequest {
    /// Create a request carrying nothing but a UID
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            fields: Map::new(),
        }
    }
}

/// The response half of a review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionResponse {
    /// Copied from the request
    pub uid: String,
    pub allowed: bool,
    /// Result status; on denial carries message, `Forbidden` reason and 403
    #[serde(rename = "status", default)]
    pub result: Status,
}

impl AdmissionResponse {
    /// Successful verdict for `uid`
    pub fn allow(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: true,
            result: Status {
                status: Some(StatusSummary::Success),
                ..Default::default()
            },
        }
    }

    /// Forbidden verdict for `uid` with a human-readable message
    pub fn forbid(uid: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: false,
            result: Status {
                status: Some(StatusSummary::Failure),
                message: message.into(),
                reason: REASON_FORBIDDEN.to_string(),
                code: CODE_FORBIDDEN,
                ..Default::default()
            },
        }
    }
}

/// Verdict returned by the policy engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionPolicy {
    /// Whether the admission request should be permitted
    #[serde(default)]
    pub allow: bool,

    /// Why admission was denied; ignored when `allow` is true
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    /// Callback URLs for post-admission processors; ignored when `allow` is
    /// false. Modelled for wire compatibility, never called by this service.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processors: Vec<String>,
}

impl AdmissionPolicy {
    pub fn allowed() -> Self {
        Self {
            allow: true,
            ..Default::default()
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
            processors: Vec::new(),
        }
    }
}

/// Query envelope posted to the policy engine: `{"input": <review>}`
#[derive(Debug, Serialize)]
pub struct PolicyQuery<'a> {
    #[serde(rename = "input")]
    pub review: &'a AdmissionReview,
}

/// Reply envelope from the policy engine: `{"result": <policy>}`
///
/// OPA answers `{}` for an undefined document. A missing or `null` result is
/// the default policy, i.e. a denial with no reason.
#[derive(Debug, Deserialize)]
pub struct PolicyVerdict {
    #[serde(rename = "result", default, deserialize_with = "null_as_default")]
    pub policy: AdmissionPolicy,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

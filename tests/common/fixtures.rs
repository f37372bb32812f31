//! Test fixtures and builder patterns for AdmissionReview.

use opa_admission_controller::webhooks::{AdmissionRequest, AdmissionReview};
use serde_json::{Map, Value, json};

/// Builder for creating AdmissionReview test fixtures.
///
/// # Example
/// ```
/// let review = AdmissionReviewBuilder::new("abc-123")
///     .operation("CREATE")
///     .deployment("web", "default")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct AdmissionReviewBuilder {
    uid: String,
    api_version: Option<String>,
    fields: Map<String, Value>,
}

impl AdmissionReviewBuilder {
    /// Create a new builder for a request with the given UID.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            api_version: Some("admission.k8s.io/v1".to_string()),
            fields: Map::new(),
        }
    }

    /// Set the admission API version (`None` omits `apiVersion` and `kind`).
    pub fn api_version(mut self, api_version: Option<&str>) -> Self {
        self.api_version = api_version.map(str::to_string);
        self
    }

    /// Set the request operation (CREATE, UPDATE, DELETE, CONNECT).
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.fields
            .insert("operation".to_string(), Value::String(operation.into()));
        self
    }

    /// Make the request about a Deployment.
    pub fn deployment(mut self, name: &str, namespace: &str) -> Self {
        self.fields.insert(
            "kind".to_string(),
            json!({"group": "apps", "version": "v1", "kind": "Deployment"}),
        );
        self.fields
            .insert("namespace".to_string(), Value::String(namespace.to_string()));
        self.fields.insert(
            "object".to_string(),
            json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {"name": name, "namespace": namespace},
                "spec": {"replicas": 1}
            }),
        );
        self
    }

    /// Set an arbitrary request field.
    pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Build the AdmissionReview.
    pub fn build(self) -> AdmissionReview {
        let kind = self.api_version.as_ref().map(|_| "AdmissionReview".to_string());
        AdmissionReview {
            api_version: self.api_version,
            kind,
            request: AdmissionRequest {
                uid: self.uid,
                fields: self.fields,
            },
            response: None,
        }
    }

    /// Build the review as raw JSON bytes.
    pub fn to_json(self) -> Vec<u8> {
        serde_json::to_vec(&self.build()).unwrap_or_default()
    }
}

impl Default for AdmissionReviewBuilder {
    fn default() -> Self {
        Self::new("705ab4f5-6393-11e8-b7cc-42010a800002")
    }
}

/// A Deployment creation review, as the API server would send it.
pub fn deployment_review(uid: &str) -> AdmissionReview {
    AdmissionReviewBuilder::new(uid)
        .operation("CREATE")
        .deployment("web", "default")
        .field(
            "userInfo",
            json!({"username": "kubernetes-admin", "groups": ["system:masters"]}),
        )
        .build()
}

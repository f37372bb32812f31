//! Admission webhook: wire types, policy engine client, response mapping and
//! the `/validate` handler.

pub mod policy_client;
pub mod response;
pub mod review;
mod server;

pub use policy_client::{JSON_CONTENT_TYPE, PolicyClient};
pub use response::{admit, build_response};
pub use review::{
    AdmissionPolicy, AdmissionRequest, AdmissionResponse, AdmissionReview, CODE_FORBIDDEN,
    PolicyQuery, PolicyVerdict, REASON_FORBIDDEN,
};
pub use server::{VALIDATE_PATH, WebhookState, create_webhook_router};

//! Maps a policy verdict onto the admission response sent back to the API server.

use crate::webhooks::review::{AdmissionPolicy, AdmissionResponse, AdmissionReview};

/// Build the admission response for `review` from the engine's verdict.
///
/// The response UID is always the request UID. Processors are not consulted.
pub fn build_response(review: &AdmissionReview, policy: &AdmissionPolicy) -> AdmissionResponse {
    let uid = review.uid();
    if policy.allow {
        AdmissionResponse::allow(uid)
    } else {
        AdmissionResponse::forbid(uid, policy.reason.as_str())
    }
}

/// Attach the verdict to the review, leaving the request untouched.
pub fn admit(mut review: AdmissionReview, policy: &AdmissionPolicy) -> AdmissionReview {
    review.response = Some(build_response(&review, policy));
    review
}

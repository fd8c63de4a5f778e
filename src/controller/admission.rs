//! # Admission
//!
//! Validating admission webhook for GitLabSource, served on `/validate`.
//!
//! Applies the same rules the reconciler re-checks on every pass, so invalid
//! objects are rejected before they are stored.

use crate::crd::{validate, GitLabSource};
use axum::Json;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use tracing::{debug, error, info};

/// Handle a validating admission review
pub async fn validate_handler(
    Json(body): Json<AdmissionReview<GitLabSource>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<GitLabSource> = match body.try_into() {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };
    Json(review(&request).into_review())
}

/// Decide one admission request
#[must_use]
pub fn review(request: &AdmissionRequest<GitLabSource>) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);
    if matches!(request.operation, Operation::Delete | Operation::Connect) {
        return response;
    }
    let Some(source) = &request.object else {
        debug!(uid = %request.uid, "No object in admission request, allowing");
        return response;
    };
    match validate(&source.spec) {
        Ok(()) => response,
        Err(e) => {
            info!(
                uid = %request.uid,
                resource.name = %request.name,
                error = %e,
                "Rejected GitLabSource"
            );
            response.deny(e.to_string())
        }
    }
}

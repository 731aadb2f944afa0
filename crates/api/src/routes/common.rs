use crate::models::ErrorResponse;
use axum::{http::StatusCode, Json};
use services::invitation::InvitationError;
use services::organization::OrganizationError;
use tracing::error;

/// Reject a field value that exceeds its limit
pub fn validate_max_length(field: &str, value: &str, max: usize) -> Result<(), String> {
    if value.len() > max {
        return Err(format!("{} must be at most {} characters", field, max));
    }
    Ok(())
}

/// 400 response with field-level detail for a failed request validation
pub fn validation_error(message: String) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(message, "bad_request".to_string())),
    )
}

/// Map organization service errors to HTTP responses
pub fn org_error_response(error: OrganizationError) -> (StatusCode, Json<ErrorResponse>) {
    match error {
        OrganizationError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "Organization not found".to_string(),
                "not_found".to_string(),
            )),
        ),
        OrganizationError::MemberNotFound => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "Organization member not found".to_string(),
                "not_found".to_string(),
            )),
        ),
        OrganizationError::Forbidden(msg) => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new(msg, "forbidden".to_string())),
        ),
        OrganizationError::Conflict(msg) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(msg, "conflict".to_string())),
        ),
        OrganizationError::InvariantViolation(msg) | OrganizationError::InvalidParams(msg) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(msg, "bad_request".to_string())),
        ),
        OrganizationError::InternalError(msg) => {
            error!("Organization operation failed: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(
                    "Internal server error".to_string(),
                    "internal_server_error".to_string(),
                )),
            )
        }
    }
}

/// Map invitation service errors to HTTP responses
pub fn invitation_error_response(error: InvitationError) -> (StatusCode, Json<ErrorResponse>) {
    match error {
        InvitationError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "Invitation not found".to_string(),
                "not_found".to_string(),
            )),
        ),
        InvitationError::OrganizationNotFound => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "Organization not found".to_string(),
                "not_found".to_string(),
            )),
        ),
        InvitationError::Forbidden(msg) => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new(msg, "forbidden".to_string())),
        ),
        InvitationError::Conflict(msg) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(msg, "conflict".to_string())),
        ),
        InvitationError::Expired => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Invitation has expired".to_string(),
                "expired".to_string(),
            )),
        ),
        InvitationError::InvalidParams(msg) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(msg, "bad_request".to_string())),
        ),
        InvitationError::InternalError(msg) => {
            error!("Invitation operation failed: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(
                    "Internal server error".to_string(),
                    "internal_server_error".to_string(),
                )),
            )
        }
    }
}

use crate::conversions::services_role_to_api_role;
use crate::middleware::AuthenticatedUser;
use crate::models::{CurrentUserResponse, ErrorResponse, UpdateCurrentUserRequest};
use crate::routes::api::AppState;
use crate::routes::common::validation_error;
use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};
use services::organization::AuthContext;
use tracing::{debug, error};

/// Current user
///
/// The authenticated user together with the resolved active-organization
/// context. The dashboard's bootstrap call.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Current user and context", body = CurrentUserResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn current_user(
    Extension(user): Extension<AuthenticatedUser>,
    Extension(ctx): Extension<AuthContext>,
) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse {
        id: user.0.id.0,
        email: user.0.email,
        display_name: user.0.display_name,
        active_organization_id: ctx.org_id.0,
        roles: ctx.roles.into_iter().map(services_role_to_api_role).collect(),
    })
}

/// Update current user
///
/// Updates the caller's display name, the one user field this service owns.
#[utoipa::path(
    patch,
    path = "/v1/users/me",
    tag = "Users",
    request_body = UpdateCurrentUserRequest,
    responses(
        (status = 200, description = "Updated user", body = CurrentUserResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn update_current_user(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<UpdateCurrentUserRequest>,
) -> Result<Json<CurrentUserResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Updating display name for user {}", user.0.id);

    request.validate().map_err(validation_error)?;

    let updated = app_state
        .auth_service
        .update_display_name(user.0.id, request.display_name)
        .await
        .map_err(|e| {
            error!("Failed to update user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(
                    "Failed to update user".to_string(),
                    "internal_server_error".to_string(),
                )),
            )
        })?;

    Ok(Json(CurrentUserResponse {
        id: updated.id.0,
        email: updated.email,
        display_name: updated.display_name,
        active_organization_id: ctx.org_id.0,
        roles: ctx.roles.into_iter().map(services_role_to_api_role).collect(),
    }))
}

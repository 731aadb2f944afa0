use crate::conversions::{
    invitation_to_response, membership_to_response, organization_to_response, preview_to_response,
    user_invitation_to_response,
};
use crate::middleware::AuthenticatedUser;
use crate::models::{
    AcceptInvitationRequest, AcceptInvitationResponse, CancelInvitationParams, ErrorResponse,
    InvitationPreviewResponse, InvitationResponse, ListInvitationsResponse,
    ListUserInvitationsResponse, LookupInvitationParams,
};
use crate::routes::api::AppState;
use crate::routes::common::invitation_error_response;
use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
};
use services::organization::{AuthContext, OrganizationId};
use tracing::debug;
use uuid::Uuid;

/// Look up an invitation by token
///
/// Public: shown to invitees before they authenticate. Returns a preview of
/// the invitation, or a descriptive error when it is no longer pending. The
/// token itself is never echoed back.
#[utoipa::path(
    get,
    path = "/v1/invitations/lookup",
    tag = "Invitations",
    params(("token" = String, Query, description = "Invitation token")),
    responses(
        (status = 200, description = "Invitation preview", body = InvitationPreviewResponse),
        (status = 400, description = "Invitation expired or no longer pending", body = ErrorResponse),
        (status = 404, description = "Unknown token", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    )
)]
pub async fn lookup_invitation(
    State(app_state): State<AppState>,
    Query(params): Query<LookupInvitationParams>,
) -> Result<Json<InvitationPreviewResponse>, (StatusCode, Json<ErrorResponse>)> {
    let preview = app_state
        .invitation_service
        .lookup(&params.token)
        .await
        .map_err(invitation_error_response)?;

    Ok(Json(preview_to_response(preview)))
}

/// Accept an invitation
///
/// The caller's email must exactly match the invitation. Creates the
/// membership and marks the invitation accepted atomically.
#[utoipa::path(
    post,
    path = "/v1/invitations/accept",
    tag = "Invitations",
    request_body = AcceptInvitationRequest,
    responses(
        (status = 200, description = "Invitation accepted", body = AcceptInvitationResponse),
        (status = 400, description = "Invitation expired or no longer pending", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Invitation addressed to a different email", body = ErrorResponse),
        (status = 404, description = "Unknown token", body = ErrorResponse),
        (status = 409, description = "Already a member", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn accept_invitation(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<AcceptInvitationRequest>,
) -> Result<Json<AcceptInvitationResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("User {} accepting an invitation", user.0.id);

    let (membership, organization) = app_state
        .invitation_service
        .accept(&user.0, &request.token)
        .await
        .map_err(invitation_error_response)?;

    let role = membership.role;
    Ok(Json(AcceptInvitationResponse {
        organization: organization_to_response(organization, role),
        membership: membership_to_response(membership),
    }))
}

/// List pending invitations addressed to the caller
///
/// Matched by the caller's email. Carries organization and inviter display
/// names but no tokens.
#[utoipa::path(
    get,
    path = "/v1/invitations/user",
    tag = "Invitations",
    responses(
        (status = 200, description = "Pending invitations for the caller", body = ListUserInvitationsResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn list_user_invitations(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ListUserInvitationsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let invitations = app_state
        .invitation_service
        .list_for_user(&user.0)
        .await
        .map_err(invitation_error_response)?;

    Ok(Json(ListUserInvitationsResponse {
        invitations: invitations
            .into_iter()
            .map(user_invitation_to_response)
            .collect(),
    }))
}

/// List an organization's pending invitations
///
/// Admin-only. Lapsed invitations are flipped to expired before listing.
#[utoipa::path(
    get,
    path = "/v1/organizations/{org_id}/invitations",
    tag = "Invitations",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Pending invitations", body = ListInvitationsResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn list_organization_invitations(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<ListInvitationsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let invitations = app_state
        .invitation_service
        .list_for_organization(&ctx, OrganizationId(org_id))
        .await
        .map_err(invitation_error_response)?;

    Ok(Json(ListInvitationsResponse {
        invitations: invitations
            .into_iter()
            .map(|entry| invitation_to_response(entry.invitation))
            .collect(),
    }))
}

/// Cancel an invitation
///
/// Admin-only. Only pending invitations can be cancelled; the invitation
/// moves to its terminal expired state.
#[utoipa::path(
    delete,
    path = "/v1/organizations/{org_id}/invitations",
    tag = "Invitations",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("invitation_id" = Uuid, Query, description = "Invitation ID to cancel")
    ),
    responses(
        (status = 200, description = "Invitation cancelled", body = InvitationResponse),
        (status = 400, description = "Invitation not pending", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Invitation not found", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn cancel_invitation(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(org_id): Path<Uuid>,
    Query(params): Query<CancelInvitationParams>,
) -> Result<Json<InvitationResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!(
        "Cancelling invitation {} in organization {} by user {}",
        params.invitation_id, org_id, ctx.user_id
    );

    match app_state
        .invitation_service
        .cancel(&ctx, OrganizationId(org_id), params.invitation_id)
        .await
    {
        Ok(invitation) => Ok(Json(invitation_to_response(invitation))),
        // Cancelling a non-pending invitation is a state-transition error,
        // not a uniqueness conflict
        Err(services::invitation::InvitationError::Conflict(msg)) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(msg, "bad_request".to_string())),
        )),
        Err(e) => Err(invitation_error_response(e)),
    }
}

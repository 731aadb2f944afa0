use crate::conversions::{
    api_role_to_services_role, invitation_to_response, member_with_user_to_response,
    membership_to_response,
};
use crate::models::{
    ErrorResponse, InviteMemberRequest, InviteMemberResponse, ListMembersResponse,
    MemberResponse, MembershipResponse, RemoveMemberParams, UpdateMemberRoleRequest,
};
use crate::routes::api::AppState;
use crate::routes::common::{invitation_error_response, org_error_response, validation_error};
use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
};
use services::invitation::InviteOutcome;
use services::organization::{AuthContext, MembershipId, OrganizationId};
use tracing::debug;
use uuid::Uuid;

/// List organization members
///
/// Member-only. Returns each membership with the member's public user data.
#[utoipa::path(
    get,
    path = "/v1/organizations/{org_id}/members",
    tag = "Organization Members",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Organization members", body = ListMembersResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn list_members(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<ListMembersResponse>, (StatusCode, Json<ErrorResponse>)> {
    let members = app_state
        .organization_service
        .list_members(&ctx, OrganizationId(org_id))
        .await
        .map_err(org_error_response)?;

    Ok(Json(ListMembersResponse {
        members: members
            .into_iter()
            .map(member_with_user_to_response)
            .collect::<Vec<MemberResponse>>(),
    }))
}

/// Invite or add a member
///
/// Admin-only. An email that belongs to an existing account is added as a
/// member immediately; an unknown email receives a pending invitation and an
/// invitation email.
#[utoipa::path(
    post,
    path = "/v1/organizations/{org_id}/members",
    tag = "Organization Members",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = InviteMemberRequest,
    responses(
        (status = 200, description = "Member added or invitation sent", body = InviteMemberResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 409, description = "Already a member or already invited", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn invite_member(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(org_id): Path<Uuid>,
    Json(request): Json<InviteMemberRequest>,
) -> Result<Json<InviteMemberResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!(
        "Inviting {} to organization {} by user {}",
        request.email, org_id, ctx.user_id
    );

    request.validate().map_err(validation_error)?;

    let outcome = app_state
        .invitation_service
        .invite_member(
            &ctx,
            OrganizationId(org_id),
            request.email,
            api_role_to_services_role(request.role),
        )
        .await
        .map_err(invitation_error_response)?;

    let response = match outcome {
        InviteOutcome::MemberAdded(membership) => InviteMemberResponse {
            outcome: "member_added".to_string(),
            member: Some(membership_to_response(membership)),
            invitation: None,
        },
        InviteOutcome::InvitationSent(invitation) => InviteMemberResponse {
            outcome: "invitation_sent".to_string(),
            member: None,
            invitation: Some(invitation_to_response(invitation)),
        },
    };

    Ok(Json(response))
}

/// Change a member's role
///
/// Admin-only. Targeting yourself is rejected, as is demoting the
/// organization's last admin.
#[utoipa::path(
    patch,
    path = "/v1/organizations/{org_id}/members",
    tag = "Organization Members",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = UpdateMemberRoleRequest,
    responses(
        (status = 200, description = "Member updated", body = MembershipResponse),
        (status = 400, description = "Self-target or last-admin violation", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Member not found", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn update_member_role(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(org_id): Path<Uuid>,
    Json(request): Json<UpdateMemberRoleRequest>,
) -> Result<Json<MembershipResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!(
        "Updating member {} in organization {} to {:?} by user {}",
        request.member_id, org_id, request.role, ctx.user_id
    );

    let membership = app_state
        .organization_service
        .update_member_role(
            &ctx,
            OrganizationId(org_id),
            MembershipId(request.member_id),
            api_role_to_services_role(request.role),
        )
        .await
        .map_err(org_error_response)?;

    Ok(Json(membership_to_response(membership)))
}

/// Remove a member
///
/// Self-removal is always permitted; removing anyone else requires the admin
/// role. The last admin cannot be removed either way.
#[utoipa::path(
    delete,
    path = "/v1/organizations/{org_id}/members",
    tag = "Organization Members",
    params(
        ("org_id" = Uuid, Path, description = "Organization ID"),
        ("member_id" = Uuid, Query, description = "Membership ID to remove")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 400, description = "Last-admin violation", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Member not found", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn remove_member(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(org_id): Path<Uuid>,
    Query(params): Query<RemoveMemberParams>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    debug!(
        "Removing member {} from organization {} by user {}",
        params.member_id, org_id, ctx.user_id
    );

    app_state
        .organization_service
        .remove_member(&ctx, OrganizationId(org_id), MembershipId(params.member_id))
        .await
        .map_err(org_error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

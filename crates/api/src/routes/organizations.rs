use crate::conversions::{org_with_role_to_response, organization_to_response};
use crate::middleware::auth::active_org_cookie;
use crate::models::{
    CreateOrganizationRequest, DeleteOrganizationResponse, ErrorResponse,
    LeaveOrganizationRequest, ListOrganizationsResponse, OrganizationResponse,
    SwitchOrganizationRequest, UpdateOrganizationRequest,
};
use crate::routes::api::AppState;
use crate::routes::common::{org_error_response, validation_error};
use axum::{
    extract::{Extension, Json, Path, State},
    http::{header::SET_COOKIE, StatusCode},
};
use services::organization::{AuthContext, OrganizationId};
use tracing::debug;
use uuid::Uuid;

/// List organizations
///
/// All organizations the caller belongs to, with their role in each.
#[utoipa::path(
    get,
    path = "/v1/organizations",
    tag = "Organizations",
    responses(
        (status = 200, description = "The caller's organizations", body = ListOrganizationsResponse),
        (status = 401, description = "Invalid or missing session token", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn list_organizations(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<ListOrganizationsResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Listing organizations for user: {}", ctx.user_id);

    let organizations = app_state
        .organization_service
        .list_organizations(&ctx)
        .await
        .map_err(org_error_response)?;

    Ok(Json(ListOrganizationsResponse {
        organizations: organizations
            .into_iter()
            .map(org_with_role_to_response)
            .collect(),
    }))
}

/// Create a new organization
///
/// The caller becomes the organization's sole admin. A missing slug is
/// derived from the name.
#[utoipa::path(
    post,
    path = "/v1/organizations",
    tag = "Organizations",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = OrganizationResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 409, description = "Slug already taken", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn create_organization(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<OrganizationResponse>), (StatusCode, Json<ErrorResponse>)> {
    debug!(
        "Creating organization '{}' for user: {}",
        request.name, ctx.user_id
    );

    request.validate().map_err(validation_error)?;

    let (org, membership) = app_state
        .organization_service
        .create_organization(
            &ctx,
            services::organization::CreateOrganizationRequest {
                name: request.name,
                slug: request.slug,
                logo: request.logo,
            },
        )
        .await
        .map_err(org_error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(organization_to_response(org, membership.role)),
    ))
}

/// Get organization by ID
///
/// Returns organization details together with the caller's role. Members only.
#[utoipa::path(
    get,
    path = "/v1/organizations/{org_id}",
    tag = "Organizations",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Organization details", body = OrganizationResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn get_organization(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<OrganizationResponse>, (StatusCode, Json<ErrorResponse>)> {
    let (org, role) = app_state
        .organization_service
        .get_organization(&ctx, OrganizationId(org_id))
        .await
        .map_err(org_error_response)?;

    Ok(Json(organization_to_response(org, role)))
}

/// Update organization
///
/// Admin-only partial update of name, slug and logo. Slug uniqueness is
/// re-checked on change.
#[utoipa::path(
    patch,
    path = "/v1/organizations/{org_id}",
    tag = "Organizations",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    request_body = UpdateOrganizationRequest,
    responses(
        (status = 200, description = "Updated organization", body = OrganizationResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 409, description = "Slug already taken", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn update_organization(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(org_id): Path<Uuid>,
    Json(request): Json<UpdateOrganizationRequest>,
) -> Result<Json<OrganizationResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Updating organization {} by user {}", org_id, ctx.user_id);

    request.validate().map_err(validation_error)?;

    let org = app_state
        .organization_service
        .update_organization(
            &ctx,
            OrganizationId(org_id),
            services::organization::UpdateOrganizationRequest {
                name: request.name,
                slug: request.slug,
                logo: request.logo,
            },
        )
        .await
        .map_err(org_error_response)?;

    // The caller had to be an admin to get here
    Ok(Json(organization_to_response(
        org,
        services::organization::MemberRole::Admin,
    )))
}

/// Delete organization
///
/// Admin-only. Rejected when it is the caller's only organization; all
/// memberships and invitations are deleted with it.
#[utoipa::path(
    delete,
    path = "/v1/organizations/{org_id}",
    tag = "Organizations",
    params(("org_id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Organization deleted", body = DeleteOrganizationResponse),
        (status = 400, description = "Caller's only organization", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn delete_organization(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<DeleteOrganizationResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Deleting organization {} by user {}", org_id, ctx.user_id);

    app_state
        .organization_service
        .delete_organization(&ctx, OrganizationId(org_id))
        .await
        .map_err(org_error_response)?;

    Ok(Json(DeleteOrganizationResponse {
        id: org_id,
        deleted: true,
    }))
}

/// Switch active organization
///
/// The caller must already hold a membership in the target organization.
/// Persists the preference in the active-organization cookie and returns the
/// role for the new context.
#[utoipa::path(
    post,
    path = "/v1/organizations/switch",
    tag = "Organizations",
    request_body = SwitchOrganizationRequest,
    responses(
        (status = 200, description = "Active organization switched", body = OrganizationResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not a member of the target organization", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn switch_organization(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<SwitchOrganizationRequest>,
) -> Result<([(axum::http::HeaderName, String); 1], Json<OrganizationResponse>), (StatusCode, Json<ErrorResponse>)>
{
    debug!(
        "Switching active organization to {} for user {}",
        request.organization_id, ctx.user_id
    );

    let target = OrganizationId(request.organization_id);
    let (org, role) = app_state
        .organization_service
        .switch_organization(&ctx, target)
        .await
        .map_err(org_error_response)?;

    let cookie = active_org_cookie(&app_state.config, target);
    Ok((
        [(SET_COOKIE, cookie)],
        Json(organization_to_response(org, role)),
    ))
}

/// Leave an organization
///
/// Always permitted, except for the organization's last admin.
#[utoipa::path(
    post,
    path = "/v1/organizations/leave",
    tag = "Organizations",
    request_body = LeaveOrganizationRequest,
    responses(
        (status = 204, description = "Left the organization"),
        (status = 400, description = "Caller is the last admin", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    security(("session_token" = []))
)]
pub async fn leave_organization(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(request): Json<LeaveOrganizationRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    debug!(
        "User {} leaving organization {}",
        ctx.user_id, request.organization_id
    );

    app_state
        .organization_service
        .leave_organization(&ctx, OrganizationId(request.organization_id))
        .await
        .map_err(org_error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

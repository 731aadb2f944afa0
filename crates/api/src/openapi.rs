use crate::models::{
    AcceptInvitationRequest, AcceptInvitationResponse, ApiRole, CreateOrganizationRequest,
    CurrentUserResponse, DeleteOrganizationResponse, ErrorDetail, ErrorResponse, HealthResponse,
    InvitationPreviewResponse, InvitationResponse, InviteMemberRequest, InviteMemberResponse,
    LeaveOrganizationRequest, ListInvitationsResponse, ListMembersResponse,
    ListOrganizationsResponse, ListUserInvitationsResponse, MemberResponse, MembershipResponse,
    OrganizationResponse, SwitchOrganizationRequest, UpdateCurrentUserRequest,
    UpdateMemberRoleRequest, UpdateOrganizationRequest, UserInvitationResponse,
};
use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Orgdesk API",
        description = "Multi-tenant organization, membership and invitation management"
    ),
    paths(
        crate::routes::health::health,
        crate::routes::organizations::list_organizations,
        crate::routes::organizations::create_organization,
        crate::routes::organizations::get_organization,
        crate::routes::organizations::update_organization,
        crate::routes::organizations::delete_organization,
        crate::routes::organizations::switch_organization,
        crate::routes::organizations::leave_organization,
        crate::routes::organization_members::list_members,
        crate::routes::organization_members::invite_member,
        crate::routes::organization_members::update_member_role,
        crate::routes::organization_members::remove_member,
        crate::routes::invitations::lookup_invitation,
        crate::routes::invitations::accept_invitation,
        crate::routes::invitations::list_user_invitations,
        crate::routes::invitations::list_organization_invitations,
        crate::routes::invitations::cancel_invitation,
        crate::routes::users::current_user,
        crate::routes::users::update_current_user,
    ),
    components(schemas(
        ErrorResponse,
        ErrorDetail,
        ApiRole,
        CreateOrganizationRequest,
        UpdateOrganizationRequest,
        OrganizationResponse,
        ListOrganizationsResponse,
        SwitchOrganizationRequest,
        LeaveOrganizationRequest,
        DeleteOrganizationResponse,
        MemberResponse,
        ListMembersResponse,
        MembershipResponse,
        InviteMemberRequest,
        InviteMemberResponse,
        UpdateMemberRoleRequest,
        InvitationResponse,
        ListInvitationsResponse,
        InvitationPreviewResponse,
        AcceptInvitationRequest,
        AcceptInvitationResponse,
        UserInvitationResponse,
        ListUserInvitationsResponse,
        CurrentUserResponse,
        UpdateCurrentUserRequest,
        HealthResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Organizations", description = "Organization lifecycle"),
        (name = "Organization Members", description = "Membership management"),
        (name = "Invitations", description = "Invitation lifecycle"),
        (name = "Users", description = "Current user"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_token",
                SecurityScheme::Http(
                    HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build(),
                ),
            );
        }
    }
}

/// Serve the generated OpenAPI document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

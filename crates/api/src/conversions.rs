//! Conversions between service-layer types and API models.

use crate::models::{
    ApiRole, InvitationPreviewResponse, InvitationResponse, MemberResponse, MembershipResponse,
    OrganizationResponse, UserInvitationResponse,
};
use services::invitation::{Invitation, InvitationPreview, InvitationWithNames};
use services::organization::{
    MemberRole, Membership, MembershipWithUser, Organization, OrganizationWithRole,
};

pub fn api_role_to_services_role(role: ApiRole) -> MemberRole {
    match role {
        ApiRole::Admin => MemberRole::Admin,
        ApiRole::User => MemberRole::User,
    }
}

pub fn services_role_to_api_role(role: MemberRole) -> ApiRole {
    match role {
        MemberRole::Admin => ApiRole::Admin,
        MemberRole::User => ApiRole::User,
    }
}

pub fn organization_to_response(org: Organization, role: MemberRole) -> OrganizationResponse {
    OrganizationResponse {
        id: org.id.0,
        name: org.name,
        slug: org.slug,
        logo: org.logo,
        role: services_role_to_api_role(role),
        created_at: org.created_at,
    }
}

pub fn org_with_role_to_response(entry: OrganizationWithRole) -> OrganizationResponse {
    let role = entry.role;
    organization_to_response(entry.organization, role)
}

pub fn membership_to_response(membership: Membership) -> MembershipResponse {
    MembershipResponse {
        id: membership.id.0,
        organization_id: membership.organization_id.0,
        user_id: membership.user_id.0,
        role: services_role_to_api_role(membership.role),
        created_at: membership.created_at,
    }
}

pub fn member_with_user_to_response(member: MembershipWithUser) -> MemberResponse {
    MemberResponse {
        id: member.membership.id.0,
        user_id: member.membership.user_id.0,
        email: member.email,
        display_name: member.display_name,
        role: services_role_to_api_role(member.membership.role),
        created_at: member.membership.created_at,
    }
}

pub fn invitation_to_response(invitation: Invitation) -> InvitationResponse {
    InvitationResponse {
        id: invitation.id,
        organization_id: invitation.organization_id.0,
        email: invitation.email,
        role: services_role_to_api_role(invitation.role),
        status: invitation.status.to_string(),
        expires_at: invitation.expires_at,
        created_at: invitation.created_at,
    }
}

pub fn preview_to_response(preview: InvitationPreview) -> InvitationPreviewResponse {
    InvitationPreviewResponse {
        organization_name: preview.organization_name,
        inviter_name: preview.inviter_name,
        email: preview.email,
        role: services_role_to_api_role(preview.role),
        status: preview.status.to_string(),
        expires_at: preview.expires_at,
    }
}

pub fn user_invitation_to_response(entry: InvitationWithNames) -> UserInvitationResponse {
    UserInvitationResponse {
        id: entry.invitation.id,
        organization_id: entry.invitation.organization_id.0,
        organization_name: entry.organization_name,
        inviter_name: entry.inviter_name,
        role: services_role_to_api_role(entry.invitation.role),
        expires_at: entry.invitation.expires_at,
        created_at: entry.invitation.created_at,
    }
}

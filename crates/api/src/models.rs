use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::consts::{
    MAX_DISPLAY_NAME_LENGTH, MAX_EMAIL_LENGTH, MAX_LOGO_URL_LENGTH, MAX_NAME_LENGTH,
    MAX_SLUG_LENGTH,
};
use crate::routes::common::validate_max_length;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: String, error_type: String) -> Self {
        Self {
            error: ErrorDetail {
                message,
                r#type: error_type,
                param: None,
                code: None,
            },
        }
    }

    pub fn with_param(message: String, error_type: String, param: String) -> Self {
        Self {
            error: ErrorDetail {
                message,
                r#type: error_type,
                param: Some(param),
                code: None,
            },
        }
    }
}

/// Member role as exposed over the wire
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApiRole {
    Admin,
    User,
}

// ============================================
// Organization models
// ============================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrganizationRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

impl CreateOrganizationRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        validate_max_length("name", &self.name, MAX_NAME_LENGTH)?;
        if let Some(ref slug) = self.slug {
            validate_max_length("slug", slug, MAX_SLUG_LENGTH)?;
        }
        if let Some(ref logo) = self.logo {
            validate_max_length("logo", logo, MAX_LOGO_URL_LENGTH)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub logo: Option<String>,
}

impl UpdateOrganizationRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                return Err("name cannot be empty".to_string());
            }
            validate_max_length("name", name, MAX_NAME_LENGTH)?;
        }
        if let Some(ref slug) = self.slug {
            validate_max_length("slug", slug, MAX_SLUG_LENGTH)?;
        }
        if let Some(ref logo) = self.logo {
            validate_max_length("logo", logo, MAX_LOGO_URL_LENGTH)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrganizationResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub logo: Option<String>,
    /// The caller's role in this organization
    pub role: ApiRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListOrganizationsResponse {
    pub organizations: Vec<OrganizationResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SwitchOrganizationRequest {
    pub organization_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LeaveOrganizationRequest {
    pub organization_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteOrganizationResponse {
    pub id: Uuid,
    pub deleted: bool,
}

// ============================================
// Member models
// ============================================

/// A membership row with the member's public user data
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: ApiRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListMembersResponse {
    pub members: Vec<MemberResponse>,
}

/// A bare membership, used where no user join has happened
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MembershipResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: ApiRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InviteMemberRequest {
    pub email: String,
    pub role: ApiRole,
}

impl InviteMemberRequest {
    pub fn validate(&self) -> Result<(), String> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err("a valid email is required".to_string());
        }
        validate_max_length("email", email, MAX_EMAIL_LENGTH)?;
        Ok(())
    }
}

/// Result of an invite: existing accounts become members immediately,
/// unknown emails receive an invitation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InviteMemberResponse {
    /// "member_added" or "invitation_sent"
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<MembershipResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation: Option<InvitationResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMemberRoleRequest {
    pub member_id: Uuid,
    pub role: ApiRole,
}

#[derive(Debug, Deserialize)]
pub struct RemoveMemberParams {
    pub member_id: Uuid,
}

// ============================================
// Invitation models
// ============================================

/// An invitation as admins see it. The token travels only in the invitation
/// email, never through the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvitationResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub role: ApiRole,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListInvitationsResponse {
    pub invitations: Vec<InvitationResponse>,
}

#[derive(Debug, Deserialize)]
pub struct LookupInvitationParams {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelInvitationParams {
    pub invitation_id: Uuid,
}

/// Public preview of a pending invitation
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvitationPreviewResponse {
    pub organization_name: String,
    pub inviter_name: Option<String>,
    pub email: String,
    pub role: ApiRole,
    pub status: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AcceptInvitationRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AcceptInvitationResponse {
    pub organization: OrganizationResponse,
    pub membership: MembershipResponse,
}

/// A pending invitation addressed to the caller
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserInvitationResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub organization_name: String,
    pub inviter_name: Option<String>,
    pub role: ApiRole,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListUserInvitationsResponse {
    pub invitations: Vec<UserInvitationResponse>,
}

// ============================================
// User models
// ============================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CurrentUserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    /// The organization this session currently operates against
    pub active_organization_id: Uuid,
    pub roles: Vec<ApiRole>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCurrentUserRequest {
    pub display_name: Option<String>,
}

impl UpdateCurrentUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref display_name) = self.display_name {
            validate_max_length("display_name", display_name, MAX_DISPLAY_NAME_LENGTH)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_organization_request_validation() {
        let request = CreateOrganizationRequest {
            name: "Acme".to_string(),
            slug: None,
            logo: None,
        };
        assert!(request.validate().is_ok());

        let request = CreateOrganizationRequest {
            name: "   ".to_string(),
            slug: None,
            logo: None,
        };
        assert!(request.validate().is_err());

        let request = CreateOrganizationRequest {
            name: "x".repeat(MAX_NAME_LENGTH + 1),
            slug: None,
            logo: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_invite_member_request_validation() {
        let request = InviteMemberRequest {
            email: "bob@x.com".to_string(),
            role: ApiRole::User,
        };
        assert!(request.validate().is_ok());

        let request = InviteMemberRequest {
            email: "not-an-email".to_string(),
            role: ApiRole::User,
        };
        assert!(request.validate().is_err());
    }
}

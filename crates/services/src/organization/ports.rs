use crate::auth::ports::UserId;
use crate::common::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OrganizationId(pub Uuid);

impl From<Uuid> for OrganizationId {
    fn from(uuid: Uuid) -> Self {
        OrganizationId(uuid)
    }
}

impl std::fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MembershipId(pub Uuid);

impl std::fmt::Display for MembershipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub slug: String,
    pub logo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    User,
}

impl MemberRole {
    pub fn can_manage_organization(&self) -> bool {
        matches!(self, MemberRole::Admin)
    }

    pub fn can_manage_members(&self) -> bool {
        matches!(self, MemberRole::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::User => "user",
        }
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(MemberRole::Admin),
            "user" => Ok(MemberRole::User),
            other => Err(format!("Invalid member role: {}", other)),
        }
    }
}

/// The join entity granting a user a role within an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
}

/// Membership joined with the member's user record, for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipWithUser {
    pub membership: Membership,
    pub email: String,
    pub display_name: Option<String>,
}

/// An organization together with the caller's role in it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationWithRole {
    pub organization: Organization,
    pub role: MemberRole,
}

#[derive(Debug, thiserror::Error)]
pub enum OrganizationError {
    #[error("Organization not found")]
    NotFound,

    #[error("Member not found")]
    MemberNotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    InvariantViolation(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Debug, Clone)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub slug: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub logo: Option<String>,
}

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// Create an organization and its creator's admin membership in one
    /// transaction. Fails with `AlreadyExists` on a slug collision.
    async fn create(
        &self,
        request: CreateOrganizationRequest,
        creator: UserId,
    ) -> Result<(Organization, Membership), RepositoryError>;

    async fn get_by_id(&self, id: OrganizationId) -> Result<Option<Organization>, RepositoryError>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Organization>, RepositoryError>;

    /// Partial update. Fails with `AlreadyExists` when a new slug collides.
    async fn update(
        &self,
        id: OrganizationId,
        request: UpdateOrganizationRequest,
    ) -> Result<Organization, RepositoryError>;

    /// Delete the organization; memberships and invitations cascade.
    async fn delete(&self, id: OrganizationId) -> Result<bool, RepositoryError>;

    async fn get_member(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<Membership>, RepositoryError>;

    async fn get_member_by_id(
        &self,
        organization_id: OrganizationId,
        member_id: MembershipId,
    ) -> Result<Option<Membership>, RepositoryError>;

    /// Fails with `AlreadyExists` when the user is already a member.
    async fn add_member(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: MemberRole,
    ) -> Result<Membership, RepositoryError>;

    /// Change a member's role. The implementation must re-check the
    /// last-admin invariant inside the same transaction as the update and
    /// fail with `ValidationFailed` when the change would leave the
    /// organization without an admin.
    async fn update_member_role(
        &self,
        organization_id: OrganizationId,
        member_id: MembershipId,
        role: MemberRole,
    ) -> Result<Membership, RepositoryError>;

    /// Remove a membership, with the same transactional last-admin re-check
    /// as `update_member_role`.
    async fn remove_member(
        &self,
        organization_id: OrganizationId,
        member_id: MembershipId,
    ) -> Result<bool, RepositoryError>;

    async fn list_members(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<MembershipWithUser>, RepositoryError>;

    async fn admin_count(&self, organization_id: OrganizationId) -> Result<i64, RepositoryError>;

    async fn list_organizations_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrganizationWithRole>, RepositoryError>;

    async fn count_memberships_for_user(&self, user_id: UserId) -> Result<i64, RepositoryError>;

    /// The user's most recently created membership, the resolver's fallback
    async fn most_recent_membership(
        &self,
        user_id: UserId,
    ) -> Result<Option<Membership>, RepositoryError>;
}

use crate::auth::ports::UserId;
use crate::common::RepositoryError;
use crate::organization::ports::{MemberRole, Membership, OrganizationId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvitationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvitationStatus::Pending),
            "accepted" => Ok(InvitationStatus::Accepted),
            "expired" => Ok(InvitationStatus::Expired),
            other => Err(format!("Invalid invitation status: {}", other)),
        }
    }
}

/// A time-boxed, token-addressed offer for an email address to join an
/// organization with a given role. Status is monotonic: `pending` moves to
/// exactly one of the terminal `accepted` or `expired` states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    pub organization_id: OrganizationId,
    pub email: String,
    pub role: MemberRole,
    pub invited_by: UserId,
    pub token: String,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Invitation {
    /// Still `pending` in the store but past its expiry; any read finding
    /// this flips the row to `expired`.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && self.expires_at < now
    }
}

/// Invitation joined with display names for listings; the token never
/// travels with these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationWithNames {
    pub invitation: Invitation,
    pub organization_name: String,
    pub inviter_name: Option<String>,
}

/// Public preview of an invitation, shown before authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationPreview {
    pub organization_name: String,
    pub inviter_name: Option<String>,
    pub email: String,
    pub role: MemberRole,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of the invite-member operation: existing accounts are added
/// directly, unknown emails get an invitation.
#[derive(Debug, Clone)]
pub enum InviteOutcome {
    MemberAdded(Membership),
    InvitationSent(Invitation),
}

#[derive(Debug, thiserror::Error)]
pub enum InvitationError {
    #[error("Invitation not found")]
    NotFound,

    #[error("Organization not found")]
    OrganizationNotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invitation has expired")]
    Expired,

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Debug, Clone)]
pub struct CreateInvitationRequest {
    pub email: String,
    pub role: MemberRole,
    pub expires_in_days: i64,
}

#[async_trait]
pub trait InvitationRepository: Send + Sync {
    /// Create a pending invitation with a fresh opaque token
    async fn create(
        &self,
        organization_id: OrganizationId,
        request: CreateInvitationRequest,
        invited_by: UserId,
    ) -> Result<Invitation, RepositoryError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Invitation>, RepositoryError>;

    async fn get_by_token(&self, token: &str) -> Result<Option<Invitation>, RepositoryError>;

    /// The pending invitation for this email in this organization, if any
    async fn find_pending(
        &self,
        organization_id: OrganizationId,
        email: &str,
    ) -> Result<Option<Invitation>, RepositoryError>;

    /// Accept atomically: insert the membership and flip the invitation to
    /// `accepted` in one transaction. The status update is conditional on
    /// `pending`, so a concurrent accept loses cleanly with
    /// `NotFound("pending invitation")`; a membership collision surfaces as
    /// `AlreadyExists`.
    async fn accept(
        &self,
        id: Uuid,
        user_id: UserId,
    ) -> Result<(Invitation, Membership), RepositoryError>;

    /// Conditionally flip `pending -> expired`. Returns `None` when the
    /// invitation was not pending, leaving the row untouched.
    async fn expire(&self, id: Uuid) -> Result<Option<Invitation>, RepositoryError>;

    async fn list_pending_by_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<InvitationWithNames>, RepositoryError>;

    async fn list_pending_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<InvitationWithNames>, RepositoryError>;

    /// Flip lapsed pending invitations for an organization to `expired`
    async fn mark_lapsed_for_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<u64, RepositoryError>;

    /// Flip lapsed pending invitations addressed to an email to `expired`
    async fn mark_lapsed_for_email(&self, email: &str) -> Result<u64, RepositoryError>;
}

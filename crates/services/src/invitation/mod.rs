pub mod ports;

pub use ports::*;

use crate::auth::ports::{User, UserRepository};
use crate::common::RepositoryError;
use crate::email::{Email, Mailer};
use crate::organization::guard::{self, AuthContext};
use crate::organization::ports::{
    MemberRole, Membership, Organization, OrganizationId, OrganizationRepository,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

fn store_error(e: RepositoryError) -> InvitationError {
    InvitationError::InternalError(format!("Storage error: {}", e))
}

/// Invitation lifecycle manager: create, look up, accept and cancel
/// invitations, with implicit expiry on read.
pub struct InvitationService {
    invitations: Arc<dyn InvitationRepository>,
    organizations: Arc<dyn OrganizationRepository>,
    users: Arc<dyn UserRepository>,
    mailer: Arc<dyn Mailer>,
    config: config::InvitationConfig,
}

impl InvitationService {
    pub fn new(
        invitations: Arc<dyn InvitationRepository>,
        organizations: Arc<dyn OrganizationRepository>,
        users: Arc<dyn UserRepository>,
        mailer: Arc<dyn Mailer>,
        config: config::InvitationConfig,
    ) -> Self {
        Self {
            invitations,
            organizations,
            users,
            mailer,
            config,
        }
    }

    async fn require_admin(
        &self,
        organization_id: OrganizationId,
        ctx: &AuthContext,
    ) -> Result<(), InvitationError> {
        let membership = self
            .organizations
            .get_member(organization_id, ctx.user_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| {
                InvitationError::Forbidden("Not a member of this organization".to_string())
            })?;

        guard::require_admin_role(&membership.role)
            .map_err(|_| InvitationError::Forbidden("Admin role required".to_string()))?;
        Ok(())
    }

    /// Invite an email address into an organization. Existing accounts are
    /// added as members immediately; unknown emails get a pending invitation
    /// and an email with the accept link.
    pub async fn invite_member(
        &self,
        ctx: &AuthContext,
        organization_id: OrganizationId,
        email: String,
        role: MemberRole,
    ) -> Result<InviteOutcome, InvitationError> {
        let email = email.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(InvitationError::InvalidParams(
                "A valid email address is required".to_string(),
            ));
        }

        let org = self
            .organizations
            .get_by_id(organization_id)
            .await
            .map_err(store_error)?
            .ok_or(InvitationError::OrganizationNotFound)?;

        self.require_admin(organization_id, ctx).await?;

        let existing_user = self
            .users
            .get_by_email(&email)
            .await
            .map_err(|e| InvitationError::InternalError(format!("Failed to look up user: {}", e)))?;

        if let Some(ref user) = existing_user {
            if self
                .organizations
                .get_member(organization_id, user.id)
                .await
                .map_err(store_error)?
                .is_some()
            {
                return Err(InvitationError::Conflict(
                    "User is already a member of this organization".to_string(),
                ));
            }
        }

        if let Some(pending) = self
            .invitations
            .find_pending(organization_id, &email)
            .await
            .map_err(store_error)?
        {
            if pending.is_lapsed(Utc::now()) {
                // A lapsed invitation does not block a fresh one
                self.invitations
                    .expire(pending.id)
                    .await
                    .map_err(store_error)?;
            } else {
                return Err(InvitationError::Conflict(
                    "A pending invitation for this email already exists".to_string(),
                ));
            }
        }

        if let Some(user) = existing_user {
            let membership = match self
                .organizations
                .add_member(organization_id, user.id, role)
                .await
            {
                Ok(membership) => membership,
                Err(RepositoryError::AlreadyExists) => {
                    return Err(InvitationError::Conflict(
                        "User is already a member of this organization".to_string(),
                    ));
                }
                Err(e) => return Err(store_error(e)),
            };
            info!(
                "Added existing user {} to organization {} as {}",
                user.id, organization_id, role
            );
            return Ok(InviteOutcome::MemberAdded(membership));
        }

        let invitation = self
            .invitations
            .create(
                organization_id,
                CreateInvitationRequest {
                    email: email.clone(),
                    role,
                    expires_in_days: self.config.expiration_days,
                },
                ctx.user_id,
            )
            .await
            .map_err(store_error)?;

        let inviter_name = self.inviter_name(ctx.user_id).await;
        let email_message =
            invitation_email(&org, inviter_name.as_deref(), &invitation, &self.config);
        if let Err(e) = self.mailer.send(&email_message).await {
            // The invitation stands; the link can still be delivered manually
            error!("Failed to send invitation email to {}: {}", email, e);
        }

        debug!(
            "Created invitation {} for {} to organization {}",
            invitation.id, email, organization_id
        );
        Ok(InviteOutcome::InvitationSent(invitation))
    }

    /// Public lookup by token: a preview of the invitation, or a descriptive
    /// error when it is no longer acceptable. A lapsed invitation is flipped
    /// to `expired` on the way.
    pub async fn lookup(&self, token: &str) -> Result<InvitationPreview, InvitationError> {
        let invitation = self
            .invitations
            .get_by_token(token)
            .await
            .map_err(store_error)?
            .ok_or(InvitationError::NotFound)?;

        if invitation.is_lapsed(Utc::now()) {
            self.invitations
                .expire(invitation.id)
                .await
                .map_err(store_error)?;
            return Err(InvitationError::Expired);
        }

        match invitation.status {
            InvitationStatus::Pending => {}
            InvitationStatus::Accepted => {
                return Err(InvitationError::InvalidParams(
                    "Invitation has already been accepted".to_string(),
                ));
            }
            InvitationStatus::Expired => return Err(InvitationError::Expired),
        }

        let organization = self
            .organizations
            .get_by_id(invitation.organization_id)
            .await
            .map_err(store_error)?
            .ok_or(InvitationError::OrganizationNotFound)?;

        Ok(InvitationPreview {
            organization_name: organization.name,
            inviter_name: self.inviter_name(invitation.invited_by).await,
            email: invitation.email,
            role: invitation.role,
            status: invitation.status,
            expires_at: invitation.expires_at,
        })
    }

    /// Accept an invitation: the authenticated user's email must match the
    /// invitation exactly. Membership creation and the status flip happen in
    /// one transaction; only one of two concurrent accepts can win.
    pub async fn accept(
        &self,
        user: &User,
        token: &str,
    ) -> Result<(Membership, Organization), InvitationError> {
        let invitation = self
            .invitations
            .get_by_token(token)
            .await
            .map_err(store_error)?
            .ok_or(InvitationError::NotFound)?;

        if invitation.is_lapsed(Utc::now()) {
            self.invitations
                .expire(invitation.id)
                .await
                .map_err(store_error)?;
            return Err(InvitationError::Expired);
        }

        match invitation.status {
            InvitationStatus::Pending => {}
            InvitationStatus::Accepted => {
                return Err(InvitationError::InvalidParams(
                    "Invitation has already been accepted".to_string(),
                ));
            }
            InvitationStatus::Expired => return Err(InvitationError::Expired),
        }

        // Exact match against the stored address, so the error can name the
        // account the invitee has to sign in with
        if invitation.email != user.email {
            return Err(InvitationError::Forbidden(format!(
                "This invitation was sent to {}. Sign in with that account to accept it.",
                invitation.email
            )));
        }

        if self
            .organizations
            .get_member(invitation.organization_id, user.id)
            .await
            .map_err(store_error)?
            .is_some()
        {
            return Err(InvitationError::Conflict(
                "Already a member of this organization".to_string(),
            ));
        }

        let (invitation, membership) = match self.invitations.accept(invitation.id, user.id).await
        {
            Ok(result) => result,
            // Lost the race: someone flipped the status first
            Err(RepositoryError::NotFound(_)) => {
                return Err(InvitationError::InvalidParams(
                    "Invitation is no longer pending".to_string(),
                ));
            }
            Err(RepositoryError::AlreadyExists) => {
                return Err(InvitationError::Conflict(
                    "Already a member of this organization".to_string(),
                ));
            }
            Err(e) => return Err(store_error(e)),
        };

        let organization = self
            .organizations
            .get_by_id(invitation.organization_id)
            .await
            .map_err(store_error)?
            .ok_or(InvitationError::OrganizationNotFound)?;

        info!(
            "User {} accepted invitation {} to organization {}",
            user.id, invitation.id, organization.id
        );
        Ok((membership, organization))
    }

    /// Admin-only cancel: flips `pending -> expired`. Cancelling an
    /// invitation in a terminal state is a conflict and changes nothing.
    pub async fn cancel(
        &self,
        ctx: &AuthContext,
        organization_id: OrganizationId,
        invitation_id: Uuid,
    ) -> Result<Invitation, InvitationError> {
        self.require_admin(organization_id, ctx).await?;

        let invitation = self
            .invitations
            .get_by_id(invitation_id)
            .await
            .map_err(store_error)?
            .filter(|inv| inv.organization_id == organization_id)
            .ok_or(InvitationError::NotFound)?;

        match self
            .invitations
            .expire(invitation.id)
            .await
            .map_err(store_error)?
        {
            Some(expired) => Ok(expired),
            None => Err(InvitationError::Conflict(
                "Can only cancel pending invitations".to_string(),
            )),
        }
    }

    /// Admin-only listing of an organization's pending invitations
    pub async fn list_for_organization(
        &self,
        ctx: &AuthContext,
        organization_id: OrganizationId,
    ) -> Result<Vec<InvitationWithNames>, InvitationError> {
        self.require_admin(organization_id, ctx).await?;

        self.invitations
            .mark_lapsed_for_organization(organization_id)
            .await
            .map_err(store_error)?;
        self.invitations
            .list_pending_by_organization(organization_id)
            .await
            .map_err(store_error)
    }

    /// Pending invitations addressed to the caller's email
    pub async fn list_for_user(
        &self,
        user: &User,
    ) -> Result<Vec<InvitationWithNames>, InvitationError> {
        self.invitations
            .mark_lapsed_for_email(&user.email)
            .await
            .map_err(store_error)?;
        self.invitations
            .list_pending_by_email(&user.email)
            .await
            .map_err(store_error)
    }

    async fn inviter_name(&self, inviter: crate::auth::UserId) -> Option<String> {
        match self.users.get_by_id(inviter).await {
            Ok(Some(user)) => Some(user.name().to_string()),
            _ => None,
        }
    }
}

fn invitation_email(
    organization: &Organization,
    inviter_name: Option<&str>,
    invitation: &Invitation,
    config: &config::InvitationConfig,
) -> Email {
    let accept_url = format!("{}/accept?token={}", config.accept_url_base, invitation.token);
    let inviter = inviter_name.unwrap_or("A member");

    Email::new(
        invitation.email.clone(),
        format!("You've been invited to join {}", organization.name),
    )
    .text(format!(
        "{} invited you to join {} as {}.\n\nAccept the invitation: {}\n\nThe invitation expires on {}.",
        inviter,
        organization.name,
        invitation.role,
        accept_url,
        invitation.expires_at.format("%Y-%m-%d")
    ))
}

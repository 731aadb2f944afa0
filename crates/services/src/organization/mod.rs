pub mod guard;
pub mod ports;
pub mod resolver;

pub use guard::AuthContext;
pub use ports::*;
pub use resolver::{ActiveOrgResolver, ResolveError, ResolvedVia, Resolution};

use crate::common::RepositoryError;
use std::sync::Arc;
use tracing::debug;

/// Derive a URL slug from an organization name: lowercase, whitespace runs
/// collapsed to `-`, everything outside `[a-z0-9-]` stripped.
pub fn derive_slug(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

fn validate_slug(slug: &str) -> Result<(), OrganizationError> {
    if slug.is_empty() {
        return Err(OrganizationError::InvalidParams(
            "Slug cannot be empty".to_string(),
        ));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(OrganizationError::InvalidParams(
            "Slug may only contain lowercase letters, digits and hyphens".to_string(),
        ));
    }
    Ok(())
}

fn store_error(e: RepositoryError) -> OrganizationError {
    OrganizationError::InternalError(format!("Storage error: {}", e))
}

/// Membership lifecycle manager: organizations, memberships, roles, and the
/// last-admin invariant.
pub struct OrganizationService {
    repository: Arc<dyn OrganizationRepository>,
}

impl OrganizationService {
    pub fn new(repository: Arc<dyn OrganizationRepository>) -> Self {
        Self { repository }
    }

    /// Fail with `Forbidden` unless the user holds a membership in the
    /// organization. Used whenever an organization id arrives from a path or
    /// body parameter rather than the trusted context.
    pub async fn require_member(
        &self,
        organization_id: OrganizationId,
        user_id: crate::auth::UserId,
    ) -> Result<Membership, OrganizationError> {
        self.repository
            .get_member(organization_id, user_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| {
                OrganizationError::Forbidden("Not a member of this organization".to_string())
            })
    }

    async fn require_admin_member(
        &self,
        organization_id: OrganizationId,
        user_id: crate::auth::UserId,
    ) -> Result<Membership, OrganizationError> {
        let membership = self.require_member(organization_id, user_id).await?;
        guard::require_admin_role(&membership.role)?;
        Ok(membership)
    }

    /// Create an organization with the caller as its sole admin
    pub async fn create_organization(
        &self,
        ctx: &AuthContext,
        request: CreateOrganizationRequest,
    ) -> Result<(Organization, Membership), OrganizationError> {
        if request.name.trim().is_empty() {
            return Err(OrganizationError::InvalidParams(
                "Organization name cannot be empty".to_string(),
            ));
        }

        let slug = match &request.slug {
            Some(slug) => {
                validate_slug(slug)?;
                slug.clone()
            }
            None => {
                let derived = derive_slug(&request.name);
                if derived.is_empty() {
                    return Err(OrganizationError::InvalidParams(
                        "Organization name does not yield a usable slug".to_string(),
                    ));
                }
                derived
            }
        };

        if self
            .repository
            .get_by_slug(&slug)
            .await
            .map_err(store_error)?
            .is_some()
        {
            return Err(OrganizationError::Conflict(format!(
                "Slug '{}' is already taken",
                slug
            )));
        }

        let request = CreateOrganizationRequest {
            name: request.name,
            slug: Some(slug),
            logo: request.logo,
        };

        match self.repository.create(request, ctx.user_id).await {
            Ok((org, membership)) => {
                debug!("Created organization {} for user {}", org.id, ctx.user_id);
                Ok((org, membership))
            }
            // Lost a race on the slug between the check and the insert
            Err(RepositoryError::AlreadyExists) => Err(OrganizationError::Conflict(
                "Slug is already taken".to_string(),
            )),
            Err(e) => Err(store_error(e)),
        }
    }

    /// List the caller's organizations with their role in each
    pub async fn list_organizations(
        &self,
        ctx: &AuthContext,
    ) -> Result<Vec<OrganizationWithRole>, OrganizationError> {
        self.repository
            .list_organizations_by_user(ctx.user_id)
            .await
            .map_err(store_error)
    }

    /// Fetch an organization the caller is a member of
    pub async fn get_organization(
        &self,
        ctx: &AuthContext,
        organization_id: OrganizationId,
    ) -> Result<(Organization, MemberRole), OrganizationError> {
        let org = self
            .repository
            .get_by_id(organization_id)
            .await
            .map_err(store_error)?
            .ok_or(OrganizationError::NotFound)?;

        let membership = self.require_member(organization_id, ctx.user_id).await?;
        Ok((org, membership.role))
    }

    /// Admin-only partial update; slug uniqueness re-checked on change
    pub async fn update_organization(
        &self,
        ctx: &AuthContext,
        organization_id: OrganizationId,
        request: UpdateOrganizationRequest,
    ) -> Result<Organization, OrganizationError> {
        let org = self
            .repository
            .get_by_id(organization_id)
            .await
            .map_err(store_error)?
            .ok_or(OrganizationError::NotFound)?;

        self.require_admin_member(organization_id, ctx.user_id)
            .await?;

        if let Some(ref name) = request.name {
            if name.trim().is_empty() {
                return Err(OrganizationError::InvalidParams(
                    "Organization name cannot be empty".to_string(),
                ));
            }
        }

        if let Some(ref slug) = request.slug {
            validate_slug(slug)?;
            if *slug != org.slug
                && self
                    .repository
                    .get_by_slug(slug)
                    .await
                    .map_err(store_error)?
                    .is_some()
            {
                return Err(OrganizationError::Conflict(format!(
                    "Slug '{}' is already taken",
                    slug
                )));
            }
        }

        match self.repository.update(organization_id, request).await {
            Ok(org) => Ok(org),
            Err(RepositoryError::AlreadyExists) => Err(OrganizationError::Conflict(
                "Slug is already taken".to_string(),
            )),
            Err(RepositoryError::NotFound(_)) => Err(OrganizationError::NotFound),
            Err(e) => Err(store_error(e)),
        }
    }

    /// Admin-only delete, rejected when it is the caller's only organization.
    /// Memberships and invitations cascade with the organization.
    pub async fn delete_organization(
        &self,
        ctx: &AuthContext,
        organization_id: OrganizationId,
    ) -> Result<(), OrganizationError> {
        self.repository
            .get_by_id(organization_id)
            .await
            .map_err(store_error)?
            .ok_or(OrganizationError::NotFound)?;

        self.require_admin_member(organization_id, ctx.user_id)
            .await?;

        let memberships = self
            .repository
            .count_memberships_for_user(ctx.user_id)
            .await
            .map_err(store_error)?;
        if memberships <= 1 {
            return Err(OrganizationError::InvariantViolation(
                "Cannot delete your only organization".to_string(),
            ));
        }

        let deleted = self
            .repository
            .delete(organization_id)
            .await
            .map_err(store_error)?;
        if !deleted {
            return Err(OrganizationError::NotFound);
        }

        debug!("Deleted organization {}", organization_id);
        Ok(())
    }

    /// Validate a switch of the active organization. The caller must already
    /// be a member of the target; the HTTP layer persists the new preference.
    pub async fn switch_organization(
        &self,
        ctx: &AuthContext,
        organization_id: OrganizationId,
    ) -> Result<(Organization, MemberRole), OrganizationError> {
        let org = self
            .repository
            .get_by_id(organization_id)
            .await
            .map_err(store_error)?
            .ok_or(OrganizationError::NotFound)?;

        let membership = self.require_member(organization_id, ctx.user_id).await?;
        Ok((org, membership.role))
    }

    /// Leave an organization. Always permitted, except for the last admin.
    pub async fn leave_organization(
        &self,
        ctx: &AuthContext,
        organization_id: OrganizationId,
    ) -> Result<(), OrganizationError> {
        let membership = self.require_member(organization_id, ctx.user_id).await?;

        match self
            .repository
            .remove_member(organization_id, membership.id)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(OrganizationError::MemberNotFound),
            Err(RepositoryError::ValidationFailed(_)) => Err(OrganizationError::InvariantViolation(
                "Cannot remove the last admin".to_string(),
            )),
            Err(e) => Err(store_error(e)),
        }
    }

    /// Member-only listing of an organization's members
    pub async fn list_members(
        &self,
        ctx: &AuthContext,
        organization_id: OrganizationId,
    ) -> Result<Vec<MembershipWithUser>, OrganizationError> {
        self.require_member(organization_id, ctx.user_id).await?;
        self.repository
            .list_members(organization_id)
            .await
            .map_err(store_error)
    }

    /// Admin-only role change. Self-targeting and demoting the last admin are
    /// rejected; the repository re-checks the invariant inside its
    /// transaction.
    pub async fn update_member_role(
        &self,
        ctx: &AuthContext,
        organization_id: OrganizationId,
        member_id: MembershipId,
        role: MemberRole,
    ) -> Result<Membership, OrganizationError> {
        self.require_admin_member(organization_id, ctx.user_id)
            .await?;

        let target = self
            .repository
            .get_member_by_id(organization_id, member_id)
            .await
            .map_err(store_error)?
            .ok_or(OrganizationError::MemberNotFound)?;

        if target.user_id == ctx.user_id {
            return Err(OrganizationError::InvariantViolation(
                "Cannot change your own role".to_string(),
            ));
        }

        if target.role == role {
            return Ok(target);
        }

        match self
            .repository
            .update_member_role(organization_id, member_id, role)
            .await
        {
            Ok(membership) => Ok(membership),
            Err(RepositoryError::ValidationFailed(_)) => Err(OrganizationError::InvariantViolation(
                "Cannot remove the last admin".to_string(),
            )),
            Err(RepositoryError::NotFound(_)) => Err(OrganizationError::MemberNotFound),
            Err(e) => Err(store_error(e)),
        }
    }

    /// Remove a member. Self-removal is always permitted (a user may always
    /// leave); removing anyone else requires the admin role. The last admin
    /// cannot be removed either way.
    pub async fn remove_member(
        &self,
        ctx: &AuthContext,
        organization_id: OrganizationId,
        member_id: MembershipId,
    ) -> Result<(), OrganizationError> {
        let target = self
            .repository
            .get_member_by_id(organization_id, member_id)
            .await
            .map_err(store_error)?
            .ok_or(OrganizationError::MemberNotFound)?;

        if target.user_id != ctx.user_id {
            self.require_admin_member(organization_id, ctx.user_id)
                .await?;
        }

        match self
            .repository
            .remove_member(organization_id, member_id)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(OrganizationError::MemberNotFound),
            Err(RepositoryError::ValidationFailed(_)) => Err(OrganizationError::InvariantViolation(
                "Cannot remove the last admin".to_string(),
            )),
            Err(e) => Err(store_error(e)),
        }
    }
}

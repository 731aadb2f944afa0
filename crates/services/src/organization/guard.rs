use super::ports::{MemberRole, OrganizationError, OrganizationId};
use crate::auth::ports::UserId;
use serde::{Deserialize, Serialize};

/// Immutable per-request authorization context: the authenticated user and
/// the organization their session currently operates against. Built once by
/// the resolver and threaded explicitly through handlers, never stored in
/// process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: UserId,
    pub email: String,
    pub org_id: OrganizationId,
    pub roles: Vec<MemberRole>,
}

impl AuthContext {
    pub fn new(user_id: UserId, email: String, org_id: OrganizationId, role: MemberRole) -> Self {
        Self {
            user_id,
            email,
            org_id,
            roles: vec![role],
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(MemberRole::can_manage_organization)
    }
}

/// Fail unless the context carries the admin role in its active organization
pub fn require_admin(ctx: &AuthContext) -> Result<(), OrganizationError> {
    if ctx.is_admin() {
        Ok(())
    } else {
        Err(OrganizationError::Forbidden(
            "Admin role required".to_string(),
        ))
    }
}

/// Fail unless the given membership role is admin. Used after a membership
/// row has been fetched for an organization id taken from a path or body
/// parameter rather than the trusted context.
pub fn require_admin_role(role: &MemberRole) -> Result<(), OrganizationError> {
    if role.can_manage_organization() {
        Ok(())
    } else {
        Err(OrganizationError::Forbidden(
            "Admin role required".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn context_with(role: MemberRole) -> AuthContext {
        AuthContext::new(
            UserId(Uuid::new_v4()),
            "user@example.com".to_string(),
            OrganizationId(Uuid::new_v4()),
            role,
        )
    }

    #[test]
    fn test_require_admin_accepts_admin_context() {
        assert!(require_admin(&context_with(MemberRole::Admin)).is_ok());
    }

    #[test]
    fn test_require_admin_rejects_user_context() {
        let err = require_admin(&context_with(MemberRole::User)).unwrap_err();
        assert!(matches!(err, OrganizationError::Forbidden(_)));
    }

    #[test]
    fn test_require_admin_role() {
        assert!(require_admin_role(&MemberRole::Admin).is_ok());
        assert!(matches!(
            require_admin_role(&MemberRole::User),
            Err(OrganizationError::Forbidden(_))
        ));
    }
}

use super::guard::AuthContext;
use super::ports::{
    CreateOrganizationRequest, Membership, OrganizationId, OrganizationRepository,
};
use super::derive_slug;
use crate::auth::ports::User;
use crate::common::RepositoryError;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};

/// How the active organization was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedVia {
    /// The persisted preference was still valid
    Preference,
    /// Fell back to the most recently created membership
    MostRecent,
    /// The user had no membership; a default organization was provisioned
    Provisioned,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub context: AuthContext,
    pub via: ResolvedVia,
}

impl Resolution {
    /// Whether the persisted preference needs refreshing
    pub fn preference_changed(&self, preferred: Option<OrganizationId>) -> bool {
        preferred != Some(self.context.org_id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Failed to provision a default organization: {0}")]
    ProvisioningFailed(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

fn store_error(e: RepositoryError) -> ResolveError {
    ResolveError::InternalError(format!("Storage error: {}", e))
}

/// Determines the organization context for a request: a valid persisted
/// preference wins, then the most recent membership, and a user with no
/// membership at all gets a default organization provisioned.
pub struct ActiveOrgResolver {
    organizations: Arc<dyn OrganizationRepository>,
}

impl ActiveOrgResolver {
    pub fn new(organizations: Arc<dyn OrganizationRepository>) -> Self {
        Self { organizations }
    }

    pub async fn resolve(
        &self,
        user: &User,
        preferred: Option<OrganizationId>,
    ) -> Result<Resolution, ResolveError> {
        // Step 1: the persisted preference, if the membership still exists
        if let Some(org_id) = preferred {
            if let Some(membership) = self
                .organizations
                .get_member(org_id, user.id)
                .await
                .map_err(store_error)?
            {
                return Ok(Resolution {
                    context: AuthContext::new(
                        user.id,
                        user.email.clone(),
                        org_id,
                        membership.role,
                    ),
                    via: ResolvedVia::Preference,
                });
            }
            debug!(
                "Preferred organization {} no longer valid for user {}",
                org_id, user.id
            );
        }

        // Step 2: the most recently created membership
        if let Some(membership) = self
            .organizations
            .most_recent_membership(user.id)
            .await
            .map_err(store_error)?
        {
            return Ok(Resolution {
                context: AuthContext::new(
                    user.id,
                    user.email.clone(),
                    membership.organization_id,
                    membership.role,
                ),
                via: ResolvedVia::MostRecent,
            });
        }

        // Step 3: no membership anywhere, provision a default organization
        let membership = self.provision(user).await?;
        info!(
            "Provisioned default organization {} for user {}",
            membership.organization_id, user.id
        );
        Ok(Resolution {
            context: AuthContext::new(
                user.id,
                user.email.clone(),
                membership.organization_id,
                membership.role,
            ),
            via: ResolvedVia::Provisioned,
        })
    }

    async fn provision(&self, user: &User) -> Result<Membership, ResolveError> {
        let name = user.name().to_string();
        let base_slug = {
            let derived = derive_slug(&name);
            if derived.is_empty() {
                "org".to_string()
            } else {
                derived
            }
        };

        match self.create_default(user, &name, base_slug.clone()).await {
            Ok(membership) => Ok(membership),
            Err(RepositoryError::AlreadyExists) => {
                // Slug taken. Either a concurrent resolution for this user
                // already committed (first one wins), or the slug belongs to
                // an unrelated organization.
                if let Some(membership) = self
                    .organizations
                    .most_recent_membership(user.id)
                    .await
                    .map_err(store_error)?
                {
                    return Ok(membership);
                }

                let suffixed = format!("{}-{}", base_slug, random_suffix());
                self.create_default(user, &name, suffixed)
                    .await
                    .map_err(|e| ResolveError::ProvisioningFailed(e.to_string()))
            }
            Err(e) => Err(ResolveError::ProvisioningFailed(e.to_string())),
        }
    }

    async fn create_default(
        &self,
        user: &User,
        name: &str,
        slug: String,
    ) -> Result<Membership, RepositoryError> {
        let (_org, membership) = self
            .organizations
            .create(
                CreateOrganizationRequest {
                    name: name.to_string(),
                    slug: Some(slug),
                    logo: None,
                },
                user.id,
            )
            .await?;
        Ok(membership)
    }
}

fn random_suffix() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..6)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organization::ports::MemberRole;
    use crate::test_support::{test_user, InMemoryOrganizationRepository};
    use uuid::Uuid;

    fn resolver() -> (ActiveOrgResolver, Arc<InMemoryOrganizationRepository>) {
        let repo = Arc::new(InMemoryOrganizationRepository::new());
        (ActiveOrgResolver::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn test_provisions_on_first_login() {
        let (resolver, repo) = resolver();
        let user = test_user("jane@example.com", Some("Jane Doe"));

        let resolution = resolver.resolve(&user, None).await.unwrap();
        assert_eq!(resolution.via, ResolvedVia::Provisioned);
        assert_eq!(resolution.context.roles, vec![MemberRole::Admin]);

        let org = repo
            .get_by_id(resolution.context.org_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(org.name, "Jane Doe");
        assert_eq!(org.slug, "jane-doe");
        assert!(resolution.preference_changed(None));
    }

    #[tokio::test]
    async fn test_provisioning_happens_once() {
        let (resolver, repo) = resolver();
        let user = test_user("jane@example.com", Some("Jane Doe"));

        let first = resolver.resolve(&user, None).await.unwrap();
        let second = resolver.resolve(&user, None).await.unwrap();

        assert_eq!(second.via, ResolvedVia::MostRecent);
        assert_eq!(first.context.org_id, second.context.org_id);
        assert_eq!(repo.count_memberships_for_user(user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_provision_survives_slug_collision() {
        let (resolver, repo) = resolver();
        let other = test_user("other@example.com", Some("Jane Doe"));
        // An unrelated user already owns the "jane-doe" slug
        resolver.resolve(&other, None).await.unwrap();

        let user = test_user("jane@example.com", Some("Jane Doe"));
        let resolution = resolver.resolve(&user, None).await.unwrap();
        assert_eq!(resolution.via, ResolvedVia::Provisioned);

        let org = repo
            .get_by_id(resolution.context.org_id)
            .await
            .unwrap()
            .unwrap();
        assert!(org.slug.starts_with("jane-doe-"));
    }

    #[tokio::test]
    async fn test_valid_preference_wins() {
        let (resolver, repo) = resolver();
        let user = test_user("jane@example.com", None);

        let first = resolver.resolve(&user, None).await.unwrap();
        let (second_org, _) = repo
            .create(
                CreateOrganizationRequest {
                    name: "Second".to_string(),
                    slug: Some("second".to_string()),
                    logo: None,
                },
                user.id,
            )
            .await
            .unwrap();

        // Without a preference, the newest membership wins
        let resolution = resolver.resolve(&user, None).await.unwrap();
        assert_eq!(resolution.context.org_id, second_org.id);

        // With a preference, the preference wins
        let resolution = resolver
            .resolve(&user, Some(first.context.org_id))
            .await
            .unwrap();
        assert_eq!(resolution.via, ResolvedVia::Preference);
        assert_eq!(resolution.context.org_id, first.context.org_id);
        assert!(!resolution.preference_changed(Some(first.context.org_id)));
    }

    #[tokio::test]
    async fn test_stale_preference_falls_back() {
        let (resolver, _repo) = resolver();
        let user = test_user("jane@example.com", None);

        let first = resolver.resolve(&user, None).await.unwrap();
        let stale = OrganizationId(Uuid::new_v4());

        let resolution = resolver.resolve(&user, Some(stale)).await.unwrap();
        assert_eq!(resolution.via, ResolvedVia::MostRecent);
        assert_eq!(resolution.context.org_id, first.context.org_id);
        assert!(resolution.preference_changed(Some(stale)));
    }
}

use crate::pool::DbPool;
use crate::repositories::utils::{map_db_error, parse_role};
use crate::retry_db;
use anyhow::Context;
use chrono::Utc;
use services::auth::UserId;
use services::common::RepositoryError;
use services::organization::ports::{
    CreateOrganizationRequest, MemberRole, Membership, MembershipId, MembershipWithUser,
    Organization, OrganizationId, OrganizationRepository, OrganizationWithRole,
    UpdateOrganizationRequest,
};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

pub struct PgOrganizationRepository {
    pool: DbPool,
}

impl PgOrganizationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_organization(row: &tokio_postgres::Row) -> Organization {
        Organization {
            id: OrganizationId(row.get("id")),
            name: row.get("name"),
            slug: row.get("slug"),
            logo: row.get("logo"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn row_to_membership(row: &tokio_postgres::Row) -> Result<Membership, RepositoryError> {
        let role: String = row.get("role");
        Ok(Membership {
            id: MembershipId(row.get("id")),
            organization_id: OrganizationId(row.get("organization_id")),
            user_id: UserId(row.get("user_id")),
            role: parse_role(&role)?,
            created_at: row.get("created_at"),
        })
    }

    /// Lock the organization's admin memberships and return how many there
    /// are. Callers hold the locks until their transaction ends, so the
    /// count stays true while they mutate.
    async fn lock_admin_rows(
        transaction: &tokio_postgres::Transaction<'_>,
        organization_id: OrganizationId,
    ) -> Result<i64, RepositoryError> {
        let rows = transaction
            .query(
                "SELECT id FROM organization_members
                 WHERE organization_id = $1 AND role = 'admin'
                 FOR UPDATE",
                &[&organization_id.0],
            )
            .await
            .map_err(map_db_error)?;
        Ok(rows.len() as i64)
    }
}

#[async_trait]
impl OrganizationRepository for PgOrganizationRepository {
    async fn create(
        &self,
        request: CreateOrganizationRequest,
        creator: UserId,
    ) -> Result<(Organization, Membership), RepositoryError> {
        let slug = request
            .slug
            .clone()
            .ok_or_else(|| RepositoryError::RequiredFieldMissing("slug".to_string()))?;

        retry_db!("create_organization", {
            let mut client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            let transaction = client
                .transaction()
                .await
                .map_err(map_db_error)?;

            let org_id = Uuid::new_v4();
            let now = Utc::now();

            let org_row = transaction
                .query_one(
                    "INSERT INTO organizations (id, name, slug, logo, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $5)
                     RETURNING id, name, slug, logo, created_at, updated_at",
                    &[&org_id, &request.name, &slug, &request.logo, &now],
                )
                .await
                .map_err(map_db_error)?;

            let member_row = transaction
                .query_one(
                    "INSERT INTO organization_members (id, organization_id, user_id, role, created_at)
                     VALUES ($1, $2, $3, 'admin', $4)
                     RETURNING id, organization_id, user_id, role, created_at",
                    &[&Uuid::new_v4(), &org_id, &creator.0, &now],
                )
                .await
                .map_err(map_db_error)?;

            transaction.commit().await.map_err(map_db_error)?;

            debug!("Created organization {} with admin {}", org_id, creator);
            Ok((
                Self::row_to_organization(&org_row),
                Self::row_to_membership(&member_row)?,
            ))
        })
    }

    async fn get_by_id(&self, id: OrganizationId) -> Result<Option<Organization>, RepositoryError> {
        let row = retry_db!("get_organization_by_id", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query_opt(
                    "SELECT id, name, slug, logo, created_at, updated_at
                     FROM organizations WHERE id = $1",
                    &[&id.0],
                )
                .await
                .map_err(map_db_error)
        })?;

        Ok(row.as_ref().map(Self::row_to_organization))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Organization>, RepositoryError> {
        let row = retry_db!("get_organization_by_slug", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query_opt(
                    "SELECT id, name, slug, logo, created_at, updated_at
                     FROM organizations WHERE slug = $1",
                    &[&slug],
                )
                .await
                .map_err(map_db_error)
        })?;

        Ok(row.as_ref().map(Self::row_to_organization))
    }

    async fn update(
        &self,
        id: OrganizationId,
        request: UpdateOrganizationRequest,
    ) -> Result<Organization, RepositoryError> {
        let row = retry_db!("update_organization", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query_opt(
                    "UPDATE organizations
                     SET name = COALESCE($2, name),
                         slug = COALESCE($3, slug),
                         logo = COALESCE($4, logo),
                         updated_at = NOW()
                     WHERE id = $1
                     RETURNING id, name, slug, logo, created_at, updated_at",
                    &[&id.0, &request.name, &request.slug, &request.logo],
                )
                .await
                .map_err(map_db_error)
        })?;

        match row {
            Some(row) => Ok(Self::row_to_organization(&row)),
            None => Err(RepositoryError::NotFound("organization".to_string())),
        }
    }

    async fn delete(&self, id: OrganizationId) -> Result<bool, RepositoryError> {
        let rows_affected = retry_db!("delete_organization", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            // Memberships and invitations cascade with the organization
            client
                .execute("DELETE FROM organizations WHERE id = $1", &[&id.0])
                .await
                .map_err(map_db_error)
        })?;

        Ok(rows_affected > 0)
    }

    async fn get_member(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<Membership>, RepositoryError> {
        let row = retry_db!("get_organization_member", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query_opt(
                    "SELECT id, organization_id, user_id, role, created_at
                     FROM organization_members
                     WHERE organization_id = $1 AND user_id = $2",
                    &[&organization_id.0, &user_id.0],
                )
                .await
                .map_err(map_db_error)
        })?;

        row.as_ref().map(Self::row_to_membership).transpose()
    }

    async fn get_member_by_id(
        &self,
        organization_id: OrganizationId,
        member_id: MembershipId,
    ) -> Result<Option<Membership>, RepositoryError> {
        let row = retry_db!("get_organization_member_by_id", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query_opt(
                    "SELECT id, organization_id, user_id, role, created_at
                     FROM organization_members
                     WHERE id = $1 AND organization_id = $2",
                    &[&member_id.0, &organization_id.0],
                )
                .await
                .map_err(map_db_error)
        })?;

        row.as_ref().map(Self::row_to_membership).transpose()
    }

    async fn add_member(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: MemberRole,
    ) -> Result<Membership, RepositoryError> {
        let row = retry_db!("add_organization_member", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query_one(
                    "INSERT INTO organization_members (id, organization_id, user_id, role, created_at)
                     VALUES ($1, $2, $3, $4, NOW())
                     RETURNING id, organization_id, user_id, role, created_at",
                    &[
                        &Uuid::new_v4(),
                        &organization_id.0,
                        &user_id.0,
                        &role.as_str(),
                    ],
                )
                .await
                .map_err(map_db_error)
        })?;

        debug!(
            "Added member {} to organization {} as {}",
            user_id, organization_id, role
        );
        Self::row_to_membership(&row)
    }

    async fn update_member_role(
        &self,
        organization_id: OrganizationId,
        member_id: MembershipId,
        role: MemberRole,
    ) -> Result<Membership, RepositoryError> {
        retry_db!("update_organization_member_role", {
            let mut client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            let transaction = client.transaction().await.map_err(map_db_error)?;

            let target = transaction
                .query_opt(
                    "SELECT id, organization_id, user_id, role, created_at
                     FROM organization_members
                     WHERE id = $1 AND organization_id = $2
                     FOR UPDATE",
                    &[&member_id.0, &organization_id.0],
                )
                .await
                .map_err(map_db_error)?
                .ok_or_else(|| RepositoryError::NotFound("organization member".to_string()))?;

            let current = Self::row_to_membership(&target)?;

            // Last-admin re-check inside the transaction: demoting the only
            // admin would leave the organization without one
            if current.role == MemberRole::Admin && role != MemberRole::Admin {
                let admins = Self::lock_admin_rows(&transaction, organization_id).await?;
                if admins <= 1 {
                    return Err(RepositoryError::ValidationFailed(
                        "organization would be left without an admin".to_string(),
                    ));
                }
            }

            let row = transaction
                .query_one(
                    "UPDATE organization_members SET role = $2
                     WHERE id = $1
                     RETURNING id, organization_id, user_id, role, created_at",
                    &[&member_id.0, &role.as_str()],
                )
                .await
                .map_err(map_db_error)?;

            transaction.commit().await.map_err(map_db_error)?;
            Self::row_to_membership(&row)
        })
    }

    async fn remove_member(
        &self,
        organization_id: OrganizationId,
        member_id: MembershipId,
    ) -> Result<bool, RepositoryError> {
        retry_db!("remove_organization_member", {
            let mut client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            let transaction = client.transaction().await.map_err(map_db_error)?;

            let Some(target) = transaction
                .query_opt(
                    "SELECT id, organization_id, user_id, role, created_at
                     FROM organization_members
                     WHERE id = $1 AND organization_id = $2
                     FOR UPDATE",
                    &[&member_id.0, &organization_id.0],
                )
                .await
                .map_err(map_db_error)?
            else {
                return Ok(false);
            };

            let current = Self::row_to_membership(&target)?;

            if current.role == MemberRole::Admin {
                let admins = Self::lock_admin_rows(&transaction, organization_id).await?;
                if admins <= 1 {
                    return Err(RepositoryError::ValidationFailed(
                        "organization would be left without an admin".to_string(),
                    ));
                }
            }

            let rows_affected = transaction
                .execute(
                    "DELETE FROM organization_members WHERE id = $1",
                    &[&member_id.0],
                )
                .await
                .map_err(map_db_error)?;

            transaction.commit().await.map_err(map_db_error)?;
            Ok(rows_affected > 0)
        })
    }

    async fn list_members(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<MembershipWithUser>, RepositoryError> {
        let rows = retry_db!("list_organization_members", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query(
                    "SELECT m.id, m.organization_id, m.user_id, m.role, m.created_at,
                            u.email, u.display_name
                     FROM organization_members m
                     JOIN users u ON u.id = m.user_id
                     WHERE m.organization_id = $1
                     ORDER BY m.created_at ASC",
                    &[&organization_id.0],
                )
                .await
                .map_err(map_db_error)
        })?;

        rows.iter()
            .map(|row| {
                Ok(MembershipWithUser {
                    membership: Self::row_to_membership(row)?,
                    email: row.get("email"),
                    display_name: row.get("display_name"),
                })
            })
            .collect()
    }

    async fn admin_count(&self, organization_id: OrganizationId) -> Result<i64, RepositoryError> {
        let row = retry_db!("organization_admin_count", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query_one(
                    "SELECT COUNT(*) AS count FROM organization_members
                     WHERE organization_id = $1 AND role = 'admin'",
                    &[&organization_id.0],
                )
                .await
                .map_err(map_db_error)
        })?;

        Ok(row.get("count"))
    }

    async fn list_organizations_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrganizationWithRole>, RepositoryError> {
        let rows = retry_db!("list_organizations_by_user", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query(
                    "SELECT o.id, o.name, o.slug, o.logo, o.created_at, o.updated_at, m.role
                     FROM organizations o
                     JOIN organization_members m ON m.organization_id = o.id
                     WHERE m.user_id = $1
                     ORDER BY m.created_at DESC",
                    &[&user_id.0],
                )
                .await
                .map_err(map_db_error)
        })?;

        rows.iter()
            .map(|row| {
                let role: String = row.get("role");
                Ok(OrganizationWithRole {
                    organization: Self::row_to_organization(row),
                    role: parse_role(&role)?,
                })
            })
            .collect()
    }

    async fn count_memberships_for_user(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let row = retry_db!("count_memberships_for_user", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query_one(
                    "SELECT COUNT(*) AS count FROM organization_members WHERE user_id = $1",
                    &[&user_id.0],
                )
                .await
                .map_err(map_db_error)
        })?;

        Ok(row.get("count"))
    }

    async fn most_recent_membership(
        &self,
        user_id: UserId,
    ) -> Result<Option<Membership>, RepositoryError> {
        let row = retry_db!("most_recent_membership", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query_opt(
                    "SELECT id, organization_id, user_id, role, created_at
                     FROM organization_members
                     WHERE user_id = $1
                     ORDER BY created_at DESC
                     LIMIT 1",
                    &[&user_id.0],
                )
                .await
                .map_err(map_db_error)
        })?;

        row.as_ref().map(Self::row_to_membership).transpose()
    }
}

use crate::pool::DbPool;
use crate::repositories::utils::{map_db_error, parse_role, parse_status};
use crate::retry_db;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use services::auth::UserId;
use services::common::{generate_invitation_token, RepositoryError};
use services::invitation::ports::{
    CreateInvitationRequest, Invitation, InvitationRepository, InvitationWithNames,
};
use services::organization::ports::{Membership, MembershipId, OrganizationId};
use tracing::debug;
use uuid::Uuid;

pub struct PgInvitationRepository {
    pool: DbPool,
}

impl PgInvitationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_invitation(row: &tokio_postgres::Row) -> Result<Invitation, RepositoryError> {
        let role: String = row.get("role");
        let status: String = row.get("status");
        Ok(Invitation {
            id: row.get("id"),
            organization_id: OrganizationId(row.get("organization_id")),
            email: row.get("email"),
            role: parse_role(&role)?,
            invited_by: UserId(row.get("invited_by_user_id")),
            token: row.get("token"),
            status: parse_status(&status)?,
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
            accepted_at: row.get("accepted_at"),
        })
    }

    fn row_to_invitation_with_names(
        row: &tokio_postgres::Row,
    ) -> Result<InvitationWithNames, RepositoryError> {
        let inviter_email: String = row.get("inviter_email");
        let inviter_display_name: Option<String> = row.get("inviter_display_name");
        let inviter_name = inviter_display_name.or_else(|| {
            inviter_email
                .split('@')
                .next()
                .map(|local| local.to_string())
        });

        Ok(InvitationWithNames {
            invitation: Self::row_to_invitation(row)?,
            organization_name: row.get("organization_name"),
            inviter_name,
        })
    }
}

const INVITATION_COLUMNS: &str = "i.id, i.organization_id, i.email, i.role, i.invited_by_user_id,
     i.token, i.status, i.created_at, i.expires_at, i.accepted_at";

#[async_trait]
impl InvitationRepository for PgInvitationRepository {
    async fn create(
        &self,
        organization_id: OrganizationId,
        request: CreateInvitationRequest,
        invited_by: UserId,
    ) -> Result<Invitation, RepositoryError> {
        let token = generate_invitation_token();
        let expires_at = Utc::now() + Duration::days(request.expires_in_days);

        debug!(
            "Creating invitation for {} to organization {} with role {}",
            request.email, organization_id, request.role
        );

        let row = retry_db!("create_invitation", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query_one(
                    "INSERT INTO organization_invitations
                     (organization_id, email, role, invited_by_user_id, token, expires_at)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     RETURNING id, organization_id, email, role, invited_by_user_id,
                               token, status, created_at, expires_at, accepted_at",
                    &[
                        &organization_id.0,
                        &request.email,
                        &request.role.as_str(),
                        &invited_by.0,
                        &token,
                        &expires_at,
                    ],
                )
                .await
                .map_err(map_db_error)
        })?;

        Self::row_to_invitation(&row)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Invitation>, RepositoryError> {
        let row = retry_db!("get_invitation_by_id", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query_opt(
                    &format!(
                        "SELECT {INVITATION_COLUMNS} FROM organization_invitations i WHERE i.id = $1"
                    ),
                    &[&id],
                )
                .await
                .map_err(map_db_error)
        })?;

        row.as_ref().map(Self::row_to_invitation).transpose()
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Invitation>, RepositoryError> {
        let row = retry_db!("get_invitation_by_token", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query_opt(
                    &format!(
                        "SELECT {INVITATION_COLUMNS} FROM organization_invitations i WHERE i.token = $1"
                    ),
                    &[&token],
                )
                .await
                .map_err(map_db_error)
        })?;

        row.as_ref().map(Self::row_to_invitation).transpose()
    }

    async fn find_pending(
        &self,
        organization_id: OrganizationId,
        email: &str,
    ) -> Result<Option<Invitation>, RepositoryError> {
        let row = retry_db!("find_pending_invitation", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query_opt(
                    &format!(
                        "SELECT {INVITATION_COLUMNS} FROM organization_invitations i
                         WHERE i.organization_id = $1 AND i.email = $2 AND i.status = 'pending'"
                    ),
                    &[&organization_id.0, &email],
                )
                .await
                .map_err(map_db_error)
        })?;

        row.as_ref().map(Self::row_to_invitation).transpose()
    }

    async fn accept(
        &self,
        id: Uuid,
        user_id: UserId,
    ) -> Result<(Invitation, Membership), RepositoryError> {
        retry_db!("accept_invitation", {
            let mut client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            let transaction = client.transaction().await.map_err(map_db_error)?;

            // Conditional transition: only one concurrent accept can match
            // the pending row, the rest observe a terminal status
            let invitation_row = transaction
                .query_opt(
                    "UPDATE organization_invitations
                     SET status = 'accepted', accepted_at = NOW()
                     WHERE id = $1 AND status = 'pending'
                     RETURNING id, organization_id, email, role, invited_by_user_id,
                               token, status, created_at, expires_at, accepted_at",
                    &[&id],
                )
                .await
                .map_err(map_db_error)?
                .ok_or_else(|| RepositoryError::NotFound("pending invitation".to_string()))?;

            let invitation = Self::row_to_invitation(&invitation_row)?;

            let member_row = transaction
                .query_one(
                    "INSERT INTO organization_members (id, organization_id, user_id, role, created_at)
                     VALUES ($1, $2, $3, $4, NOW())
                     RETURNING id, organization_id, user_id, role, created_at",
                    &[
                        &Uuid::new_v4(),
                        &invitation.organization_id.0,
                        &user_id.0,
                        &invitation.role.as_str(),
                    ],
                )
                .await
                .map_err(map_db_error)?;

            let role: String = member_row.get("role");
            let membership = Membership {
                id: MembershipId(member_row.get("id")),
                organization_id: OrganizationId(member_row.get("organization_id")),
                user_id: UserId(member_row.get("user_id")),
                role: parse_role(&role)?,
                created_at: member_row.get("created_at"),
            };

            transaction.commit().await.map_err(map_db_error)?;

            debug!("Invitation {} accepted by user {}", id, user_id);
            Ok((invitation, membership))
        })
    }

    async fn expire(&self, id: Uuid) -> Result<Option<Invitation>, RepositoryError> {
        let row = retry_db!("expire_invitation", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query_opt(
                    "UPDATE organization_invitations
                     SET status = 'expired'
                     WHERE id = $1 AND status = 'pending'
                     RETURNING id, organization_id, email, role, invited_by_user_id,
                               token, status, created_at, expires_at, accepted_at",
                    &[&id],
                )
                .await
                .map_err(map_db_error)
        })?;

        row.as_ref().map(Self::row_to_invitation).transpose()
    }

    async fn list_pending_by_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<InvitationWithNames>, RepositoryError> {
        let rows = retry_db!("list_pending_invitations_by_org", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query(
                    &format!(
                        "SELECT {INVITATION_COLUMNS}, o.name AS organization_name,
                                u.email AS inviter_email, u.display_name AS inviter_display_name
                         FROM organization_invitations i
                         JOIN organizations o ON o.id = i.organization_id
                         JOIN users u ON u.id = i.invited_by_user_id
                         WHERE i.organization_id = $1 AND i.status = 'pending'
                         ORDER BY i.created_at DESC"
                    ),
                    &[&organization_id.0],
                )
                .await
                .map_err(map_db_error)
        })?;

        rows.iter().map(Self::row_to_invitation_with_names).collect()
    }

    async fn list_pending_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<InvitationWithNames>, RepositoryError> {
        let rows = retry_db!("list_pending_invitations_by_email", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .query(
                    &format!(
                        "SELECT {INVITATION_COLUMNS}, o.name AS organization_name,
                                u.email AS inviter_email, u.display_name AS inviter_display_name
                         FROM organization_invitations i
                         JOIN organizations o ON o.id = i.organization_id
                         JOIN users u ON u.id = i.invited_by_user_id
                         WHERE i.email = $1 AND i.status = 'pending'
                         ORDER BY i.created_at DESC"
                    ),
                    &[&email],
                )
                .await
                .map_err(map_db_error)
        })?;

        rows.iter().map(Self::row_to_invitation_with_names).collect()
    }

    async fn mark_lapsed_for_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<u64, RepositoryError> {
        let rows_affected = retry_db!("mark_lapsed_invitations_for_org", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .execute(
                    "UPDATE organization_invitations
                     SET status = 'expired'
                     WHERE organization_id = $1 AND status = 'pending' AND expires_at < NOW()",
                    &[&organization_id.0],
                )
                .await
                .map_err(map_db_error)
        })?;

        Ok(rows_affected)
    }

    async fn mark_lapsed_for_email(&self, email: &str) -> Result<u64, RepositoryError> {
        let rows_affected = retry_db!("mark_lapsed_invitations_for_email", {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get database connection")
                .map_err(RepositoryError::PoolError)?;

            client
                .execute(
                    "UPDATE organization_invitations
                     SET status = 'expired'
                     WHERE email = $1 AND status = 'pending' AND expires_at < NOW()",
                    &[&email],
                )
                .await
                .map_err(map_db_error)
        })?;

        Ok(rows_affected)
    }
}

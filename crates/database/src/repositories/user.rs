use crate::pool::DbPool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use services::auth::{User, UserId, UserRepository};
use tracing::debug;

pub struct PgUserRepository {
    pool: DbPool,
}

impl PgUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: tokio_postgres::Row) -> User {
        User {
            id: UserId(row.get("id")),
            email: row.get("email"),
            display_name: row.get("display_name"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_opt(
                "SELECT id, email, display_name, created_at, updated_at
                 FROM users WHERE id = $1",
                &[&id.0],
            )
            .await
            .context("Failed to query user")?;

        Ok(row.map(Self::row_to_user))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_opt(
                "SELECT id, email, display_name, created_at, updated_at
                 FROM users WHERE email = $1",
                &[&email],
            )
            .await
            .context("Failed to query user by email")?;

        Ok(row.map(Self::row_to_user))
    }

    async fn update_display_name(
        &self,
        id: UserId,
        display_name: Option<String>,
    ) -> Result<Option<User>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_opt(
                "UPDATE users
                 SET display_name = $2, updated_at = NOW()
                 WHERE id = $1
                 RETURNING id, email, display_name, created_at, updated_at",
                &[&id.0, &display_name],
            )
            .await
            .context("Failed to update user display name")?;

        debug!("Updated display name for user {}", id);
        Ok(row.map(Self::row_to_user))
    }
}

use crate::pool::DbPool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use services::auth::{SessionRepository, User, UserId};

pub struct PgSessionRepository {
    pool: DbPool,
}

impl PgSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn get_user_by_token_hash(&self, token_hash: &str) -> Result<Option<User>> {
        let client = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let row = client
            .query_opt(
                "SELECT u.id, u.email, u.display_name, u.created_at, u.updated_at
                 FROM sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = $1 AND s.expires_at > NOW()",
                &[&token_hash],
            )
            .await
            .context("Failed to query session")?;

        Ok(row.map(|row| User {
            id: UserId(row.get("id")),
            email: row.get("email"),
            display_name: row.get("display_name"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }
}

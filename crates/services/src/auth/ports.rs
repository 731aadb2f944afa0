use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        UserId(uuid)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user as the identity provider exposes it. Accounts are created by the
/// identity provider; only the display name is mutable from this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Best available human-readable name for this user
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .unwrap_or_else(|| self.email.split('@').next().unwrap_or(&self.email))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid or missing session token")]
    Unauthenticated,

    #[error("User not found")]
    UserNotFound,

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_id(&self, id: UserId) -> anyhow::Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn update_display_name(
        &self,
        id: UserId,
        display_name: Option<String>,
    ) -> anyhow::Result<Option<User>>;
}

/// Session lookup against the identity provider's session store. Tokens are
/// presented opaque and matched against their stored hash.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get_user_by_token_hash(&self, token_hash: &str) -> anyhow::Result<Option<User>>;
}

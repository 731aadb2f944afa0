pub mod ports;

pub use ports::*;

use crate::common::hash_token;
use std::sync::Arc;
use tracing::debug;

/// Thin facade over the identity provider: validates an opaque session token
/// and yields the user it belongs to. Credential and session issuance
/// machinery lives with the provider, not here.
pub struct AuthService {
    sessions: Arc<dyn SessionRepository>,
    users: Arc<dyn UserRepository>,
}

impl AuthService {
    pub fn new(sessions: Arc<dyn SessionRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { sessions, users }
    }

    /// Authenticate a bearer session token
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        if token.is_empty() {
            return Err(AuthError::Unauthenticated);
        }

        let user = self
            .sessions
            .get_user_by_token_hash(&hash_token(token))
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to look up session: {}", e)))?
            .ok_or(AuthError::Unauthenticated)?;

        debug!("Authenticated user: {}", user.id);
        Ok(user)
    }

    /// Fetch a user by id
    pub async fn get_user(&self, id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(id)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to get user: {}", e)))?
            .ok_or(AuthError::UserNotFound)
    }

    /// Update the caller's display name, the one user field this subsystem owns
    pub async fn update_display_name(
        &self,
        id: UserId,
        display_name: Option<String>,
    ) -> Result<User, AuthError> {
        self.users
            .update_display_name(id, display_name)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to update user: {}", e)))?
            .ok_or(AuthError::UserNotFound)
    }
}

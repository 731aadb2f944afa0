pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, DbPool};
pub use repositories::{
    PgInvitationRepository, PgOrganizationRepository, PgSessionRepository, PgUserRepository,
};

use anyhow::Result;

/// Database service combining all repositories
pub struct Database {
    pub users: PgUserRepository,
    pub sessions: PgSessionRepository,
    pub organizations: PgOrganizationRepository,
    pub invitations: PgInvitationRepository,
    pool: DbPool,
}

impl Database {
    /// Create a new database service from a connection pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            users: PgUserRepository::new(pool.clone()),
            sessions: PgSessionRepository::new(pool.clone()),
            organizations: PgOrganizationRepository::new(pool.clone()),
            invitations: PgInvitationRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new database service from configuration
    pub async fn from_config(config: &config::DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run(&self.pool).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

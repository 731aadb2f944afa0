pub mod consts;
pub mod conversions;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod routes;

pub use routes::api::{build_router, AppState};

use database::Database;
use services::auth::{SessionRepository, UserRepository};
use services::email::{ConsoleMailer, Mailer, SmtpMailer};
use services::invitation::InvitationRepository;
use services::organization::OrganizationRepository;
use services::{ActiveOrgResolver, AuthService, InvitationService, OrganizationService};
use std::sync::Arc;

/// Initialize database connection and run migrations
pub async fn init_database(db_config: &config::DatabaseConfig) -> Arc<Database> {
    let database = Arc::new(
        Database::from_config(db_config)
            .await
            .expect("Failed to connect to database"),
    );

    tracing::info!("Starting database migrations...");
    database
        .run_migrations()
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations completed.");

    database
}

/// Build the mailer from configuration: SMTP when configured, console
/// logging otherwise
pub fn init_mailer(config: &config::ApiConfig) -> Arc<dyn Mailer> {
    if config.email.smtp_enabled() {
        match SmtpMailer::from_config(&config.email) {
            Ok(mailer) => {
                tracing::info!("SMTP mailer configured");
                return Arc::new(mailer);
            }
            Err(e) => {
                tracing::error!("Failed to configure SMTP mailer, falling back to console: {}", e);
            }
        }
    }
    tracing::info!("Using console mailer");
    Arc::new(ConsoleMailer::new())
}

/// Wire repositories and services into the application state
pub fn init_services(database: Arc<Database>, config: Arc<config::ApiConfig>) -> AppState {
    let pool = database.pool().clone();

    let user_repository =
        Arc::new(database::PgUserRepository::new(pool.clone())) as Arc<dyn UserRepository>;
    let session_repository =
        Arc::new(database::PgSessionRepository::new(pool.clone())) as Arc<dyn SessionRepository>;
    let organization_repository = Arc::new(database::PgOrganizationRepository::new(pool.clone()))
        as Arc<dyn OrganizationRepository>;
    let invitation_repository =
        Arc::new(database::PgInvitationRepository::new(pool)) as Arc<dyn InvitationRepository>;

    let mailer = init_mailer(&config);

    AppState {
        auth_service: Arc::new(AuthService::new(session_repository, user_repository.clone())),
        resolver: Arc::new(ActiveOrgResolver::new(organization_repository.clone())),
        organization_service: Arc::new(OrganizationService::new(organization_repository.clone())),
        invitation_service: Arc::new(InvitationService::new(
            invitation_repository,
            organization_repository,
            user_repository,
            mailer,
            config.invitations.clone(),
        )),
        config,
    }
}

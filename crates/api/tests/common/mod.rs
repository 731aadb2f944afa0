//! Shared harness for API tests: the real router and services wired to
//! in-memory repositories.
#![allow(dead_code)]

use api::{build_router, AppState};
use axum_test::TestServer;
use services::test_support::{
    InMemoryInvitationRepository, InMemoryOrganizationRepository, InMemorySessionRepository,
    InMemoryUserRepository, RecordingMailer,
};
use services::{ActiveOrgResolver, AuthService, InvitationService, OrganizationService};
use std::sync::Arc;

pub struct TestApp {
    pub server: TestServer,
    pub users: Arc<InMemoryUserRepository>,
    pub sessions: Arc<InMemorySessionRepository>,
    pub organizations: Arc<InMemoryOrganizationRepository>,
    pub invitations: Arc<InMemoryInvitationRepository>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn spawn_app() -> TestApp {
    let users = Arc::new(InMemoryUserRepository::new());
    let sessions = Arc::new(InMemorySessionRepository::new());
    let organizations = Arc::new(InMemoryOrganizationRepository::with_users(users.clone()));
    let invitations = Arc::new(InMemoryInvitationRepository::new(
        organizations.clone(),
        users.clone(),
    ));
    let mailer = Arc::new(RecordingMailer::new());
    let config = Arc::new(config::ApiConfig::default());

    let state = AppState {
        auth_service: Arc::new(AuthService::new(sessions.clone(), users.clone())),
        resolver: Arc::new(ActiveOrgResolver::new(organizations.clone())),
        organization_service: Arc::new(OrganizationService::new(organizations.clone())),
        invitation_service: Arc::new(InvitationService::new(
            invitations.clone(),
            organizations.clone(),
            users.clone(),
            mailer.clone(),
            config.invitations.clone(),
        )),
        config,
    };

    let server = TestServer::new(build_router(state)).expect("failed to start test server");

    TestApp {
        server,
        users,
        sessions,
        organizations,
        invitations,
        mailer,
    }
}

impl TestApp {
    /// Register a user with the identity provider and give them a session
    pub fn seed_user(
        &self,
        email: &str,
        display_name: Option<&str>,
        token: &str,
    ) -> services::auth::User {
        let user = self.users.seed_user(email, display_name);
        self.sessions.seed_session(token, &user);
        user
    }
}

/// Pull the invitation token out of a recorded invitation email
pub fn extract_invitation_token(email_text: &str) -> String {
    let start = email_text
        .find("token=")
        .expect("invitation email carries no token")
        + "token=".len();
    email_text[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect()
}

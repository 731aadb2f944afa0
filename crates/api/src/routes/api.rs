use crate::middleware::auth_middleware;
use crate::routes::{health, invitations, organization_members, organizations, users};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use services::{ActiveOrgResolver, AuthService, InvitationService, OrganizationService};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub resolver: Arc<ActiveOrgResolver>,
    pub organization_service: Arc<OrganizationService>,
    pub invitation_service: Arc<InvitationService>,
    pub config: Arc<config::ApiConfig>,
}

/// Build the full application router under the `/v1` prefix
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/invitations/lookup", get(invitations::lookup_invitation))
        .route("/openapi.json", get(crate::openapi::openapi_json));

    let protected = Router::new()
        .route(
            "/organizations",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route("/organizations/switch", post(organizations::switch_organization))
        .route("/organizations/leave", post(organizations::leave_organization))
        .route(
            "/organizations/{org_id}",
            get(organizations::get_organization)
                .patch(organizations::update_organization)
                .delete(organizations::delete_organization),
        )
        .route(
            "/organizations/{org_id}/members",
            get(organization_members::list_members)
                .post(organization_members::invite_member)
                .patch(organization_members::update_member_role)
                .delete(organization_members::remove_member),
        )
        .route(
            "/organizations/{org_id}/invitations",
            get(invitations::list_organization_invitations)
                .delete(invitations::cancel_invitation),
        )
        .route("/invitations/accept", post(invitations::accept_invitation))
        .route("/invitations/user", get(invitations::list_user_invitations))
        .route(
            "/users/me",
            get(users::current_user).patch(users::update_current_user),
        )
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/v1", public.merge(protected))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

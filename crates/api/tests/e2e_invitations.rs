// E2E tests for the invitation lifecycle: create, lookup, accept, cancel,
// expiry, and the terminal-state rules.
mod common;

use api::models::{
    AcceptInvitationResponse, InvitationPreviewResponse, InviteMemberResponse,
    ListInvitationsResponse, ListUserInvitationsResponse, OrganizationResponse,
};
use axum::http::StatusCode;
use common::{extract_invitation_token, spawn_app};
use serde_json::json;
use services::invitation::CreateInvitationRequest;
use services::invitation::InvitationRepository;
use services::organization::{MemberRole, OrganizationId};

async fn create_org(app: &common::TestApp, token: &str, name: &str) -> OrganizationResponse {
    app.server
        .post("/v1/organizations")
        .authorization_bearer(token)
        .json(&json!({"name": name}))
        .await
        .json()
}

async fn invite(
    app: &common::TestApp,
    token: &str,
    org_id: uuid::Uuid,
    email: &str,
) -> InviteMemberResponse {
    app.server
        .post(&format!("/v1/organizations/{}/members", org_id))
        .authorization_bearer(token)
        .json(&json!({"email": email, "role": "user"}))
        .await
        .json()
}

#[tokio::test]
async fn test_full_invitation_flow() {
    let app = spawn_app();
    app.seed_user("admin@example.com", Some("Ada Admin"), "tok-admin");
    let org = create_org(&app, "tok-admin", "Acme").await;

    // Invite an email with no account: invitation + email dispatch
    let body = invite(&app, "tok-admin", org.id, "bob@x.com").await;
    assert_eq!(body.outcome, "invitation_sent");
    let invitation = body.invitation.expect("invitation in response");
    assert_eq!(invitation.status, "pending");

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "bob@x.com");
    let token = extract_invitation_token(sent[0].text.as_deref().unwrap());

    // Public lookup shows the preview, never the token
    let response = app
        .server
        .get(&format!("/v1/invitations/lookup?token={}", token))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let preview: InvitationPreviewResponse = response.json();
    assert_eq!(preview.organization_name, "Acme");
    assert_eq!(preview.email, "bob@x.com");
    assert_eq!(preview.role, api::models::ApiRole::User);
    assert_eq!(preview.status, "pending");
    assert!(!response.text().contains(&token));

    // Bob signs up with the invited address and accepts
    app.seed_user("bob@x.com", Some("Bob"), "tok-bob");
    let response = app
        .server
        .post("/v1/invitations/accept")
        .authorization_bearer("tok-bob")
        .json(&json!({"token": token}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let accepted: AcceptInvitationResponse = response.json();
    assert_eq!(accepted.organization.id, org.id);
    assert_eq!(accepted.membership.role, api::models::ApiRole::User);

    // The invitation is terminal now; a second accept fails
    let response = app
        .server
        .post("/v1/invitations/accept")
        .authorization_bearer("tok-bob")
        .json(&json!({"token": token}))
        .await;
    assert!(
        response.status_code() == StatusCode::BAD_REQUEST
            || response.status_code() == StatusCode::CONFLICT
    );
}

#[tokio::test]
async fn test_lookup_unknown_token() {
    let app = spawn_app();
    let response = app
        .server
        .get("/v1/invitations/lookup?token=no-such-token")
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_accept_email_mismatch_names_invitee() {
    let app = spawn_app();
    app.seed_user("admin@example.com", Some("Ada"), "tok-admin");
    let org = create_org(&app, "tok-admin", "Acme").await;
    invite(&app, "tok-admin", org.id, "bob@x.com").await;
    let token = extract_invitation_token(app.mailer.sent()[0].text.as_deref().unwrap());

    app.seed_user("eve@x.com", Some("Eve"), "tok-eve");
    let response = app
        .server
        .post("/v1/invitations/accept")
        .authorization_bearer("tok-eve")
        .json(&json!({"token": token}))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert!(response.text().contains("bob@x.com"));
}

#[tokio::test]
async fn test_accept_when_already_member() {
    let app = spawn_app();
    let admin = app.seed_user("admin@example.com", Some("Ada"), "tok-admin");
    let org = create_org(&app, "tok-admin", "Acme").await;

    // A pending invitation addressed to someone who is already a member
    let invitation = app
        .invitations
        .create(
            OrganizationId(org.id),
            CreateInvitationRequest {
                email: admin.email.clone(),
                role: MemberRole::User,
                expires_in_days: 7,
            },
            admin.id,
        )
        .await
        .unwrap();

    let response = app
        .server
        .post("/v1/invitations/accept")
        .authorization_bearer("tok-admin")
        .json(&json!({"token": invitation.token}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_expired_invitation_lookup_and_accept() {
    let app = spawn_app();
    let admin = app.seed_user("admin@example.com", Some("Ada"), "tok-admin");
    let org = create_org(&app, "tok-admin", "Acme").await;

    let invitation = app
        .invitations
        .create(
            OrganizationId(org.id),
            CreateInvitationRequest {
                email: "bob@x.com".to_string(),
                role: MemberRole::User,
                expires_in_days: -1,
            },
            admin.id,
        )
        .await
        .unwrap();

    // Lookup reports the expiry instead of a pending preview
    let response = app
        .server
        .get(&format!("/v1/invitations/lookup?token={}", invitation.token))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.text().contains("expired"));

    // Accept fails the same way, and the stored status is now terminal
    app.seed_user("bob@x.com", Some("Bob"), "tok-bob");
    let response = app
        .server
        .post("/v1/invitations/accept")
        .authorization_bearer("tok-bob")
        .json(&json!({"token": invitation.token}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let stored = app
        .invitations
        .get_by_id(invitation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.status,
        services::invitation::InvitationStatus::Expired
    );
}

#[tokio::test]
async fn test_cancel_invitation() {
    let app = spawn_app();
    app.seed_user("admin@example.com", Some("Ada"), "tok-admin");
    app.seed_user("outsider@example.com", None, "tok-out");
    let org = create_org(&app, "tok-admin", "Acme").await;

    let body = invite(&app, "tok-admin", org.id, "bob@x.com").await;
    let invitation = body.invitation.unwrap();

    // Only admins may cancel
    let response = app
        .server
        .delete(&format!(
            "/v1/organizations/{}/invitations?invitation_id={}",
            org.id, invitation.id
        ))
        .authorization_bearer("tok-out")
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = app
        .server
        .delete(&format!(
            "/v1/organizations/{}/invitations?invitation_id={}",
            org.id, invitation.id
        ))
        .authorization_bearer("tok-admin")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    // Cancelling again is a state-transition error and changes nothing
    let response = app
        .server
        .delete(&format!(
            "/v1/organizations/{}/invitations?invitation_id={}",
            org.id, invitation.id
        ))
        .authorization_bearer("tok-admin")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_organization_invitations() {
    let app = spawn_app();
    app.seed_user("admin@example.com", Some("Ada"), "tok-admin");
    let org = create_org(&app, "tok-admin", "Acme").await;

    invite(&app, "tok-admin", org.id, "bob@x.com").await;
    let cancelled = invite(&app, "tok-admin", org.id, "carol@x.com")
        .await
        .invitation
        .unwrap();
    app.server
        .delete(&format!(
            "/v1/organizations/{}/invitations?invitation_id={}",
            org.id, cancelled.id
        ))
        .authorization_bearer("tok-admin")
        .await;

    let response = app
        .server
        .get(&format!("/v1/organizations/{}/invitations", org.id))
        .authorization_bearer("tok-admin")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ListInvitationsResponse = response.json();
    assert_eq!(body.invitations.len(), 1);
    assert_eq!(body.invitations[0].email, "bob@x.com");
}

#[tokio::test]
async fn test_user_invitations_listing() {
    let app = spawn_app();
    let ada = app.seed_user("ada@example.com", Some("Ada"), "tok-ada");
    app.seed_user("zoe@example.com", Some("Zoe"), "tok-zoe");
    let acme = create_org(&app, "tok-ada", "Acme").await;
    let zeta = create_org(&app, "tok-zoe", "Zeta").await;

    invite(&app, "tok-ada", acme.id, "bob@x.com").await;
    invite(&app, "tok-zoe", zeta.id, "bob@x.com").await;
    // A lapsed invitation from a third source is not listed
    app.invitations
        .create(
            OrganizationId(acme.id),
            CreateInvitationRequest {
                email: "bob@x.com".to_string(),
                role: MemberRole::User,
                expires_in_days: -1,
            },
            ada.id,
        )
        .await
        .unwrap();

    app.seed_user("bob@x.com", Some("Bob"), "tok-bob");
    let response = app
        .server
        .get("/v1/invitations/user")
        .authorization_bearer("tok-bob")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: ListUserInvitationsResponse = response.json();
    assert_eq!(body.invitations.len(), 2);
    let names: Vec<&str> = body
        .invitations
        .iter()
        .map(|i| i.organization_name.as_str())
        .collect();
    assert!(names.contains(&"Acme"));
    assert!(names.contains(&"Zeta"));
    // Tokens never travel through the listing
    assert!(!response.text().contains("token"));
}

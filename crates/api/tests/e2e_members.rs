// E2E tests for membership management: listings, role changes, removal and
// the last-admin invariant.
mod common;

use api::models::{
    InviteMemberResponse, ListMembersResponse, MembershipResponse, OrganizationResponse,
};
use axum::http::StatusCode;
use common::spawn_app;
use serde_json::json;
use services::organization::{MemberRole, OrganizationId, OrganizationRepository};

async fn create_org(app: &common::TestApp, token: &str, name: &str) -> OrganizationResponse {
    app.server
        .post("/v1/organizations")
        .authorization_bearer(token)
        .json(&json!({"name": name}))
        .await
        .json()
}

#[tokio::test]
async fn test_list_members_is_member_only() {
    let app = spawn_app();
    app.seed_user("a@example.com", Some("A"), "tok-a");
    app.seed_user("outsider@example.com", None, "tok-out");
    let org = create_org(&app, "tok-a", "Acme").await;

    let response = app
        .server
        .get(&format!("/v1/organizations/{}/members", org.id))
        .authorization_bearer("tok-out")
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = app
        .server
        .get(&format!("/v1/organizations/{}/members", org.id))
        .authorization_bearer("tok-a")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ListMembersResponse = response.json();
    assert_eq!(body.members.len(), 1);
    assert_eq!(body.members[0].email, "a@example.com");
    assert_eq!(body.members[0].role, api::models::ApiRole::Admin);
}

#[tokio::test]
async fn test_invite_existing_user_adds_directly() {
    let app = spawn_app();
    app.seed_user("a@example.com", Some("A"), "tok-a");
    let bob = app.seed_user("bob@x.com", Some("Bob"), "tok-bob");
    let org = create_org(&app, "tok-a", "Acme").await;

    let response = app
        .server
        .post(&format!("/v1/organizations/{}/members", org.id))
        .authorization_bearer("tok-a")
        .json(&json!({"email": "bob@x.com", "role": "user"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: InviteMemberResponse = response.json();
    assert_eq!(body.outcome, "member_added");
    let member = body.member.expect("direct add returns the membership");
    assert_eq!(member.user_id, bob.id.0);
    assert_eq!(member.role, api::models::ApiRole::User);

    // No invitation email for direct adds
    assert!(app.mailer.sent().is_empty());

    // Inviting the same email again conflicts
    let response = app
        .server
        .post(&format!("/v1/organizations/{}/members", org.id))
        .authorization_bearer("tok-a")
        .json(&json!({"email": "bob@x.com", "role": "user"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_invite_requires_admin() {
    let app = spawn_app();
    app.seed_user("a@example.com", Some("A"), "tok-a");
    let bob = app.seed_user("bob@x.com", Some("Bob"), "tok-bob");
    let org = create_org(&app, "tok-a", "Acme").await;

    app.organizations
        .add_member(OrganizationId(org.id), bob.id, MemberRole::User)
        .await
        .unwrap();

    let response = app
        .server
        .post(&format!("/v1/organizations/{}/members", org.id))
        .authorization_bearer("tok-bob")
        .json(&json!({"email": "carol@x.com", "role": "user"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_member_role_rejects_self_target() {
    let app = spawn_app();
    app.seed_user("carol@example.com", Some("Carol"), "tok-carol");
    let org = create_org(&app, "tok-carol", "Acme").await;

    let members: ListMembersResponse = app
        .server
        .get(&format!("/v1/organizations/{}/members", org.id))
        .authorization_bearer("tok-carol")
        .await
        .json();
    let carol_membership = members.members[0].id;

    // Carol is the only admin; demoting herself is rejected
    let response = app
        .server
        .patch(&format!("/v1/organizations/{}/members", org.id))
        .authorization_bearer("tok-carol")
        .json(&json!({"member_id": carol_membership, "role": "user"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_demote_succeeds_once_second_admin_exists() {
    let app = spawn_app();
    app.seed_user("carol@example.com", Some("Carol"), "tok-carol");
    let dave = app.seed_user("dave@example.com", Some("Dave"), "tok-dave");
    let org = create_org(&app, "tok-carol", "Acme").await;

    let dave_membership = app
        .organizations
        .add_member(OrganizationId(org.id), dave.id, MemberRole::User)
        .await
        .unwrap();

    // Promote Dave to admin
    let response = app
        .server
        .patch(&format!("/v1/organizations/{}/members", org.id))
        .authorization_bearer("tok-carol")
        .json(&json!({"member_id": dave_membership.id.0, "role": "admin"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let updated: MembershipResponse = response.json();
    assert_eq!(updated.role, api::models::ApiRole::Admin);

    // With two admins, Dave can demote Carol
    let members: ListMembersResponse = app
        .server
        .get(&format!("/v1/organizations/{}/members", org.id))
        .authorization_bearer("tok-dave")
        .await
        .json();
    let carol_membership = members
        .members
        .iter()
        .find(|m| m.email == "carol@example.com")
        .unwrap()
        .id;

    let response = app
        .server
        .patch(&format!("/v1/organizations/{}/members", org.id))
        .authorization_bearer("tok-dave")
        .json(&json!({"member_id": carol_membership, "role": "user"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let updated: MembershipResponse = response.json();
    assert_eq!(updated.role, api::models::ApiRole::User);
}

#[tokio::test]
async fn test_role_change_requires_admin() {
    let app = spawn_app();
    app.seed_user("a@example.com", Some("A"), "tok-a");
    let bob = app.seed_user("bob@x.com", Some("Bob"), "tok-bob");
    let org = create_org(&app, "tok-a", "Acme").await;

    let bob_membership = app
        .organizations
        .add_member(OrganizationId(org.id), bob.id, MemberRole::User)
        .await
        .unwrap();

    let response = app
        .server
        .patch(&format!("/v1/organizations/{}/members", org.id))
        .authorization_bearer("tok-bob")
        .json(&json!({"member_id": bob_membership.id.0, "role": "admin"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_remove_member() {
    let app = spawn_app();
    app.seed_user("a@example.com", Some("A"), "tok-a");
    let bob = app.seed_user("bob@x.com", Some("Bob"), "tok-bob");
    let org = create_org(&app, "tok-a", "Acme").await;

    let bob_membership = app
        .organizations
        .add_member(OrganizationId(org.id), bob.id, MemberRole::User)
        .await
        .unwrap();

    // Bob (a plain member) cannot remove someone else
    let members: ListMembersResponse = app
        .server
        .get(&format!("/v1/organizations/{}/members", org.id))
        .authorization_bearer("tok-bob")
        .await
        .json();
    let admin_membership = members
        .members
        .iter()
        .find(|m| m.email == "a@example.com")
        .unwrap()
        .id;

    let response = app
        .server
        .delete(&format!(
            "/v1/organizations/{}/members?member_id={}",
            org.id, admin_membership
        ))
        .authorization_bearer("tok-bob")
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    // The admin removes Bob
    let response = app
        .server
        .delete(&format!(
            "/v1/organizations/{}/members?member_id={}",
            org.id, bob_membership.id.0
        ))
        .authorization_bearer("tok-a")
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let members: ListMembersResponse = app
        .server
        .get(&format!("/v1/organizations/{}/members", org.id))
        .authorization_bearer("tok-a")
        .await
        .json();
    assert_eq!(members.members.len(), 1);
}

#[tokio::test]
async fn test_remove_last_admin_rejected() {
    let app = spawn_app();
    app.seed_user("a@example.com", Some("A"), "tok-a");
    let org = create_org(&app, "tok-a", "Acme").await;

    let members: ListMembersResponse = app
        .server
        .get(&format!("/v1/organizations/{}/members", org.id))
        .authorization_bearer("tok-a")
        .await
        .json();
    let admin_membership = members.members[0].id;

    // Self-removal is normally allowed, but not for the last admin
    let response = app
        .server
        .delete(&format!(
            "/v1/organizations/{}/members?member_id={}",
            org.id, admin_membership
        ))
        .authorization_bearer("tok-a")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_remove_unknown_member() {
    let app = spawn_app();
    app.seed_user("a@example.com", Some("A"), "tok-a");
    let org = create_org(&app, "tok-a", "Acme").await;

    let response = app
        .server
        .delete(&format!(
            "/v1/organizations/{}/members?member_id={}",
            org.id,
            uuid::Uuid::new_v4()
        ))
        .authorization_bearer("tok-a")
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

// E2E tests for the organization lifecycle: creation, slug rules, active
// organization resolution, switch/leave and deletion.
mod common;

use api::models::{ListOrganizationsResponse, OrganizationResponse};
use axum::http::StatusCode;
use common::spawn_app;
use serde_json::json;
use services::organization::OrganizationRepository;

#[tokio::test]
async fn test_requires_authentication() {
    let app = spawn_app();

    let response = app.server.get("/v1/organizations").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = app
        .server
        .get("/v1/organizations")
        .authorization_bearer("no-such-token")
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = spawn_app();
    let response = app.server.get("/v1/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_first_request_provisions_default_organization() {
    let app = spawn_app();
    app.seed_user("jane@example.com", Some("Jane Doe"), "tok-jane");

    let response = app
        .server
        .get("/v1/organizations")
        .authorization_bearer("tok-jane")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: ListOrganizationsResponse = response.json();
    assert_eq!(body.organizations.len(), 1);
    assert_eq!(body.organizations[0].name, "Jane Doe");
    assert_eq!(body.organizations[0].slug, "jane-doe");
    assert_eq!(body.organizations[0].role, api::models::ApiRole::Admin);

    // The resolved preference is persisted as a long-lived cookie
    let set_cookie = response
        .headers()
        .get("set-cookie")
        .expect("first request should set the active_org cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("active_org="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));

    // A second request with the cookie resolves the same organization and
    // does not re-provision
    let cookie_pair = set_cookie.split(';').next().unwrap().to_string();
    let response = app
        .server
        .get("/v1/organizations")
        .authorization_bearer("tok-jane")
        .add_header(
            axum::http::header::COOKIE,
            axum::http::HeaderValue::from_str(&cookie_pair).unwrap(),
        )
        .await;
    let body: ListOrganizationsResponse = response.json();
    assert_eq!(body.organizations.len(), 1);
}

#[tokio::test]
async fn test_create_organization_derives_slug() {
    let app = spawn_app();
    app.seed_user("u@example.com", Some("U"), "tok-u");

    let response = app
        .server
        .post("/v1/organizations")
        .authorization_bearer("tok-u")
        .json(&json!({"name": "Acme Inc."}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let org: OrganizationResponse = response.json();
    assert_eq!(org.name, "Acme Inc.");
    assert_eq!(org.slug, "acme-inc");
    assert_eq!(org.role, api::models::ApiRole::Admin);

    // Round trip: fetching yields the same derived slug
    let response = app
        .server
        .get(&format!("/v1/organizations/{}", org.id))
        .authorization_bearer("tok-u")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let fetched: OrganizationResponse = response.json();
    assert_eq!(fetched.slug, "acme-inc");
}

#[tokio::test]
async fn test_create_organization_slug_collision() {
    let app = spawn_app();
    app.seed_user("a@example.com", Some("A"), "tok-a");
    app.seed_user("b@example.com", Some("B"), "tok-b");

    let response = app
        .server
        .post("/v1/organizations")
        .authorization_bearer("tok-a")
        .json(&json!({"name": "Acme"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    // Same derived slug, different user: no auto-suffixing, the caller must
    // pick a different name or slug
    let response = app
        .server
        .post("/v1/organizations")
        .authorization_bearer("tok-b")
        .json(&json!({"name": "Acme"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_create_organization_validation() {
    let app = spawn_app();
    app.seed_user("a@example.com", Some("A"), "tok-a");

    let response = app
        .server
        .post("/v1/organizations")
        .authorization_bearer("tok-a")
        .json(&json!({"name": "   "}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_organization_is_member_only() {
    let app = spawn_app();
    app.seed_user("a@example.com", Some("A"), "tok-a");
    app.seed_user("b@example.com", Some("B"), "tok-b");

    let response = app
        .server
        .post("/v1/organizations")
        .authorization_bearer("tok-a")
        .json(&json!({"name": "Acme"}))
        .await;
    let org: OrganizationResponse = response.json();

    let response = app
        .server
        .get(&format!("/v1/organizations/{}", org.id))
        .authorization_bearer("tok-b")
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = app
        .server
        .get(&format!("/v1/organizations/{}", uuid::Uuid::new_v4()))
        .authorization_bearer("tok-a")
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_organization() {
    let app = spawn_app();
    app.seed_user("a@example.com", Some("A"), "tok-a");

    let response = app
        .server
        .post("/v1/organizations")
        .authorization_bearer("tok-a")
        .json(&json!({"name": "Acme"}))
        .await;
    let org: OrganizationResponse = response.json();

    // A plain member cannot update
    let bob = app.seed_user("bob@x.com", Some("Bob"), "tok-bob");
    app.organizations
        .add_member(
            services::organization::OrganizationId(org.id),
            bob.id,
            services::organization::MemberRole::User,
        )
        .await
        .unwrap();

    let response = app
        .server
        .patch(&format!("/v1/organizations/{}", org.id))
        .authorization_bearer("tok-bob")
        .json(&json!({"name": "Renamed"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    // The admin can
    let response = app
        .server
        .patch(&format!("/v1/organizations/{}", org.id))
        .authorization_bearer("tok-a")
        .json(&json!({"name": "Renamed", "logo": "https://example.com/logo.png"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let updated: OrganizationResponse = response.json();
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.logo.as_deref(), Some("https://example.com/logo.png"));

    // Slug collisions are re-checked on update
    app.server
        .post("/v1/organizations")
        .authorization_bearer("tok-a")
        .json(&json!({"name": "Beta"}))
        .await;
    let response = app
        .server
        .patch(&format!("/v1/organizations/{}", org.id))
        .authorization_bearer("tok-a")
        .json(&json!({"slug": "beta"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_only_organization_rejected() {
    let app = spawn_app();
    app.seed_user("e@example.com", Some("Eve"), "tok-e");

    // First request provisions Eve's only organization
    let response = app
        .server
        .get("/v1/organizations")
        .authorization_bearer("tok-e")
        .await;
    let body: ListOrganizationsResponse = response.json();
    let only_org = body.organizations[0].id;

    let response = app
        .server
        .delete(&format!("/v1/organizations/{}", only_org))
        .authorization_bearer("tok-e")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    // With a second organization the delete succeeds and Eve keeps one
    app.server
        .post("/v1/organizations")
        .authorization_bearer("tok-e")
        .json(&json!({"name": "Second"}))
        .await;
    let response = app
        .server
        .delete(&format!("/v1/organizations/{}", only_org))
        .authorization_bearer("tok-e")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = app
        .server
        .get("/v1/organizations")
        .authorization_bearer("tok-e")
        .await;
    let body: ListOrganizationsResponse = response.json();
    assert_eq!(body.organizations.len(), 1);
    assert_eq!(body.organizations[0].name, "Second");
}

#[tokio::test]
async fn test_switch_organization() {
    let app = spawn_app();
    app.seed_user("a@example.com", Some("A"), "tok-a");
    app.seed_user("b@example.com", Some("B"), "tok-b");

    let response = app
        .server
        .post("/v1/organizations")
        .authorization_bearer("tok-a")
        .json(&json!({"name": "Acme"}))
        .await;
    let acme: OrganizationResponse = response.json();

    let response = app
        .server
        .post("/v1/organizations/switch")
        .authorization_bearer("tok-a")
        .json(&json!({"organization_id": acme.id}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let switched: OrganizationResponse = response.json();
    assert_eq!(switched.id, acme.id);
    assert_eq!(switched.role, api::models::ApiRole::Admin);

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .expect("switch should persist the preference")
        .to_str()
        .unwrap();
    assert!(set_cookie.contains(&acme.id.to_string()));

    // A non-member cannot switch into the organization
    let response = app
        .server
        .post("/v1/organizations/switch")
        .authorization_bearer("tok-b")
        .json(&json!({"organization_id": acme.id}))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_leave_organization() {
    let app = spawn_app();
    app.seed_user("a@example.com", Some("A"), "tok-a");

    let response = app
        .server
        .get("/v1/organizations")
        .authorization_bearer("tok-a")
        .await;
    let body: ListOrganizationsResponse = response.json();
    let org_id = body.organizations[0].id;

    // The sole admin cannot leave their organization
    let response = app
        .server
        .post("/v1/organizations/leave")
        .authorization_bearer("tok-a")
        .json(&json!({"organization_id": org_id}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    // A plain member can always leave
    let bob = app.seed_user("bob@x.com", Some("Bob"), "tok-bob");
    app.organizations
        .add_member(
            services::organization::OrganizationId(org_id),
            bob.id,
            services::organization::MemberRole::User,
        )
        .await
        .unwrap();

    let response = app
        .server
        .post("/v1/organizations/leave")
        .authorization_bearer("tok-bob")
        .json(&json!({"organization_id": org_id}))
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
}

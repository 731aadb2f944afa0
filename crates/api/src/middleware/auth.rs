use crate::routes::api::AppState;
use axum::{
    extract::{Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    middleware::Next,
    response::Response,
};
use services::auth::User;
use services::organization::OrganizationId;
use tracing::{debug, error};
use uuid::Uuid;

/// Authenticated user information passed to route handlers
#[derive(Clone)]
pub struct AuthenticatedUser(pub User);

/// Authentication and organization-context middleware.
///
/// Validates the bearer session token, resolves the active organization for
/// the request (auto-provisioning a default organization on first login) and
/// inserts both the user and the resolved `AuthContext` as request
/// extensions. When the resolved organization differs from the presented
/// cookie preference, the response carries a refreshed cookie.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, axum::Json<crate::models::ErrorResponse>)> {
    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|value| value.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                axum::Json(crate::models::ErrorResponse::new(
                    "Missing or malformed authorization header".to_string(),
                    "unauthorized".to_string(),
                )),
            ));
        }
    };

    let user = match state.auth_service.authenticate(token).await {
        Ok(user) => user,
        Err(services::auth::AuthError::Unauthenticated) => {
            return Err((
                StatusCode::UNAUTHORIZED,
                axum::Json(crate::models::ErrorResponse::new(
                    "Invalid or expired session token".to_string(),
                    "unauthorized".to_string(),
                )),
            ));
        }
        Err(e) => {
            error!("Authentication failed: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(crate::models::ErrorResponse::new(
                    "Authentication failed".to_string(),
                    "internal_server_error".to_string(),
                )),
            ));
        }
    };

    let preferred = preferred_organization(request.headers(), &state.config.auth.active_org_cookie);

    let resolution = match state.resolver.resolve(&user, preferred).await {
        Ok(resolution) => resolution,
        Err(e) => {
            // Provisioning failures are fatal for the request; no partial
            // organization state survives the failed transaction
            error!("Failed to resolve active organization: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(crate::models::ErrorResponse::new(
                    "Failed to resolve organization context".to_string(),
                    "internal_server_error".to_string(),
                )),
            ));
        }
    };

    debug!(
        "Resolved organization {} for user {} (via {:?})",
        resolution.context.org_id, user.id, resolution.via
    );

    let refresh_cookie = resolution.preference_changed(preferred);
    let org_id = resolution.context.org_id;

    let mut request = request;
    request.extensions_mut().insert(AuthenticatedUser(user));
    request.extensions_mut().insert(resolution.context);

    let mut response = next.run(request).await;

    // Handlers that switch the active organization set their own cookie;
    // don't overwrite it here
    if refresh_cookie && !response.headers().contains_key(SET_COOKIE) {
        let cookie = active_org_cookie(&state.config, org_id);
        if let Ok(value) = cookie.parse() {
            response.headers_mut().insert(SET_COOKIE, value);
        }
    }

    Ok(response)
}

/// Build the active-organization preference cookie. HttpOnly and
/// SameSite=Lax; the value is advisory, membership is re-validated on every
/// request.
pub fn active_org_cookie(config: &config::ApiConfig, org_id: OrganizationId) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        config.auth.active_org_cookie,
        org_id,
        config.auth.active_org_cookie_max_age_secs()
    )
}

fn preferred_organization(headers: &HeaderMap, cookie_name: &str) -> Option<OrganizationId> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(cookie_name)?.strip_prefix('='))
        .and_then(|value| value.parse::<Uuid>().ok())
        .map(OrganizationId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_preferred_organization_parses_cookie() {
        let org_id = Uuid::new_v4();
        let headers = headers_with_cookie(&format!("theme=dark; active_org={}", org_id));
        assert_eq!(
            preferred_organization(&headers, "active_org"),
            Some(OrganizationId(org_id))
        );
    }

    #[test]
    fn test_preferred_organization_missing_or_garbage() {
        let headers = headers_with_cookie("theme=dark");
        assert_eq!(preferred_organization(&headers, "active_org"), None);

        let headers = headers_with_cookie("active_org=not-a-uuid");
        assert_eq!(preferred_organization(&headers, "active_org"), None);

        assert_eq!(preferred_organization(&HeaderMap::new(), "active_org"), None);
    }

    #[test]
    fn test_active_org_cookie_attributes() {
        let config = config::ApiConfig::default();
        let org_id = OrganizationId(Uuid::new_v4());
        let cookie = active_org_cookie(&config, org_id);

        assert!(cookie.starts_with(&format!("active_org={}", org_id)));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=31536000"));
    }
}

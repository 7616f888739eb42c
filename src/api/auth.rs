use axum::{
    Extension, Json,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::IntoResponse,
};
use chrono::SecondsFormat;
use std::sync::Arc;
use tracing::{info, warn};

use super::{ApiError, ApiResponse, AppState};
use super::types::{CurrentUserResponse, MessageResponse, SignInRequest, SignInResponse};
use crate::domain::Identity;

/// The verified bearer of the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub identity: Identity,
    pub token: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Requires `Authorization: Bearer <token>`, verified by the identity provider.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let Some(token) = extract_bearer(&headers) else {
        return Err(ApiError::Unauthorized("Missing bearer token".to_string()));
    };

    let identity = state
        .shared
        .auth_provider()
        .get_user(&token)
        .await
        .map_err(|e| {
            warn!(error = %e, "Rejected bearer token");
            ApiError::from(e)
        })?;

    tracing::Span::current().record("user_id", identity.id.as_str());
    request
        .extensions_mut()
        .insert(CurrentUser { identity, token });

    Ok(next.run(request).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();

    (!token.is_empty()).then(|| token.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/signin
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<ApiResponse<SignInResponse>>, ApiError> {
    let session = state
        .shared
        .auth_provider()
        .sign_in_with_password(&payload.email, &payload.password)
        .await?;

    let roles = &state.shared.roles;
    if let Err(e) = roles.upsert_profile(&session.identity).await {
        warn!(user_id = %session.identity.id, error = %e, "Profile upsert failed");
    }
    let role = roles.resolve_role(&session.identity.id).await;

    info!(user_id = %session.identity.id, %role, "Signed in over HTTP");

    Ok(Json(ApiResponse::success(SignInResponse {
        token: session.token,
        expires_at: session
            .expires_at
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        user: session.identity,
        role,
    })))
}

/// POST /auth/signout
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .shared
        .auth_provider()
        .sign_out(Some(&user.token))
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Signed out".to_string(),
    })))
}

/// GET /auth/user
pub async fn current_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<CurrentUserResponse>>, ApiError> {
    let roles = &state.shared.roles;
    let role = roles.resolve_role(&user.identity.id).await;
    let profile = roles.get_profile(&user.identity.id).await?;

    Ok(Json(ApiResponse::success(CurrentUserResponse {
        user: user.identity,
        role,
        profile,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer(&headers).as_deref(), Some("abc123"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc123"));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer(&headers), None);
    }
}

//! Handlers shared by the project and blog post collections.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::info;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::models::{BlogPost, Project};
use crate::services::{ContentBackend, ContentError, ContentRecord};

pub trait Collection: ContentRecord + Serialize {
    fn backend(state: &AppState) -> Arc<dyn ContentBackend<Self>>;
}

impl Collection for Project {
    fn backend(state: &AppState) -> Arc<dyn ContentBackend<Self>> {
        state.shared.projects.clone()
    }
}

impl Collection for BlogPost {
    fn backend(state: &AppState) -> Arc<dyn ContentBackend<Self>> {
        state.shared.blog_posts.clone()
    }
}

async fn ensure_can_write(state: &AppState, user: &CurrentUser) -> Result<(), ApiError> {
    let require_admin = state.config().read().await.content.require_admin_for_writes;
    if require_admin && !state.shared.roles.resolve_role(&user.identity.id).await.is_admin() {
        return Err(ContentError::Forbidden.into());
    }
    Ok(())
}

/// GET /projects, GET /blog
pub async fn list<R: Collection>(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<R>>>, ApiError> {
    let items = R::backend(&state).list_published().await?;
    Ok(Json(ApiResponse::success(items)))
}

/// POST /projects, POST /blog
pub async fn create<R>(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(draft): Json<R::Draft>,
) -> Result<(StatusCode, Json<ApiResponse<R>>), ApiError>
where
    R: Collection,
    R::Draft: DeserializeOwned,
{
    ensure_can_write(&state, &user).await?;

    let record = R::backend(&state)
        .insert(&draft, Some(&user.identity.id))
        .await?;

    info!(
        collection = R::COLLECTION,
        id = record.id(),
        user_id = %user.identity.id,
        "Created over HTTP"
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record))))
}

/// PUT /projects/{id}, PUT /blog/{id}
pub async fn update<R>(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(patch): Json<R::Patch>,
) -> Result<Json<ApiResponse<R>>, ApiError>
where
    R: Collection,
    R::Patch: DeserializeOwned,
{
    ensure_can_write(&state, &user).await?;

    let record = R::backend(&state).update(&id, &patch).await?;
    Ok(Json(ApiResponse::success(record)))
}

/// DELETE /projects/{id}, DELETE /blog/{id}
pub async fn delete<R: Collection>(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    ensure_can_write(&state, &user).await?;

    R::backend(&state).delete(&id).await?;
    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Deleted {id}"),
    })))
}

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::user::{AdminUpdateUserRequest, UserProfile},
    services::{admin_service, admin_service::AdminService, user_service::UserService, AppState},
};
use axum::Extension;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

/// GET /api/admin/users - Paginated, searchable user listing
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let service = AdminService::new(state.mongo.clone());
    let (users, total) = service.list_users(page, limit, query.search).await?;

    let ids: Vec<ObjectId> = users.iter().filter_map(|user| user.id).collect();
    let user_service = UserService::new(state.mongo.clone());
    let ratings = user_service.ratings_for(&ids).await?;

    let profiles: Vec<UserProfile> = users
        .into_iter()
        .map(|user| {
            let rating = user
                .id
                .and_then(|id| ratings.get(&id).copied())
                .unwrap_or(0);
            UserProfile::from_user(user, rating)
        })
        .collect();

    Ok(Json(serde_json::json!({
        "users": profiles,
        "totalPages": admin_service::total_pages(total, limit),
        "currentPage": page,
        "total": total,
    })))
}

/// GET /api/admin/users/{id} - Single user for editing
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = ObjectId::parse_str(&user_id)?;

    let service = AdminService::new(state.mongo.clone());
    let user = service.get_user(&user_id).await?;

    let user_service = UserService::new(state.mongo.clone());
    let ratings = user_service.ratings_for(&[user_id]).await?;
    let rating = ratings.get(&user_id).copied().unwrap_or(0);

    Ok(Json(serde_json::json!({
        "user": UserProfile::from_user(user, rating),
    })))
}

/// PUT /api/admin/users/{id} - Direct field overwrites
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(user_id): Path<String>,
    AppJson(req): AppJson<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::validation(format!("Validation error: {}", e)))?;

    let user_id = ObjectId::parse_str(&user_id)?;

    tracing::info!(admin = %claims.sub, target = %user_id.to_hex(), "Admin user update");

    let service = AdminService::new(state.mongo.clone());
    let user = service.update_user(&user_id, req).await?;

    let user_service = UserService::new(state.mongo.clone());
    let ratings = user_service.ratings_for(&[user_id]).await?;
    let rating = ratings.get(&user_id).copied().unwrap_or(0);

    Ok(Json(serde_json::json!({
        "message": "User updated successfully",
        "user": UserProfile::from_user(user, rating),
    })))
}

/// DELETE /api/admin/users/{id} - Guarded delete with cascades
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = ObjectId::parse_str(&user_id)?;

    tracing::info!(admin = %claims.sub, target = %user_id.to_hex(), "Admin user delete");

    let service = AdminService::new(state.mongo.clone());
    service.delete_user(&user_id).await?;

    Ok(Json(serde_json::json!({
        "message": "User deleted successfully",
    })))
}

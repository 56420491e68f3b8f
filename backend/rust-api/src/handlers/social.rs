use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::user::AddFriendRequest,
    services::{user_service::UserService, AppState},
};

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    pub search: Option<String>,
}

/// GET /api/users - Search users by name
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = UserService::new(state.mongo.clone());
    let users = service.search_users(query.search).await?;
    Ok(Json(users))
}

/// GET /api/users/{id} - Another user's public profile (derived rating)
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = ObjectId::parse_str(&user_id)?;
    let service = UserService::new(state.mongo.clone());
    let profile = service.get_profile(&user_id).await?;
    Ok(Json(profile))
}

/// GET /api/friends - The caller's friend list
pub async fn list_friends(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;
    let service = UserService::new(state.mongo.clone());
    let friends = service.list_friends(&user_id).await?;
    Ok(Json(friends))
}

/// POST /api/friends - Add a friend (both directions)
pub async fn add_friend(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<AddFriendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;
    let friend_id = ObjectId::parse_str(&req.friend_id)?;

    let service = UserService::new(state.mongo.clone());
    service.add_friend(&user_id, &friend_id).await?;

    Ok(Json(serde_json::json!({ "message": "Friend added" })))
}

/// DELETE /api/friends/{friendId} - Remove a friend (both directions)
pub async fn remove_friend(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(friend_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;
    let friend_id = ObjectId::parse_str(&friend_id)?;

    let service = UserService::new(state.mongo.clone());
    service.remove_friend(&user_id, &friend_id).await?;

    Ok(Json(serde_json::json!({ "message": "Friend removed" })))
}

/// GET /api/leaderboard - Top ten by derived rating
pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let service = UserService::new(state.mongo.clone());
    let entries = service.leaderboard().await?;
    Ok(Json(entries))
}

/// GET /api/compare/{compareId} - Head-to-head learning stats
pub async fn compare(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(compare_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;
    let compare_id = ObjectId::parse_str(&compare_id)?;

    let service = UserService::new(state.mongo.clone());
    let response = service.compare(&user_id, &compare_id).await?;
    Ok(Json(response))
}

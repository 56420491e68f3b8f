use axum::{
    extract::{Multipart, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ApiError,
    middlewares::auth::JwtClaims,
    models::user::UpdateProfileRequest,
    services::{uploads, user_service::UserService, AppState},
};

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub include: Option<String>,
}

/// GET /api/profile - Current user's profile; `?include=progress` attaches
/// the progress records.
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<ProfileQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;
    let service = UserService::new(state.mongo.clone());

    let profile = service.get_profile(&user_id).await?;

    let mut body = serde_json::to_value(&profile)
        .map_err(|e| ApiError::Internal(e.into()))?;

    if let Some(include) = query.include {
        if include.contains("progress") {
            let progress = super::learning::load_progress_views(&state, &user_id).await?;
            body["progress"] = serde_json::to_value(progress)
                .map_err(|e| ApiError::Internal(e.into()))?;
        }
    }

    Ok(Json(body))
}

/// PUT /api/profile - Update profile fields; multipart so an avatar file can
/// ride along.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;

    let mut req = UpdateProfileRequest::default();
    let mut avatar = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart payload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "avatar" => {
                let original_name = field.file_name().unwrap_or("avatar").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("Failed to read avatar: {}", e)))?;
                if !data.is_empty() {
                    avatar =
                        Some(uploads::save_upload(&state.config.uploads_dir, &original_name, &data)
                            .await?);
                }
            }
            "firstName" => req.first_name = Some(read_text(field).await?),
            "lastName" => req.last_name = Some(read_text(field).await?),
            "englishLevel" => req.english_level = Some(read_text(field).await?),
            "age" => {
                let text = read_text(field).await?;
                if !text.is_empty() {
                    req.age = Some(
                        text.parse()
                            .map_err(|_| ApiError::validation("Age must be a number"))?,
                    );
                }
            }
            "bio" => req.bio = Some(read_text(field).await?),
            _ => {
                tracing::debug!("Ignoring unknown profile field: {}", name);
            }
        }
    }

    req.validate()
        .map_err(|e| ApiError::validation(format!("Validation error: {}", e)))?;

    let service = UserService::new(state.mongo.clone());
    let profile = service.update_profile(&user_id, req, avatar).await?;

    Ok(Json(serde_json::json!({
        "message": "Profile updated successfully",
        "user": profile,
    })))
}

pub(crate) async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid form field: {}", e)))
}

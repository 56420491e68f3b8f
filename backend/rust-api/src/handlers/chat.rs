use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::message::SendMessageRequest,
    models::user::UserSummary,
    services::{chat_service::ChatService, user_service, AppState},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub from: Option<UserSummary>,
    pub to: Option<UserSummary>,
    pub text: String,
    pub coins: i64,
    pub created_at: DateTime<Utc>,
}

/// GET /api/chat/{userId}/messages - Conversation with another user
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(other_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;
    let other_id = ObjectId::parse_str(&other_id)?;

    let service = ChatService::new(state.mongo.clone(), state.mongo_client.clone());
    let messages = service.conversation(&user_id, &other_id).await?;

    let users =
        user_service::load_user_summaries(&state.mongo, vec![user_id, other_id]).await?;

    let views: Vec<MessageView> = messages
        .into_iter()
        .map(|message| MessageView {
            id: message.id.map(|id| id.to_hex()).unwrap_or_default(),
            from: users.get(&message.from).cloned(),
            to: users.get(&message.to).cloned(),
            text: message.text,
            coins: message.coins,
            created_at: message.created_at,
        })
        .collect();

    Ok(Json(views))
}

/// POST /api/chat/{userId}/send - Send a message, optionally with coins
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(other_id): Path<String>,
    AppJson(req): AppJson<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::validation(format!("Validation error: {}", e)))?;

    let user_id = claims.user_id()?;
    let other_id = ObjectId::parse_str(&other_id)?;

    let service = ChatService::new(state.mongo.clone(), state.mongo_client.clone());
    let message = service
        .send(&user_id, &other_id, &req.text, req.coins)
        .await?;

    Ok(Json(serde_json::json!({
        "message": "Message sent",
        "sent": message,
    })))
}

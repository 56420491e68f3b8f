use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::message::SendCoinsRequest,
    services::{economy_service::EconomyService, AppState},
};

/// POST /api/courses/{id}/enroll - Enroll (and pay, for priced courses)
pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;
    let course_id = ObjectId::parse_str(&course_id)?;

    let service = EconomyService::new(state.mongo.clone(), state.mongo_client.clone());
    let outcome = service.enroll(&course_id, &user_id).await?;

    let message = if outcome.already_enrolled {
        "Already enrolled in this course"
    } else {
        "Successfully enrolled in course"
    };

    Ok(Json(serde_json::json!({
        "message": message,
        "progress": outcome.progress,
    })))
}

/// POST /api/premium/subscribe - Activate the one-time premium flag
pub async fn subscribe_premium(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;

    let service = EconomyService::new(state.mongo.clone(), state.mongo_client.clone());
    let user = service.subscribe_premium(&user_id).await?;

    Ok(Json(serde_json::json!({
        "message": "Premium subscription activated successfully",
        "user": {
            "coins": user.coins,
            "isPremium": user.is_premium,
        },
    })))
}

/// POST /api/coins/send/{receiverId} - Peer-to-peer coin transfer
pub async fn send_coins(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(receiver_id): Path<String>,
    AppJson(req): AppJson<SendCoinsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::validation(format!("Validation error: {}", e)))?;

    let sender_id = claims.user_id()?;
    let receiver_id = ObjectId::parse_str(&receiver_id)?;

    let service = EconomyService::new(state.mongo.clone(), state.mongo_client.clone());
    service
        .send_coins(&sender_id, &receiver_id, req.amount)
        .await?;

    Ok(Json(serde_json::json!({ "message": "Coins sent successfully" })))
}

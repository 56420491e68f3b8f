use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Directed user-to-user message, optionally carrying a coin transfer.
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub from: ObjectId,
    pub to: ObjectId,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub coins: i64,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(max = 2000, message = "Message must be at most 2000 characters"))]
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub coins: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendCoinsRequest {
    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount: i64,
}

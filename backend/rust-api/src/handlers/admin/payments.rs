use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::ApiError,
    models::course::Course,
    models::payment::Payment,
    models::user::UserSummary,
    services::{admin_service, admin_service::AdminService, user_service, AppState},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: String,
    pub user: Option<UserSummary>,
    pub course: Option<CourseRef>,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CourseRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// GET /api/admin/payments - Payment history, optionally filtered by type
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let service = AdminService::new(state.mongo.clone());
    let (payments, total) = service.list_payments(page, limit, query.kind).await?;

    let views = payment_views(&state, payments).await?;

    Ok(Json(serde_json::json!({
        "payments": views,
        "totalPages": admin_service::total_pages(total, limit),
        "currentPage": page,
        "total": total,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListSubscriptionsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// GET /api/admin/premium-subscriptions - Premium payment records
pub async fn list_premium_subscriptions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListSubscriptionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let service = AdminService::new(state.mongo.clone());
    let (payments, total) = service.list_premium_subscriptions(page, limit).await?;

    let views = payment_views(&state, payments).await?;

    Ok(Json(serde_json::json!({
        "subscriptions": views,
        "totalPages": admin_service::total_pages(total, limit),
        "currentPage": page,
        "total": total,
    })))
}

async fn payment_views(
    state: &AppState,
    payments: Vec<Payment>,
) -> Result<Vec<PaymentView>, ApiError> {
    let user_ids: Vec<ObjectId> = payments.iter().map(|payment| payment.user).collect();
    let users = user_service::load_user_summaries(&state.mongo, user_ids).await?;

    let course_ids: Vec<ObjectId> = payments
        .iter()
        .filter_map(|payment| payment.course)
        .collect();
    let courses = load_course_titles(state, course_ids).await?;

    Ok(payments
        .into_iter()
        .map(|payment| PaymentView {
            id: payment.id.map(|id| id.to_hex()).unwrap_or_default(),
            user: users.get(&payment.user).cloned(),
            course: payment.course.and_then(|id| {
                courses.get(&id).map(|title| CourseRef {
                    id: id.to_hex(),
                    title: title.clone(),
                })
            }),
            amount: payment.amount,
            kind: payment.kind.as_str().to_string(),
            status: payment.status.as_str().to_string(),
            created_at: payment.created_at,
        })
        .collect())
}

async fn load_course_titles(
    state: &AppState,
    ids: Vec<ObjectId>,
) -> Result<HashMap<ObjectId, String>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let courses = state.mongo.collection::<Course>("courses");
    let mut cursor = courses.find(doc! { "_id": { "$in": ids } }).await?;

    let mut map = HashMap::new();
    while let Some(course) = cursor.try_next().await? {
        if let Some(id) = course.id {
            map.insert(id, course.title);
        }
    }
    Ok(map)
}

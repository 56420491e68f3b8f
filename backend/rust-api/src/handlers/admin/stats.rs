use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::ApiError,
    services::{admin_service::AdminService, AppState},
};

/// GET /api/admin/stats - Platform-wide aggregate statistics
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let service = AdminService::new(state.mongo.clone());
    let stats = service.stats().await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct RevenueQuery {
    pub period: Option<String>,
}

/// GET /api/admin/revenue - Revenue grouped by calendar period
pub async fn get_revenue(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RevenueQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let period = query.period.unwrap_or_else(|| "monthly".to_string());

    let service = AdminService::new(state.mongo.clone());
    let rows = service.revenue(&period).await?;
    Ok(Json(rows))
}

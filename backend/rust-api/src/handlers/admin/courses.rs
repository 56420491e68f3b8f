use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    handlers::courses::build_course_detail,
    middlewares::auth::JwtClaims,
    models::course::{AdminUpdateCourseRequest, ApproveCourseRequest},
    services::{admin_service, admin_service::AdminService, AppState},
};

#[derive(Debug, Deserialize)]
pub struct ListCoursesQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub status: Option<String>,
}

/// GET /api/admin/courses - Paginated listing with status filter
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListCoursesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let service = AdminService::new(state.mongo.clone());
    let (courses, total) = service
        .list_courses(page, limit, query.search, query.status)
        .await?;

    let mut details = Vec::with_capacity(courses.len());
    for course in courses {
        details.push(build_course_detail(&state, course).await?);
    }

    Ok(Json(serde_json::json!({
        "courses": details,
        "totalPages": admin_service::total_pages(total, limit),
        "currentPage": page,
        "total": total,
    })))
}

/// GET /api/admin/courses/{id} - Single course for editing
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = ObjectId::parse_str(&course_id)?;

    let service = AdminService::new(state.mongo.clone());
    let course = service.get_course(&course_id).await?;
    let detail = build_course_detail(&state, course).await?;

    Ok(Json(serde_json::json!({ "course": detail })))
}

/// PUT /api/admin/courses/{id} - Direct field overwrites
pub async fn update_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<AdminUpdateCourseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::validation(format!("Validation error: {}", e)))?;

    let course_id = ObjectId::parse_str(&course_id)?;

    tracing::info!(admin = %claims.sub, course = %course_id.to_hex(), "Admin course update");

    let service = AdminService::new(state.mongo.clone());
    let course = service.update_course(&course_id, req).await?;
    let detail = build_course_detail(&state, course).await?;

    Ok(Json(serde_json::json!({
        "message": "Course updated successfully",
        "course": detail,
    })))
}

/// DELETE /api/admin/courses/{id} - Delete with progress/payment cascade
pub async fn delete_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = ObjectId::parse_str(&course_id)?;

    tracing::info!(admin = %claims.sub, course = %course_id.to_hex(), "Admin course delete");

    let service = AdminService::new(state.mongo.clone());
    service.delete_course(&course_id).await?;

    Ok(Json(serde_json::json!({
        "message": "Course deleted successfully",
    })))
}

/// POST /api/admin/courses/{id}/approve - Approve or reject a course
pub async fn approve_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<ApproveCourseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = ObjectId::parse_str(&course_id)?;

    tracing::info!(
        admin = %claims.sub,
        course = %course_id.to_hex(),
        approved = req.approved,
        "Admin course approval"
    );

    let service = AdminService::new(state.mongo.clone());
    let course = service.approve_course(&course_id, req.approved).await?;
    let detail = build_course_detail(&state, course).await?;

    let message = if req.approved {
        "Course approved"
    } else {
        "Course rejected"
    };

    Ok(Json(serde_json::json!({
        "message": message,
        "course": detail,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ParticipantsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// GET /api/admin/courses/{id}/participants - Roster merged with progress
pub async fn course_participants(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
    Query(query): Query<ParticipantsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = ObjectId::parse_str(&course_id)?;
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let service = AdminService::new(state.mongo.clone());
    let roster = service.participants(&course_id, page, limit).await?;

    Ok(Json(serde_json::json!({
        "participants": roster.participants,
        "totalPages": admin_service::total_pages(roster.total, limit),
        "currentPage": page,
        "total": roster.total,
        "course": {
            "title": roster.course_title,
            "totalLessons": roster.total_lessons,
        },
    })))
}

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::course::Course,
    models::progress::{
        CompleteLessonResponse, Progress, QuizResult, SubmitQuizRequest,
    },
    services::{progress_service::ProgressService, AppState},
};

/// Progress record with the course's display fields attached.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub id: String,
    pub course: Option<CourseBrief>,
    pub completed_lessons: Vec<String>,
    pub quiz_results: Vec<QuizResult>,
    pub current_lesson: Option<String>,
    pub progress: i32,
    pub last_accessed: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseBrief {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub level: String,
}

pub(crate) async fn load_progress_views(
    state: &AppState,
    user_id: &ObjectId,
) -> Result<Vec<ProgressView>, ApiError> {
    let service = ProgressService::new(state.mongo.clone(), state.mongo_client.clone());
    let records = service.list(user_id).await?;

    let course_ids: Vec<ObjectId> = records.iter().map(|record| record.course).collect();
    let courses = load_course_briefs(state, course_ids).await?;

    Ok(records
        .into_iter()
        .map(|record| progress_view(record, &courses))
        .collect())
}

async fn load_course_briefs(
    state: &AppState,
    ids: Vec<ObjectId>,
) -> Result<HashMap<ObjectId, CourseBrief>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let courses = state.mongo.collection::<Course>("courses");
    let mut cursor = courses.find(doc! { "_id": { "$in": ids } }).await?;

    let mut map = HashMap::new();
    while let Some(course) = cursor.try_next().await? {
        if let Some(id) = course.id {
            map.insert(
                id,
                CourseBrief {
                    id: id.to_hex(),
                    title: course.title,
                    image: course.image,
                    level: course.level,
                },
            );
        }
    }
    Ok(map)
}

fn progress_view(record: Progress, courses: &HashMap<ObjectId, CourseBrief>) -> ProgressView {
    let course = courses.get(&record.course).cloned();

    ProgressView {
        id: record.id.map(|id| id.to_hex()).unwrap_or_default(),
        course,
        completed_lessons: record
            .completed_lessons
            .iter()
            .map(|id| id.to_hex())
            .collect(),
        quiz_results: record.quiz_results,
        current_lesson: record.current_lesson.map(|id| id.to_hex()),
        progress: record.progress,
        last_accessed: record.last_accessed,
    }
}

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// GET /api/progress - Progress records for the caller (or `?userId=`)
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<ProgressQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = match query.user_id {
        Some(id) => ObjectId::parse_str(&id)?,
        None => claims.user_id()?,
    };

    let views = load_progress_views(&state, &user_id).await?;
    Ok(Json(views))
}

/// GET /api/courses/{courseId}/lessons/{lessonId} - Open a lesson
pub async fn get_lesson(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;
    let course_id = ObjectId::parse_str(&course_id)?;
    let lesson_id = ObjectId::parse_str(&lesson_id)?;

    let service = ProgressService::new(state.mongo.clone(), state.mongo_client.clone());
    let view = service.view_lesson(&course_id, &lesson_id, &user_id).await?;

    Ok(Json(serde_json::json!({
        "lesson": view.lesson,
        "course": {
            "title": view.course_title,
            "teacher": view.teacher.to_hex(),
        },
    })))
}

/// POST /api/courses/{courseId}/lessons/{lessonId}/complete
pub async fn complete_lesson(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, lesson_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;
    let course_id = ObjectId::parse_str(&course_id)?;
    let lesson_id = ObjectId::parse_str(&lesson_id)?;

    let service = ProgressService::new(state.mongo.clone(), state.mongo_client.clone());
    let completion = service
        .complete_lesson(&course_id, &lesson_id, &user_id)
        .await?;

    Ok(Json(CompleteLessonResponse {
        message: "Lesson completed successfully".to_string(),
        coins_added: completion.coins_added,
        progress: completion.progress,
    }))
}

/// POST /api/courses/{courseId}/quizzes/{quizId}/submit
pub async fn submit_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, quiz_id)): Path<(String, String)>,
    AppJson(req): AppJson<SubmitQuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;
    let course_id = ObjectId::parse_str(&course_id)?;
    let quiz_id = ObjectId::parse_str(&quiz_id)?;

    let service = ProgressService::new(state.mongo.clone(), state.mongo_client.clone());
    let response = service
        .submit_quiz(&course_id, &quiz_id, &user_id, &req.answers)
        .await?;

    Ok(Json(response))
}

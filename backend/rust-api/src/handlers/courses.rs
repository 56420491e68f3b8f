use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
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
    models::course::{
        AddCommentRequest, Comment, Course, CourseSummary, CreateCourseRequest, Lesson, NewLesson,
        NewQuiz, Quiz, Reply, TeacherSummary,
    },
    models::user::UserSummary,
    services::{
        course_service::CourseService, uploads, user_service, user_service::UserService, AppState,
    },
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetailResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub level: String,
    pub category: String,
    pub price: i64,
    pub image: Option<String>,
    pub teacher: Option<UserSummary>,
    pub lessons: Vec<Lesson>,
    pub quizzes: Vec<Quiz>,
    pub students: Vec<UserSummary>,
    pub likes: Vec<String>,
    pub comments: Vec<CommentView>,
    pub is_active: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub text: String,
    pub user: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub likes: Vec<String>,
    pub replies: Vec<ReplyView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyView {
    pub id: String,
    pub text: String,
    pub user: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub likes: Vec<String>,
}

/// GET /api/courses - Public catalogue (active + approved, no lesson bodies)
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let service = CourseService::new(state.mongo.clone());
    let courses = service.list_public().await?;

    let teacher_ids: Vec<ObjectId> = courses.iter().map(|course| course.teacher).collect();
    let teachers = user_service::load_user_summaries(&state.mongo, teacher_ids).await?;

    let summaries: Vec<CourseSummary> = courses
        .into_iter()
        .map(|course| course_summary(course, &teachers))
        .collect();

    Ok(Json(summaries))
}

fn course_summary(course: Course, teachers: &HashMap<ObjectId, UserSummary>) -> CourseSummary {
    let teacher = teachers
        .get(&course.teacher)
        .map(|summary| TeacherSummary {
            id: summary.id.clone(),
            first_name: summary.first_name.clone(),
            last_name: summary.last_name.clone(),
            avatar: summary.avatar.clone(),
        })
        .unwrap_or(TeacherSummary {
            id: course.teacher.to_hex(),
            first_name: None,
            last_name: None,
            avatar: None,
        });

    CourseSummary {
        id: course.id.map(|id| id.to_hex()).unwrap_or_default(),
        title: course.title,
        description: course.description,
        level: course.level,
        category: course.category,
        price: course.price,
        image: course.image,
        teacher,
        lessons_count: course.lessons.len(),
        students_count: course.students.len(),
        likes_count: course.likes.len(),
        created_at: course.created_at,
    }
}

/// GET /api/courses/{id} - Course detail with teacher, students and comments
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = ObjectId::parse_str(&course_id)?;
    let service = CourseService::new(state.mongo.clone());
    let course = service.get(&course_id).await?;

    let detail = build_course_detail(&state, course).await?;
    Ok(Json(detail))
}

pub(crate) async fn build_course_detail(
    state: &AppState,
    course: Course,
) -> Result<CourseDetailResponse, ApiError> {
    let mut ids = vec![course.teacher];
    ids.extend(course.students.iter().cloned());
    for comment in &course.comments {
        ids.push(comment.user);
        for reply in &comment.replies {
            ids.push(reply.user);
        }
    }

    let users = user_service::load_user_summaries(&state.mongo, ids).await?;

    let students = course
        .students
        .iter()
        .filter_map(|id| users.get(id))
        .map(clone_summary)
        .collect();

    let comments = course
        .comments
        .iter()
        .map(|comment| comment_view(comment, &users))
        .collect();

    Ok(CourseDetailResponse {
        id: course.id.map(|id| id.to_hex()).unwrap_or_default(),
        title: course.title,
        description: course.description,
        level: course.level,
        category: course.category,
        price: course.price,
        image: course.image,
        teacher: users.get(&course.teacher).map(clone_summary),
        lessons: course.lessons,
        quizzes: course.quizzes,
        students,
        likes: course.likes.iter().map(|id| id.to_hex()).collect(),
        comments,
        is_active: course.is_active,
        is_approved: course.is_approved,
        created_at: course.created_at,
    })
}

fn clone_summary(summary: &UserSummary) -> UserSummary {
    summary.clone()
}

pub(crate) fn comment_view(
    comment: &Comment,
    users: &HashMap<ObjectId, UserSummary>,
) -> CommentView {
    CommentView {
        id: comment.id.to_hex(),
        text: comment.text.clone(),
        user: users.get(&comment.user).map(clone_summary),
        created_at: comment.created_at,
        likes: comment.likes.iter().map(|id| id.to_hex()).collect(),
        replies: comment
            .replies
            .iter()
            .map(|reply| reply_view(reply, users))
            .collect(),
    }
}

fn reply_view(reply: &Reply, users: &HashMap<ObjectId, UserSummary>) -> ReplyView {
    ReplyView {
        id: reply.id.to_hex(),
        text: reply.text.clone(),
        user: users.get(&reply.user).map(clone_summary),
        created_at: reply.created_at,
        likes: reply.likes.iter().map(|id| id.to_hex()).collect(),
    }
}

/// POST /api/courses - Create a course (teacher role, multipart payload)
pub async fn create_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;

    let mut title = String::new();
    let mut description = String::new();
    let mut level = String::new();
    let mut category = String::new();
    let mut price: i64 = 0;
    let mut lessons: Vec<NewLesson> = Vec::new();
    let mut quizzes: Vec<NewQuiz> = Vec::new();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart payload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let original_name = field.file_name().unwrap_or("course").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("Failed to read image: {}", e)))?;
                if !data.is_empty() {
                    image = Some(
                        uploads::save_upload(&state.config.uploads_dir, &original_name, &data)
                            .await?,
                    );
                }
            }
            "title" => title = super::profile::read_text(field).await?,
            "description" => description = super::profile::read_text(field).await?,
            "level" => level = super::profile::read_text(field).await?,
            "category" => category = super::profile::read_text(field).await?,
            "price" => {
                let text = super::profile::read_text(field).await?;
                if !text.is_empty() {
                    price = text
                        .parse()
                        .map_err(|_| ApiError::validation("Price must be a number"))?;
                }
            }
            "lessons" => {
                let text = super::profile::read_text(field).await?;
                lessons = serde_json::from_str(&text)
                    .map_err(|e| ApiError::validation(format!("Invalid lessons JSON: {}", e)))?;
            }
            "quizzes" => {
                let text = super::profile::read_text(field).await?;
                quizzes = serde_json::from_str(&text)
                    .map_err(|e| ApiError::validation(format!("Invalid quizzes JSON: {}", e)))?;
            }
            _ => {
                tracing::debug!("Ignoring unknown course field: {}", name);
            }
        }
    }

    let req = CreateCourseRequest {
        title,
        description,
        level,
        category,
        price,
        lessons,
        quizzes,
        image,
    };
    req.validate()
        .map_err(|e| ApiError::validation(format!("Validation error: {}", e)))?;

    let user_service = UserService::new(state.mongo.clone());
    let author = user_service.get_user(&user_id).await?;

    let service = CourseService::new(state.mongo.clone());
    let course = service.create_course(&author, req).await?;

    tracing::info!(
        course_id = %course.id.map(|id| id.to_hex()).unwrap_or_default(),
        "Course created, awaiting approval"
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Course created successfully. Awaiting admin approval.",
            "course": course,
        })),
    ))
}

/// GET /api/teacher/courses - The caller's own courses
pub async fn teacher_courses(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;
    let service = CourseService::new(state.mongo.clone());
    let courses = service.teacher_courses(&user_id).await?;
    Ok(Json(courses))
}

/// POST /api/courses/{id}/like - Toggle the caller's like
pub async fn toggle_like(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;
    let course_id = ObjectId::parse_str(&course_id)?;

    let service = CourseService::new(state.mongo.clone());
    let course = service.toggle_like(&course_id, &user_id).await?;

    let likers =
        user_service::load_user_summaries(&state.mongo, course.likes.clone()).await?;
    let likes: Vec<UserSummary> = course
        .likes
        .iter()
        .filter_map(|id| likers.get(id))
        .map(clone_summary)
        .collect();

    Ok(Json(serde_json::json!({
        "message": "Like updated successfully",
        "likes": likes,
    })))
}

/// POST /api/courses/{id}/comments - Add a comment or a reply
pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<AddCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::validation(format!("Validation error: {}", e)))?;

    let user_id = claims.user_id()?;
    let course_id = ObjectId::parse_str(&course_id)?;
    let reply_to = req
        .reply_to
        .as_deref()
        .map(ObjectId::parse_str)
        .transpose()?;

    let service = CourseService::new(state.mongo.clone());
    let course = service
        .add_comment(&course_id, &user_id, &req.text, reply_to)
        .await?;

    let detail = build_course_detail(&state, course).await?;

    Ok(Json(serde_json::json!({
        "message": "Comment added successfully",
        "comments": detail.comments,
    })))
}

/// POST /api/courses/{id}/comments/{commentId}/like - Toggle a comment like
pub async fn toggle_comment_like(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, comment_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.user_id()?;
    let course_id = ObjectId::parse_str(&course_id)?;
    let comment_id = ObjectId::parse_str(&comment_id)?;

    let service = CourseService::new(state.mongo.clone());
    let course = service
        .toggle_comment_like(&course_id, &comment_id, &user_id)
        .await?;

    let detail = build_course_detail(&state, course).await?;
    let comment = detail
        .comments
        .into_iter()
        .find(|comment| comment.id == comment_id.to_hex())
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    Ok(Json(serde_json::json!({
        "message": "Comment like updated successfully",
        "comment": comment,
    })))
}

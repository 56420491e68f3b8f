#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use mongodb::bson::{doc, oid::ObjectId};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use englishmaster_api::{config::Config, create_router, services::AppState};

pub async fn create_test_app() -> Router {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // Load test environment from .env.test
    dotenvy::from_filename(".env.test").ok();

    let config = Config::load().expect("Failed to load test configuration");

    // The MongoDB client connects lazily, so building the app does not
    // require a live database; only handlers that touch collections do.
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to create test MongoDB client");

    let app_state = Arc::new(AppState::new(config, mongo_client));

    create_router(app_state)
}

pub fn load_test_config() -> Config {
    dotenvy::from_filename(".env.test").ok();
    Config::load().expect("Failed to load test configuration")
}

pub async fn test_mongo() -> mongodb::Database {
    let config = load_test_config();
    let client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to create test MongoDB client");
    client.database(&config.mongo_database)
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, ObjectId::new().to_hex())
}

pub fn unique_username(prefix: &str) -> String {
    // Usernames are capped at 30 characters; a 12-hex suffix is plenty
    // unique for a test run.
    format!("{}-{}", prefix, &ObjectId::new().to_hex()[..12])
}

/// Register a user, returning (status, body, set-cookie headers).
pub async fn register_user(
    app: &Router,
    username: &str,
    email: &str,
    password: &str,
) -> (StatusCode, String, Vec<String>) {
    let request_body = json!({
        "username": username,
        "email": email,
        "password": password,
        "firstName": "Test",
        "lastName": "User",
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/register")
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();

    let cookies: Vec<String> = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(|s| s.to_string()))
        .collect();

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body_str = String::from_utf8(body.to_vec()).unwrap();

    (status, body_str, cookies)
}

pub async fn login_user(
    app: &Router,
    email: &str,
    password: &str,
) -> (StatusCode, String, Vec<String>) {
    let request_body = json!({
        "email": email,
        "password": password,
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/login")
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();

    let cookies: Vec<String> = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(|s| s.to_string()))
        .collect();

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body_str = String::from_utf8(body.to_vec()).unwrap();

    (status, body_str, cookies)
}

/// Extract the access token from a register/login JSON response.
pub fn extract_token(json_str: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json_str).ok()?;
    value["token"].as_str().map(|s| s.to_string())
}

pub fn extract_user_id(json_str: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json_str).ok()?;
    value["user"]["id"].as_str().map(|s| s.to_string())
}

/// Simple authenticated GET helper.
pub async fn get_with_token(app: &Router, uri: &str, token: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

/// Simple authenticated POST helper with a JSON body.
pub async fn post_with_token(
    app: &Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

/// Seed a course directly in MongoDB (the way a teacher would have created
/// it, already approved). Returns (course_id, lesson_ids, quiz_id).
pub async fn seed_course(
    mongo: &mongodb::Database,
    teacher: ObjectId,
    price: i64,
    lesson_count: usize,
    quiz_questions: usize,
) -> (ObjectId, Vec<ObjectId>, ObjectId) {
    let lesson_ids: Vec<ObjectId> = (0..lesson_count).map(|_| ObjectId::new()).collect();

    let lessons: Vec<mongodb::bson::Document> = lesson_ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            doc! {
                "_id": id,
                "title": format!("Lesson {}", i + 1),
                "content": "Hello, how are you?",
                "materials": [],
                "duration": 30_i64,
                "order": i as i64,
            }
        })
        .collect();

    let quiz_id = ObjectId::new();
    let questions: Vec<mongodb::bson::Document> = (0..quiz_questions)
        .map(|i| {
            doc! {
                "question": format!("Question {}", i + 1),
                "options": ["a", "b", "c"],
                // Correct answer is always option 0, so tests can dial in
                // any score they need.
                "correctAnswer": 0_i64,
            }
        })
        .collect();

    let course_id = ObjectId::new();
    let course = doc! {
        "_id": course_id,
        "title": format!("Course {}", course_id.to_hex()),
        "description": "Seeded test course",
        "level": "beginner",
        "category": "General English",
        "price": price,
        "teacher": teacher,
        "lessons": lessons,
        "quizzes": [ { "_id": quiz_id, "lessonId": &lesson_ids[0], "questions": questions } ],
        "students": [],
        "likes": [],
        "comments": [],
        "isActive": true,
        "isApproved": true,
        "createdAt": mongodb::bson::DateTime::now(),
    };

    mongo
        .collection::<mongodb::bson::Document>("courses")
        .insert_one(course)
        .await
        .expect("Failed to seed course");

    (course_id, lesson_ids, quiz_id)
}

pub async fn user_coins(mongo: &mongodb::Database, user_id: &ObjectId) -> i64 {
    let user = mongo
        .collection::<mongodb::bson::Document>("users")
        .find_one(doc! { "_id": user_id })
        .await
        .expect("Failed to load user")
        .expect("User not found");
    user.get_i64("coins")
        .or_else(|_| user.get_i32("coins").map(|v| v as i64))
        .expect("coins field missing")
}

pub async fn set_user_coins(mongo: &mongodb::Database, user_id: &ObjectId, coins: i64) {
    mongo
        .collection::<mongodb::bson::Document>("users")
        .update_one(doc! { "_id": user_id }, doc! { "$set": { "coins": coins } })
        .await
        .expect("Failed to set coins");
}

pub async fn make_admin(mongo: &mongodb::Database, user_id: &ObjectId) {
    mongo
        .collection::<mongodb::bson::Document>("users")
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { "isAdmin": true, "isTeacher": true } },
        )
        .await
        .expect("Failed to promote user");
}

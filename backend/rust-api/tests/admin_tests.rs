//! Admin panel: role guard, stats, listings, approval and guarded deletes.
//!
//! Requires the MongoDB replica set configured in `.env.test`; run with
//! `cargo test -- --ignored`.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use mongodb::bson::{doc, oid::ObjectId};
use serde_json::json;
use tower::ServiceExt;

mod common;

async fn registered_user(app: &axum::Router, prefix: &str) -> (String, ObjectId) {
    let (status, body, _) = common::register_user(
        app,
        &common::unique_username(prefix),
        &common::unique_email(prefix),
        "SecurePassword123!",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let token = common::extract_token(&body).unwrap();
    let user_id = ObjectId::parse_str(common::extract_user_id(&body).unwrap()).unwrap();
    (token, user_id)
}

/// Register a user and flip the admin flag directly in the database.
async fn admin_user(app: &axum::Router, mongo: &mongodb::Database) -> (String, ObjectId) {
    let (token, user_id) = registered_user(app, "admin").await;
    common::make_admin(mongo, &user_id).await;
    (token, user_id)
}

#[tokio::test]
#[ignore]
async fn non_admin_cannot_access_admin_routes() {
    let app = common::create_test_app().await;

    let (token, _) = registered_user(&app, "student").await;

    let (status, _) = common::get_with_token(&app, "/api/admin/stats", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn admin_stats_counts_are_present() {
    let app = common::create_test_app().await;
    let mongo = common::test_mongo().await;

    let (token, _) = admin_user(&app, &mongo).await;

    let (status, body) = common::get_with_token(&app, "/api/admin/stats", &token).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(json["totalUsers"].as_u64().unwrap() >= 1);
    assert!(json["totalCourses"].is_u64() || json["totalCourses"].is_number());
    assert!(json["monthlyRevenue"].is_number());
    assert!(json["weeklyRevenue"].is_number());
    assert!(json["coursesStats"].is_array());
}

#[tokio::test]
#[ignore]
async fn admin_user_listing_paginates() {
    let app = common::create_test_app().await;
    let mongo = common::test_mongo().await;

    let (token, _) = admin_user(&app, &mongo).await;

    let (status, body) =
        common::get_with_token(&app, "/api/admin/users?page=1&limit=5", &token).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(json["users"].as_array().unwrap().len() <= 5);
    assert_eq!(json["currentPage"], 1);
    assert!(json["total"].as_u64().unwrap() >= 1);
}

#[tokio::test]
#[ignore]
async fn course_approval_flips_the_flag() {
    let app = common::create_test_app().await;
    let mongo = common::test_mongo().await;

    let (token, _) = admin_user(&app, &mongo).await;
    let (course_id, _, _) = common::seed_course(&mongo, ObjectId::new(), 0, 1, 0).await;

    // Seeded approved; reject it
    let uri = format!("/api/admin/courses/{}/approve", course_id.to_hex());
    let (status, body) =
        common::post_with_token(&app, &uri, &token, json!({ "approved": false })).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["course"]["isApproved"], false);

    // Rejected courses disappear from the public catalogue
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/courses")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let catalogue: serde_json::Value =
        serde_json::from_str(std::str::from_utf8(&body).unwrap()).unwrap();
    let listed = catalogue
        .as_array()
        .unwrap()
        .iter()
        .any(|course| course["id"] == course_id.to_hex());
    assert!(!listed);
}

#[tokio::test]
#[ignore]
async fn deleting_a_user_who_owns_courses_conflicts() {
    let app = common::create_test_app().await;
    let mongo = common::test_mongo().await;

    let (admin_token, _) = admin_user(&app, &mongo).await;
    let (_, teacher_id) = registered_user(&app, "owner").await;
    let (course_id, _, _) = common::seed_course(&mongo, teacher_id, 0, 1, 0).await;

    let uri = format!("/api/admin/users/{}", teacher_id.to_hex());
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(&uri)
                .header("authorization", format!("Bearer {}", admin_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Remove the course, then the delete goes through
    let course_uri = format!("/api/admin/courses/{}", course_id.to_hex());
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(&course_uri)
                .header("authorization", format!("Bearer {}", admin_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(&uri)
                .header("authorization", format!("Bearer {}", admin_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let remaining = mongo
        .collection::<mongodb::bson::Document>("users")
        .count_documents(doc! { "_id": teacher_id })
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
#[ignore]
async fn deleting_a_course_cascades_progress_and_payments() {
    let app = common::create_test_app().await;
    let mongo = common::test_mongo().await;

    let (admin_token, _) = admin_user(&app, &mongo).await;
    let (student_token, student_id) = registered_user(&app, "cascade").await;
    let (course_id, _, _) = common::seed_course(&mongo, ObjectId::new(), 50, 2, 0).await;

    // Student buys the course, creating progress and a payment record
    let enroll_uri = format!("/api/courses/{}/enroll", course_id.to_hex());
    let (status, _) = common::post_with_token(&app, &enroll_uri, &student_token, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let delete_uri = format!("/api/admin/courses/{}", course_id.to_hex());
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(&delete_uri)
                .header("authorization", format!("Bearer {}", admin_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let progress_left = mongo
        .collection::<mongodb::bson::Document>("progress")
        .count_documents(doc! { "course": course_id })
        .await
        .unwrap();
    assert_eq!(progress_left, 0);

    let payments_left = mongo
        .collection::<mongodb::bson::Document>("payments")
        .count_documents(doc! { "course": course_id })
        .await
        .unwrap();
    assert_eq!(payments_left, 0);

    // The student record itself survives
    let student_left = mongo
        .collection::<mongodb::bson::Document>("users")
        .count_documents(doc! { "_id": student_id })
        .await
        .unwrap();
    assert_eq!(student_left, 1);
}

#[tokio::test]
#[ignore]
async fn admin_can_edit_user_fields_directly() {
    let app = common::create_test_app().await;
    let mongo = common::test_mongo().await;

    let (admin_token, _) = admin_user(&app, &mongo).await;
    let (_, target_id) = registered_user(&app, "edit-target").await;

    let uri = format!("/api/admin/users/{}", target_id.to_hex());
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(&uri)
                .header("authorization", format!("Bearer {}", admin_token))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "coins": 999, "isTeacher": true }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value =
        serde_json::from_str(std::str::from_utf8(&body).unwrap()).unwrap();
    assert_eq!(json["user"]["coins"], 999);
    assert_eq!(json["user"]["isTeacher"], true);
}

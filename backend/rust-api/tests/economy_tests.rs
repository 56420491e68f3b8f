//! Coin economy: enrollment purchases, premium subscription and transfers.
//!
//! Requires the MongoDB replica set configured in `.env.test` (transactions
//! are unavailable on a standalone server); run with `cargo test -- --ignored`.

use axum::http::StatusCode;
use mongodb::bson::{doc, oid::ObjectId};
use serde_json::json;

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

#[tokio::test]
#[ignore]
async fn free_enrollment_is_idempotent() {
    let app = common::create_test_app().await;
    let mongo = common::test_mongo().await;

    let (token, user_id) = registered_user(&app, "enroll-free").await;
    let (course_id, _, _) = common::seed_course(&mongo, ObjectId::new(), 0, 3, 0).await;

    let uri = format!("/api/courses/{}/enroll", course_id.to_hex());
    let (status, _) = common::post_with_token(&app, &uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = common::post_with_token(&app, &uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    // Exactly one membership, one progress record, no payments, no debit
    let course = mongo
        .collection::<mongodb::bson::Document>("courses")
        .find_one(doc! { "_id": course_id })
        .await
        .unwrap()
        .unwrap();
    let students = course.get_array("students").unwrap();
    assert_eq!(students.len(), 1);

    let progress_count = mongo
        .collection::<mongodb::bson::Document>("progress")
        .count_documents(doc! { "user": user_id, "course": course_id })
        .await
        .unwrap();
    assert_eq!(progress_count, 1);

    let payment_count = mongo
        .collection::<mongodb::bson::Document>("payments")
        .count_documents(doc! { "user": user_id })
        .await
        .unwrap();
    assert_eq!(payment_count, 0);

    assert_eq!(common::user_coins(&mongo, &user_id).await, 100);
}

#[tokio::test]
#[ignore]
async fn paid_enrollment_debits_once_and_records_payment() {
    let app = common::create_test_app().await;
    let mongo = common::test_mongo().await;

    let (token, user_id) = registered_user(&app, "enroll-paid").await;
    let (course_id, _, _) = common::seed_course(&mongo, ObjectId::new(), 60, 2, 0).await;

    let uri = format!("/api/courses/{}/enroll", course_id.to_hex());
    let (status, _) = common::post_with_token(&app, &uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(common::user_coins(&mongo, &user_id).await, 40);

    let payment_count = mongo
        .collection::<mongodb::bson::Document>("payments")
        .count_documents(doc! { "user": user_id, "course": course_id, "type": "course_purchase" })
        .await
        .unwrap();
    assert_eq!(payment_count, 1);

    // Enrolling again must not charge a second time
    let (status, body) = common::post_with_token(&app, &uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Already enrolled"));
    assert_eq!(common::user_coins(&mongo, &user_id).await, 40);
}

#[tokio::test]
#[ignore]
async fn insufficient_balance_leaves_everything_unchanged() {
    let app = common::create_test_app().await;
    let mongo = common::test_mongo().await;

    let (token, user_id) = registered_user(&app, "enroll-poor").await;
    let (course_id, _, _) = common::seed_course(&mongo, ObjectId::new(), 500, 2, 0).await;

    let uri = format!("/api/courses/{}/enroll", course_id.to_hex());
    let (status, body) = common::post_with_token(&app, &uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Insufficient coins"));

    // Balance, payment history and enrollment all untouched
    assert_eq!(common::user_coins(&mongo, &user_id).await, 100);

    let payment_count = mongo
        .collection::<mongodb::bson::Document>("payments")
        .count_documents(doc! { "user": user_id })
        .await
        .unwrap();
    assert_eq!(payment_count, 0);

    let progress_count = mongo
        .collection::<mongodb::bson::Document>("progress")
        .count_documents(doc! { "user": user_id, "course": course_id })
        .await
        .unwrap();
    assert_eq!(progress_count, 0);

    let course = mongo
        .collection::<mongodb::bson::Document>("courses")
        .find_one(doc! { "_id": course_id })
        .await
        .unwrap()
        .unwrap();
    assert!(course.get_array("students").unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn coin_transfer_preserves_the_balance_sum() {
    let app = common::create_test_app().await;
    let mongo = common::test_mongo().await;

    let (sender_token, sender_id) = registered_user(&app, "sender").await;
    let (_, receiver_id) = registered_user(&app, "receiver").await;

    let uri = format!("/api/coins/send/{}", receiver_id.to_hex());
    let (status, _) =
        common::post_with_token(&app, &uri, &sender_token, json!({ "amount": 30 })).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(common::user_coins(&mongo, &sender_id).await, 70);
    assert_eq!(common::user_coins(&mongo, &receiver_id).await, 130);
}

#[tokio::test]
#[ignore]
async fn transfer_with_insufficient_balance_changes_nothing() {
    let app = common::create_test_app().await;
    let mongo = common::test_mongo().await;

    let (sender_token, sender_id) = registered_user(&app, "sender-poor").await;
    let (_, receiver_id) = registered_user(&app, "receiver-poor").await;

    let uri = format!("/api/coins/send/{}", receiver_id.to_hex());
    let (status, body) =
        common::post_with_token(&app, &uri, &sender_token, json!({ "amount": 500 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Insufficient coins"));

    assert_eq!(common::user_coins(&mongo, &sender_id).await, 100);
    assert_eq!(common::user_coins(&mongo, &receiver_id).await, 100);
}

#[tokio::test]
#[ignore]
async fn transfer_to_unknown_user_is_not_found() {
    let app = common::create_test_app().await;

    let (sender_token, _) = registered_user(&app, "sender-404").await;

    let uri = format!("/api/coins/send/{}", ObjectId::new().to_hex());
    let (status, _) =
        common::post_with_token(&app, &uri, &sender_token, json!({ "amount": 10 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn premium_subscription_charges_once() {
    let app = common::create_test_app().await;
    let mongo = common::test_mongo().await;

    let (token, user_id) = registered_user(&app, "premium").await;

    // Not affordable with the starting balance
    let (status, _) =
        common::post_with_token(&app, "/api/premium/subscribe", &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::set_user_coins(&mongo, &user_id, 1500).await;

    let (status, body) =
        common::post_with_token(&app, "/api/premium/subscribe", &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["user"]["coins"], 300);
    assert_eq!(json["user"]["isPremium"], true);

    // A second subscription attempt is a conflict and does not charge
    let (status, _) =
        common::post_with_token(&app, "/api/premium/subscribe", &token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(common::user_coins(&mongo, &user_id).await, 300);

    let payment_count = mongo
        .collection::<mongodb::bson::Document>("payments")
        .count_documents(doc! { "user": user_id, "type": "premium_subscription" })
        .await
        .unwrap();
    assert_eq!(payment_count, 1);
}

#[tokio::test]
#[ignore]
async fn chat_message_with_coins_moves_the_balance() {
    let app = common::create_test_app().await;
    let mongo = common::test_mongo().await;

    let (sender_token, sender_id) = registered_user(&app, "chat-sender").await;
    let (_, receiver_id) = registered_user(&app, "chat-receiver").await;

    let uri = format!("/api/chat/{}/send", receiver_id.to_hex());
    let (status, _) = common::post_with_token(
        &app,
        &uri,
        &sender_token,
        json!({ "text": "here, take these", "coins": 25 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(common::user_coins(&mongo, &sender_id).await, 75);
    assert_eq!(common::user_coins(&mongo, &receiver_id).await, 125);

    let message_count = mongo
        .collection::<mongodb::bson::Document>("messages")
        .count_documents(doc! { "from": sender_id, "to": receiver_id })
        .await
        .unwrap();
    assert_eq!(message_count, 1);
}

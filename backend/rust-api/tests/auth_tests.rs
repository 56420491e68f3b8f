//! Registration/login/refresh flows.
//!
//! These tests run against the MongoDB instance configured in `.env.test`
//! (a replica set, since the economy endpoints use transactions) and are
//! therefore `#[ignore]`d by default:
//!
//!   cargo test -- --ignored

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use tower::ServiceExt;

mod common;

#[tokio::test]
#[ignore]
async fn register_success_returns_token_and_profile() {
    let app = common::create_test_app().await;

    let username = common::unique_username("register");
    let email = common::unique_email("register");
    let (status, body, cookies) =
        common::register_user(&app, &username, &email, "SecurePassword123!").await;

    assert_eq!(status, StatusCode::CREATED);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(json["token"].is_string());
    assert_eq!(json["user"]["email"], email);
    assert_eq!(json["user"]["username"], username);
    // New accounts start with the default balance and no roles
    assert_eq!(json["user"]["coins"], 100);
    assert_eq!(json["user"]["isPremium"], false);
    assert_eq!(json["user"]["isTeacher"], false);
    assert_eq!(json["user"]["isAdmin"], false);

    // Refresh token is delivered as an HTTP-only cookie
    let refresh_cookie = cookies
        .iter()
        .find(|c| c.starts_with("refresh_token="))
        .expect("refresh_token cookie not found");
    assert!(refresh_cookie.contains("HttpOnly"));
    assert!(refresh_cookie.contains("Path=/api"));
}

#[tokio::test]
#[ignore]
async fn register_duplicate_email_conflicts() {
    let app = common::create_test_app().await;

    let email = common::unique_email("duplicate");

    let (status, _, _) = common::register_user(
        &app,
        &common::unique_username("dup1"),
        &email,
        "Password123!",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Same email, different username
    let (status, body, _) = common::register_user(
        &app,
        &common::unique_username("dup2"),
        &email,
        "Password456!",
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("already taken"));
}

#[tokio::test]
#[ignore]
async fn register_duplicate_username_conflicts() {
    let app = common::create_test_app().await;

    let username = common::unique_username("taken");

    let (status, _, _) = common::register_user(
        &app,
        &username,
        &common::unique_email("first"),
        "Password123!",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, _) = common::register_user(
        &app,
        &username,
        &common::unique_email("second"),
        "Password123!",
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn login_succeeds_after_register() {
    let app = common::create_test_app().await;

    let email = common::unique_email("login");
    let password = "SecurePassword123!";
    let (status, _, _) =
        common::register_user(&app, &common::unique_username("login"), &email, password).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body, _) = common::login_user(&app, &email, password).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(json["token"].is_string());
    assert_eq!(json["user"]["email"], email);
}

#[tokio::test]
#[ignore]
async fn login_failure_does_not_reveal_which_credential_was_wrong() {
    let app = common::create_test_app().await;

    let email = common::unique_email("wrongpwd");
    let (status, _, _) = common::register_user(
        &app,
        &common::unique_username("wrongpwd"),
        &email,
        "CorrectPassword123!",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Wrong password for an existing account
    let (status_wrong_pwd, body_wrong_pwd, _) =
        common::login_user(&app, &email, "WrongPassword123!").await;
    assert_eq!(status_wrong_pwd, StatusCode::UNAUTHORIZED);

    // Unknown email entirely
    let (status_unknown, body_unknown, _) =
        common::login_user(&app, &common::unique_email("ghost"), "AnyPassword123!").await;
    assert_eq!(status_unknown, StatusCode::UNAUTHORIZED);

    // Identical message in both cases
    let msg_wrong_pwd: serde_json::Value = serde_json::from_str(&body_wrong_pwd).unwrap();
    let msg_unknown: serde_json::Value = serde_json::from_str(&body_unknown).unwrap();
    assert_eq!(msg_wrong_pwd["message"], msg_unknown["message"]);
}

#[tokio::test]
#[ignore]
async fn refresh_flow_mints_a_new_access_token() {
    let app = common::create_test_app().await;

    let email = common::unique_email("refresh");
    let (_, _, cookies) = common::register_user(
        &app,
        &common::unique_username("refresh"),
        &email,
        "SecurePassword123!",
    )
    .await;

    let refresh_cookie = cookies
        .iter()
        .find(|c| c.starts_with("refresh_token="))
        .and_then(|c| c.split(';').next())
        .expect("refresh_token cookie missing")
        .to_string();

    // CSRF token for the cookie-authenticated endpoint
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/csrf-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let csrf_cookie = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|c| c.starts_with("csrf_token="))
        .and_then(|header| header.split(';').next())
        .unwrap()
        .to_string();
    let csrf_token = csrf_cookie.split('=').nth(1).unwrap().to_string();

    let cookie_header = format!("{}; {}", csrf_cookie, refresh_cookie);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/refresh")
                .header("cookie", cookie_header)
                .header("x-csrf-token", csrf_token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value =
        serde_json::from_str(std::str::from_utf8(&body).unwrap()).unwrap();
    assert!(json["token"].is_string());

    // The minted token works against a protected route
    let token = json["token"].as_str().unwrap();
    let (status, _) = common::get_with_token(&app, "/api/profile", token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore]
async fn profile_returns_current_user() {
    let app = common::create_test_app().await;

    let email = common::unique_email("profile");
    let (_, body, _) = common::register_user(
        &app,
        &common::unique_username("profile"),
        &email,
        "SecurePassword123!",
    )
    .await;
    let token = common::extract_token(&body).unwrap();

    let (status, body) = common::get_with_token(&app, "/api/profile", &token).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["email"], email);
    // Password hash never leaves the server
    assert!(json.get("passwordHash").is_none());
    // No progress yet, so the derived rating is zero
    assert_eq!(json["rating"], 0);
}

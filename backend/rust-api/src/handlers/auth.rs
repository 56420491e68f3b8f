use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtService,
    models::refresh_token::RefreshTokenResponse,
    models::user::{AuthResponse, LoginRequest, RegisterRequest},
    services::{auth_service::AuthService, AppState},
};

const REFRESH_COOKIE: &str = "refresh_token";

fn refresh_cookie(value: String, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, value))
        .path("/api")
        .http_only(true)
        .secure(true)
        .same_site(axum_extra::extract::cookie::SameSite::Strict)
        .max_age(max_age)
        .build()
}

/// POST /api/register - Register a new user
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::validation(format!("Validation error: {}", e)))?;

    tracing::info!("Registering new user: {}", req.email);

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let service = AuthService::new(state.mongo.clone(), jwt_service);

    let session = service.register(req).await?;

    tracing::info!("User registered successfully");

    let jar = jar.add(refresh_cookie(
        session.refresh_token,
        time::Duration::days(30),
    ));

    let body = AuthResponse {
        message: "User registered successfully".to_string(),
        token: session.token,
        user: session.user,
    };

    Ok((StatusCode::CREATED, jar, Json(body)))
}

/// POST /api/login - Login with email and password
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::validation(format!("Validation error: {}", e)))?;

    tracing::info!("Login attempt for user: {}", req.email);

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let service = AuthService::new(state.mongo.clone(), jwt_service);

    let session = service.login(req).await?;

    let jar = jar.add(refresh_cookie(
        session.refresh_token,
        time::Duration::days(30),
    ));

    let body = AuthResponse {
        message: "Login successful".to_string(),
        token: session.token,
        user: session.user,
    };

    Ok((StatusCode::OK, jar, Json(body)))
}

/// POST /api/refresh - Mint a new access token from the refresh cookie
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    tracing::debug!("Refreshing access token");

    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ApiError::unauthorized("Missing refresh token cookie"))?;

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let service = AuthService::new(state.mongo.clone(), jwt_service);

    let token = service.refresh_token(&refresh_token).await?;

    Ok((StatusCode::OK, Json(RefreshTokenResponse { token })))
}

/// POST /api/logout - Revoke the refresh token and clear the cookie
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Logging out user");

    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ApiError::unauthorized("Missing refresh token cookie"))?;

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let service = AuthService::new(state.mongo.clone(), jwt_service);

    service.logout(&refresh_token).await?;

    // Clear the refresh_token cookie
    let jar = jar.add(refresh_cookie(String::new(), time::Duration::ZERO));

    Ok((StatusCode::NO_CONTENT, jar))
}

/// GET /api/csrf-token - Get CSRF token for cookie-authenticated requests
/// Returns CSRF token in both JSON response and as a cookie
pub async fn get_csrf_token() -> Result<impl IntoResponse, ApiError> {
    use crate::middlewares::csrf::{generate_csrf_token, set_csrf_cookie};
    use axum::response::Response;

    tracing::debug!("Generating CSRF token");

    let token = generate_csrf_token();

    let json_response = Json(serde_json::json!({
        "csrf_token": token
    }));

    let response: Response = (StatusCode::OK, json_response).into_response();
    let response_with_cookie = set_csrf_cookie(response, &token);

    Ok(response_with_cookie)
}

#![allow(dead_code)]

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    let auth_mw = middleware::from_fn_with_state(
        app_state.clone(),
        middlewares::auth::auth_middleware,
    );
    let admin_mw = middleware::from_fn_with_state(
        app_state.clone(),
        middlewares::auth::admin_middleware,
    );

    // Public API surface: registration, login, token refresh and the open
    // course catalogue. The cookie-authenticated refresh/logout endpoints
    // carry CSRF protection instead of a bearer token.
    let public_api = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/csrf-token", get(handlers::auth::get_csrf_token))
        .route(
            "/refresh",
            post(handlers::auth::refresh_token)
                .route_layer(middleware::from_fn(middlewares::csrf::csrf_middleware)),
        )
        .route(
            "/logout",
            post(handlers::auth::logout)
                .route_layer(middleware::from_fn(middlewares::csrf::csrf_middleware)),
        )
        // Catalogue listing is public; creating a course on the same path
        // requires a bearer token, layered on the POST handler alone.
        .route(
            "/courses",
            get(handlers::courses::list_courses).merge(
                post(handlers::courses::create_course).route_layer(auth_mw.clone()),
            ),
        )
        .route("/courses/{id}", get(handlers::courses::get_course));

    // Everything else requires a valid bearer token.
    let protected_api = Router::new()
        .route(
            "/profile",
            get(handlers::profile::get_profile).put(handlers::profile::update_profile),
        )
        .route("/teacher/courses", get(handlers::courses::teacher_courses))
        .route("/courses/{id}/enroll", post(handlers::economy::enroll))
        .route("/courses/{id}/like", post(handlers::courses::toggle_like))
        .route(
            "/courses/{id}/comments",
            post(handlers::courses::add_comment),
        )
        .route(
            "/courses/{id}/comments/{comment_id}/like",
            post(handlers::courses::toggle_comment_like),
        )
        .route(
            "/courses/{id}/lessons/{lesson_id}",
            get(handlers::learning::get_lesson),
        )
        .route(
            "/courses/{id}/lessons/{lesson_id}/complete",
            post(handlers::learning::complete_lesson),
        )
        .route(
            "/courses/{id}/quizzes/{quiz_id}/submit",
            post(handlers::learning::submit_quiz),
        )
        .route("/progress", get(handlers::learning::get_progress))
        .route(
            "/premium/subscribe",
            post(handlers::economy::subscribe_premium),
        )
        .route("/users", get(handlers::social::list_users))
        .route("/users/{id}", get(handlers::social::get_user))
        .route(
            "/friends",
            get(handlers::social::list_friends).post(handlers::social::add_friend),
        )
        .route("/friends/{friend_id}", delete(handlers::social::remove_friend))
        .route("/leaderboard", get(handlers::social::leaderboard))
        .route("/compare/{compare_id}", get(handlers::social::compare))
        .route("/chat/{user_id}/messages", get(handlers::chat::get_messages))
        .route("/chat/{user_id}/send", post(handlers::chat::send_message))
        .route(
            "/coins/send/{receiver_id}",
            post(handlers::economy::send_coins),
        )
        .route_layer(auth_mw.clone());

    // Admin panel: bearer token plus the admin flag on the user document.
    let admin_routes = Router::new()
        .route("/stats", get(handlers::admin::get_stats))
        .route("/revenue", get(handlers::admin::get_revenue))
        .route("/users", get(handlers::admin::list_users))
        .route(
            "/users/{id}",
            get(handlers::admin::get_user)
                .put(handlers::admin::update_user)
                .delete(handlers::admin::delete_user),
        )
        .route("/courses", get(handlers::admin::list_courses))
        .route(
            "/courses/{id}",
            get(handlers::admin::get_course)
                .put(handlers::admin::update_course)
                .delete(handlers::admin::delete_course),
        )
        .route(
            "/courses/{id}/approve",
            post(handlers::admin::approve_course),
        )
        .route(
            "/courses/{id}/participants",
            get(handlers::admin::course_participants),
        )
        .route("/payments", get(handlers::admin::list_payments))
        .route(
            "/premium-subscriptions",
            get(handlers::admin::list_premium_subscriptions),
        )
        .route_layer(admin_mw)
        .route_layer(auth_mw);

    let api = public_api.merge(protected_api).nest("/admin", admin_routes);

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api", api)
        // Uploaded avatars and course images
        .nest_service(
            "/uploads",
            ServeDir::new(&app_state.config.uploads_dir),
        )
        // HTML page routes served from public/
        .route_service("/", ServeFile::new("public/index.html"))
        .route_service("/login", ServeFile::new("public/login.html"))
        .route_service("/register", ServeFile::new("public/register.html"))
        .route_service("/courses", ServeFile::new("public/courses.html"))
        .route_service("/course/{id}", ServeFile::new("public/course-detail.html"))
        .route_service("/profile", ServeFile::new("public/profile.html"))
        .route_service("/teacher", ServeFile::new("public/teacher.html"))
        .route_service("/admin", ServeFile::new("public/admin.html"))
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware)) // Apply CSP to all responses
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

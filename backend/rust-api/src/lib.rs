use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

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
             script-src 'self'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

/// Origins from `CORS_ALLOWED_ORIGINS` (comma separated); credentials are allowed for them
fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000".to_string())
        .split(',')
        .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(middlewares::csrf::CSRF_HEADER_NAME),
        ])
        .allow_credentials(true)
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest(
            "/api",
            public_routes(app_state.clone())
                .merge(protected_routes(app_state.clone()))
                .merge(author_routes(app_state.clone())),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware))
        .layer(cors_layer())
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(middlewares::metrics::metrics_middleware))
        .layer(middleware::from_fn(middlewares::trace::trace_context_middleware))
        .layer(TraceLayer::new_for_http())
}

fn public_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let signup_route = Router::new()
        .route("/users/signup", post(handlers::account::signup))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::signup_rate_limit_middleware,
        ));

    let signin_route = Router::new()
        .route("/users/signin", post(handlers::account::signin))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::signin_rate_limit_middleware,
        ));

    // The refresh cookie is sent automatically, so the CSRF token is required here too
    let refresh_route = Router::new()
        .route("/users/refresh", post(handlers::account::refresh))
        .route_layer(middleware::from_fn(middlewares::csrf::csrf_middleware));

    let csrf_route = Router::new().route("/users/csrf-token", get(handlers::account::csrf_token));

    signup_route
        .merge(signin_route)
        .merge(refresh_route)
        .merge(csrf_route)
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::rate_limit::rate_limit_middleware,
        ))
}

/// Any signed-in user; finer role checks happen in the handlers.
/// Layers run bottom-up: auth, then CSRF, then the per-user rate limit.
fn protected_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        // Account
        .route("/users/signout", post(handlers::account::signout))
        .route(
            "/users/profile",
            get(handlers::account::get_profile).put(handlers::account::update_profile),
        )
        // People
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/users/{uid}",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route("/users/{uid}/courses", get(handlers::users::user_courses))
        .route(
            "/users/{uid}/enrollments",
            get(handlers::users::user_enrollments),
        )
        .route(
            "/users/{uid}/courses/{cid}/enroll",
            post(handlers::users::enroll),
        )
        .route(
            "/users/{uid}/courses/{cid}/unenroll",
            delete(handlers::users::unenroll),
        )
        .route(
            "/users/{uid}/courses/{cid}/enrollment",
            get(handlers::users::enrollment_status),
        )
        .route(
            "/users/{uid}/quizzes/{qid}/attempts",
            get(handlers::users::user_quiz_attempts),
        )
        // Courses
        .route(
            "/courses",
            get(handlers::courses::list_courses).post(handlers::courses::create_course),
        )
        .route(
            "/courses/{cid}",
            get(handlers::courses::get_course)
                .put(handlers::courses::update_course)
                .delete(handlers::courses::delete_course),
        )
        .route(
            "/courses/{cid}/enrollments",
            get(handlers::courses::course_enrollments),
        )
        .route("/courses/{cid}/users", get(handlers::courses::course_users))
        .route(
            "/courses/{cid}/modules",
            get(handlers::modules::list_modules).post(handlers::modules::create_module),
        )
        .route(
            "/courses/{cid}/assignments",
            get(handlers::assignments::list_assignments)
                .post(handlers::assignments::create_assignment),
        )
        .route(
            "/courses/{cid}/assignments/{aid}",
            get(handlers::assignments::get_assignment)
                .put(handlers::assignments::update_assignment)
                .delete(handlers::assignments::delete_assignment),
        )
        // Quizzes
        .route(
            "/courses/{cid}/quizzes",
            get(handlers::quizzes::list_quizzes).post(handlers::quizzes::create_quiz),
        )
        .route(
            "/quizzes/{qid}",
            get(handlers::quizzes::get_quiz)
                .put(handlers::quizzes::update_quiz)
                .delete(handlers::quizzes::delete_quiz),
        )
        .route(
            "/quizzes/{qid}/questions",
            get(handlers::questions::list_questions).post(handlers::questions::create_question),
        )
        // Taking quizzes
        .route("/quiz-attempts", post(handlers::attempts::start_attempt))
        .route("/quiz-attempts/{id}", get(handlers::attempts::get_attempt))
        .route(
            "/quiz-attempts/{id}/answers",
            put(handlers::attempts::save_answers),
        )
        .route(
            "/quiz-attempts/{id}/submit",
            post(handlers::attempts::submit_attempt),
        )
        .route(
            "/quiz-attempts/{id}/results",
            get(handlers::attempts::attempt_results),
        )
        .route(
            "/quiz-attempts/{id}/stream",
            get(handlers::sse::attempt_stream),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn(middlewares::csrf::csrf_middleware))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}

/// Routes where every method is for FACULTY/ADMIN only
fn author_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/enrollments", get(handlers::enrollments::list_enrollments))
        .route(
            "/courses/{cid}/modules/{mid}",
            put(handlers::modules::update_module).delete(handlers::modules::delete_module),
        )
        .route(
            "/quizzes/{qid}/publish",
            put(handlers::quizzes::publish_quiz),
        )
        .route(
            "/quizzes/{qid}/questions/order",
            put(handlers::questions::reorder_questions),
        )
        .route(
            "/quizzes/{qid}/questions/{question_id}",
            put(handlers::questions::update_question).delete(handlers::questions::delete_question),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn(middlewares::csrf::csrf_middleware))
        .route_layer(middleware::from_fn(
            middlewares::auth::author_guard_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}

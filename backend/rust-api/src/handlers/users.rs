use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;

use super::{require_admin, require_author, require_self_or_author};
use crate::{
    error::ServiceResult,
    extractors::ValidJson,
    middlewares::auth::JwtClaims,
    models::{
        attempt::AttemptResponse,
        course::Course,
        enrollment::{Enrollment, EnrollmentStatus},
        user::{ListUsersQuery, Role, SignupRequest, UpdateUserRequest, UserProfile},
    },
    services::{
        attempt_service::AttemptService, course_service::CourseService,
        enrollment_service::EnrollmentService, user_service::UserService, AppState,
    },
};

/// GET /api/users?role=&name=
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<ListUsersQuery>,
) -> ServiceResult<Json<Vec<UserProfile>>> {
    require_author(&claims)?;

    let users = UserService::new(state.mongo.clone())
        .list_users(query)
        .await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// POST /api/users - Admin creates an account with any role
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidJson(req): ValidJson<SignupRequest>,
) -> ServiceResult<impl IntoResponse> {
    require_admin(&claims)?;

    let role = req.role.unwrap_or(Role::Student);
    let user = UserService::new(state.mongo.clone())
        .create_user(req, role)
        .await?;
    tracing::info!(admin_id = %claims.sub, user_id = %user.id, role = role.as_str(), "User created");
    Ok((StatusCode::CREATED, Json(UserProfile::from(user))))
}

/// GET /api/users/{uid}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(user_id): Path<String>,
) -> ServiceResult<Json<UserProfile>> {
    require_self_or_author(&claims, &user_id)?;

    let user = UserService::new(state.mongo.clone())
        .get_user(&user_id)
        .await?;
    Ok(Json(UserProfile::from(user)))
}

/// PUT /api/users/{uid}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(user_id): Path<String>,
    ValidJson(req): ValidJson<UpdateUserRequest>,
) -> ServiceResult<Json<UserProfile>> {
    require_author(&claims)?;

    let user = UserService::new(state.mongo.clone())
        .update_user(&user_id, req)
        .await?;
    tracing::info!(editor_id = %claims.sub, user_id = %user_id, "User updated");
    Ok(Json(UserProfile::from(user)))
}

/// DELETE /api/users/{uid}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(user_id): Path<String>,
) -> ServiceResult<StatusCode> {
    require_admin(&claims)?;

    UserService::new(state.mongo.clone())
        .delete_user(&user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/users/{uid}/courses - Courses the user is enrolled in
pub async fn user_courses(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(user_id): Path<String>,
) -> ServiceResult<Json<Vec<Course>>> {
    require_self_or_author(&claims, &user_id)?;

    let courses = CourseService::new(state.mongo.clone())
        .list_for_user(&user_id)
        .await?;
    Ok(Json(courses))
}

/// GET /api/users/{uid}/enrollments
pub async fn user_enrollments(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(user_id): Path<String>,
) -> ServiceResult<Json<Vec<Enrollment>>> {
    require_self_or_author(&claims, &user_id)?;

    let enrollments = EnrollmentService::new(state.mongo.clone())
        .list_for_user(&user_id)
        .await?;
    Ok(Json(enrollments))
}

/// POST /api/users/{uid}/courses/{cid}/enroll - Idempotent
pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((user_id, course_id)): Path<(String, String)>,
) -> ServiceResult<Json<Enrollment>> {
    require_self_or_author(&claims, &user_id)?;

    let enrollment = EnrollmentService::new(state.mongo.clone())
        .enroll(&user_id, &course_id)
        .await?;
    Ok(Json(enrollment))
}

/// DELETE /api/users/{uid}/courses/{cid}/unenroll
pub async fn unenroll(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((user_id, course_id)): Path<(String, String)>,
) -> ServiceResult<StatusCode> {
    require_self_or_author(&claims, &user_id)?;

    EnrollmentService::new(state.mongo.clone())
        .unenroll(&user_id, &course_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/users/{uid}/courses/{cid}/enrollment
pub async fn enrollment_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((user_id, course_id)): Path<(String, String)>,
) -> ServiceResult<Json<EnrollmentStatus>> {
    require_self_or_author(&claims, &user_id)?;

    let enrolled = EnrollmentService::new(state.mongo.clone())
        .is_enrolled(&user_id, &course_id)
        .await?;
    Ok(Json(EnrollmentStatus { enrolled }))
}

/// GET /api/users/{uid}/quizzes/{qid}/attempts - Oldest first
pub async fn user_quiz_attempts(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((user_id, quiz_id)): Path<(String, String)>,
) -> ServiceResult<Json<Vec<AttemptResponse>>> {
    let attempts = AttemptService::new(&state)
        .list_attempts(&claims, &user_id, &quiz_id)
        .await?;

    let now = Utc::now();
    Ok(Json(
        attempts
            .into_iter()
            .map(|attempt| AttemptResponse::from_attempt(attempt, now))
            .collect(),
    ))
}

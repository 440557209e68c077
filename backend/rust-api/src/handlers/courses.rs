use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use super::require_author;
use crate::{
    error::ServiceResult,
    extractors::ValidJson,
    middlewares::auth::JwtClaims,
    models::{
        course::{Course, CreateCourseRequest, UpdateCourseRequest},
        enrollment::Enrollment,
        user::UserProfile,
    },
    services::{
        course_service::CourseService, enrollment_service::EnrollmentService,
        user_service::UserService, AppState,
    },
};

/// GET /api/courses - The full catalog
pub async fn list_courses(State(state): State<Arc<AppState>>) -> ServiceResult<Json<Vec<Course>>> {
    let courses = CourseService::new(state.mongo.clone()).list_all().await?;
    Ok(Json(courses))
}

/// POST /api/courses - The author is enrolled in the new course
pub async fn create_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidJson(req): ValidJson<CreateCourseRequest>,
) -> ServiceResult<impl IntoResponse> {
    require_author(&claims)?;

    let course = CourseService::new(state.mongo.clone())
        .create(req, &claims)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// GET /api/courses/{cid}
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> ServiceResult<Json<Course>> {
    let course = CourseService::new(state.mongo.clone()).get(&course_id).await?;
    EnrollmentService::new(state.mongo.clone())
        .require_member(&claims, &course_id)
        .await?;
    Ok(Json(course))
}

/// PUT /api/courses/{cid}
pub async fn update_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    ValidJson(req): ValidJson<UpdateCourseRequest>,
) -> ServiceResult<Json<Course>> {
    require_author(&claims)?;

    let course = CourseService::new(state.mongo.clone())
        .update(&course_id, req)
        .await?;
    Ok(Json(course))
}

/// DELETE /api/courses/{cid} - Removes everything that belongs to the course
pub async fn delete_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> ServiceResult<StatusCode> {
    require_author(&claims)?;

    CourseService::new(state.mongo.clone())
        .delete(&course_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/courses/{cid}/enrollments
pub async fn course_enrollments(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> ServiceResult<Json<Vec<Enrollment>>> {
    let enrollments = EnrollmentService::new(state.mongo.clone());
    enrollments.require_member(&claims, &course_id).await?;
    Ok(Json(enrollments.list_for_course(&course_id).await?))
}

/// GET /api/courses/{cid}/users - The course roster
pub async fn course_users(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> ServiceResult<Json<Vec<UserProfile>>> {
    EnrollmentService::new(state.mongo.clone())
        .require_member(&claims, &course_id)
        .await?;

    let users = UserService::new(state.mongo.clone())
        .users_in_course(&course_id)
        .await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

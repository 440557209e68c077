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
    models::assignment::{Assignment, CreateAssignmentRequest, UpdateAssignmentRequest},
    services::{
        assignment_service::AssignmentService, course_service::CourseService,
        enrollment_service::EnrollmentService, AppState,
    },
};

/// GET /api/courses/{cid}/assignments - Students see published ones only
pub async fn list_assignments(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> ServiceResult<Json<Vec<Assignment>>> {
    EnrollmentService::new(state.mongo.clone())
        .require_member(&claims, &course_id)
        .await?;

    let assignments = AssignmentService::new(state.mongo.clone())
        .list_for_course(&course_id, claims.is_staff())
        .await?;
    Ok(Json(assignments))
}

/// GET /api/courses/{cid}/assignments/{aid}
pub async fn get_assignment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, assignment_id)): Path<(String, String)>,
) -> ServiceResult<Json<Assignment>> {
    EnrollmentService::new(state.mongo.clone())
        .require_member(&claims, &course_id)
        .await?;

    let assignment = AssignmentService::new(state.mongo.clone())
        .get(&course_id, &assignment_id, claims.is_staff())
        .await?;
    Ok(Json(assignment))
}

/// POST /api/courses/{cid}/assignments
pub async fn create_assignment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    ValidJson(req): ValidJson<CreateAssignmentRequest>,
) -> ServiceResult<impl IntoResponse> {
    require_author(&claims)?;
    CourseService::new(state.mongo.clone()).get(&course_id).await?;

    let assignment = AssignmentService::new(state.mongo.clone())
        .create(&course_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// PUT /api/courses/{cid}/assignments/{aid}
pub async fn update_assignment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, assignment_id)): Path<(String, String)>,
    ValidJson(req): ValidJson<UpdateAssignmentRequest>,
) -> ServiceResult<Json<Assignment>> {
    require_author(&claims)?;

    let assignment = AssignmentService::new(state.mongo.clone())
        .update(&course_id, &assignment_id, req)
        .await?;
    Ok(Json(assignment))
}

/// DELETE /api/courses/{cid}/assignments/{aid}
pub async fn delete_assignment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((course_id, assignment_id)): Path<(String, String)>,
) -> ServiceResult<StatusCode> {
    require_author(&claims)?;

    AssignmentService::new(state.mongo.clone())
        .delete(&course_id, &assignment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{
    error::ServiceResult,
    models::enrollment::Enrollment,
    services::{enrollment_service::EnrollmentService, AppState},
};

/// GET /api/enrollments - Every enrollment; mounted behind the author guard
pub async fn list_enrollments(
    State(state): State<Arc<AppState>>,
) -> ServiceResult<Json<Vec<Enrollment>>> {
    let enrollments = EnrollmentService::new(state.mongo.clone()).list_all().await?;
    Ok(Json(enrollments))
}

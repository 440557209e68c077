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
    models::module::{CreateModuleRequest, Module, UpdateModuleRequest},
    services::{
        course_service::CourseService, enrollment_service::EnrollmentService,
        module_service::ModuleService, AppState,
    },
};

/// GET /api/courses/{cid}/modules
pub async fn list_modules(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> ServiceResult<Json<Vec<Module>>> {
    EnrollmentService::new(state.mongo.clone())
        .require_member(&claims, &course_id)
        .await?;

    let modules = ModuleService::new(state.mongo.clone())
        .list_for_course(&course_id)
        .await?;
    Ok(Json(modules))
}

/// POST /api/courses/{cid}/modules
pub async fn create_module(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    ValidJson(req): ValidJson<CreateModuleRequest>,
) -> ServiceResult<impl IntoResponse> {
    require_author(&claims)?;
    CourseService::new(state.mongo.clone()).get(&course_id).await?;

    let module = ModuleService::new(state.mongo.clone())
        .create(&course_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(module)))
}

/// PUT /api/courses/{cid}/modules/{mid}
pub async fn update_module(
    State(state): State<Arc<AppState>>,
    Path((course_id, module_id)): Path<(String, String)>,
    ValidJson(req): ValidJson<UpdateModuleRequest>,
) -> ServiceResult<Json<Module>> {
    let module = ModuleService::new(state.mongo.clone())
        .update(&course_id, &module_id, req)
        .await?;
    Ok(Json(module))
}

/// DELETE /api/courses/{cid}/modules/{mid}
pub async fn delete_module(
    State(state): State<Arc<AppState>>,
    Path((course_id, module_id)): Path<(String, String)>,
) -> ServiceResult<StatusCode> {
    ModuleService::new(state.mongo.clone())
        .delete(&course_id, &module_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

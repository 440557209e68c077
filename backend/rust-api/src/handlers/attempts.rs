use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::{
    error::ServiceResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::attempt::{
        AttemptResponse, AttemptResults, SaveAnswersRequest, StartAttemptRequest,
        SubmitAttemptRequest,
    },
    services::{attempt_service::AttemptService, AppState},
};

/// POST /api/quiz-attempts - Start, or resume the attempt already in progress
pub async fn start_attempt(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<StartAttemptRequest>,
) -> ServiceResult<impl IntoResponse> {
    let session = AttemptService::new(&state)
        .start_attempt(&claims, req)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/quiz-attempts/{id}
pub async fn get_attempt(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(attempt_id): Path<String>,
) -> ServiceResult<Json<AttemptResponse>> {
    let attempt = AttemptService::new(&state)
        .get_attempt(&claims, &attempt_id)
        .await?;
    Ok(Json(AttemptResponse::from_attempt(attempt, Utc::now())))
}

/// PUT /api/quiz-attempts/{id}/answers
pub async fn save_answers(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(attempt_id): Path<String>,
    AppJson(req): AppJson<SaveAnswersRequest>,
) -> ServiceResult<Json<AttemptResponse>> {
    let attempt = AttemptService::new(&state)
        .save_answers(&claims, &attempt_id, req.answers)
        .await?;
    Ok(Json(AttemptResponse::from_attempt(attempt, Utc::now())))
}

/// POST /api/quiz-attempts/{id}/submit
pub async fn submit_attempt(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(attempt_id): Path<String>,
    AppJson(req): AppJson<SubmitAttemptRequest>,
) -> ServiceResult<Json<AttemptResults>> {
    let results = AttemptService::new(&state)
        .submit_attempt(&claims, &attempt_id, req.answers)
        .await?;
    Ok(Json(results))
}

/// GET /api/quiz-attempts/{id}/results
pub async fn attempt_results(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(attempt_id): Path<String>,
) -> ServiceResult<Json<AttemptResults>> {
    let results = AttemptService::new(&state)
        .results(&claims, &attempt_id)
        .await?;
    Ok(Json(results))
}

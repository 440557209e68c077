use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;

use super::require_author;
use crate::{
    error::ServiceResult,
    extractors::{AppJson, ValidJson},
    middlewares::auth::JwtClaims,
    models::quiz::{PublishRequest, QuizDraft, QuizSummary},
    services::{enrollment_service::EnrollmentService, quiz_service::QuizService, AppState},
};

/// GET /api/courses/{cid}/quizzes - Each item carries its availability
pub async fn list_quizzes(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> ServiceResult<Json<Vec<QuizSummary>>> {
    EnrollmentService::new(state.mongo.clone())
        .require_member(&claims, &course_id)
        .await?;

    let quizzes = QuizService::new(state.mongo.clone())
        .list_for_course(&course_id, &claims)
        .await?;
    Ok(Json(quizzes))
}

/// POST /api/courses/{cid}/quizzes - Starts from the editor defaults
pub async fn create_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    ValidJson(draft): ValidJson<QuizDraft>,
) -> ServiceResult<impl IntoResponse> {
    require_author(&claims)?;

    let quiz = QuizService::new(state.mongo.clone())
        .create(&course_id, draft)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(QuizSummary::for_viewer(quiz, Utc::now(), true)),
    ))
}

/// GET /api/quizzes/{qid}
pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
) -> ServiceResult<Json<QuizSummary>> {
    let quiz = QuizService::new(state.mongo.clone())
        .get_for_viewer(&quiz_id, &claims)
        .await?;
    Ok(Json(QuizSummary::for_viewer(
        quiz,
        Utc::now(),
        claims.can_author(),
    )))
}

/// PUT /api/quizzes/{qid} - Partial update
pub async fn update_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
    ValidJson(draft): ValidJson<QuizDraft>,
) -> ServiceResult<Json<QuizSummary>> {
    require_author(&claims)?;

    let quiz = QuizService::new(state.mongo.clone())
        .update(&quiz_id, draft)
        .await?;
    Ok(Json(QuizSummary::for_viewer(quiz, Utc::now(), true)))
}

/// DELETE /api/quizzes/{qid} - Questions and attempts go with it
pub async fn delete_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
) -> ServiceResult<StatusCode> {
    require_author(&claims)?;

    QuizService::new(state.mongo.clone()).delete(&quiz_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/quizzes/{qid}/publish
pub async fn publish_quiz(
    State(state): State<Arc<AppState>>,
    Path(quiz_id): Path<String>,
    AppJson(req): AppJson<PublishRequest>,
) -> ServiceResult<Json<QuizSummary>> {
    let quiz = QuizService::new(state.mongo.clone())
        .set_published(&quiz_id, req.published)
        .await?;
    Ok(Json(QuizSummary::for_viewer(quiz, Utc::now(), true)))
}

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
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::question::{Question, QuestionDraft, QuestionView, ReorderQuestionsRequest},
    services::{question_service::QuestionService, AppState},
};

/// GET /api/quizzes/{qid}/questions - Students get questions without answers
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
) -> ServiceResult<Json<Vec<QuestionView>>> {
    let questions = QuestionService::new(state.mongo.clone())
        .list_for_viewer(&quiz_id, &claims)
        .await?;
    Ok(Json(questions))
}

/// POST /api/quizzes/{qid}/questions - Appended after the last question
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
    AppJson(draft): AppJson<QuestionDraft>,
) -> ServiceResult<impl IntoResponse> {
    require_author(&claims)?;

    let question = QuestionService::new(state.mongo.clone())
        .create(&quiz_id, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// PUT /api/quizzes/{qid}/questions/{questionId}
pub async fn update_question(
    State(state): State<Arc<AppState>>,
    Path((quiz_id, question_id)): Path<(String, String)>,
    AppJson(draft): AppJson<QuestionDraft>,
) -> ServiceResult<Json<Question>> {
    let question = QuestionService::new(state.mongo.clone())
        .update(&quiz_id, &question_id, draft)
        .await?;
    Ok(Json(question))
}

/// DELETE /api/quizzes/{qid}/questions/{questionId}
pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    Path((quiz_id, question_id)): Path<(String, String)>,
) -> ServiceResult<StatusCode> {
    QuestionService::new(state.mongo.clone())
        .delete(&quiz_id, &question_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/quizzes/{qid}/questions/order
pub async fn reorder_questions(
    State(state): State<Arc<AppState>>,
    Path(quiz_id): Path<String>,
    AppJson(req): AppJson<ReorderQuestionsRequest>,
) -> ServiceResult<Json<Vec<Question>>> {
    let questions = QuestionService::new(state.mongo.clone())
        .reorder(&quiz_id, req.order)
        .await?;
    Ok(Json(questions))
}

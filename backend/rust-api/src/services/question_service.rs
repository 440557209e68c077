use std::collections::HashSet;

use anyhow::Context;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Collection, Database};

use crate::error::{ServiceError, ServiceResult};
use crate::metrics::track_db_operation;
use crate::middlewares::auth::JwtClaims;
use crate::models::new_id;
use crate::models::question::{Question, QuestionDraft, QuestionView};
use crate::services::quiz_service::QuizService;

pub struct QuestionService {
    mongo: Database,
}

impl QuestionService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn questions(&self) -> Collection<Question> {
        self.mongo.collection::<Question>("questions")
    }

    fn quizzes(&self) -> QuizService {
        QuizService::new(self.mongo.clone())
    }

    /// Questions of a quiz in display order
    pub async fn list(&self, quiz_id: &str) -> ServiceResult<Vec<Question>> {
        let questions = track_db_operation("find", "questions", async {
            self.questions()
                .find(doc! { "quiz": quiz_id })
                .sort(doc! { "order": 1 })
                .await?
                .try_collect()
                .await
        })
        .await
        .context("Failed to query questions")?;
        Ok(questions)
    }

    /// Authors get the editor view; everyone else gets questions without answers
    pub async fn list_for_viewer(
        &self,
        quiz_id: &str,
        viewer: &JwtClaims,
    ) -> ServiceResult<Vec<QuestionView>> {
        let quiz = self.quizzes().get_for_viewer(quiz_id, viewer).await?;
        let questions = self.list(quiz_id).await?;

        if viewer.can_author() {
            return Ok(questions.into_iter().map(QuestionView::Full).collect());
        }
        Ok(questions
            .iter()
            .map(|q| QuestionView::Student(q.student_view(quiz.shuffle_answers)))
            .collect())
    }

    pub async fn create(&self, quiz_id: &str, draft: QuestionDraft) -> ServiceResult<Question> {
        self.quizzes().get(quiz_id).await?;
        let draft = draft.validate_draft().map_err(ServiceError::Validation)?;

        let last = self
            .questions()
            .find_one(doc! { "quiz": quiz_id })
            .sort(doc! { "order": -1 })
            .await
            .context("Failed to query question order")?;
        let order = last.map(|q| q.order + 1).unwrap_or(0);

        let question = Question::from_draft(new_id(), quiz_id.to_string(), order, draft);
        self.questions()
            .insert_one(&question)
            .await
            .context("Failed to insert question")?;

        self.quizzes().recompute_totals(quiz_id).await?;
        tracing::debug!(quiz_id = %quiz_id, question_id = %question.id, "Question created");
        Ok(question)
    }

    pub async fn update(
        &self,
        quiz_id: &str,
        question_id: &str,
        draft: QuestionDraft,
    ) -> ServiceResult<Question> {
        let existing = self.get(quiz_id, question_id).await?;
        let draft = draft.validate_draft().map_err(ServiceError::Validation)?;

        let question = Question::from_draft(existing.id, existing.quiz, existing.order, draft);
        self.questions()
            .replace_one(doc! { "_id": question_id }, &question)
            .await
            .context("Failed to update question")?;

        self.quizzes().recompute_totals(quiz_id).await?;
        Ok(question)
    }

    pub async fn delete(&self, quiz_id: &str, question_id: &str) -> ServiceResult<()> {
        let result = self
            .questions()
            .delete_one(doc! { "_id": question_id, "quiz": quiz_id })
            .await
            .context("Failed to delete question")?;
        if result.deleted_count == 0 {
            return Err(ServiceError::not_found("Question not found"));
        }

        self.quizzes().recompute_totals(quiz_id).await?;
        Ok(())
    }

    /// `order` must name every question of the quiz exactly once
    pub async fn reorder(&self, quiz_id: &str, order: Vec<String>) -> ServiceResult<Vec<Question>> {
        let existing = self.list(quiz_id).await?;
        check_reorder(&existing, &order).map_err(ServiceError::Validation)?;

        for (position, question_id) in order.iter().enumerate() {
            self.questions()
                .update_one(
                    doc! { "_id": question_id.as_str(), "quiz": quiz_id },
                    doc! { "$set": { "order": position as i64 } },
                )
                .await
                .context("Failed to reorder questions")?;
        }

        self.list(quiz_id).await
    }

    async fn get(&self, quiz_id: &str, question_id: &str) -> ServiceResult<Question> {
        self.questions()
            .find_one(doc! { "_id": question_id, "quiz": quiz_id })
            .await
            .context("Failed to query question")?
            .ok_or_else(|| ServiceError::not_found("Question not found"))
    }
}

fn check_reorder(existing: &[Question], order: &[String]) -> Result<(), String> {
    let requested: HashSet<&str> = order.iter().map(String::as_str).collect();
    if requested.len() != order.len() {
        return Err("Question order contains duplicates".to_string());
    }
    let current: HashSet<&str> = existing.iter().map(|q| q.id.as_str()).collect();
    if requested != current {
        return Err("Question order must list every question of the quiz".to_string());
    }
    Ok(())
}

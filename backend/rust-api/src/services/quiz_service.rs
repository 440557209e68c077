use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::{Collection, Database};

use crate::error::{ServiceError, ServiceResult};
use crate::metrics::track_db_operation;
use crate::middlewares::auth::JwtClaims;
use crate::models::new_id;
use crate::models::question::Question;
use crate::models::quiz::{Quiz, QuizDraft, QuizSummary};
use crate::services::enrollment_service::EnrollmentService;

pub struct QuizService {
    mongo: Database,
}

impl QuizService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn quizzes(&self) -> Collection<Quiz> {
        self.mongo.collection::<Quiz>("quizzes")
    }

    /// Students get published quizzes only
    pub async fn list_for_course(
        &self,
        course_id: &str,
        viewer: &JwtClaims,
    ) -> ServiceResult<Vec<QuizSummary>> {
        let mut filter = doc! { "course": course_id };
        if !viewer.is_staff() {
            filter.insert("published", true);
        }

        let quizzes: Vec<Quiz> = track_db_operation("find", "quizzes", async {
            self.quizzes()
                .find(filter)
                .sort(doc! { "availableDate": 1, "title": 1 })
                .await?
                .try_collect()
                .await
        })
        .await
        .context("Failed to query quizzes")?;

        let now = Utc::now();
        Ok(quizzes
            .into_iter()
            .map(|quiz| QuizSummary::for_viewer(quiz, now, viewer.can_author()))
            .collect())
    }

    pub async fn get(&self, quiz_id: &str) -> ServiceResult<Quiz> {
        self.quizzes()
            .find_one(doc! { "_id": quiz_id })
            .await
            .context("Failed to query quiz")?
            .ok_or_else(|| ServiceError::not_found("Quiz not found"))
    }

    /// Quiz as the viewer may see it; unpublished quizzes do not exist for students
    pub async fn get_for_viewer(&self, quiz_id: &str, viewer: &JwtClaims) -> ServiceResult<Quiz> {
        let quiz = self.get(quiz_id).await?;
        EnrollmentService::new(self.mongo.clone())
            .require_member(viewer, &quiz.course)
            .await?;
        if !quiz.published && !viewer.is_staff() {
            return Err(ServiceError::not_found("Quiz not found"));
        }
        Ok(quiz)
    }

    pub async fn create(&self, course_id: &str, draft: QuizDraft) -> ServiceResult<Quiz> {
        let course_exists = self
            .mongo
            .collection::<Document>("courses")
            .count_documents(doc! { "_id": course_id })
            .limit(1)
            .await
            .context("Failed to look up course")?;
        if course_exists == 0 {
            return Err(ServiceError::not_found("Course not found"));
        }

        let mut quiz = Quiz::new(new_id(), course_id.to_string());
        draft.apply(&mut quiz);
        quiz.check_dates().map_err(ServiceError::Validation)?;

        self.quizzes()
            .insert_one(&quiz)
            .await
            .context("Failed to insert quiz")?;

        tracing::info!(quiz_id = %quiz.id, course_id = %course_id, "Quiz created");
        Ok(quiz)
    }

    /// Writes only the editable fields, so totals maintained by question edits are never rolled back
    pub async fn update(&self, quiz_id: &str, draft: QuizDraft) -> ServiceResult<Quiz> {
        let mut quiz = self.get(quiz_id).await?;
        draft.apply(&mut quiz);
        quiz.check_dates().map_err(ServiceError::Validation)?;

        let fields = editable_fields(&quiz)?;
        let result = track_db_operation("update_one", "quizzes", async {
            self.quizzes()
                .update_one(doc! { "_id": quiz_id }, doc! { "$set": fields })
                .await
        })
        .await
        .context("Failed to update quiz")?;
        if result.matched_count == 0 {
            return Err(ServiceError::not_found("Quiz not found"));
        }

        self.get(quiz_id).await
    }

    pub async fn set_published(&self, quiz_id: &str, published: bool) -> ServiceResult<Quiz> {
        let mut quiz = self.get(quiz_id).await?;
        if quiz.published == published {
            return Ok(quiz);
        }

        self.quizzes()
            .update_one(
                doc! { "_id": quiz_id },
                doc! { "$set": { "published": published } },
            )
            .await
            .context("Failed to publish quiz")?;

        quiz.published = published;
        tracing::info!(quiz_id = %quiz_id, published, "Quiz publish state changed");
        Ok(quiz)
    }

    /// Removes the quiz with its questions and attempts
    pub async fn delete(&self, quiz_id: &str) -> ServiceResult<()> {
        let result = self
            .quizzes()
            .delete_one(doc! { "_id": quiz_id })
            .await
            .context("Failed to delete quiz")?;
        if result.deleted_count == 0 {
            return Err(ServiceError::not_found("Quiz not found"));
        }

        self.mongo
            .collection::<Document>("questions")
            .delete_many(doc! { "quiz": quiz_id })
            .await
            .context("Failed to delete quiz questions")?;
        self.mongo
            .collection::<Document>("quiz_attempts")
            .delete_many(doc! { "quiz": quiz_id })
            .await
            .context("Failed to delete quiz attempts")?;

        tracing::info!(quiz_id = %quiz_id, "Quiz deleted");
        Ok(())
    }

    /// Keeps `points` and `numberOfQuestions` in line with the stored questions
    pub async fn recompute_totals(&self, quiz_id: &str) -> ServiceResult<(f64, u32)> {
        let questions: Vec<Question> = self
            .mongo
            .collection::<Question>("questions")
            .find(doc! { "quiz": quiz_id })
            .await
            .context("Failed to query questions")?
            .try_collect()
            .await
            .context("Failed to read questions")?;

        let (points, count) = totals(&questions);

        self.quizzes()
            .update_one(
                doc! { "_id": quiz_id },
                doc! { "$set": { "points": points, "numberOfQuestions": count } },
            )
            .await
            .context("Failed to update quiz totals")?;

        Ok((points, count))
    }
}

/// Quiz document minus identity and the derived totals
fn editable_fields(quiz: &Quiz) -> ServiceResult<Document> {
    let mut fields = mongodb::bson::to_document(quiz).context("Failed to encode quiz")?;
    for key in ["_id", "course", "points", "numberOfQuestions"] {
        fields.remove(key);
    }
    Ok(fields)
}

fn totals(questions: &[Question]) -> (f64, u32) {
    let points = questions.iter().map(|q| q.points).sum();
    (points, questions.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionKind;

    #[test]
    fn totals_sum_points_and_count() {
        let question = |id: &str, points: f64| Question {
            id: id.to_string(),
            quiz: "q".to_string(),
            title: String::new(),
            points,
            question: "?".to_string(),
            order: 0,
            kind: QuestionKind::TrueFalse {
                correct_answer: true,
            },
        };

        assert_eq!(totals(&[]), (0.0, 0));
        assert_eq!(
            totals(&[question("a", 2.5), question("b", 4.0)]),
            (6.5, 2)
        );
    }

    #[test]
    fn editable_fields_leave_totals_alone() {
        let mut quiz = Quiz::new("q1".to_string(), "c1".to_string());
        quiz.points = 12.0;
        quiz.number_of_questions = 3;
        quiz.title = "Midterm".to_string();

        let fields = editable_fields(&quiz).unwrap();

        for derived in ["_id", "course", "points", "numberOfQuestions"] {
            assert!(!fields.contains_key(derived), "{} must not be written", derived);
        }
        assert_eq!(fields.get_str("title").unwrap(), "Midterm");
        assert!(!fields.get_bool("published").unwrap());
        // cleared dates are written as null
        assert!(fields.contains_key("availableDate"));
    }
}

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use futures::TryStreamExt;
use lazy_static::lazy_static;
use mongodb::bson::{self, doc};
use mongodb::{Collection, Database};
use redis::aio::ConnectionManager;

use crate::config::QuizConfig;
use crate::error::{is_duplicate_key, ServiceError, ServiceResult};
use crate::metrics::{
    track_cache_operation, track_db_operation, QUIZ_ATTEMPTS_ACTIVE, QUIZ_ATTEMPTS_TOTAL,
    QUIZ_SCORE_PERCENT,
};
use crate::middlewares::auth::JwtClaims;
use crate::models::attempt::{
    AnswerMap, AttemptResponse, AttemptResults, AttemptSession, AttemptStatus, QuizAttempt,
    StartAttemptRequest,
};
use crate::models::new_id;
use crate::models::question::Question;
use crate::models::quiz::{Availability, Quiz};
use crate::services::enrollment_service::EnrollmentService;
use crate::services::grading::{self, Grade};
use crate::services::question_service::QuestionService;
use crate::services::quiz_service::QuizService;
use crate::services::AppState;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

const START_LOCK_SECONDS: u64 = 10;

lazy_static! {
    // Deletes the lock only if we still own it
    static ref RELEASE_LOCK_SCRIPT: redis::Script = redis::Script::new(
        r#"
        if redis.call('GET', KEYS[1]) == ARGV[1] then
            return redis.call('DEL', KEYS[1])
        end
        return 0
        "#
    );
}

fn lock_key(user_id: &str, quiz_id: &str) -> String {
    format!("attempt_lock:{}:{}", user_id, quiz_id)
}

fn timer_key(attempt_id: &str) -> String {
    format!("attempt_timer:{}", attempt_id)
}

fn preview_key(attempt_id: &str) -> String {
    format!("quiz_preview:{}", attempt_id)
}

pub struct AttemptService {
    mongo: Database,
    redis: ConnectionManager,
    config: QuizConfig,
}

impl AttemptService {
    pub fn new(state: &AppState) -> Self {
        Self::from_parts(state.mongo.clone(), state.redis.clone(), state.config.quiz.clone())
    }

    pub fn from_parts(mongo: Database, redis: ConnectionManager, config: QuizConfig) -> Self {
        Self {
            mongo,
            redis,
            config,
        }
    }

    fn attempts(&self) -> Collection<QuizAttempt> {
        self.mongo.collection::<QuizAttempt>("quiz_attempts")
    }

    /// Starts or resumes an attempt. Staff get a preview that is never recorded.
    pub async fn start_attempt(
        &self,
        viewer: &JwtClaims,
        req: StartAttemptRequest,
    ) -> ServiceResult<AttemptSession> {
        let quiz = QuizService::new(self.mongo.clone()).get(&req.quiz).await?;

        if viewer.is_staff() {
            return self.start_preview(viewer, &quiz).await;
        }

        EnrollmentService::new(self.mongo.clone())
            .require_member(viewer, &quiz.course)
            .await?;
        if !quiz.published {
            return Err(ServiceError::not_found("Quiz not found"));
        }
        match quiz.availability(Utc::now()) {
            Availability::Available => {}
            Availability::NotAvailableUntil(date) => {
                return Err(ServiceError::forbidden(format!(
                    "Quiz is not available until {}",
                    date.to_rfc3339()
                )));
            }
            Availability::Closed => return Err(ServiceError::forbidden("Quiz is closed")),
        }

        let lock = lock_key(&viewer.sub, &quiz.id);
        let token = new_id();
        if !self.acquire_lock(&lock, &token).await? {
            return Err(ServiceError::conflict("An attempt is already being started"));
        }

        let result = self.start_locked(viewer, &quiz, req.access_code.as_deref()).await;

        if let Err(e) = self.release_lock(&lock, &token).await {
            tracing::warn!(error = %e, lock = %lock, "Failed to release attempt lock");
        }
        result
    }

    async fn start_locked(
        &self,
        viewer: &JwtClaims,
        quiz: &Quiz,
        access_code: Option<&str>,
    ) -> ServiceResult<AttemptSession> {
        let now = Utc::now();

        let in_progress = self
            .attempts()
            .find_one(doc! {
                "user": viewer.sub.as_str(),
                "quiz": quiz.id.as_str(),
                "status": AttemptStatus::InProgress.as_str(),
            })
            .await
            .context("Failed to query in-progress attempt")?;

        if let Some(attempt) = in_progress {
            if !attempt.is_expired(now, self.config.submit_grace_seconds) {
                tracing::debug!(attempt_id = %attempt.id, user_id = %viewer.sub, "Resuming attempt");
                return self.session(attempt, quiz).await;
            }
            match self.settle_expired(attempt).await {
                Ok(_) | Err(ServiceError::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if quiz.requires_access_code()
            && access_code.map(str::trim) != Some(quiz.access_code.trim())
        {
            return Err(ServiceError::forbidden("Invalid access code"));
        }

        let taken = self
            .attempts()
            .count_documents(doc! { "user": viewer.sub.as_str(), "quiz": quiz.id.as_str() })
            .await
            .context("Failed to count attempts")?;
        if taken >= u64::from(quiz.allowed_attempts()) {
            return Err(ServiceError::conflict("No more attempts available"));
        }

        let attempt = new_attempt(viewer, quiz, taken as u32 + 1, now, false);

        match self.attempts().insert_one(&attempt).await {
            Ok(_) => {}
            Err(e) if is_duplicate_key(&e) => {
                return Err(ServiceError::conflict("No more attempts available"));
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(deadline) = attempt.deadline {
            self.set_timer(&attempt.id, deadline, now).await?;
        }

        QUIZ_ATTEMPTS_TOTAL.with_label_values(&["started"]).inc();
        tracing::info!(
            attempt_id = %attempt.id,
            user_id = %viewer.sub,
            quiz_id = %quiz.id,
            attempt_number = attempt.attempt_number,
            "Quiz attempt started"
        );

        self.session(attempt, quiz).await
    }

    async fn start_preview(&self, viewer: &JwtClaims, quiz: &Quiz) -> ServiceResult<AttemptSession> {
        let now = Utc::now();
        let attempt = new_attempt(viewer, quiz, 1, now, true);

        let ttl = self.preview_ttl(quiz);
        self.write_preview(&attempt, Some(ttl)).await?;
        if let Some(deadline) = attempt.deadline {
            self.set_timer(&attempt.id, deadline, now).await?;
        }

        QUIZ_ATTEMPTS_TOTAL.with_label_values(&["preview"]).inc();
        tracing::info!(attempt_id = %attempt.id, user_id = %viewer.sub, quiz_id = %quiz.id, "Quiz preview started");

        self.session(attempt, quiz).await
    }

    fn preview_ttl(&self, quiz: &Quiz) -> u64 {
        let timed = u64::from(quiz.time_limit) * 60 + self.config.submit_grace_seconds.max(0) as u64;
        self.config.preview_ttl_seconds.max(timed)
    }

    async fn session(&self, attempt: QuizAttempt, quiz: &Quiz) -> ServiceResult<AttemptSession> {
        let questions = QuestionService::new(self.mongo.clone())
            .list(&quiz.id)
            .await?
            .iter()
            .map(|q| q.student_view(quiz.shuffle_answers))
            .collect();

        Ok(AttemptSession {
            attempt: AttemptResponse::from_attempt(attempt, Utc::now()),
            questions,
        })
    }

    /// Owner or an author; expired attempts are settled on read
    pub async fn get_attempt(&self, viewer: &JwtClaims, attempt_id: &str) -> ServiceResult<QuizAttempt> {
        let attempt = self.load(attempt_id).await?;
        if attempt.user != viewer.sub && !viewer.can_author() {
            return Err(ServiceError::forbidden("You cannot view this attempt"));
        }
        self.settle_if_expired(attempt).await
    }

    pub async fn save_answers(
        &self,
        viewer: &JwtClaims,
        attempt_id: &str,
        answers: AnswerMap,
    ) -> ServiceResult<QuizAttempt> {
        let mut attempt = self.load_owned(viewer, attempt_id).await?;
        if !attempt.is_in_progress() {
            return Err(ServiceError::conflict("Attempt already submitted"));
        }
        if attempt.is_expired(Utc::now(), self.config.submit_grace_seconds) {
            self.settle_expired(attempt).await?;
            return Err(ServiceError::conflict(
                "Time limit exceeded; the attempt was submitted",
            ));
        }

        let quiz = QuizService::new(self.mongo.clone()).get(&attempt.quiz).await?;
        let questions = QuestionService::new(self.mongo.clone()).list(&quiz.id).await?;
        merge_answers(&quiz, &questions, &mut attempt.answers, answers)?;

        if attempt.preview {
            self.write_preview(&attempt, None).await?;
        } else {
            let answers = bson::to_bson(&attempt.answers).context("Failed to encode answers")?;
            let result = self
                .attempts()
                .update_one(
                    doc! { "_id": attempt.id.as_str(), "status": AttemptStatus::InProgress.as_str() },
                    doc! { "$set": { "answers": answers } },
                )
                .await
                .context("Failed to save answers")?;
            if result.matched_count == 0 {
                return Err(ServiceError::conflict("Attempt already submitted"));
            }
        }

        Ok(attempt)
    }

    /// Final answers are ignored once the deadline plus grace has passed
    pub async fn submit_attempt(
        &self,
        viewer: &JwtClaims,
        attempt_id: &str,
        answers: Option<AnswerMap>,
    ) -> ServiceResult<AttemptResults> {
        let mut attempt = self.load_owned(viewer, attempt_id).await?;
        if !attempt.is_in_progress() {
            return Err(ServiceError::conflict("Attempt already submitted"));
        }

        let quiz = QuizService::new(self.mongo.clone()).get(&attempt.quiz).await?;
        let questions = QuestionService::new(self.mongo.clone()).list(&quiz.id).await?;

        let late = attempt.is_expired(Utc::now(), self.config.submit_grace_seconds);
        match answers {
            Some(_) if late => {
                tracing::info!(attempt_id = %attempt.id, "Ignoring answers submitted after the deadline");
            }
            Some(answers) => merge_answers(&quiz, &questions, &mut attempt.answers, answers)?,
            None => {}
        }

        let (attempt, grade) = self.finalize(attempt, &questions, late).await?;
        Ok(build_results(attempt, grade, &quiz, &questions, viewer))
    }

    /// Results of a submitted attempt; correct answers only when the quiz shows them
    pub async fn results(&self, viewer: &JwtClaims, attempt_id: &str) -> ServiceResult<AttemptResults> {
        let attempt = self.get_attempt(viewer, attempt_id).await?;
        if attempt.is_in_progress() {
            return Err(ServiceError::conflict("Attempt has not been submitted"));
        }

        let quiz = QuizService::new(self.mongo.clone()).get(&attempt.quiz).await?;
        let questions = QuestionService::new(self.mongo.clone()).list(&quiz.id).await?;

        let mut grade = grading::grade(&questions, &attempt.answers);
        grade.score = attempt.score;
        grade.max_score = attempt.max_score;
        Ok(build_results(attempt, grade, &quiz, &questions, viewer))
    }

    /// A user's attempts at one quiz, oldest first
    pub async fn list_attempts(
        &self,
        viewer: &JwtClaims,
        user_id: &str,
        quiz_id: &str,
    ) -> ServiceResult<Vec<QuizAttempt>> {
        if !viewer.is_self_or_author(user_id) {
            return Err(ServiceError::forbidden("You cannot view these attempts"));
        }

        let attempts = track_db_operation("find", "quiz_attempts", async {
            self.attempts()
                .find(doc! { "user": user_id, "quiz": quiz_id })
                .sort(doc! { "attemptNumber": 1 })
                .await?
                .try_collect()
                .await
        })
        .await
        .context("Failed to query attempts")?;
        Ok(attempts)
    }

    /// Seconds left for the owner's attempt, read from the Redis timer when present
    pub async fn time_remaining(
        &self,
        viewer: &JwtClaims,
        attempt_id: &str,
    ) -> ServiceResult<(QuizAttempt, Option<i64>)> {
        let attempt = self.load_owned(viewer, attempt_id).await?;
        if !attempt.is_in_progress() || attempt.deadline.is_none() {
            return Ok((attempt, None));
        }

        let key = timer_key(&attempt.id);
        let ttl: i64 = retry_async_with_config(RetryConfig::redis_read(), || {
            let mut conn = self.redis.clone();
            let key = key.clone();
            async move { redis::cmd("TTL").arg(&key).query_async::<i64>(&mut conn).await }
        })
        .await?;

        let remaining = if ttl >= 0 {
            Some(ttl)
        } else {
            attempt.time_remaining(Utc::now())
        };
        Ok((attempt, remaining))
    }

    /// Grades every in-progress attempt whose deadline plus grace has passed
    pub async fn auto_submit_expired(&self) -> ServiceResult<usize> {
        let cutoff = Utc::now() - Duration::seconds(self.config.submit_grace_seconds.max(0));
        let expired: Vec<QuizAttempt> = self
            .attempts()
            .find(doc! {
                "status": AttemptStatus::InProgress.as_str(),
                "deadline": { "$lt": bson::DateTime::from_millis(cutoff.timestamp_millis()) },
            })
            .await
            .context("Failed to query expired attempts")?
            .try_collect()
            .await
            .context("Failed to read expired attempts")?;

        let mut submitted = 0;
        for attempt in expired {
            let attempt_id = attempt.id.clone();
            match self.settle_expired(attempt).await {
                Ok(_) => submitted += 1,
                Err(ServiceError::Conflict(_)) => {}
                Err(e) => tracing::warn!(attempt_id = %attempt_id, error = %e, "Failed to auto-submit attempt"),
            }
        }
        Ok(submitted)
    }

    /// Sets the active-attempts gauge from storage; sweepers and cascading deletes in
    /// any process are reflected on the next call.
    pub async fn refresh_active_gauge(&self) -> ServiceResult<u64> {
        let active = track_db_operation("count", "quiz_attempts", async {
            self.attempts()
                .count_documents(doc! { "status": AttemptStatus::InProgress.as_str() })
                .await
        })
        .await
        .context("Failed to count active attempts")?;
        QUIZ_ATTEMPTS_ACTIVE.set(active as i64);
        Ok(active)
    }

    async fn settle_if_expired(&self, attempt: QuizAttempt) -> ServiceResult<QuizAttempt> {
        if attempt.is_in_progress() && attempt.is_expired(Utc::now(), self.config.submit_grace_seconds) {
            return match self.settle_expired(attempt.clone()).await {
                Ok(settled) => Ok(settled),
                Err(ServiceError::Conflict(_)) => self.load(&attempt.id).await,
                Err(e) => Err(e),
            };
        }
        Ok(attempt)
    }

    async fn settle_expired(&self, attempt: QuizAttempt) -> ServiceResult<QuizAttempt> {
        let questions = QuestionService::new(self.mongo.clone()).list(&attempt.quiz).await?;
        let (attempt, _) = self.finalize(attempt, &questions, true).await?;
        Ok(attempt)
    }

    /// Grades and marks the attempt submitted; a second submit loses the race with 409
    async fn finalize(
        &self,
        mut attempt: QuizAttempt,
        questions: &[Question],
        auto_submitted: bool,
    ) -> ServiceResult<(QuizAttempt, Grade)> {
        let grade = grading::grade(questions, &attempt.answers);
        let now = Utc::now();

        attempt.score = grade.score;
        attempt.max_score = grade.max_score;
        attempt.end_time = Some(now);
        attempt.is_completed = true;
        attempt.status = AttemptStatus::Submitted;
        attempt.auto_submitted = auto_submitted;

        if attempt.preview {
            self.write_preview(&attempt, None).await?;
        } else {
            let answers = bson::to_bson(&attempt.answers).context("Failed to encode answers")?;
            let result = self
                .attempts()
                .update_one(
                    doc! { "_id": attempt.id.as_str(), "status": AttemptStatus::InProgress.as_str() },
                    doc! { "$set": {
                        "answers": answers,
                        "score": attempt.score,
                        "maxScore": attempt.max_score,
                        "endTime": bson::DateTime::from_millis(now.timestamp_millis()),
                        "isCompleted": true,
                        "status": AttemptStatus::Submitted.as_str(),
                        "autoSubmitted": auto_submitted,
                    } },
                )
                .await
                .context("Failed to submit attempt")?;
            if result.matched_count == 0 {
                return Err(ServiceError::conflict("Attempt already submitted"));
            }

            let status = if auto_submitted { "auto_submitted" } else { "submitted" };
            QUIZ_ATTEMPTS_TOTAL.with_label_values(&[status]).inc();
            QUIZ_SCORE_PERCENT.observe(grade.percentage());
        }

        if attempt.deadline.is_some() {
            self.clear_timer(&attempt.id).await;
        }

        tracing::info!(
            attempt_id = %attempt.id,
            user_id = %attempt.user,
            score = attempt.score,
            max_score = attempt.max_score,
            auto_submitted,
            preview = attempt.preview,
            "Quiz attempt submitted"
        );
        Ok((attempt, grade))
    }

    async fn load_owned(&self, viewer: &JwtClaims, attempt_id: &str) -> ServiceResult<QuizAttempt> {
        let attempt = self.load(attempt_id).await?;
        if attempt.user != viewer.sub {
            return Err(ServiceError::forbidden("This attempt belongs to another user"));
        }
        Ok(attempt)
    }

    /// MongoDB first, then the preview store
    async fn load(&self, attempt_id: &str) -> ServiceResult<QuizAttempt> {
        let stored = self
            .attempts()
            .find_one(doc! { "_id": attempt_id })
            .await
            .context("Failed to query attempt")?;
        if let Some(attempt) = stored {
            return Ok(attempt);
        }

        let key = preview_key(attempt_id);
        let bytes: Option<Vec<u8>> = retry_async_with_config(RetryConfig::redis_read(), || {
            let mut conn = self.redis.clone();
            let key = key.clone();
            async move { redis::cmd("GET").arg(&key).query_async(&mut conn).await }
        })
        .await?;

        match bytes {
            Some(bytes) => {
                let attempt = bson::from_slice(&bytes).context("Failed to decode preview attempt")?;
                Ok(attempt)
            }
            None => Err(ServiceError::not_found("Attempt not found")),
        }
    }

    /// `ttl` is set on creation; later writes keep the remaining lifetime
    async fn write_preview(&self, attempt: &QuizAttempt, ttl: Option<u64>) -> ServiceResult<()> {
        let bytes = bson::to_vec(attempt).context("Failed to encode preview attempt")?;
        let key = preview_key(&attempt.id);
        let mut conn = self.redis.clone();

        track_cache_operation("set", async {
            let mut cmd = redis::cmd("SET");
            cmd.arg(&key).arg(bytes);
            match ttl {
                Some(ttl) => cmd.arg("EX").arg(ttl),
                None => cmd.arg("KEEPTTL"),
            };
            cmd.query_async::<()>(&mut conn).await
        })
        .await?;
        Ok(())
    }

    async fn set_timer(&self, attempt_id: &str, deadline: DateTime<Utc>, now: DateTime<Utc>) -> ServiceResult<()> {
        let seconds = (deadline - now).num_seconds().max(1);
        let mut conn = self.redis.clone();
        track_cache_operation("setex", async {
            redis::cmd("SET")
                .arg(timer_key(attempt_id))
                .arg(deadline.to_rfc3339())
                .arg("EX")
                .arg(seconds)
                .query_async::<()>(&mut conn)
                .await
        })
        .await?;
        Ok(())
    }

    async fn clear_timer(&self, attempt_id: &str) {
        let mut conn = self.redis.clone();
        let result = track_cache_operation("del", async {
            redis::cmd("DEL")
                .arg(timer_key(attempt_id))
                .query_async::<()>(&mut conn)
                .await
        })
        .await;
        if let Err(e) = result {
            tracing::warn!(attempt_id = %attempt_id, error = %e, "Failed to clear attempt timer");
        }
    }

    async fn acquire_lock(&self, key: &str, token: &str) -> ServiceResult<bool> {
        let mut conn = self.redis.clone();
        let acquired: Option<String> = track_cache_operation("set_nx", async {
            redis::cmd("SET")
                .arg(key)
                .arg(token)
                .arg("NX")
                .arg("EX")
                .arg(START_LOCK_SECONDS)
                .query_async(&mut conn)
                .await
        })
        .await?;
        Ok(acquired.is_some())
    }

    async fn release_lock(&self, key: &str, token: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.clone();
        RELEASE_LOCK_SCRIPT
            .key(key)
            .arg(token)
            .invoke_async::<i64>(&mut conn)
            .await?;
        Ok(())
    }
}

fn new_attempt(
    viewer: &JwtClaims,
    quiz: &Quiz,
    attempt_number: u32,
    now: DateTime<Utc>,
    preview: bool,
) -> QuizAttempt {
    let deadline = quiz
        .is_timed()
        .then(|| now + Duration::minutes(i64::from(quiz.time_limit)));
    QuizAttempt {
        id: new_id(),
        user: viewer.sub.clone(),
        quiz: quiz.id.clone(),
        course: quiz.course.clone(),
        attempt_number,
        answers: AnswerMap::new(),
        score: 0.0,
        max_score: quiz.points,
        start_time: now,
        deadline,
        end_time: None,
        is_completed: false,
        status: AttemptStatus::InProgress,
        auto_submitted: false,
        preview,
    }
}

/// Only questions of the quiz are accepted, in a shape their type can grade
fn merge_answers(
    quiz: &Quiz,
    questions: &[Question],
    saved: &mut AnswerMap,
    incoming: AnswerMap,
) -> ServiceResult<()> {
    for (question_id, answer) in &incoming {
        let question = questions
            .iter()
            .find(|q| q.id == *question_id)
            .ok_or_else(|| {
                ServiceError::validation(format!("Question {} is not part of this quiz", question_id))
            })?;
        if !question.accepts_answer_shape(answer) {
            return Err(ServiceError::validation(format!(
                "Answer for question {} has the wrong type",
                question_id
            )));
        }
        if quiz.lock_questions_after_answering {
            if let Some(previous) = saved.get(question_id) {
                if previous != answer {
                    return Err(ServiceError::conflict(format!(
                        "Question {} is locked after answering",
                        question_id
                    )));
                }
            }
        }
    }

    saved.extend(incoming);
    Ok(())
}

fn build_results(
    attempt: QuizAttempt,
    grade: Grade,
    quiz: &Quiz,
    questions: &[Question],
    viewer: &JwtClaims,
) -> AttemptResults {
    let percentage = grade.percentage();
    let passed = grade.passed();
    let mut results = grade.results;
    if quiz.show_correct_answers || viewer.can_author() {
        grading::reveal_correct_answers(&mut results, questions);
    }

    AttemptResults {
        attempt: AttemptResponse::from_attempt(attempt, Utc::now()),
        score: grade.score,
        max_score: grade.max_score,
        percentage,
        passed,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attempt::AttemptAnswer;
    use crate::models::question::{Choice, QuestionKind};
    use crate::models::user::Role;

    fn claims(role: Role) -> JwtClaims {
        JwtClaims {
            sub: "student-1".to_string(),
            username: "student".to_string(),
            role,
            exp: 0,
            iat: 0,
        }
    }

    fn questions() -> Vec<Question> {
        vec![
            Question {
                id: "tf".to_string(),
                quiz: "quiz".to_string(),
                title: String::new(),
                points: 2.0,
                question: "Sky is blue?".to_string(),
                order: 0,
                kind: QuestionKind::TrueFalse {
                    correct_answer: true,
                },
            },
            Question {
                id: "mc".to_string(),
                quiz: "quiz".to_string(),
                title: String::new(),
                points: 3.0,
                question: "Pick one".to_string(),
                order: 1,
                kind: QuestionKind::MultipleChoice {
                    answers: vec![
                        Choice {
                            id: "a".to_string(),
                            text: "A".to_string(),
                            is_correct: true,
                        },
                        Choice {
                            id: "b".to_string(),
                            text: "B".to_string(),
                            is_correct: false,
                        },
                    ],
                },
            },
        ]
    }

    fn answers(pairs: &[(&str, AttemptAnswer)]) -> AnswerMap {
        pairs
            .iter()
            .map(|(id, answer)| (id.to_string(), answer.clone()))
            .collect()
    }

    #[test]
    fn merge_rejects_foreign_questions_and_wrong_shapes() {
        let quiz = Quiz::new("quiz".to_string(), "course".to_string());
        let mut saved = AnswerMap::new();

        let err = merge_answers(
            &quiz,
            &questions(),
            &mut saved,
            answers(&[("other", AttemptAnswer::Bool(true))]),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = merge_answers(
            &quiz,
            &questions(),
            &mut saved,
            answers(&[("mc", AttemptAnswer::Bool(true))]),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(saved.is_empty());
    }

    #[test]
    fn merge_overwrites_unless_locked() {
        let mut quiz = Quiz::new("quiz".to_string(), "course".to_string());
        let mut saved = answers(&[("tf", AttemptAnswer::Bool(false))]);

        merge_answers(
            &quiz,
            &questions(),
            &mut saved,
            answers(&[("tf", AttemptAnswer::Bool(true)), ("mc", AttemptAnswer::Text("a".into()))]),
        )
        .unwrap();
        assert_eq!(saved["tf"], AttemptAnswer::Bool(true));
        assert_eq!(saved.len(), 2);

        quiz.lock_questions_after_answering = true;
        let err = merge_answers(
            &quiz,
            &questions(),
            &mut saved,
            answers(&[("mc", AttemptAnswer::Text("b".into()))]),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        // resending the same answer is not a change
        assert!(merge_answers(
            &quiz,
            &questions(),
            &mut saved,
            answers(&[("mc", AttemptAnswer::Text("a".into()))]),
        )
        .is_ok());
    }

    #[test]
    fn new_attempt_sets_deadline_only_when_timed() {
        let now = Utc::now();
        let mut quiz = Quiz::new("quiz".to_string(), "course".to_string());
        quiz.points = 5.0;

        let timed = new_attempt(&claims(Role::Student), &quiz, 2, now, false);
        assert_eq!(timed.deadline, Some(now + Duration::minutes(30)));
        assert_eq!(timed.attempt_number, 2);
        assert_eq!(timed.max_score, 5.0);
        assert!(timed.is_in_progress());

        quiz.time_limit = 0;
        let untimed = new_attempt(&claims(Role::Faculty), &quiz, 1, now, true);
        assert!(untimed.deadline.is_none());
        assert!(untimed.preview);
    }

    #[test]
    fn results_hide_correct_answers_unless_allowed() {
        let mut quiz = Quiz::new("quiz".to_string(), "course".to_string());
        quiz.show_correct_answers = false;
        let questions = questions();
        let attempt = new_attempt(&claims(Role::Student), &quiz, 1, Utc::now(), false);
        let given = answers(&[("tf", AttemptAnswer::Bool(true))]);

        let hidden = build_results(
            attempt.clone(),
            grading::grade(&questions, &given),
            &quiz,
            &questions,
            &claims(Role::Student),
        );
        assert!(hidden.results.iter().all(|r| r.correct_answer.is_none()));
        assert_eq!(hidden.score, 2.0);
        assert_eq!(hidden.max_score, 5.0);
        assert!(!hidden.passed);

        let shown = build_results(
            attempt,
            grading::grade(&questions, &given),
            &quiz,
            &questions,
            &claims(Role::Faculty),
        );
        assert!(shown.results.iter().all(|r| r.correct_answer.is_some()));
    }

    #[test]
    fn lock_keys_are_scoped_per_user_and_quiz() {
        assert_eq!(lock_key("u1", "q1"), "attempt_lock:u1:q1");
        assert_ne!(lock_key("u1", "q1"), lock_key("u2", "q1"));
        assert_eq!(timer_key("a1"), "attempt_timer:a1");
        assert_eq!(preview_key("a1"), "quiz_preview:a1");
    }
}

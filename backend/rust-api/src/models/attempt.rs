use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::question::{CorrectAnswer, StudentQuestion};
use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// A submitted value: a choice id or free text, or a boolean for true/false
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AttemptAnswer {
    Bool(bool),
    Text(String),
}

impl AttemptAnswer {
    /// Booleans, and the strings "true"/"false" in any case
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttemptAnswer::Bool(value) => Some(*value),
            AttemptAnswer::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }
}

pub type AnswerMap = BTreeMap<String, AttemptAnswer>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "IN_PROGRESS",
            AttemptStatus::Submitted => "SUBMITTED",
        }
    }
}

/// Attempt stored in MongoDB "quiz_attempts" (previews live in Redis only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub quiz: String,
    pub course: String,
    pub attempt_number: u32,
    #[serde(default)]
    pub answers: AnswerMap,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub max_score: f64,
    #[serde(with = "bson_datetime_as_chrono")]
    pub start_time: DateTime<Utc>,
    #[serde(default, with = "bson_datetime_as_chrono_option")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, with = "bson_datetime_as_chrono_option")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_completed: bool,
    pub status: AttemptStatus,
    #[serde(default)]
    pub auto_submitted: bool,
    #[serde(default)]
    pub preview: bool,
}

impl QuizAttempt {
    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }

    /// Seconds left before the deadline; `None` when untimed
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.deadline
            .map(|deadline| (deadline - now).num_seconds().max(0))
    }

    /// Past the deadline plus grace: further answers are no longer accepted
    pub fn is_expired(&self, now: DateTime<Utc>, grace_seconds: i64) -> bool {
        match self.deadline {
            Some(deadline) => now > deadline + chrono::Duration::seconds(grace_seconds.max(0)),
            None => false,
        }
    }
}

/// Wire shape of an attempt
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub quiz: String,
    pub course: String,
    pub attempt_number: u32,
    pub answers: AnswerMap,
    pub score: f64,
    pub max_score: f64,
    pub start_time: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub status: AttemptStatus,
    pub auto_submitted: bool,
    pub preview: bool,
    pub time_remaining: Option<i64>,
}

impl AttemptResponse {
    pub fn from_attempt(attempt: QuizAttempt, now: DateTime<Utc>) -> Self {
        let time_remaining = if attempt.is_in_progress() {
            attempt.time_remaining(now)
        } else {
            None
        };
        AttemptResponse {
            id: attempt.id,
            user: attempt.user,
            quiz: attempt.quiz,
            course: attempt.course,
            attempt_number: attempt.attempt_number,
            answers: attempt.answers,
            score: attempt.score,
            max_score: attempt.max_score,
            start_time: attempt.start_time,
            deadline: attempt.deadline,
            end_time: attempt.end_time,
            is_completed: attempt.is_completed,
            status: attempt.status,
            auto_submitted: attempt.auto_submitted,
            preview: attempt.preview,
            time_remaining,
        }
    }
}

/// Returned when an attempt is started or resumed
#[derive(Debug, Serialize)]
pub struct AttemptSession {
    pub attempt: AttemptResponse,
    pub questions: Vec<StudentQuestion>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub question_id: String,
    pub correct: bool,
    pub points_awarded: f64,
    pub points: f64,
    pub answer: Option<AttemptAnswer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<CorrectAnswer>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResults {
    pub attempt: AttemptResponse,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub passed: bool,
    pub results: Vec<AttemptResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptRequest {
    #[serde(alias = "quizId")]
    pub quiz: String,
    #[serde(default)]
    pub access_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveAnswersRequest {
    pub answers: AnswerMap,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    pub answers: Option<AnswerMap>,
}

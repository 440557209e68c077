use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{check_date_window, flexible_datetime_option, flexible_datetime_patch};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuizType {
    #[default]
    GradedQuiz,
    PracticeQuiz,
    GradedSurvey,
    UngradedSurvey,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentGroup {
    #[default]
    Quizzes,
    Exams,
    Assignments,
    Project,
}

/// Quiz stored in MongoDB "quizzes" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(rename = "_id")]
    pub id: String,
    pub course: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quiz_type: QuizType,
    #[serde(default)]
    pub assignment_group: AssignmentGroup,
    /// Sum of question points, maintained by the question editor
    #[serde(default)]
    pub points: f64,
    #[serde(default)]
    pub number_of_questions: u32,
    #[serde(default)]
    pub shuffle_answers: bool,
    /// Minutes; 0 means untimed
    #[serde(default)]
    pub time_limit: u32,
    #[serde(default)]
    pub multiple_attempts: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub show_correct_answers: bool,
    #[serde(default)]
    pub one_question_at_a_time: bool,
    #[serde(default)]
    pub webcam_required: bool,
    #[serde(default)]
    pub lock_questions_after_answering: bool,
    #[serde(default)]
    pub access_code: String,
    #[serde(default, with = "flexible_datetime_option")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, with = "flexible_datetime_option")]
    pub available_date: Option<DateTime<Utc>>,
    #[serde(default, with = "flexible_datetime_option")]
    pub until_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published: bool,
}

fn default_max_attempts() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "date", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    Available,
    NotAvailableUntil(DateTime<Utc>),
    Closed,
}

impl Quiz {
    /// A fresh quiz with the editor's defaults
    pub fn new(id: String, course: String) -> Self {
        Quiz {
            id,
            course,
            title: "New Quiz".to_string(),
            description: String::new(),
            quiz_type: QuizType::GradedQuiz,
            assignment_group: AssignmentGroup::Quizzes,
            points: 0.0,
            number_of_questions: 0,
            shuffle_answers: false,
            time_limit: 30,
            multiple_attempts: false,
            max_attempts: 1,
            show_correct_answers: true,
            one_question_at_a_time: true,
            webcam_required: false,
            lock_questions_after_answering: false,
            access_code: String::new(),
            due_date: None,
            available_date: None,
            until_date: None,
            published: false,
        }
    }

    pub fn availability(&self, now: DateTime<Utc>) -> Availability {
        let Some(available) = self.available_date else {
            return Availability::Available;
        };
        if now < available {
            return Availability::NotAvailableUntil(available);
        }
        match self.until_date {
            Some(until) if now > until => Availability::Closed,
            _ => Availability::Available,
        }
    }

    pub fn allowed_attempts(&self) -> u32 {
        if self.multiple_attempts {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    pub fn is_timed(&self) -> bool {
        self.time_limit > 0
    }

    pub fn requires_access_code(&self) -> bool {
        !self.access_code.trim().is_empty()
    }

    pub fn check_dates(&self) -> Result<(), String> {
        check_date_window(self.available_date, self.due_date, self.until_date)
    }
}

/// Quiz plus its availability at read time
#[derive(Debug, Serialize)]
pub struct QuizSummary {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub availability: Availability,
    #[serde(rename = "requiresAccessCode")]
    pub requires_access_code: bool,
}

impl QuizSummary {
    /// The access code itself is only shown to authors
    pub fn for_viewer(mut quiz: Quiz, now: DateTime<Utc>, can_author: bool) -> Self {
        let availability = quiz.availability(now);
        let requires_access_code = quiz.requires_access_code();
        if !can_author {
            quiz.access_code.clear();
        }
        QuizSummary {
            quiz,
            availability,
            requires_access_code,
        }
    }
}

/// Create and update share one partial shape; create starts from `Quiz::new`
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuizDraft {
    #[validate(length(min = 1, max = 200, message = "Quiz title must not be empty"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub quiz_type: Option<QuizType>,
    pub assignment_group: Option<AssignmentGroup>,
    pub shuffle_answers: Option<bool>,
    #[validate(range(max = 1440, message = "Time limit must be at most 1440 minutes"))]
    pub time_limit: Option<u32>,
    pub multiple_attempts: Option<bool>,
    #[validate(range(min = 1, max = 100, message = "Max attempts must be between 1 and 100"))]
    pub max_attempts: Option<u32>,
    pub show_correct_answers: Option<bool>,
    pub one_question_at_a_time: Option<bool>,
    pub webcam_required: Option<bool>,
    pub lock_questions_after_answering: Option<bool>,
    pub access_code: Option<String>,
    #[serde(default, deserialize_with = "flexible_datetime_patch::deserialize")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "flexible_datetime_patch::deserialize")]
    pub available_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "flexible_datetime_patch::deserialize")]
    pub until_date: Option<Option<DateTime<Utc>>>,
    pub published: Option<bool>,
}

impl QuizDraft {
    pub fn apply(self, quiz: &mut Quiz) {
        if let Some(title) = self.title {
            quiz.title = title;
        }
        if let Some(description) = self.description {
            quiz.description = description;
        }
        if let Some(quiz_type) = self.quiz_type {
            quiz.quiz_type = quiz_type;
        }
        if let Some(group) = self.assignment_group {
            quiz.assignment_group = group;
        }
        if let Some(shuffle) = self.shuffle_answers {
            quiz.shuffle_answers = shuffle;
        }
        if let Some(time_limit) = self.time_limit {
            quiz.time_limit = time_limit;
        }
        if let Some(multiple) = self.multiple_attempts {
            quiz.multiple_attempts = multiple;
        }
        if let Some(max_attempts) = self.max_attempts {
            quiz.max_attempts = max_attempts;
        }
        if let Some(show) = self.show_correct_answers {
            quiz.show_correct_answers = show;
        }
        if let Some(one_at_a_time) = self.one_question_at_a_time {
            quiz.one_question_at_a_time = one_at_a_time;
        }
        if let Some(webcam) = self.webcam_required {
            quiz.webcam_required = webcam;
        }
        if let Some(lock) = self.lock_questions_after_answering {
            quiz.lock_questions_after_answering = lock;
        }
        if let Some(code) = self.access_code {
            quiz.access_code = code.trim().to_string();
        }
        if let Some(due_date) = self.due_date {
            quiz.due_date = due_date;
        }
        if let Some(available_date) = self.available_date {
            quiz.available_date = available_date;
        }
        if let Some(until_date) = self.until_date {
            quiz.until_date = until_date;
        }
        if let Some(published) = self.published {
            quiz.published = published;
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub published: bool,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{check_date_window, flexible_datetime_option, flexible_datetime_patch};

/// Assignment stored in MongoDB "assignments" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "_id")]
    pub id: String,
    pub course: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_points")]
    pub points: f64,
    #[serde(rename = "dueDate", default, with = "flexible_datetime_option")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(rename = "availableDate", default, with = "flexible_datetime_option")]
    pub available_date: Option<DateTime<Utc>>,
    #[serde(rename = "untilDate", default, with = "flexible_datetime_option")]
    pub until_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published: bool,
}

fn default_points() -> f64 {
    100.0
}

impl Assignment {
    pub fn check_dates(&self) -> Result<(), String> {
        check_date_window(self.available_date, self.due_date, self.until_date)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssignmentRequest {
    #[validate(length(min = 1, max = 200, message = "Assignment title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_points")]
    #[validate(range(min = 0.0, message = "Points must not be negative"))]
    pub points: f64,
    #[serde(rename = "dueDate", default, with = "flexible_datetime_option")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(rename = "availableDate", default, with = "flexible_datetime_option")]
    pub available_date: Option<DateTime<Utc>>,
    #[serde(rename = "untilDate", default, with = "flexible_datetime_option")]
    pub until_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateAssignmentRequest {
    #[validate(length(min = 1, max = 200, message = "Assignment title must not be empty"))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "Points must not be negative"))]
    pub points: Option<f64>,
    #[serde(
        rename = "dueDate",
        default,
        deserialize_with = "flexible_datetime_patch::deserialize"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(
        rename = "availableDate",
        default,
        deserialize_with = "flexible_datetime_patch::deserialize"
    )]
    pub available_date: Option<Option<DateTime<Utc>>>,
    #[serde(
        rename = "untilDate",
        default,
        deserialize_with = "flexible_datetime_patch::deserialize"
    )]
    pub until_date: Option<Option<DateTime<Utc>>>,
    pub published: Option<bool>,
}

impl UpdateAssignmentRequest {
    pub fn apply(self, assignment: &mut Assignment) {
        if let Some(title) = self.title {
            assignment.title = title;
        }
        if let Some(description) = self.description {
            assignment.description = description;
        }
        if let Some(points) = self.points {
            assignment.points = points;
        }
        if let Some(due_date) = self.due_date {
            assignment.due_date = due_date;
        }
        if let Some(available_date) = self.available_date {
            assignment.available_date = available_date;
        }
        if let Some(until_date) = self.until_date {
            assignment.until_date = until_date;
        }
        if let Some(published) = self.published {
            assignment.published = published;
        }
    }
}

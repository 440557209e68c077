use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Course stored in MongoDB "courses" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub number: String,
    #[serde(rename = "startDate", default)]
    pub start_date: Option<String>,
    #[serde(rename = "endDate", default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub credits: Option<i32>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[serde(default = "default_course_name")]
    #[validate(length(min = 1, max = 200, message = "Course name is required"))]
    pub name: String,
    #[serde(default = "default_course_number")]
    #[validate(length(max = 50))]
    pub number: String,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    pub department: Option<String>,
    #[validate(range(min = 0, max = 30))]
    pub credits: Option<i32>,
    #[serde(default = "default_course_description")]
    pub description: String,
}

fn default_course_name() -> String {
    "New Course".to_string()
}

fn default_course_number() -> String {
    "New Number".to_string()
}

fn default_course_description() -> String {
    "New Description".to_string()
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 200, message = "Course name must not be empty"))]
    pub name: Option<String>,
    #[validate(length(max = 50))]
    pub number: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    pub department: Option<String>,
    #[validate(range(min = 0, max = 30))]
    pub credits: Option<i32>,
    pub description: Option<String>,
}

impl UpdateCourseRequest {
    pub fn apply(self, course: &mut Course) {
        if let Some(name) = self.name {
            course.name = name;
        }
        if let Some(number) = self.number {
            course.number = number;
        }
        if let Some(start_date) = self.start_date {
            course.start_date = Some(start_date);
        }
        if let Some(end_date) = self.end_date {
            course.end_date = Some(end_date);
        }
        if let Some(department) = self.department {
            course.department = Some(department);
        }
        if let Some(credits) = self.credits {
            course.credits = Some(credits);
        }
        if let Some(description) = self.description {
            course.description = description;
        }
    }
}

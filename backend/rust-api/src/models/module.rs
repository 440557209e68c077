use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::new_id;

/// Course module stored in MongoDB "modules" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    #[serde(rename = "_id")]
    pub id: String,
    pub course: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lesson {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateModuleRequest {
    #[validate(length(min = 1, max = 200, message = "Module name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateModuleRequest {
    #[validate(length(min = 1, max = 200, message = "Module name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    /// Replaces the whole lesson list, order preserved
    pub lessons: Option<Vec<Lesson>>,
}

/// Lessons keep their ids; new ones get a fresh id
pub fn assign_lesson_ids(lessons: Vec<Lesson>) -> Vec<Lesson> {
    lessons
        .into_iter()
        .map(|mut lesson| {
            if lesson.id.trim().is_empty() {
                lesson.id = new_id();
            }
            lesson
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_lessons_receive_ids() {
        let lessons = assign_lesson_ids(vec![
            Lesson {
                id: "keep".to_string(),
                name: "Intro".to_string(),
                description: String::new(),
            },
            Lesson {
                id: String::new(),
                name: "Thrust".to_string(),
                description: String::new(),
            },
        ]);

        assert_eq!(lessons[0].id, "keep");
        assert!(!lessons[1].id.is_empty());
        assert_eq!(lessons[1].name, "Thrust");
    }
}

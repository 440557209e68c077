use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::{Collection, Database};

use crate::error::{ServiceError, ServiceResult};
use crate::middlewares::auth::JwtClaims;
use crate::models::course::{Course, CreateCourseRequest, UpdateCourseRequest};
use crate::models::new_id;
use crate::services::enrollment_service::EnrollmentService;

pub struct CourseService {
    mongo: Database,
}

impl CourseService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn courses(&self) -> Collection<Course> {
        self.mongo.collection::<Course>("courses")
    }

    pub async fn list_all(&self) -> ServiceResult<Vec<Course>> {
        self.find(doc! {}).await
    }

    /// Courses the user is enrolled in
    pub async fn list_for_user(&self, user_id: &str) -> ServiceResult<Vec<Course>> {
        let course_ids: Vec<String> = EnrollmentService::new(self.mongo.clone())
            .list_for_user(user_id)
            .await?
            .into_iter()
            .map(|e| e.course)
            .collect();

        if course_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.find(doc! { "_id": { "$in": course_ids } }).await
    }

    async fn find(&self, filter: Document) -> ServiceResult<Vec<Course>> {
        let courses = self
            .courses()
            .find(filter)
            .sort(doc! { "number": 1, "name": 1 })
            .await
            .context("Failed to query courses")?
            .try_collect()
            .await
            .context("Failed to read courses")?;
        Ok(courses)
    }

    pub async fn get(&self, course_id: &str) -> ServiceResult<Course> {
        self.courses()
            .find_one(doc! { "_id": course_id })
            .await
            .context("Failed to query course")?
            .ok_or_else(|| ServiceError::not_found("Course not found"))
    }

    /// The creator is enrolled in the new course
    pub async fn create(&self, req: CreateCourseRequest, author: &JwtClaims) -> ServiceResult<Course> {
        let now = Utc::now();
        let course = Course {
            id: new_id(),
            name: req.name,
            number: req.number,
            start_date: req.start_date,
            end_date: req.end_date,
            department: req.department,
            credits: req.credits,
            description: req.description,
            author: Some(author.sub.clone()),
            created_at: now,
            updated_at: now,
        };

        self.courses()
            .insert_one(&course)
            .await
            .context("Failed to insert course")?;

        EnrollmentService::new(self.mongo.clone())
            .enroll(&author.sub, &course.id)
            .await?;

        tracing::info!(course_id = %course.id, author = %author.sub, "Course created");
        Ok(course)
    }

    pub async fn update(&self, course_id: &str, req: UpdateCourseRequest) -> ServiceResult<Course> {
        let mut course = self.get(course_id).await?;
        req.apply(&mut course);
        course.updated_at = Utc::now();

        self.courses()
            .replace_one(doc! { "_id": course_id }, &course)
            .await
            .context("Failed to update course")?;

        Ok(course)
    }

    /// Deletes the course and everything hanging off it
    pub async fn delete(&self, course_id: &str) -> ServiceResult<()> {
        let result = self
            .courses()
            .delete_one(doc! { "_id": course_id })
            .await
            .context("Failed to delete course")?;
        if result.deleted_count == 0 {
            return Err(ServiceError::not_found("Course not found"));
        }

        let quiz_ids: Vec<String> = self
            .mongo
            .collection::<Document>("quizzes")
            .distinct("_id", doc! { "course": course_id })
            .await
            .context("Failed to collect course quizzes")?
            .into_iter()
            .filter_map(|id| id.as_str().map(str::to_string))
            .collect();

        if !quiz_ids.is_empty() {
            self.mongo
                .collection::<Document>("questions")
                .delete_many(doc! { "quiz": { "$in": quiz_ids.clone() } })
                .await
                .context("Failed to delete course questions")?;
        }

        for collection in ["quiz_attempts", "quizzes", "assignments", "modules", "enrollments"] {
            self.mongo
                .collection::<Document>(collection)
                .delete_many(doc! { "course": course_id })
                .await
                .with_context(|| format!("Failed to delete course {}", collection))?;
        }

        tracing::info!(course_id = %course_id, quizzes = quiz_ids.len(), "Course deleted");
        Ok(())
    }
}

use anyhow::Context;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::{Collection, Database};

use crate::error::{ServiceError, ServiceResult};
use crate::models::assignment::{Assignment, CreateAssignmentRequest, UpdateAssignmentRequest};
use crate::models::new_id;

pub struct AssignmentService {
    mongo: Database,
}

impl AssignmentService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn assignments(&self) -> Collection<Assignment> {
        self.mongo.collection::<Assignment>("assignments")
    }

    /// Students only see published assignments
    pub async fn list_for_course(
        &self,
        course_id: &str,
        include_unpublished: bool,
    ) -> ServiceResult<Vec<Assignment>> {
        let mut filter: Document = doc! { "course": course_id };
        if !include_unpublished {
            filter.insert("published", true);
        }

        let assignments = self
            .assignments()
            .find(filter)
            .sort(doc! { "dueDate": 1, "title": 1 })
            .await
            .context("Failed to query assignments")?
            .try_collect()
            .await
            .context("Failed to read assignments")?;
        Ok(assignments)
    }

    pub async fn get(
        &self,
        course_id: &str,
        assignment_id: &str,
        include_unpublished: bool,
    ) -> ServiceResult<Assignment> {
        let assignment = self
            .assignments()
            .find_one(doc! { "_id": assignment_id, "course": course_id })
            .await
            .context("Failed to query assignment")?
            .ok_or_else(|| ServiceError::not_found("Assignment not found"))?;

        if !assignment.published && !include_unpublished {
            return Err(ServiceError::not_found("Assignment not found"));
        }
        Ok(assignment)
    }

    pub async fn create(
        &self,
        course_id: &str,
        req: CreateAssignmentRequest,
    ) -> ServiceResult<Assignment> {
        let assignment = Assignment {
            id: new_id(),
            course: course_id.to_string(),
            title: req.title.trim().to_string(),
            description: req.description,
            points: req.points,
            due_date: req.due_date,
            available_date: req.available_date,
            until_date: req.until_date,
            published: req.published,
        };
        assignment.check_dates().map_err(ServiceError::Validation)?;

        self.assignments()
            .insert_one(&assignment)
            .await
            .context("Failed to insert assignment")?;
        Ok(assignment)
    }

    pub async fn update(
        &self,
        course_id: &str,
        assignment_id: &str,
        req: UpdateAssignmentRequest,
    ) -> ServiceResult<Assignment> {
        let mut assignment = self.get(course_id, assignment_id, true).await?;
        req.apply(&mut assignment);
        assignment.check_dates().map_err(ServiceError::Validation)?;

        self.assignments()
            .replace_one(doc! { "_id": assignment_id }, &assignment)
            .await
            .context("Failed to update assignment")?;
        Ok(assignment)
    }

    pub async fn delete(&self, course_id: &str, assignment_id: &str) -> ServiceResult<()> {
        let result = self
            .assignments()
            .delete_one(doc! { "_id": assignment_id, "course": course_id })
            .await
            .context("Failed to delete assignment")?;
        if result.deleted_count == 0 {
            return Err(ServiceError::not_found("Assignment not found"));
        }
        Ok(())
    }
}

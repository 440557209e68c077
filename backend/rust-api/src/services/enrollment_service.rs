use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::{Collection, Database};

use crate::error::{ServiceError, ServiceResult};
use crate::metrics::ENROLLMENTS_TOTAL;
use crate::middlewares::auth::JwtClaims;
use crate::models::enrollment::Enrollment;
use crate::models::new_id;

pub struct EnrollmentService {
    mongo: Database,
}

impl EnrollmentService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn enrollments(&self) -> Collection<Enrollment> {
        self.mongo.collection::<Enrollment>("enrollments")
    }

    /// Idempotent: enrolling twice returns the existing enrollment
    pub async fn enroll(&self, user_id: &str, course_id: &str) -> ServiceResult<Enrollment> {
        self.ensure_exists("users", user_id, "User not found").await?;
        self.ensure_exists("courses", course_id, "Course not found").await?;

        let fresh = Enrollment {
            id: new_id(),
            user: user_id.to_string(),
            course: course_id.to_string(),
            enrolled_at: Utc::now(),
        };
        let on_insert =
            mongodb::bson::to_document(&fresh).context("Failed to serialize enrollment")?;

        let result = self
            .enrollments()
            .update_one(
                doc! { "user": user_id, "course": course_id },
                doc! { "$setOnInsert": on_insert },
            )
            .upsert(true)
            .await
            .context("Failed to upsert enrollment")?;

        if result.upserted_id.is_some() {
            ENROLLMENTS_TOTAL.with_label_values(&["enroll"]).inc();
            tracing::info!(user_id = %user_id, course_id = %course_id, "User enrolled");
        }

        self.enrollments()
            .find_one(doc! { "user": user_id, "course": course_id })
            .await
            .context("Failed to read enrollment")?
            .ok_or_else(|| ServiceError::Internal(anyhow::anyhow!("Enrollment vanished after upsert")))
    }

    pub async fn unenroll(&self, user_id: &str, course_id: &str) -> ServiceResult<()> {
        let result = self
            .enrollments()
            .delete_one(doc! { "user": user_id, "course": course_id })
            .await
            .context("Failed to delete enrollment")?;

        if result.deleted_count == 0 {
            return Err(ServiceError::not_found("Enrollment not found"));
        }

        ENROLLMENTS_TOTAL.with_label_values(&["unenroll"]).inc();
        tracing::info!(user_id = %user_id, course_id = %course_id, "User unenrolled");
        Ok(())
    }

    pub async fn is_enrolled(&self, user_id: &str, course_id: &str) -> ServiceResult<bool> {
        let count = self
            .enrollments()
            .count_documents(doc! { "user": user_id, "course": course_id })
            .limit(1)
            .await
            .context("Failed to check enrollment")?;
        Ok(count > 0)
    }

    pub async fn list_for_user(&self, user_id: &str) -> ServiceResult<Vec<Enrollment>> {
        self.list(doc! { "user": user_id }).await
    }

    pub async fn list_for_course(&self, course_id: &str) -> ServiceResult<Vec<Enrollment>> {
        self.list(doc! { "course": course_id }).await
    }

    pub async fn list_all(&self) -> ServiceResult<Vec<Enrollment>> {
        self.list(doc! {}).await
    }

    async fn list(&self, filter: Document) -> ServiceResult<Vec<Enrollment>> {
        let enrollments = self
            .enrollments()
            .find(filter)
            .sort(doc! { "enrolledAt": 1 })
            .await
            .context("Failed to query enrollments")?
            .try_collect()
            .await
            .context("Failed to read enrollments")?;
        Ok(enrollments)
    }

    /// Course content is open to staff and to enrolled users
    pub async fn require_member(&self, claims: &JwtClaims, course_id: &str) -> ServiceResult<()> {
        if claims.is_staff() || self.is_enrolled(&claims.sub, course_id).await? {
            Ok(())
        } else {
            Err(ServiceError::forbidden("You are not enrolled in this course"))
        }
    }

    async fn ensure_exists(
        &self,
        collection: &str,
        id: &str,
        message: &'static str,
    ) -> ServiceResult<()> {
        let count = self
            .mongo
            .collection::<Document>(collection)
            .count_documents(doc! { "_id": id })
            .limit(1)
            .await
            .with_context(|| format!("Failed to look up {}", collection))?;
        if count == 0 {
            return Err(ServiceError::not_found(message));
        }
        Ok(())
    }
}

use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Collection, Database};

use crate::error::{ServiceError, ServiceResult};
use crate::models::module::{assign_lesson_ids, CreateModuleRequest, Module, UpdateModuleRequest};
use crate::models::new_id;

pub struct ModuleService {
    mongo: Database,
}

impl ModuleService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn modules(&self) -> Collection<Module> {
        self.mongo.collection::<Module>("modules")
    }

    pub async fn list_for_course(&self, course_id: &str) -> ServiceResult<Vec<Module>> {
        let modules = self
            .modules()
            .find(doc! { "course": course_id })
            .sort(doc! { "createdAt": 1 })
            .await
            .context("Failed to query modules")?
            .try_collect()
            .await
            .context("Failed to read modules")?;
        Ok(modules)
    }

    pub async fn create(&self, course_id: &str, req: CreateModuleRequest) -> ServiceResult<Module> {
        let now = Utc::now();
        let module = Module {
            id: new_id(),
            course: course_id.to_string(),
            name: req.name.trim().to_string(),
            description: req.description,
            lessons: assign_lesson_ids(req.lessons),
            created_at: now,
            updated_at: now,
        };

        self.modules()
            .insert_one(&module)
            .await
            .context("Failed to insert module")?;
        Ok(module)
    }

    pub async fn update(
        &self,
        course_id: &str,
        module_id: &str,
        req: UpdateModuleRequest,
    ) -> ServiceResult<Module> {
        let filter = doc! { "_id": module_id, "course": course_id };
        let mut module = self
            .modules()
            .find_one(filter.clone())
            .await
            .context("Failed to query module")?
            .ok_or_else(|| ServiceError::not_found("Module not found"))?;

        if let Some(name) = req.name {
            module.name = name.trim().to_string();
        }
        if let Some(description) = req.description {
            module.description = description;
        }
        if let Some(lessons) = req.lessons {
            module.lessons = assign_lesson_ids(lessons);
        }
        module.updated_at = Utc::now();

        self.modules()
            .replace_one(filter, &module)
            .await
            .context("Failed to update module")?;
        Ok(module)
    }

    pub async fn delete(&self, course_id: &str, module_id: &str) -> ServiceResult<()> {
        let result = self
            .modules()
            .delete_one(doc! { "_id": module_id, "course": course_id })
            .await
            .context("Failed to delete module")?;
        if result.deleted_count == 0 {
            return Err(ServiceError::not_found("Module not found"));
        }
        Ok(())
    }
}

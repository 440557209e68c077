use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

use crate::error::{is_duplicate_key, ServiceError, ServiceResult};
use crate::models::enrollment::Enrollment;
use crate::models::new_id;
use crate::models::user::{
    ListUsersQuery, Role, SignupRequest, UpdateProfileRequest, UpdateUserRequest, User,
};
use crate::services::auth_service::AuthService;

const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 500;

pub struct UserService {
    mongo: Database,
}

impl UserService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn users(&self) -> Collection<User> {
        self.mongo.collection::<User>("users")
    }

    pub async fn create_user(&self, req: SignupRequest, role: Role) -> ServiceResult<User> {
        if self
            .users()
            .find_one(doc! { "username": &req.username })
            .await
            .context("Failed to check existing user")?
            .is_some()
        {
            return Err(ServiceError::conflict("Username already taken"));
        }

        let now = Utc::now();
        let user = User {
            id: new_id(),
            username: req.username,
            password_hash: AuthService::hash_password(&req.password)?,
            first_name: req.first_name.unwrap_or_default(),
            last_name: req.last_name.unwrap_or_default(),
            email: req.email.filter(|e| !e.trim().is_empty()),
            dob: req.dob,
            role,
            section: req.section,
            last_activity: None,
            total_activity: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        match self.users().insert_one(&user).await {
            Ok(_) => Ok(user),
            Err(e) if is_duplicate_key(&e) => Err(ServiceError::conflict("Username already taken")),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_user(&self, user_id: &str) -> ServiceResult<User> {
        self.users()
            .find_one(doc! { "_id": user_id })
            .await
            .context("Failed to query user")?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    pub async fn list_users(&self, query: ListUsersQuery) -> ServiceResult<Vec<User>> {
        let filter = build_user_filter(&query)?;
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let users: Vec<User> = self
            .users()
            .find(filter)
            .sort(doc! { "lastName": 1, "firstName": 1 })
            .skip(u64::from(query.offset.unwrap_or(0)))
            .limit(i64::from(limit))
            .await
            .context("Failed to query users")?
            .try_collect()
            .await
            .context("Failed to read users")?;

        Ok(users)
    }

    /// Self-service edit; role and section stay untouched
    pub async fn update_profile(
        &self,
        user_id: &str,
        req: UpdateProfileRequest,
    ) -> ServiceResult<User> {
        let set = profile_changes(req)?;
        self.apply_changes(user_id, set).await
    }

    pub async fn update_user(&self, user_id: &str, req: UpdateUserRequest) -> ServiceResult<User> {
        let mut set = profile_changes(req.profile)?;
        if let Some(role) = req.role {
            set.insert("role", role.as_str());
        }
        if let Some(section) = req.section {
            set.insert("section", section);
        }
        self.apply_changes(user_id, set).await
    }

    async fn apply_changes(&self, user_id: &str, mut set: Document) -> ServiceResult<User> {
        set.insert(
            "updatedAt",
            mongodb::bson::DateTime::from_millis(Utc::now().timestamp_millis()),
        );

        self.users()
            .find_one_and_update(doc! { "_id": user_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to update user")?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    /// Removes the user with their enrollments, attempts and refresh tokens
    pub async fn delete_user(&self, user_id: &str) -> ServiceResult<()> {
        let result = self
            .users()
            .delete_one(doc! { "_id": user_id })
            .await
            .context("Failed to delete user")?;
        if result.deleted_count == 0 {
            return Err(ServiceError::not_found("User not found"));
        }

        self.mongo
            .collection::<Document>("enrollments")
            .delete_many(doc! { "user": user_id })
            .await
            .context("Failed to delete user enrollments")?;
        self.mongo
            .collection::<Document>("quiz_attempts")
            .delete_many(doc! { "user": user_id })
            .await
            .context("Failed to delete user attempts")?;
        self.mongo
            .collection::<Document>("refresh_tokens")
            .delete_many(doc! { "userId": user_id })
            .await
            .context("Failed to delete user refresh tokens")?;

        tracing::info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    /// The "People" page: everyone enrolled in the course
    pub async fn users_in_course(&self, course_id: &str) -> ServiceResult<Vec<User>> {
        let enrollments: Vec<Enrollment> = self
            .mongo
            .collection::<Enrollment>("enrollments")
            .find(doc! { "course": course_id })
            .await
            .context("Failed to query enrollments")?
            .try_collect()
            .await
            .context("Failed to read enrollments")?;

        let user_ids: Vec<String> = enrollments.into_iter().map(|e| e.user).collect();
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let users: Vec<User> = self
            .users()
            .find(doc! { "_id": { "$in": user_ids } })
            .sort(doc! { "lastName": 1, "firstName": 1 })
            .await
            .context("Failed to query roster")?
            .try_collect()
            .await
            .context("Failed to read roster")?;

        Ok(users)
    }
}

fn build_user_filter(query: &ListUsersQuery) -> ServiceResult<Document> {
    let mut filter = doc! {};

    if let Some(role) = query.role.as_deref().filter(|r| !r.trim().is_empty()) {
        let role = Role::parse(role.trim())
            .ok_or_else(|| ServiceError::validation(format!("Unknown role: {}", role)))?;
        filter.insert("role", role.as_str());
    }

    if let Some(name) = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        let pattern = regex::escape(name);
        filter.insert(
            "$or",
            vec![
                doc! { "firstName": { "$regex": &pattern, "$options": "i" } },
                doc! { "lastName": { "$regex": &pattern, "$options": "i" } },
            ],
        );
    }

    Ok(filter)
}

fn profile_changes(req: UpdateProfileRequest) -> ServiceResult<Document> {
    let mut set = doc! {};
    if let Some(first_name) = req.first_name {
        set.insert("firstName", first_name);
    }
    if let Some(last_name) = req.last_name {
        set.insert("lastName", last_name);
    }
    if let Some(email) = req.email {
        set.insert("email", email);
    }
    if let Some(dob) = req.dob {
        set.insert("dob", dob);
    }
    if let Some(password) = req.password {
        set.insert("passwordHash", AuthService::hash_password(&password)?);
    }
    Ok(set)
}

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]{3,40}$").unwrap();
}

/// User model stored in MongoDB "users" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(rename = "passwordHash")]
    pub password_hash: String,
    #[serde(rename = "firstName", default)]
    pub first_name: String,
    #[serde(rename = "lastName", default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(rename = "lastActivity", default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
    #[serde(rename = "totalActivity", default, skip_serializing_if = "Option::is_none")]
    pub total_activity: Option<String>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
    #[serde(
        rename = "lastLoginAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    Student,
    Faculty,
    #[serde(rename = "TA")]
    Ta,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Faculty => "FACULTY",
            Role::Ta => "TA",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "STUDENT" => Some(Role::Student),
            "FACULTY" => Some(Role::Faculty),
            "TA" => Some(Role::Ta),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    /// May create and edit course content and manage rosters
    pub fn can_author(&self) -> bool {
        matches!(self, Role::Faculty | Role::Admin)
    }

    pub fn sees_unpublished(&self) -> bool {
        matches!(self, Role::Faculty | Role::Ta | Role::Admin)
    }
}

/// User profile returned to client (without sensitive data)
#[derive(Debug, Serialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub email: Option<String>,
    pub dob: Option<String>,
    pub role: Role,
    pub section: Option<String>,
    #[serde(rename = "lastActivity")]
    pub last_activity: Option<String>,
    #[serde(rename = "totalActivity")]
    pub total_activity: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastLoginAt")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            dob: user.dob,
            role: user.role,
            section: user.section,
            last_activity: user.last_activity,
            total_activity: user.total_activity,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(regex(
        path = *USERNAME_RE,
        message = "Username must be 3-40 letters, digits, '.', '_' or '-'"
    ))]
    pub username: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[serde(rename = "firstName", default)]
    #[validate(length(max = 100))]
    pub first_name: Option<String>,

    #[serde(rename = "lastName", default)]
    #[validate(length(max = 100))]
    pub last_name: Option<String>,

    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[serde(default)]
    pub dob: Option<String>,

    #[serde(default)]
    pub section: Option<String>,

    /// Honoured only on the admin create route; public signup is always STUDENT
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SigninRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    /// If true, refresh token TTL is extended to the configured maximum
    #[serde(rename = "rememberMe", default)]
    pub remember_me: bool,
}

/// Response after successful signin or signup (refresh token in HTTP-only cookie)
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(skip)]
    pub refresh_token: String,
    pub user: UserProfile,
}

/// Fields a user may change on their own profile
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[serde(rename = "firstName")]
    #[validate(length(max = 100))]
    pub first_name: Option<String>,

    #[serde(rename = "lastName")]
    #[validate(length(max = 100))]
    pub last_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub dob: Option<String>,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
}

/// People-page edit: everything on the profile plus role and section
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub profile: UpdateProfileRequest,

    pub role: Option<Role>,

    pub section: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<String>,
    /// Case-insensitive substring of first or last name
    pub name: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

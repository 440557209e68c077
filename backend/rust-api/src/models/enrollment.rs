use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Join record in MongoDB "enrollments"; unique on (user, course)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub course: String,
    #[serde(rename = "enrolledAt")]
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentStatus {
    pub enrolled: bool,
}

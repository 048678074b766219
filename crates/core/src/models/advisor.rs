use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An advisor who owns a set of students.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Advisor {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Advisor with the number of students currently linked to them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdvisorWithLoad {
    #[serde(flatten)]
    pub advisor: Advisor,
    pub student_count: i64,
}

/// Values used when creating an advisor.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAdvisor {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
}

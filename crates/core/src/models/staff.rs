//! Admin and sales accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Portal administrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Admin {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Sales team member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Values used when creating an admin or sales account.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStaff {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
}

//! Audit log model for privileged portal actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::Role;

/// Represents an entry in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub actor_role: Role,
    pub actor_email: String,
    pub action: String,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::Role;

/// Review state of an uploaded document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DocumentStatus::Pending),
            "approved" => Some(DocumentStatus::Approved),
            "rejected" => Some(DocumentStatus::Rejected),
            _ => None,
        }
    }
}

/// Metadata about a student document. File bytes live elsewhere; `storage_ref`
/// points at them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: i64,
    pub student_id: i64,
    pub student_email: String,
    pub doc_type: String,
    pub file_name: String,
    pub storage_ref: String,
    pub status: DocumentStatus,
    pub review_note: Option<String>,
    pub uploaded_by_email: String,
    pub uploaded_by_role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values used when registering a document.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub student_id: i64,
    pub student_email: String,
    pub doc_type: String,
    pub file_name: String,
    pub storage_ref: String,
    pub uploaded_by_email: String,
    pub uploaded_by_role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_roundtrip() {
        for s in [
            DocumentStatus::Pending,
            DocumentStatus::Approved,
            DocumentStatus::Rejected,
        ] {
            assert_eq!(DocumentStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(DocumentStatus::parse("archived"), None);
    }

    #[test]
    fn status_serialization() {
        assert_eq!(
            serde_json::to_string(&DocumentStatus::Approved).unwrap(),
            "\"approved\""
        );
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of processing one inbound webhook record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
    Created,
    Updated,
    Rejected,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Created => "created",
            WebhookOutcome::Updated => "updated",
            WebhookOutcome::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "created" => WebhookOutcome::Created,
            "updated" => WebhookOutcome::Updated,
            _ => WebhookOutcome::Rejected,
        }
    }
}

/// Logged receipt of an inbound webhook record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookEvent {
    pub id: i64,
    pub source: String,
    pub email: Option<String>,
    pub outcome: WebhookOutcome,
    pub detail: Option<String>,
    pub received_at: DateTime<Utc>,
}

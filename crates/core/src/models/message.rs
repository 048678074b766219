use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::Role;

/// A single message between two portal accounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: i64,
    pub sender_email: String,
    pub sender_role: Role,
    pub receiver_email: String,
    pub receiver_role: Role,
    pub content: String,
    pub reply_to_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// True if `email` is the sender or the receiver.
    pub fn involves(&self, email: &str) -> bool {
        self.sender_email == email || self.receiver_email == email
    }

    /// The participant on the other side from `email`.
    pub fn counterpart(&self, email: &str) -> (&str, Role) {
        if self.sender_email == email {
            (&self.receiver_email, self.receiver_role)
        } else {
            (&self.sender_email, self.sender_role)
        }
    }
}

/// Values used when appending a message.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub sender_email: String,
    pub sender_role: Role,
    pub receiver_email: String,
    pub receiver_role: Role,
    pub content: String,
    pub reply_to_id: Option<i64>,
}

/// One conversation as seen by a participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub counterpart_email: String,
    pub counterpart_role: Role,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    pub total: i64,
    pub unread: i64,
}

//! JSON API handlers, grouped by the role that owns each route prefix.

pub mod admin;
pub mod advisor;
pub mod documents;
pub mod messages;
pub mod sales;
pub mod student;
pub mod webhook;

use serde::Deserialize;

const DEFAULT_LOG_LIMIT: i64 = 100;
const MAX_LOG_LIMIT: i64 = 1000;

/// `?limit=` for log listings.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

impl LimitQuery {
    pub fn effective(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT)
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{CompassError, Result};

/// Portal role a caller authenticates as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Advisor,
    Admin,
    Sales,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Advisor, Role::Admin, Role::Sales];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Advisor => "advisor",
            Role::Admin => "admin",
            Role::Sales => "sales",
        }
    }

    /// Parse a stored or user-supplied role name.
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "advisor" => Some(Role::Advisor),
            "admin" => Some(Role::Admin),
            "sales" => Some(Role::Sales),
            _ => None,
        }
    }

    /// Table holding accounts of this role.
    pub(crate) fn table(&self) -> &'static str {
        match self {
            Role::Student => "students",
            Role::Advisor => "advisors",
            Role::Admin => "admins",
            Role::Sales => "sales_users",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trim and lower-case an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Normalize an email and check it has a plausible `local@domain` shape.
pub fn validate_email(email: &str) -> Result<String> {
    let normalized = normalize_email(email);
    if normalized.is_empty() {
        return Err(CompassError::Validation("email is required".into()));
    }
    let valid = match normalized.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !normalized.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(CompassError::Validation(format!(
            "invalid email address: {normalized}"
        )));
    }
    Ok(normalized)
}

/// Trim a required text value, rejecting blanks.
pub fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CompassError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

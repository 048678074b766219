//! Student record, its writable field catalog, and partial updates.
//!
//! The catalog is the single source of truth for which columns exist on
//! `students`, which group each belongs to (used for role write scoping),
//! and what JSON type an update must carry.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CompassError, Result};

/// Stage assigned to a new student when none is given.
pub const DEFAULT_STAGE: &str = "New";

/// Write-scoping group a student field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldGroup {
    Contact,
    Personal,
    Passport,
    Visa,
    Family,
    Education,
    Pipeline,
}

/// Value shape a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Nullable text.
    Text,
    /// Text that may not be blank or null.
    RequiredText,
    /// Boolean flag.
    Flag,
}

/// One entry of the student field catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub group: FieldGroup,
    pub kind: FieldKind,
}

/// Writable fields stored directly on [`Student`].
pub const CORE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "first_name",
        group: FieldGroup::Contact,
        kind: FieldKind::RequiredText,
    },
    FieldSpec {
        name: "last_name",
        group: FieldGroup::Contact,
        kind: FieldKind::RequiredText,
    },
    FieldSpec {
        name: "phone",
        group: FieldGroup::Contact,
        kind: FieldKind::Text,
    },
    FieldSpec {
        name: "stage",
        group: FieldGroup::Pipeline,
        kind: FieldKind::RequiredText,
    },
    FieldSpec {
        name: "process_started",
        group: FieldGroup::Pipeline,
        kind: FieldKind::Flag,
    },
];

macro_rules! student_profile {
    ($( $group:ident => [ $($field:ident),* $(,)? ] ),* $(,)?) => {
        /// Optional profile details (personal, passport, visa, family, education).
        #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
        pub struct StudentProfile {
            $($(
                #[serde(default)]
                pub $field: Option<String>,
            )*)*
        }

        /// Profile fields in column order.
        pub const PROFILE_FIELDS: &[FieldSpec] = &[
            $($(
                FieldSpec {
                    name: stringify!($field),
                    group: FieldGroup::$group,
                    kind: FieldKind::Text,
                },
            )*)*
        ];

        impl StudentProfile {
            /// Read a profile field by column name.
            pub fn get(&self, name: &str) -> Option<&str> {
                match name {
                    $($( stringify!($field) => self.$field.as_deref(), )*)*
                    _ => None,
                }
            }

            /// Set a profile field by column name. Returns false for unknown names.
            pub fn set(&mut self, name: &str, value: Option<String>) -> bool {
                match name {
                    $($( stringify!($field) => {
                        self.$field = value;
                        true
                    } )*)*
                    _ => false,
                }
            }
        }
    };
}

student_profile! {
    Personal => [
        middle_name, date_of_birth, gender, nationality, marital_status,
        address_line, city, country, postal_code, whatsapp, alternate_email,
    ],
    Passport => [
        passport_number, passport_issue_date, passport_expiry_date,
        passport_issue_place, passport_country,
    ],
    Visa => [
        visa_type, visa_status, visa_application_date, visa_decision_date,
        previous_visa_refusal, target_country, intake_term, intake_year,
    ],
    Family => [
        father_name, father_occupation, father_phone, mother_name,
        mother_occupation, mother_phone, guardian_name, guardian_relation,
        guardian_phone, sponsor_name, sponsor_relation, sponsor_income,
    ],
    Education => [
        highest_qualification, high_school_name, high_school_grade,
        high_school_year, bachelor_university, bachelor_major, bachelor_gpa,
        bachelor_year, master_university, master_major, master_gpa,
        master_year, english_test_type, english_test_score, english_test_date,
        preferred_program, preferred_university, work_experience_years, notes,
    ],
}

/// Look up a writable field by column name.
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    CORE_FIELDS
        .iter()
        .chain(PROFILE_FIELDS.iter())
        .find(|f| f.name == name)
}

/// Every writable field, core fields first.
pub fn all_fields() -> impl Iterator<Item = &'static FieldSpec> {
    CORE_FIELDS.iter().chain(PROFILE_FIELDS.iter())
}

/// A student record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Student {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub stage: String,
    pub process_started: bool,
    pub advisor_email: Option<String>,
    pub advisor_id: Option<i64>,
    #[serde(flatten)]
    pub profile: StudentProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Compact view used in list responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudentSummary {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub stage: String,
    pub process_started: bool,
    pub advisor_email: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Student> for StudentSummary {
    fn from(s: &Student) -> Self {
        Self {
            id: s.id,
            email: s.email.clone(),
            first_name: s.first_name.clone(),
            last_name: s.last_name.clone(),
            phone: s.phone.clone(),
            stage: s.stage.clone(),
            process_started: s.process_started,
            advisor_email: s.advisor_email.clone(),
            updated_at: s.updated_at,
        }
    }
}

/// Values used when inserting a new student row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub stage: String,
    pub password_hash: Option<String>,
    /// Advisor linked in the same insert; must name an existing advisor.
    pub advisor_email: Option<String>,
}

impl NewStudent {
    pub fn new(email: &str, first_name: &str, last_name: &str) -> Self {
        Self {
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            phone: None,
            stage: DEFAULT_STAGE.to_string(),
            password_hash: None,
            advisor_email: None,
        }
    }
}

/// Filter for listing students.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StudentFilter {
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub advisor_email: Option<String>,
    #[serde(default)]
    pub process_started: Option<bool>,
    /// Case-insensitive match on email, first or last name.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

/// Whether an upsert inserted or modified a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// A new value for one catalog field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(Option<String>),
    Flag(bool),
}

/// A validated partial update of a student record.
///
/// Setting the same field twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentUpdate {
    changes: Vec<(&'static FieldSpec, FieldValue)>,
}

impl StudentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of `field -> value` against the catalog.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| CompassError::Validation("update must be a JSON object".into()))?;
        let mut update = Self::new();
        for (name, v) in obj {
            let spec = field_spec(name)
                .ok_or_else(|| CompassError::Validation(format!("unknown field: {name}")))?;
            match spec.kind {
                FieldKind::Flag => {
                    let flag = v.as_bool().ok_or_else(|| {
                        CompassError::Validation(format!("{name} must be a boolean"))
                    })?;
                    update.set_flag(name, flag)?;
                }
                FieldKind::Text | FieldKind::RequiredText => {
                    let text = match v {
                        Value::Null => None,
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => {
                            return Err(CompassError::Validation(format!(
                                "{name} must be a string"
                            )))
                        }
                    };
                    update.set_text(name, text)?;
                }
            }
        }
        Ok(update)
    }

    /// Set a text field. Blank text is stored as null; required fields reject it.
    pub fn set_text(&mut self, name: &str, value: Option<String>) -> Result<()> {
        let spec =
            field_spec(name).ok_or_else(|| CompassError::Validation(format!("unknown field: {name}")))?;
        let value = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        match spec.kind {
            FieldKind::Flag => {
                return Err(CompassError::Validation(format!(
                    "{name} must be a boolean"
                )))
            }
            FieldKind::RequiredText if value.is_none() => {
                return Err(CompassError::Validation(format!("{name} must not be empty")))
            }
            _ => {}
        }
        self.push(spec, FieldValue::Text(value));
        Ok(())
    }

    /// Set a boolean field.
    pub fn set_flag(&mut self, name: &str, value: bool) -> Result<()> {
        let spec =
            field_spec(name).ok_or_else(|| CompassError::Validation(format!("unknown field: {name}")))?;
        if spec.kind != FieldKind::Flag {
            return Err(CompassError::Validation(format!("{name} must be a string")));
        }
        self.push(spec, FieldValue::Flag(value));
        Ok(())
    }

    fn push(&mut self, spec: &'static FieldSpec, value: FieldValue) {
        self.changes.retain(|(s, _)| s.name != spec.name);
        self.changes.push((spec, value));
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.changes
            .iter()
            .find(|(s, _)| s.name == name)
            .map(|(_, v)| v)
    }

    /// Text value of a field if the update sets it to non-null text.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(FieldValue::Text(Some(v))) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn changes(&self) -> impl Iterator<Item = (&'static FieldSpec, &FieldValue)> {
        self.changes.iter().map(|(s, v)| (*s, v))
    }

    /// Field groups touched by this update.
    pub fn groups(&self) -> BTreeSet<FieldGroup> {
        self.changes.iter().map(|(s, _)| s.group).collect()
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.changes.iter().map(|(s, _)| s.name).collect()
    }
}

//! Odoo lead fields to student columns.
//!
//! Odoo serializes records with its own conventions: `false` stands for an
//! empty value of any type, many2one relations arrive as `[id, "Display
//! Name"]`, and custom Studio fields carry an `x_studio_` prefix.

use serde_json::{Map, Value};

use crate::models::student::{field_spec, FieldKind, StudentUpdate};

/// Pseudo-column for the record's identity.
pub const EMAIL: &str = "email";
/// Pseudo-column for the advisor link, applied separately from the update.
pub const ADVISOR_EMAIL: &str = "advisor_email";

/// Odoo field name to student column. The first match for a column wins.
pub const FIELD_MAP: &[(&str, &str)] = &[
    ("email_from", EMAIL),
    ("email", EMAIL),
    ("x_studio_first_name", "first_name"),
    ("x_studio_last_name", "last_name"),
    ("phone", "phone"),
    ("mobile", "whatsapp"),
    ("stage_id", "stage"),
    ("x_studio_process_started", "process_started"),
    ("x_studio_advisor_email", ADVISOR_EMAIL),
    // Personal
    ("x_studio_middle_name", "middle_name"),
    ("x_studio_date_of_birth", "date_of_birth"),
    ("x_studio_gender", "gender"),
    ("x_studio_nationality", "nationality"),
    ("x_studio_marital_status", "marital_status"),
    ("street", "address_line"),
    ("city", "city"),
    ("country_id", "country"),
    ("zip", "postal_code"),
    ("x_studio_alternate_email", "alternate_email"),
    // Passport
    ("x_studio_passport_number", "passport_number"),
    ("x_studio_passport_issue_date", "passport_issue_date"),
    ("x_studio_passport_expiry_date", "passport_expiry_date"),
    ("x_studio_passport_issue_place", "passport_issue_place"),
    ("x_studio_passport_country", "passport_country"),
    // Visa
    ("x_studio_visa_type", "visa_type"),
    ("x_studio_visa_status", "visa_status"),
    ("x_studio_visa_application_date", "visa_application_date"),
    ("x_studio_visa_decision_date", "visa_decision_date"),
    ("x_studio_visa_refusal", "previous_visa_refusal"),
    ("x_studio_destination_country", "target_country"),
    ("x_studio_intake", "intake_term"),
    ("x_studio_intake_year", "intake_year"),
    // Family
    ("x_studio_father_name", "father_name"),
    ("x_studio_father_occupation", "father_occupation"),
    ("x_studio_father_phone", "father_phone"),
    ("x_studio_mother_name", "mother_name"),
    ("x_studio_mother_occupation", "mother_occupation"),
    ("x_studio_mother_phone", "mother_phone"),
    ("x_studio_guardian_name", "guardian_name"),
    ("x_studio_guardian_relation", "guardian_relation"),
    ("x_studio_guardian_phone", "guardian_phone"),
    ("x_studio_sponsor", "sponsor_name"),
    ("x_studio_sponsor_relation", "sponsor_relation"),
    ("x_studio_sponsor_income", "sponsor_income"),
    // Education
    ("x_studio_highest_qualification", "highest_qualification"),
    ("x_studio_high_school", "high_school_name"),
    ("x_studio_high_school_grade", "high_school_grade"),
    ("x_studio_high_school_year", "high_school_year"),
    ("x_studio_bachelor_university", "bachelor_university"),
    ("x_studio_bachelor_major", "bachelor_major"),
    ("x_studio_bachelor_gpa", "bachelor_gpa"),
    ("x_studio_bachelor_year", "bachelor_year"),
    ("x_studio_master_university", "master_university"),
    ("x_studio_master_major", "master_major"),
    ("x_studio_master_gpa", "master_gpa"),
    ("x_studio_master_year", "master_year"),
    ("x_studio_english_test", "english_test_type"),
    ("x_studio_english_score", "english_test_score"),
    ("x_studio_english_test_date", "english_test_date"),
    ("x_studio_program", "preferred_program"),
    ("x_studio_university", "preferred_university"),
    ("x_studio_work_experience", "work_experience_years"),
    ("description", "notes"),
];

/// Fields holding a full name, tried in order when first/last are missing.
const NAME_FIELDS: &[&str] = &["contact_name", "partner_name"];

/// One Odoo record translated into student terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedRecord {
    pub email: Option<String>,
    pub advisor_email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Catalog fields carried by the record, names excluded.
    pub update: StudentUpdate,
    /// Keys of the record with no mapping.
    pub ignored: Vec<String>,
}

/// Text form of an Odoo value. `false`, null and blanks are empty.
pub fn text_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null | Value::Bool(false) => return None,
        Value::Bool(true) => "true".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        // many2one: [id, "Display Name"]
        Value::Array(items) => match items.as_slice() {
            [_, Value::String(name)] => name.clone(),
            _ => return None,
        },
        Value::Object(_) => return None,
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Boolean form of an Odoo value. Null means "not provided".
pub fn flag_value(value: &Value) -> Option<bool> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" | "" => Some(false),
            _ => None,
        },
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Split a full name on its last space: "Ana Maria Silva" becomes
/// ("Ana Maria", "Silva"). A single word has no last name.
pub fn split_name(full: &str) -> (String, Option<String>) {
    let full = full.split_whitespace().collect::<Vec<_>>().join(" ");
    match full.rsplit_once(' ') {
        Some((first, last)) => (first.to_string(), Some(last.to_string())),
        None => (full, None),
    }
}

fn target_for(key: &str) -> Option<&'static str> {
    FIELD_MAP
        .iter()
        .find(|(odoo, _)| *odoo == key)
        .map(|(_, column)| *column)
}

/// Translate one Odoo record.
///
/// Empty values for required columns are skipped rather than clearing them,
/// and `false` clears optional columns.
pub fn map_record(record: &Map<String, Value>) -> MappedRecord {
    let mut mapped = MappedRecord::default();

    // Walk the map in table order so the first alias for a column wins.
    for (odoo, column) in FIELD_MAP {
        let Some(value) = record.get(*odoo) else {
            continue;
        };
        match *column {
            EMAIL => {
                if mapped.email.is_none() {
                    mapped.email = text_value(value);
                }
            }
            ADVISOR_EMAIL => mapped.advisor_email = text_value(value),
            "first_name" => mapped.first_name = text_value(value),
            "last_name" => mapped.last_name = text_value(value),
            name => {
                let Some(spec) = field_spec(name) else {
                    continue;
                };
                let applied = match spec.kind {
                    FieldKind::Flag => match flag_value(value) {
                        Some(flag) => mapped.update.set_flag(name, flag),
                        None => Ok(()),
                    },
                    FieldKind::RequiredText => match text_value(value) {
                        Some(text) => mapped.update.set_text(name, Some(text)),
                        None => Ok(()),
                    },
                    FieldKind::Text => mapped.update.set_text(name, text_value(value)),
                };
                // Catalog kinds are checked above, so this only fires on a map typo.
                debug_assert!(applied.is_ok(), "{name} rejected by catalog");
            }
        }
    }

    if mapped.first_name.is_none() || mapped.last_name.is_none() {
        let full = NAME_FIELDS
            .iter()
            .find_map(|key| record.get(*key).and_then(text_value));
        if let Some(full) = full {
            let (first, last) = split_name(&full);
            if mapped.first_name.is_none() {
                mapped.first_name = Some(first);
            }
            if mapped.last_name.is_none() {
                mapped.last_name = last;
            }
        }
    }

    mapped.ignored = record
        .keys()
        .filter(|k| target_for(k).is_none() && !NAME_FIELDS.contains(&k.as_str()))
        .cloned()
        .collect();
    mapped
}

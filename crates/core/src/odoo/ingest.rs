//! Webhook authentication and record ingestion.

use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::access::{self, Caller};
use crate::config::OdooConfig;
use crate::db::repository::{PortalRepository, WebhookEventRepository};
use crate::error::{CompassError, Result};
use crate::models::common::{normalize_email, validate_email};
use crate::models::student::{NewStudent, Student, UpsertOutcome};
use crate::models::webhook::{WebhookEvent, WebhookOutcome};

use super::mapping::{map_record, MappedRecord};

type HmacSha256 = Hmac<Sha256>;

/// Source name recorded in `webhook_events`.
pub const SOURCE: &str = "odoo";

/// Compute the hex HMAC-SHA256 of a request body, as expected in `X-Odoo-Signature`.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Compare two secrets without leaking where they differ.
///
/// Both sides are MACed under a fixed key so the comparison runs over
/// equal-length tags via `verify_slice`.
fn secrets_match(expected: &str, provided: &str) -> bool {
    let tag = |value: &str| {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(b"compass-odoo-token")
            .expect("HMAC can take key of any size");
        mac.update(value.as_bytes());
        mac
    };
    let expected_tag = tag(expected).finalize().into_bytes();
    tag(provided).verify_slice(&expected_tag).is_ok()
}

/// Check the `token` query parameter against the configured secret.
///
/// The whole token must match; a value that merely contains the secret is
/// rejected.
pub fn verify_token(config: &OdooConfig, provided: Option<&str>) -> Result<()> {
    let expected = config
        .webhook_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CompassError::Config("odoo webhook token is not configured".into()))?;
    match provided {
        Some(token) if secrets_match(expected, token) => Ok(()),
        _ => Err(CompassError::Unauthorized("invalid webhook token".into())),
    }
}

/// Check the `X-Odoo-Signature` header when a signing secret is configured.
pub fn verify_signature(config: &OdooConfig, body: &[u8], signature: Option<&str>) -> Result<()> {
    let Some(secret) = config.signing_secret.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(());
    };
    let signature = signature
        .map(str::trim)
        .ok_or_else(|| CompassError::Unauthorized("missing webhook signature".into()))?;
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let bytes = hex::decode(signature)
        .map_err(|_| CompassError::Unauthorized("malformed webhook signature".into()))?;

    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    mac.verify_slice(&bytes)
        .map_err(|_| CompassError::Unauthorized("invalid webhook signature".into()))
}

/// Parse a webhook body into records. Accepts one object or an array of objects.
pub fn parse_payload(body: &[u8]) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| CompassError::Validation(format!("invalid JSON payload: {e}")))?;
    match value {
        Value::Object(_) => Ok(vec![value]),
        Value::Array(items) => Ok(items),
        _ => Err(CompassError::Validation(
            "payload must be a JSON object or an array of objects".into(),
        )),
    }
}

/// Outcome of one record in a webhook delivery.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecordResult {
    pub index: usize,
    pub email: Option<String>,
    pub outcome: WebhookOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Summary returned to the webhook caller.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct IngestReport {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub rejected: usize,
    pub results: Vec<RecordResult>,
}

impl IngestReport {
    fn push(&mut self, result: RecordResult) {
        self.processed += 1;
        match result.outcome {
            WebhookOutcome::Created => self.created += 1,
            WebhookOutcome::Updated => self.updated += 1,
            WebhookOutcome::Rejected => self.rejected += 1,
        }
        self.results.push(result);
    }
}

/// Upsert every record by email, logging each outcome to `webhook_events`.
///
/// A bad record is rejected on its own and does not stop the batch; a
/// database failure does.
pub async fn ingest<R>(repo: &R, config: &OdooConfig, records: Vec<Value>) -> Result<IngestReport>
where
    R: PortalRepository + ?Sized,
{
    let mut report = IngestReport::default();
    for (index, record) in records.into_iter().enumerate() {
        let result = match ingest_record(repo, config, index, &record).await {
            Ok(result) => result,
            Err(CompassError::Validation(reason)) | Err(CompassError::NotFound(reason)) => {
                RecordResult {
                    index,
                    email: record
                        .get("email_from")
                        .or_else(|| record.get("email"))
                        .and_then(Value::as_str)
                        .map(normalize_email),
                    outcome: WebhookOutcome::Rejected,
                    student_id: None,
                    detail: Some(reason),
                }
            }
            Err(e) => return Err(e),
        };

        if result.outcome == WebhookOutcome::Rejected {
            warn!(index, email = ?result.email, detail = ?result.detail, "odoo record rejected");
        }
        repo.record_webhook_event(
            SOURCE,
            result.email.as_deref(),
            result.outcome,
            result.detail.as_deref(),
        )
        .await?;
        report.push(result);
    }

    info!(
        processed = report.processed,
        created = report.created,
        updated = report.updated,
        rejected = report.rejected,
        "odoo webhook ingested"
    );
    Ok(report)
}

async fn ingest_record<R>(
    repo: &R,
    config: &OdooConfig,
    index: usize,
    record: &Value,
) -> Result<RecordResult>
where
    R: PortalRepository + ?Sized,
{
    let fields = record
        .as_object()
        .ok_or_else(|| CompassError::Validation("record is not a JSON object".into()))?;
    let MappedRecord {
        email,
        advisor_email,
        first_name,
        last_name,
        mut update,
        ignored,
    } = map_record(fields);

    let email = validate_email(
        email
            .as_deref()
            .ok_or_else(|| CompassError::Validation("record has no email".into()))?,
    )?;
    if !ignored.is_empty() {
        debug!(%email, ?ignored, "unmapped odoo fields");
    }

    // Names given by the CRM overwrite; missing names only seed a new record.
    if let Some(ref first) = first_name {
        update.set_text("first_name", Some(first.clone()))?;
    }
    if let Some(ref last) = last_name {
        update.set_text("last_name", Some(last.clone()))?;
    }

    // A new student needs a last name; updates may omit it.
    let last_name = last_name.filter(|l| !l.trim().is_empty());
    if last_name.is_none() && repo.get_student_by_email(&email).await?.is_none() {
        return Err(CompassError::Validation(format!(
            "record for new student {email} has no last name"
        )));
    }

    let local_part = email.split('@').next().unwrap_or_default().to_string();
    let first = first_name
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .unwrap_or(&local_part);
    let mut new = NewStudent::new(&email, first, last_name.as_deref().unwrap_or_default());
    new.stage = config.default_stage.clone();

    let (mut student, outcome) = repo.upsert_student(&new, &update).await?;

    let mut detail = None;
    if let Some(advisor) = advisor_email.as_deref().map(normalize_email) {
        let known = repo.get_advisor_by_email(&advisor).await?.is_some();
        let linked = if !known {
            Err(CompassError::NotFound(format!("advisor {advisor}")))
        } else if student.advisor_email.as_deref() == Some(advisor.as_str()) {
            Ok(None)
        } else {
            repo.assign_advisor(&email, Some(&advisor)).await
        };
        let (linked, note) = settle_advisor_link(&email, &advisor, linked)?;
        if let Some(linked) = linked {
            student = linked;
        }
        detail = note;
    }

    Ok(RecordResult {
        index,
        email: Some(student.email),
        outcome: match outcome {
            UpsertOutcome::Created => WebhookOutcome::Created,
            UpsertOutcome::Updated => WebhookOutcome::Updated,
        },
        student_id: Some(student.id),
        detail,
    })
}

/// Fold an advisor link attempt into the record result.
///
/// The student row is already written, so an advisor that is unknown (or
/// deleted mid-request) only drops the link and leaves a detail note.
fn settle_advisor_link(
    email: &str,
    advisor: &str,
    linked: Result<Option<Student>>,
) -> Result<(Option<Student>, Option<String>)> {
    match linked {
        Ok(student) => Ok((student, None)),
        Err(CompassError::NotFound(_)) => {
            warn!(%email, %advisor, "odoo record names unknown advisor; link ignored");
            Ok((None, Some(format!("unknown advisor {advisor} ignored"))))
        }
        Err(e) => Err(e),
    }
}

/// Latest logged webhook records. Admin only.
pub async fn recent_events<R>(repo: &R, caller: &Caller, limit: i64) -> Result<Vec<WebhookEvent>>
where
    R: WebhookEventRepository + ?Sized,
{
    access::require_admin(caller)?;
    repo.list_webhook_events(limit).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{AdvisorRepository, StudentRepository, WebhookEventRepository};
    use crate::db::{sqlite::SqliteRepository, DatabasePool};
    use crate::models::advisor::NewAdvisor;
    use serde_json::json;

    async fn setup() -> SqliteRepository {
        let repo =
            SqliteRepository::new(DatabasePool::new_sqlite_memory().await.unwrap().into_sqlite());
        repo.create_advisor(&NewAdvisor {
            email: "sam@compass.example".into(),
            name: "Sam".into(),
            phone: None,
            password_hash: None,
        })
        .await
        .unwrap();
        repo
    }

    fn config() -> OdooConfig {
        OdooConfig {
            enabled: true,
            webhook_token: Some("s3cret-token".into()),
            signing_secret: None,
            default_stage: "Lead".into(),
        }
    }

    #[test]
    fn token_must_match_exactly() {
        let cfg = config();
        assert!(verify_token(&cfg, Some("s3cret-token")).is_ok());
        for bad in ["s3cret-token-extra", "xs3cret-token", "s3cret", ""] {
            let err = verify_token(&cfg, Some(bad)).unwrap_err();
            assert!(matches!(err, CompassError::Unauthorized(_)), "{bad}");
        }
        assert!(verify_token(&cfg, None).is_err());
    }

    #[test]
    fn unconfigured_token_is_config_error() {
        let mut cfg = config();
        cfg.webhook_token = None;
        assert!(matches!(
            verify_token(&cfg, Some("anything")).unwrap_err(),
            CompassError::Config(_)
        ));
    }

    #[test]
    fn signature_checked_only_when_configured() {
        let body = br#"{"email_from":"a@b.io"}"#;
        let mut cfg = config();
        assert!(verify_signature(&cfg, body, None).is_ok());

        cfg.signing_secret = Some("sign-me".into());
        let good = sign_payload("sign-me", body);
        assert_eq!(good.len(), 64);
        assert!(verify_signature(&cfg, body, Some(&good)).is_ok());
        assert!(verify_signature(&cfg, body, Some(&format!("sha256={good}"))).is_ok());
        assert!(verify_signature(&cfg, body, None).is_err());
        assert!(verify_signature(&cfg, body, Some("zz")).is_err());
        assert!(verify_signature(&cfg, b"tampered", Some(&good)).is_err());
    }

    #[test]
    fn parse_payload_shapes() {
        assert_eq!(parse_payload(br#"{"a":1}"#).unwrap().len(), 1);
        assert_eq!(parse_payload(br#"[{"a":1},{"b":2}]"#).unwrap().len(), 2);
        assert!(matches!(
            parse_payload(b"not json").unwrap_err(),
            CompassError::Validation(_)
        ));
        assert!(parse_payload(b"42").is_err());
    }

    #[tokio::test]
    async fn creates_then_updates_same_email() {
        let repo = setup().await;
        let first = json!({
            "email_from": "Lina@Example.com",
            "contact_name": "Lina Farouk",
            "x_studio_passport_number": "N1"
        });
        let report = ingest(&repo, &config(), vec![first]).await.unwrap();
        assert_eq!(report.created, 1);
        let student = repo
            .get_student_by_email("lina@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(student.stage, "Lead");
        assert_eq!(student.last_name, "Farouk");

        let second = json!({
            "email_from": "lina@example.com",
            "stage_id": [3, "Visa"],
            "x_studio_passport_number": "N2"
        });
        let report = ingest(&repo, &config(), vec![second]).await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(repo.count_students().await.unwrap(), 1);

        let student = repo
            .get_student_by_email("lina@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(student.stage, "Visa");
        assert_eq!(student.first_name, "Lina");
        assert_eq!(student.profile.passport_number.as_deref(), Some("N2"));
    }

    #[tokio::test]
    async fn new_record_without_last_name_is_rejected() {
        let repo = setup().await;
        let report = ingest(
            &repo,
            &config(),
            vec![
                json!({"email_from": "cher@b.io", "contact_name": "Cher"}),
                json!({"email_from": "kofi@example.com", "x_studio_last_name": "  "}),
            ],
        )
        .await
        .unwrap();
        assert_eq!(report.rejected, 2);
        assert!(report.results[0].detail.as_deref().unwrap().contains("last name"));
        assert!(repo.get_student_by_email("cher@b.io").await.unwrap().is_none());
        assert_eq!(repo.count_students().await.unwrap(), 0);

        let events = repo.list_webhook_events(10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.outcome == WebhookOutcome::Rejected));
    }

    #[tokio::test]
    async fn new_record_without_first_name_uses_email() {
        let repo = setup().await;
        ingest(
            &repo,
            &config(),
            vec![json!({"email_from": "kofi@example.com", "x_studio_last_name": "Mensah"})],
        )
        .await
        .unwrap();
        let student = repo
            .get_student_by_email("kofi@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(student.first_name, "kofi");
        assert_eq!(student.last_name, "Mensah");

        let report = ingest(
            &repo,
            &config(),
            vec![json!({"email_from": "kofi@example.com", "phone": "+233 20"})],
        )
        .await
        .unwrap();
        assert_eq!(report.updated, 1);
        let student = repo
            .get_student_by_email("kofi@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(student.last_name, "Mensah");
    }

    #[tokio::test]
    async fn batch_rejects_bad_records_individually() {
        let repo = setup().await;
        let report = ingest(
            &repo,
            &config(),
            vec![
                json!({"email_from": "ok@example.com", "contact_name": "Ola Kay"}),
                json!({"contact_name": "No Email"}),
                json!({"email_from": "not-an-email"}),
                json!("not an object"),
            ],
        )
        .await
        .unwrap();
        assert_eq!(report.processed, 4);
        assert_eq!(report.created, 1);
        assert_eq!(report.rejected, 3);
        assert_eq!(report.results[1].outcome, WebhookOutcome::Rejected);
        assert!(report.results[1].detail.as_deref().unwrap().contains("email"));

        let events = repo.list_webhook_events(10).await.unwrap();
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn vanished_advisor_keeps_record_outcome() {
        let (student, detail) = settle_advisor_link(
            "a@example.com",
            "gone@compass.example",
            Err(CompassError::NotFound("advisor gone@compass.example".into())),
        )
        .unwrap();
        assert!(student.is_none());
        assert!(detail.unwrap().contains("gone@compass.example"));

        let err = settle_advisor_link(
            "a@example.com",
            "sam@compass.example",
            Err(CompassError::Conflict("locked".into())),
        )
        .unwrap_err();
        assert!(matches!(err, CompassError::Conflict(_)));
    }

    #[tokio::test]
    async fn advisor_link_only_for_known_advisors() {
        let repo = setup().await;
        let report = ingest(
            &repo,
            &config(),
            vec![
                json!({"email_from": "a@example.com", "contact_name": "Ama Boateng", "x_studio_advisor_email": "Sam@Compass.Example"}),
                json!({"email_from": "b@example.com", "contact_name": "Ben Ito", "x_studio_advisor_email": "ghost@compass.example"}),
            ],
        )
        .await
        .unwrap();
        assert_eq!(report.created, 2);

        let a = repo.get_student_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(a.advisor_email.as_deref(), Some("sam@compass.example"));
        assert!(a.advisor_id.is_some());

        let b = repo.get_student_by_email("b@example.com").await.unwrap().unwrap();
        assert!(b.advisor_email.is_none());
        assert!(report.results[1].detail.as_deref().unwrap().contains("ghost"));
    }
}

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::error::{CompassError, Result};
use crate::models::{
    advisor::{Advisor, AdvisorWithLoad, NewAdvisor},
    audit::AuditEntry,
    common::Role,
    document::{Document, DocumentStatus, NewDocument},
    message::{Message, NewMessage},
    session::Session,
    staff::{Admin, NewStaff, SalesUser},
    student::{
        FieldValue, NewStudent, Student, StudentFilter, StudentProfile, StudentUpdate,
        UpsertOutcome, PROFILE_FIELDS,
    },
    webhook::{WebhookEvent, WebhookOutcome},
};

use super::repository::{
    AdminRepository, AdvisorRepository, AuditRepository, CredentialRepository,
    DocumentRepository, MessageRepository, PortalRepository, SalesRepository, SessionRepository,
    StudentRepository, WebhookEventRepository,
};

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PortalRepository for SqliteRepository {}

// -- Helper functions for converting between rows and models --

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
fn datetime_to_str(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn now_str() -> String {
    datetime_to_str(&Utc::now())
}

fn parse_role(s: &str) -> Role {
    Role::parse(s).unwrap_or(Role::Student)
}

fn parse_document_status(s: &str) -> DocumentStatus {
    DocumentStatus::parse(s).unwrap_or(DocumentStatus::Pending)
}

/// Turn a UNIQUE violation into a `Conflict` naming the duplicate.
fn unique_as_conflict(e: sqlx::Error, what: impl FnOnce() -> String) -> CompassError {
    let err = CompassError::from(e);
    if err.is_unique_violation() {
        CompassError::Conflict(what())
    } else {
        err
    }
}

fn row_to_student(r: &SqliteRow) -> Student {
    let mut profile = StudentProfile::default();
    for field in PROFILE_FIELDS {
        profile.set(field.name, r.get::<Option<String>, _>(field.name));
    }
    Student {
        id: r.get("id"),
        email: r.get("email"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        phone: r.get("phone"),
        stage: r.get("stage"),
        process_started: r.get::<i64, _>("process_started") != 0,
        advisor_email: r.get("advisor_email"),
        advisor_id: r.get("advisor_id"),
        profile,
        created_at: parse_datetime(r.get("created_at")),
        updated_at: parse_datetime(r.get("updated_at")),
    }
}

fn row_to_advisor(r: &SqliteRow) -> Advisor {
    Advisor {
        id: r.get("id"),
        email: r.get("email"),
        name: r.get("name"),
        phone: r.get("phone"),
        created_at: parse_datetime(r.get("created_at")),
    }
}

fn row_to_admin(r: &SqliteRow) -> Admin {
    Admin {
        id: r.get("id"),
        email: r.get("email"),
        name: r.get("name"),
        created_at: parse_datetime(r.get("created_at")),
    }
}

fn row_to_sales_user(r: &SqliteRow) -> SalesUser {
    SalesUser {
        id: r.get("id"),
        email: r.get("email"),
        name: r.get("name"),
        created_at: parse_datetime(r.get("created_at")),
    }
}

fn row_to_message(r: &SqliteRow) -> Message {
    Message {
        id: r.get("id"),
        sender_email: r.get("sender_email"),
        sender_role: parse_role(r.get("sender_role")),
        receiver_email: r.get("receiver_email"),
        receiver_role: parse_role(r.get("receiver_role")),
        content: r.get("content"),
        reply_to_id: r.get("reply_to_id"),
        is_read: r.get::<i64, _>("is_read") != 0,
        created_at: parse_datetime(r.get("created_at")),
    }
}

fn row_to_document(r: &SqliteRow) -> Document {
    Document {
        id: r.get("id"),
        student_id: r.get("student_id"),
        student_email: r.get("student_email"),
        doc_type: r.get("doc_type"),
        file_name: r.get("file_name"),
        storage_ref: r.get("storage_ref"),
        status: parse_document_status(r.get("status")),
        review_note: r.get("review_note"),
        uploaded_by_email: r.get("uploaded_by_email"),
        uploaded_by_role: parse_role(r.get("uploaded_by_role")),
        created_at: parse_datetime(r.get("created_at")),
        updated_at: parse_datetime(r.get("updated_at")),
    }
}

fn row_to_session(r: &SqliteRow) -> Session {
    Session {
        token: r.get("token"),
        role: parse_role(r.get("role")),
        email: r.get("email"),
        created_at: parse_datetime(r.get("created_at")),
        expires_at: parse_datetime(r.get("expires_at")),
        ip_address: r.get("ip_address"),
    }
}

async fn fetch_student_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<Student>> {
    let row = sqlx::query("SELECT * FROM students WHERE email = ?1")
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(row_to_student))
}

/// Write every change in `update` to the row with `email`, bumping `updated_at`.
///
/// Column names come from the static field catalog, never from input.
async fn apply_student_update(
    conn: &mut SqliteConnection,
    email: &str,
    update: &StudentUpdate,
) -> Result<u64> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE students SET ");
    {
        let mut assignments = qb.separated(", ");
        for (spec, value) in update.changes() {
            assignments.push(format!("{} = ", spec.name));
            match value {
                FieldValue::Text(text) => assignments.push_bind_unseparated(text.clone()),
                FieldValue::Flag(flag) => assignments.push_bind_unseparated(*flag as i64),
            };
        }
        assignments.push("updated_at = ");
        assignments.push_bind_unseparated(now_str());
    }
    qb.push(" WHERE email = ");
    qb.push_bind(email.to_string());
    let result = qb.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

// -- StudentRepository --

#[async_trait]
impl StudentRepository for SqliteRepository {
    async fn create_student(&self, student: &NewStudent) -> Result<Student> {
        let now = now_str();
        let mut tx = self.pool.begin().await?;

        let advisor_id = match student.advisor_email.as_deref() {
            Some(email) => Some(
                sqlx::query("SELECT id FROM advisors WHERE email = ?1")
                    .bind(email)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| CompassError::NotFound(format!("advisor {email}")))?
                    .get::<i64, _>("id"),
            ),
            None => None,
        };

        sqlx::query(
            "INSERT INTO students (email, password_hash, first_name, last_name, phone, stage, advisor_id, advisor_email, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        )
        .bind(&student.email)
        .bind(&student.password_hash)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.phone)
        .bind(&student.stage)
        .bind(advisor_id)
        .bind(&student.advisor_email)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_as_conflict(e, || format!("student {} already exists", student.email)))?;

        let saved = fetch_student_by_email(&mut tx, &student.email)
            .await?
            .ok_or_else(|| CompassError::NotFound(format!("student {}", student.email)))?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn get_student(&self, id: i64) -> Result<Option<Student>> {
        let row = sqlx::query("SELECT * FROM students WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_student))
    }

    async fn get_student_by_email(&self, email: &str) -> Result<Option<Student>> {
        let mut conn = self.pool.acquire().await?;
        fetch_student_by_email(&mut conn, email).await
    }

    async fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM students WHERE 1 = 1");
        if let Some(ref stage) = filter.stage {
            qb.push(" AND stage = ");
            qb.push_bind(stage.clone());
        }
        if let Some(ref advisor_email) = filter.advisor_email {
            qb.push(" AND advisor_email = ");
            qb.push_bind(advisor_email.clone());
        }
        if let Some(started) = filter.process_started {
            qb.push(" AND process_started = ");
            qb.push_bind(started as i64);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search.to_lowercase());
            qb.push(" AND (lower(email) LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR lower(first_name) LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR lower(last_name) LIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
        qb.push(" ORDER BY updated_at DESC, id DESC LIMIT ");
        qb.push_bind(filter.limit.unwrap_or(-1));
        qb.push(" OFFSET ");
        qb.push_bind(filter.offset.unwrap_or(0).max(0));

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_student).collect())
    }

    async fn update_student(
        &self,
        email: &str,
        update: &StudentUpdate,
    ) -> Result<Option<Student>> {
        let mut conn = self.pool.acquire().await?;
        if update.is_empty() {
            return fetch_student_by_email(&mut conn, email).await;
        }
        if apply_student_update(&mut conn, email, update).await? == 0 {
            return Ok(None);
        }
        fetch_student_by_email(&mut conn, email).await
    }

    async fn upsert_student(
        &self,
        student: &NewStudent,
        update: &StudentUpdate,
    ) -> Result<(Student, UpsertOutcome)> {
        let mut tx = self.pool.begin().await?;
        let now = now_str();
        let inserted = sqlx::query(
            "INSERT INTO students (email, password_hash, first_name, last_name, phone, stage, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(email) DO NOTHING",
        )
        .bind(&student.email)
        .bind(&student.password_hash)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.phone)
        .bind(&student.stage)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let outcome = if inserted.rows_affected() > 0 {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        };

        if !update.is_empty() {
            apply_student_update(&mut tx, &student.email, update).await?;
        }

        let saved = fetch_student_by_email(&mut tx, &student.email)
            .await?
            .ok_or_else(|| CompassError::NotFound(format!("student {}", student.email)))?;
        tx.commit().await?;
        Ok((saved, outcome))
    }

    async fn delete_student(&self, email: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM students WHERE email = ?1")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn assign_advisor(
        &self,
        student_email: &str,
        advisor_email: Option<&str>,
    ) -> Result<Option<Student>> {
        let mut tx = self.pool.begin().await?;

        let (advisor_id, advisor_email) = match advisor_email {
            Some(email) => {
                let row = sqlx::query("SELECT id, email FROM advisors WHERE email = ?1")
                    .bind(email)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| CompassError::NotFound(format!("advisor {email}")))?;
                (
                    Some(row.get::<i64, _>("id")),
                    Some(row.get::<String, _>("email")),
                )
            }
            None => (None, None),
        };

        let result = sqlx::query(
            "UPDATE students SET advisor_id = ?1, advisor_email = ?2, updated_at = ?3 WHERE email = ?4",
        )
        .bind(advisor_id)
        .bind(&advisor_email)
        .bind(now_str())
        .bind(student_email)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let saved = fetch_student_by_email(&mut tx, student_email).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn count_students(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM students")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }
}

// -- AdvisorRepository --

#[async_trait]
impl AdvisorRepository for SqliteRepository {
    async fn create_advisor(&self, advisor: &NewAdvisor) -> Result<Advisor> {
        let result = sqlx::query(
            "INSERT INTO advisors (email, name, phone, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&advisor.email)
        .bind(&advisor.name)
        .bind(&advisor.phone)
        .bind(&advisor.password_hash)
        .bind(now_str())
        .execute(&self.pool)
        .await
        .map_err(|e| unique_as_conflict(e, || format!("advisor {} already exists", advisor.email)))?;

        self.get_advisor(result.last_insert_rowid())
            .await?
            .ok_or_else(|| CompassError::NotFound(format!("advisor {}", advisor.email)))
    }

    async fn get_advisor(&self, id: i64) -> Result<Option<Advisor>> {
        let row = sqlx::query("SELECT * FROM advisors WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_advisor))
    }

    async fn get_advisor_by_email(&self, email: &str) -> Result<Option<Advisor>> {
        let row = sqlx::query("SELECT * FROM advisors WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_advisor))
    }

    async fn list_advisors(&self) -> Result<Vec<AdvisorWithLoad>> {
        let rows = sqlx::query(
            "SELECT a.*, (SELECT COUNT(*) FROM students s WHERE s.advisor_email = a.email) AS student_count
             FROM advisors a ORDER BY a.name, a.id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| AdvisorWithLoad {
                advisor: row_to_advisor(r),
                student_count: r.get("student_count"),
            })
            .collect())
    }

    async fn delete_advisor(&self, email: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE students SET advisor_id = NULL, advisor_email = NULL, updated_at = ?1
             WHERE advisor_email = ?2 OR advisor_id = (SELECT id FROM advisors WHERE email = ?2)",
        )
        .bind(now_str())
        .bind(email)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM sessions WHERE role = 'advisor' AND email = ?1")
            .bind(email)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM advisors WHERE email = ?1")
            .bind(email)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

// -- AdminRepository --

#[async_trait]
impl AdminRepository for SqliteRepository {
    async fn upsert_admin(&self, admin: &NewStaff) -> Result<Admin> {
        sqlx::query(
            "INSERT INTO admins (email, name, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(email) DO UPDATE SET
                name = excluded.name,
                password_hash = COALESCE(excluded.password_hash, admins.password_hash)",
        )
        .bind(&admin.email)
        .bind(&admin.name)
        .bind(&admin.password_hash)
        .bind(now_str())
        .execute(&self.pool)
        .await?;

        self.get_admin_by_email(&admin.email)
            .await?
            .ok_or_else(|| CompassError::NotFound(format!("admin {}", admin.email)))
    }

    async fn get_admin_by_email(&self, email: &str) -> Result<Option<Admin>> {
        let row = sqlx::query("SELECT * FROM admins WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_admin))
    }

    async fn list_admins(&self) -> Result<Vec<Admin>> {
        let rows = sqlx::query("SELECT * FROM admins ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_admin).collect())
    }
}

// -- SalesRepository --

#[async_trait]
impl SalesRepository for SqliteRepository {
    async fn create_sales_user(&self, user: &NewStaff) -> Result<SalesUser> {
        sqlx::query(
            "INSERT INTO sales_users (email, name, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(now_str())
        .execute(&self.pool)
        .await
        .map_err(|e| unique_as_conflict(e, || format!("sales user {} already exists", user.email)))?;

        self.get_sales_user_by_email(&user.email)
            .await?
            .ok_or_else(|| CompassError::NotFound(format!("sales user {}", user.email)))
    }

    async fn get_sales_user_by_email(&self, email: &str) -> Result<Option<SalesUser>> {
        let row = sqlx::query("SELECT * FROM sales_users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_sales_user))
    }

    async fn list_sales_users(&self) -> Result<Vec<SalesUser>> {
        let rows = sqlx::query("SELECT * FROM sales_users ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_sales_user).collect())
    }

    async fn delete_sales_user(&self, email: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM sessions WHERE role = 'sales' AND email = ?1")
            .bind(email)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM sales_users WHERE email = ?1")
            .bind(email)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

// -- CredentialRepository --

#[async_trait]
impl CredentialRepository for SqliteRepository {
    async fn get_password_hash(&self, role: Role, email: &str) -> Result<Option<String>> {
        let sql = format!("SELECT password_hash FROM {} WHERE email = ?1", role.table());
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|r| r.get::<Option<String>, _>("password_hash")))
    }

    async fn set_password_hash(&self, role: Role, email: &str, hash: &str) -> Result<bool> {
        let sql = format!("UPDATE {} SET password_hash = ?1 WHERE email = ?2", role.table());
        let result = sqlx::query(&sql)
            .bind(hash)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// -- MessageRepository --

#[async_trait]
impl MessageRepository for SqliteRepository {
    async fn create_message(&self, message: &NewMessage) -> Result<Message> {
        let result = sqlx::query(
            "INSERT INTO messages (sender_email, sender_role, receiver_email, receiver_role, content, reply_to_id, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
        )
        .bind(&message.sender_email)
        .bind(message.sender_role.as_str())
        .bind(&message.receiver_email)
        .bind(message.receiver_role.as_str())
        .bind(&message.content)
        .bind(message.reply_to_id)
        .bind(now_str())
        .execute(&self.pool)
        .await?;

        self.get_message(result.last_insert_rowid())
            .await?
            .ok_or_else(|| CompassError::NotFound("message".into()))
    }

    async fn get_message(&self, id: i64) -> Result<Option<Message>> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_message))
    }

    async fn list_messages_for(&self, email: &str) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE sender_email = ?1 OR receiver_email = ?1 ORDER BY id DESC",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn list_conversation(&self, a: &str, b: &str) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT * FROM messages
             WHERE (sender_email = ?1 AND receiver_email = ?2)
                OR (sender_email = ?2 AND receiver_email = ?1)
             ORDER BY id ASC",
        )
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn mark_message_read(&self, id: i64, receiver_email: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE messages SET is_read = 1 WHERE id = ?1 AND receiver_email = ?2")
                .bind(id)
                .bind(receiver_email)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_conversation_read(
        &self,
        receiver_email: &str,
        sender_email: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = 1 WHERE receiver_email = ?1 AND sender_email = ?2 AND is_read = 0",
        )
        .bind(receiver_email)
        .bind(sender_email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count_unread(&self, receiver_email: &str) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM messages WHERE receiver_email = ?1 AND is_read = 0",
        )
        .bind(receiver_email)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("count"))
    }
}

// -- DocumentRepository --

#[async_trait]
impl DocumentRepository for SqliteRepository {
    async fn create_document(&self, document: &NewDocument) -> Result<Document> {
        let now = now_str();
        let result = sqlx::query(
            "INSERT INTO documents (student_id, student_email, doc_type, file_name, storage_ref, status, uploaded_by_email, uploaded_by_role, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7, ?8, ?8)",
        )
        .bind(document.student_id)
        .bind(&document.student_email)
        .bind(&document.doc_type)
        .bind(&document.file_name)
        .bind(&document.storage_ref)
        .bind(&document.uploaded_by_email)
        .bind(document.uploaded_by_role.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get_document(result.last_insert_rowid())
            .await?
            .ok_or_else(|| CompassError::NotFound("document".into()))
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_document))
    }

    async fn list_documents_for_student(&self, student_id: i64) -> Result<Vec<Document>> {
        let rows = sqlx::query("SELECT * FROM documents WHERE student_id = ?1 ORDER BY id")
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn update_document_status(
        &self,
        id: i64,
        status: DocumentStatus,
        review_note: Option<&str>,
    ) -> Result<Option<Document>> {
        let result = sqlx::query(
            "UPDATE documents SET status = ?1, review_note = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(status.as_str())
        .bind(review_note)
        .bind(now_str())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_document(id).await
    }

    async fn delete_document(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// -- SessionRepository --

#[async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (token, role, email, created_at, expires_at, ip_address) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&session.token)
        .bind(session.role.as_str())
        .bind(&session.email)
        .bind(datetime_to_str(&session.created_at))
        .bind(datetime_to_str(&session.expires_at))
        .bind(&session.ip_address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE token = ?1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_session))
    }

    async fn delete_session(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_sessions(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(now_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_sessions_for(&self, role: Role, email: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE role = ?1 AND email = ?2")
            .bind(role.as_str())
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// -- AuditRepository --

#[async_trait]
impl AuditRepository for SqliteRepository {
    async fn log_action(
        &self,
        actor_role: Role,
        actor_email: &str,
        action: &str,
        details: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO audit_log (actor_role, actor_email, action, details, ip_address, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(actor_role.as_str())
        .bind(actor_email)
        .bind(action)
        .bind(details)
        .bind(ip_address)
        .bind(now_str())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn list_audit_log(&self, limit: i64) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query("SELECT * FROM audit_log ORDER BY id DESC LIMIT ?1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| AuditEntry {
                id: r.get("id"),
                actor_role: parse_role(r.get("actor_role")),
                actor_email: r.get("actor_email"),
                action: r.get("action"),
                details: r.get("details"),
                ip_address: r.get("ip_address"),
                created_at: parse_datetime(r.get("created_at")),
            })
            .collect())
    }
}

// -- WebhookEventRepository --

#[async_trait]
impl WebhookEventRepository for SqliteRepository {
    async fn record_webhook_event(
        &self,
        source: &str,
        email: Option<&str>,
        outcome: WebhookOutcome,
        detail: Option<&str>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO webhook_events (source, email, outcome, detail, received_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(source)
        .bind(email)
        .bind(outcome.as_str())
        .bind(detail)
        .bind(now_str())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn list_webhook_events(&self, limit: i64) -> Result<Vec<WebhookEvent>> {
        let rows = sqlx::query("SELECT * FROM webhook_events ORDER BY id DESC LIMIT ?1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| WebhookEvent {
                id: r.get("id"),
                source: r.get("source"),
                email: r.get("email"),
                outcome: WebhookOutcome::parse(r.get("outcome")),
                detail: r.get("detail"),
                received_at: parse_datetime(r.get("received_at")),
            })
            .collect())
    }
}

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    advisor::{Advisor, AdvisorWithLoad, NewAdvisor},
    audit::AuditEntry,
    common::Role,
    document::{Document, DocumentStatus, NewDocument},
    message::{Message, NewMessage},
    session::Session,
    staff::{Admin, NewStaff, SalesUser},
    student::{NewStudent, Student, StudentFilter, StudentUpdate, UpsertOutcome},
    webhook::{WebhookEvent, WebhookOutcome},
};

#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn create_student(&self, student: &NewStudent) -> Result<Student>;
    async fn get_student(&self, id: i64) -> Result<Option<Student>>;
    async fn get_student_by_email(&self, email: &str) -> Result<Option<Student>>;
    async fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>>;
    /// Apply `update` to the student with `email`. Returns `None` if no such student.
    async fn update_student(&self, email: &str, update: &StudentUpdate)
        -> Result<Option<Student>>;
    /// Insert `student` if its email is unknown, then apply `update` either way.
    async fn upsert_student(
        &self,
        student: &NewStudent,
        update: &StudentUpdate,
    ) -> Result<(Student, UpsertOutcome)>;
    async fn delete_student(&self, email: &str) -> Result<bool>;
    /// Link a student to an advisor, or unlink with `None`.
    ///
    /// Returns `NotFound` if the advisor does not exist and `None` if the
    /// student does not exist.
    async fn assign_advisor(
        &self,
        student_email: &str,
        advisor_email: Option<&str>,
    ) -> Result<Option<Student>>;
    async fn count_students(&self) -> Result<i64>;
}

#[async_trait]
pub trait AdvisorRepository: Send + Sync {
    async fn create_advisor(&self, advisor: &NewAdvisor) -> Result<Advisor>;
    async fn get_advisor(&self, id: i64) -> Result<Option<Advisor>>;
    async fn get_advisor_by_email(&self, email: &str) -> Result<Option<Advisor>>;
    async fn list_advisors(&self) -> Result<Vec<AdvisorWithLoad>>;
    /// Delete an advisor and clear the link on every student they owned.
    async fn delete_advisor(&self, email: &str) -> Result<bool>;
}

#[async_trait]
pub trait AdminRepository: Send + Sync {
    async fn upsert_admin(&self, admin: &NewStaff) -> Result<Admin>;
    async fn get_admin_by_email(&self, email: &str) -> Result<Option<Admin>>;
    async fn list_admins(&self) -> Result<Vec<Admin>>;
}

#[async_trait]
pub trait SalesRepository: Send + Sync {
    async fn create_sales_user(&self, user: &NewStaff) -> Result<SalesUser>;
    async fn get_sales_user_by_email(&self, email: &str) -> Result<Option<SalesUser>>;
    async fn list_sales_users(&self) -> Result<Vec<SalesUser>>;
    async fn delete_sales_user(&self, email: &str) -> Result<bool>;
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn get_password_hash(&self, role: Role, email: &str) -> Result<Option<String>>;
    async fn set_password_hash(&self, role: Role, email: &str, hash: &str) -> Result<bool>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create_message(&self, message: &NewMessage) -> Result<Message>;
    async fn get_message(&self, id: i64) -> Result<Option<Message>>;
    /// All messages sent or received by `email`, newest first.
    async fn list_messages_for(&self, email: &str) -> Result<Vec<Message>>;
    /// Messages between two participants, oldest first.
    async fn list_conversation(&self, a: &str, b: &str) -> Result<Vec<Message>>;
    /// Mark a message read if `receiver_email` is its receiver.
    async fn mark_message_read(&self, id: i64, receiver_email: &str) -> Result<bool>;
    /// Mark every message from `sender_email` to `receiver_email` read.
    async fn mark_conversation_read(&self, receiver_email: &str, sender_email: &str)
        -> Result<u64>;
    async fn count_unread(&self, receiver_email: &str) -> Result<i64>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create_document(&self, document: &NewDocument) -> Result<Document>;
    async fn get_document(&self, id: i64) -> Result<Option<Document>>;
    async fn list_documents_for_student(&self, student_id: i64) -> Result<Vec<Document>>;
    async fn update_document_status(
        &self,
        id: i64,
        status: DocumentStatus,
        review_note: Option<&str>,
    ) -> Result<Option<Document>>;
    async fn delete_document(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<()>;
    async fn get_session(&self, token: &str) -> Result<Option<Session>>;
    async fn delete_session(&self, token: &str) -> Result<bool>;
    async fn delete_expired_sessions(&self) -> Result<u64>;
    async fn delete_sessions_for(&self, role: Role, email: &str) -> Result<u64>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn log_action(
        &self,
        actor_role: Role,
        actor_email: &str,
        action: &str,
        details: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<i64>;
    async fn list_audit_log(&self, limit: i64) -> Result<Vec<AuditEntry>>;
}

#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn record_webhook_event(
        &self,
        source: &str,
        email: Option<&str>,
        outcome: WebhookOutcome,
        detail: Option<&str>,
    ) -> Result<i64>;
    async fn list_webhook_events(&self, limit: i64) -> Result<Vec<WebhookEvent>>;
}

/// Combined repository trait for all entity types.
pub trait PortalRepository:
    StudentRepository
    + AdvisorRepository
    + AdminRepository
    + SalesRepository
    + CredentialRepository
    + MessageRepository
    + DocumentRepository
    + SessionRepository
    + AuditRepository
    + WebhookEventRepository
{
}

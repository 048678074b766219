//! Student document metadata and review.

use serde::Deserialize;
use tracing::info;

use crate::access::{self, Caller};
use crate::audit;
use crate::db::repository::PortalRepository;
use crate::error::{CompassError, Result};
use crate::models::common::{normalize_email, require_text, Role};
use crate::models::document::{Document, DocumentStatus, NewDocument};
use crate::models::student::Student;

#[derive(Debug, Clone, Deserialize)]
pub struct AddDocument {
    pub doc_type: String,
    pub file_name: String,
    pub storage_ref: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewDocument {
    pub status: DocumentStatus,
    #[serde(default)]
    pub note: Option<String>,
}

async fn visible_student<R>(repo: &R, caller: &Caller, email: &str) -> Result<Student>
where
    R: PortalRepository + ?Sized,
{
    let email = normalize_email(email);
    let student = repo
        .get_student_by_email(&email)
        .await?
        .ok_or_else(|| CompassError::NotFound(format!("student {email}")))?;
    access::require_read(caller, &student)?;
    Ok(student)
}

/// Register a document for a student.
pub async fn add_document<R>(
    repo: &R,
    caller: &Caller,
    student_email: &str,
    input: AddDocument,
) -> Result<Document>
where
    R: PortalRepository + ?Sized,
{
    access::require_role(caller, &[Role::Student, Role::Advisor, Role::Admin])?;
    let student = visible_student(repo, caller, student_email).await?;

    let document = repo
        .create_document(&NewDocument {
            student_id: student.id,
            student_email: student.email.clone(),
            doc_type: require_text("doc_type", &input.doc_type)?,
            file_name: require_text("file_name", &input.file_name)?,
            storage_ref: require_text("storage_ref", &input.storage_ref)?,
            uploaded_by_email: caller.email.clone(),
            uploaded_by_role: caller.role,
        })
        .await?;
    info!(id = document.id, student = %student.email, doc_type = %document.doc_type, "document added");
    Ok(document)
}

pub async fn list_documents<R>(repo: &R, caller: &Caller, student_email: &str) -> Result<Vec<Document>>
where
    R: PortalRepository + ?Sized,
{
    let student = visible_student(repo, caller, student_email).await?;
    repo.list_documents_for_student(student.id).await
}

/// Load a document, hiding it when its student is outside the caller's scope.
async fn visible_document<R>(repo: &R, caller: &Caller, id: i64) -> Result<Document>
where
    R: PortalRepository + ?Sized,
{
    let not_found = || CompassError::NotFound(format!("document {id}"));
    let document = repo.get_document(id).await?.ok_or_else(not_found)?;
    let student = repo
        .get_student(document.student_id)
        .await?
        .ok_or_else(not_found)?;
    if !access::can_read(caller, &student) {
        return Err(not_found());
    }
    Ok(document)
}

/// Approve or reject a document. Advisors review their own students' files.
pub async fn review_document<R>(
    repo: &R,
    caller: &Caller,
    id: i64,
    review: ReviewDocument,
) -> Result<Document>
where
    R: PortalRepository + ?Sized,
{
    access::require_role(caller, &[Role::Advisor, Role::Admin])?;
    if review.status == DocumentStatus::Pending {
        return Err(CompassError::Validation(
            "review status must be approved or rejected".into(),
        ));
    }
    visible_document(repo, caller, id).await?;

    let note = review
        .note
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let document = repo
        .update_document_status(id, review.status, note)
        .await?
        .ok_or_else(|| CompassError::NotFound(format!("document {id}")))?;

    info!(id, status = document.status.as_str(), reviewer = %caller.email, "document reviewed");
    if caller.is(Role::Admin) {
        let details = format!("document={id} status={}", document.status.as_str());
        audit::record(repo, caller, "review_document", Some(&details)).await;
    }
    Ok(document)
}

/// Delete a document. Admins may delete any; uploaders only while pending.
pub async fn remove_document<R>(repo: &R, caller: &Caller, id: i64) -> Result<()>
where
    R: PortalRepository + ?Sized,
{
    let document = visible_document(repo, caller, id).await?;
    let own_pending =
        document.uploaded_by_email == caller.email && document.status == DocumentStatus::Pending;
    if !caller.is(Role::Admin) && !own_pending {
        return Err(CompassError::Forbidden(
            "only pending documents can be removed by their uploader".into(),
        ));
    }

    repo.delete_document(id).await?;
    info!(id, actor = %caller.email, "document removed");
    if caller.is(Role::Admin) {
        audit::record(repo, caller, "remove_document", Some(&format!("document={id}"))).await;
    }
    Ok(())
}

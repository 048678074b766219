//! Role-scoped student operations.
//!
//! Each function takes the authenticated [`Caller`] and applies the rules in
//! [`crate::access`] before touching the repository.

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::access::{self, Caller};
use crate::audit;
use crate::auth;
use crate::db::repository::PortalRepository;
use crate::error::{CompassError, Result};
use crate::models::advisor::Advisor;
use crate::models::common::{normalize_email, require_text, validate_email, Role};
use crate::models::student::{NewStudent, Student, StudentFilter, StudentUpdate, DEFAULT_STAGE};

/// Staff-created student record.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStudent {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub advisor_email: Option<String>,
    /// Optional initial password so the student can sign in.
    #[serde(default)]
    pub password: Option<String>,
}

/// Student self sign-up.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

async fn load<R>(repo: &R, email: &str) -> Result<Student>
where
    R: PortalRepository + ?Sized,
{
    let email = normalize_email(email);
    repo.get_student_by_email(&email)
        .await?
        .ok_or_else(|| CompassError::NotFound(format!("student {email}")))
}

/// Fetch one student within the caller's read scope.
pub async fn fetch_student<R>(repo: &R, caller: &Caller, email: &str) -> Result<Student>
where
    R: PortalRepository + ?Sized,
{
    let student = load(repo, email).await?;
    access::require_read(caller, &student)?;
    Ok(student)
}

/// List students visible to the caller. Advisors only ever see their own.
pub async fn list_students<R>(
    repo: &R,
    caller: &Caller,
    mut filter: StudentFilter,
) -> Result<Vec<Student>>
where
    R: PortalRepository + ?Sized,
{
    match caller.role {
        Role::Student => {
            return Err(CompassError::Forbidden(
                "students may not list other students".into(),
            ))
        }
        Role::Advisor => filter.advisor_email = Some(caller.email.clone()),
        Role::Admin | Role::Sales => {
            filter.advisor_email = filter.advisor_email.as_deref().map(normalize_email);
        }
    }
    repo.list_students(&filter).await
}

/// Apply a JSON object of field changes to a student.
pub async fn update_student<R>(
    repo: &R,
    caller: &Caller,
    email: &str,
    changes: &Value,
) -> Result<Student>
where
    R: PortalRepository + ?Sized,
{
    let update = StudentUpdate::from_json(changes)?;
    if update.is_empty() {
        return Err(CompassError::Validation("no fields to update".into()));
    }

    let student = load(repo, email).await?;
    access::check_write(caller, &student, &update)?;

    let saved = repo
        .update_student(&student.email, &update)
        .await?
        .ok_or_else(|| CompassError::NotFound(format!("student {}", student.email)))?;

    info!(
        student = %saved.email,
        role = %caller.role,
        actor = %caller.email,
        fields = update.len(),
        "student updated"
    );
    if caller.is(Role::Admin) {
        let details = format!("{}: {}", saved.email, update.field_names().join(","));
        audit::record(repo, caller, "update_student", Some(&details)).await;
    }
    Ok(saved)
}

/// Create a student on behalf of admin or sales.
pub async fn create_student<R>(repo: &R, caller: &Caller, input: CreateStudent) -> Result<Student>
where
    R: PortalRepository + ?Sized,
{
    if !access::can_create_students(caller.role) {
        return Err(CompassError::Forbidden(format!(
            "{} may not create students",
            caller.role
        )));
    }
    if input.advisor_email.is_some() {
        access::require_admin(caller)?;
    }

    let mut new = NewStudent::new(
        &validate_email(&input.email)?,
        &require_text("first_name", &input.first_name)?,
        &require_text("last_name", &input.last_name)?,
    );
    new.phone = input
        .phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    if let Some(stage) = input.stage {
        new.stage = require_text("stage", &stage)?;
    }
    if let Some(password) = input.password {
        auth::validate_new_password(&password)?;
        new.password_hash = Some(auth::hash_password(&password)?);
    }

    new.advisor_email = input.advisor_email.as_deref().map(normalize_email);

    let student = repo.create_student(&new).await?;

    info!(student = %student.email, actor = %caller.email, "student created");
    audit::record(repo, caller, "create_student", Some(&student.email)).await;
    Ok(student)
}

/// Student self sign-up.
///
/// A record created earlier by staff or the CRM without a password is
/// claimed: the password is set and the record returned. An account that
/// already has a password is a conflict.
pub async fn register_student<R>(repo: &R, input: Registration) -> Result<Student>
where
    R: PortalRepository + ?Sized,
{
    let email = validate_email(&input.email)?;
    let first_name = require_text("first_name", &input.first_name)?;
    let last_name = require_text("last_name", &input.last_name)?;
    auth::validate_new_password(&input.password)?;
    let hash = auth::hash_password(&input.password)?;

    if repo.get_student_by_email(&email).await?.is_some() {
        if repo.get_password_hash(Role::Student, &email).await?.is_some() {
            return Err(CompassError::Conflict(format!(
                "student {email} already registered"
            )));
        }
        repo.set_password_hash(Role::Student, &email, &hash).await?;
        info!(student = %email, "existing student record claimed");
        return load(repo, &email).await;
    }

    let mut new = NewStudent::new(&email, &first_name, &last_name);
    new.phone = input
        .phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    new.stage = DEFAULT_STAGE.to_string();
    new.password_hash = Some(hash);

    let student = repo.create_student(&new).await?;
    info!(student = %student.email, "student registered");
    Ok(student)
}

/// Delete a student and everything that cascades from it. Admin only.
pub async fn delete_student<R>(repo: &R, caller: &Caller, email: &str) -> Result<()>
where
    R: PortalRepository + ?Sized,
{
    access::require_admin(caller)?;
    let email = normalize_email(email);
    if !repo.delete_student(&email).await? {
        return Err(CompassError::NotFound(format!("student {email}")));
    }
    repo.delete_sessions_for(Role::Student, &email).await?;
    info!(student = %email, actor = %caller.email, "student deleted");
    audit::record(repo, caller, "delete_student", Some(&email)).await;
    Ok(())
}

/// Link a student to an existing advisor. Admin only.
pub async fn assign_advisor<R>(
    repo: &R,
    caller: &Caller,
    student_email: &str,
    advisor_email: &str,
) -> Result<Student>
where
    R: PortalRepository + ?Sized,
{
    access::require_admin(caller)?;
    let student_email = normalize_email(student_email);
    let advisor_email = validate_email(advisor_email)?;
    let student = repo
        .assign_advisor(&student_email, Some(&advisor_email))
        .await?
        .ok_or_else(|| CompassError::NotFound(format!("student {student_email}")))?;
    info!(student = %student_email, advisor = %advisor_email, "advisor assigned");
    let details = format!("student={student_email} advisor={advisor_email}");
    audit::record(repo, caller, "assign_advisor", Some(&details)).await;
    Ok(student)
}

/// Remove a student's advisor link. Admin only.
pub async fn unassign_advisor<R>(repo: &R, caller: &Caller, student_email: &str) -> Result<Student>
where
    R: PortalRepository + ?Sized,
{
    access::require_admin(caller)?;
    let student_email = normalize_email(student_email);
    let student = repo
        .assign_advisor(&student_email, None)
        .await?
        .ok_or_else(|| CompassError::NotFound(format!("student {student_email}")))?;
    info!(student = %student_email, "advisor unassigned");
    audit::record(repo, caller, "unassign_advisor", Some(&student_email)).await;
    Ok(student)
}

/// The advisor assigned to the calling student, if any.
pub async fn advisor_for_student<R>(repo: &R, caller: &Caller) -> Result<Option<Advisor>>
where
    R: PortalRepository + ?Sized,
{
    access::require_role(caller, &[Role::Student])?;
    let student = load(repo, &caller.email).await?;
    match student.advisor_email {
        Some(ref email) => repo.get_advisor_by_email(email).await,
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{
        AdvisorRepository, AuditRepository, CredentialRepository, StudentRepository,
    };
    use crate::db::{sqlite::SqliteRepository, DatabasePool};
    use crate::models::advisor::NewAdvisor;
    use serde_json::json;

    async fn setup() -> SqliteRepository {
        let repo =
            SqliteRepository::new(DatabasePool::new_sqlite_memory().await.unwrap().into_sqlite());
        for email in ["sam@compass.example", "kim@compass.example"] {
            repo.create_advisor(&NewAdvisor {
                email: email.into(),
                name: email.split('@').next().unwrap().into(),
                phone: None,
                password_hash: None,
            })
            .await
            .unwrap();
        }
        repo
    }

    fn admin() -> Caller {
        Caller::new(Role::Admin, "root@compass.example")
    }

    fn create_input(email: &str) -> CreateStudent {
        CreateStudent {
            email: email.into(),
            first_name: "Lina".into(),
            last_name: "Farouk".into(),
            phone: None,
            stage: None,
            advisor_email: None,
            password: None,
        }
    }

    async fn seed(repo: &SqliteRepository, email: &str, advisor: Option<&str>) -> Student {
        let mut input = create_input(email);
        input.advisor_email = advisor.map(String::from);
        create_student(repo, &admin(), input).await.unwrap()
    }

    #[tokio::test]
    async fn student_reads_own_record_only() {
        let repo = setup().await;
        seed(&repo, "lina@example.com", None).await;
        seed(&repo, "omar@example.com", None).await;
        let me = Caller::new(Role::Student, "lina@example.com");

        assert_eq!(
            fetch_student(&repo, &me, "lina@example.com").await.unwrap().email,
            "lina@example.com"
        );
        let err = fetch_student(&repo, &me, "omar@example.com").await.unwrap_err();
        assert!(matches!(err, CompassError::NotFound(_)));
    }

    #[tokio::test]
    async fn advisor_lists_only_own_students() {
        let repo = setup().await;
        seed(&repo, "a@example.com", Some("sam@compass.example")).await;
        seed(&repo, "b@example.com", Some("kim@compass.example")).await;
        seed(&repo, "c@example.com", None).await;

        let sam = Caller::new(Role::Advisor, "sam@compass.example");
        let filter = StudentFilter {
            advisor_email: Some("kim@compass.example".into()),
            ..Default::default()
        };
        let listed = list_students(&repo, &sam, filter).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].email, "a@example.com");

        let all = list_students(&repo, &admin(), StudentFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let me = Caller::new(Role::Student, "a@example.com");
        assert!(list_students(&repo, &me, StudentFilter::default()).await.is_err());
    }

    #[tokio::test]
    async fn student_updates_profile_but_not_stage() {
        let repo = setup().await;
        seed(&repo, "lina@example.com", None).await;
        let me = Caller::new(Role::Student, "lina@example.com");

        let saved = update_student(
            &repo,
            &me,
            "lina@example.com",
            &json!({"passport_number": "N1234567", "city": "Amman"}),
        )
        .await
        .unwrap();
        assert_eq!(saved.profile.passport_number.as_deref(), Some("N1234567"));

        let err = update_student(&repo, &me, "lina@example.com", &json!({"stage": "Visa"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CompassError::Forbidden(_)));
    }

    #[tokio::test]
    async fn student_cannot_update_someone_else() {
        let repo = setup().await;
        seed(&repo, "lina@example.com", None).await;
        seed(&repo, "omar@example.com", None).await;
        let me = Caller::new(Role::Student, "lina@example.com");
        let err = update_student(&repo, &me, "omar@example.com", &json!({"city": "Doha"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CompassError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_rejects_unknown_and_empty() {
        let repo = setup().await;
        seed(&repo, "lina@example.com", None).await;
        let err = update_student(&repo, &admin(), "lina@example.com", &json!({"salary": "1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CompassError::Validation(_)));
        let err = update_student(&repo, &admin(), "lina@example.com", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CompassError::Validation(_)));
    }

    #[tokio::test]
    async fn admin_update_is_audited() {
        let repo = setup().await;
        seed(&repo, "lina@example.com", None).await;
        update_student(&repo, &admin(), "lina@example.com", &json!({"stage": "Offer"}))
            .await
            .unwrap();
        let entries = repo.list_audit_log(1).await.unwrap();
        assert_eq!(entries[0].action, "update_student");
        assert_eq!(entries[0].details.as_deref(), Some("lina@example.com: stage"));
    }

    #[tokio::test]
    async fn sales_creates_but_cannot_assign_advisor() {
        let repo = setup().await;
        let sales = Caller::new(Role::Sales, "lee@compass.example");
        let created = create_student(&repo, &sales, create_input("new@example.com"))
            .await
            .unwrap();
        assert_eq!(created.stage, DEFAULT_STAGE);

        let mut input = create_input("other@example.com");
        input.advisor_email = Some("sam@compass.example".into());
        let err = create_student(&repo, &sales, input).await.unwrap_err();
        assert!(matches!(err, CompassError::Forbidden(_)));

        let advisor = Caller::new(Role::Advisor, "sam@compass.example");
        assert!(create_student(&repo, &advisor, create_input("x@example.com"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn create_validates_email_and_advisor() {
        let repo = setup().await;
        let err = create_student(&repo, &admin(), create_input("not-an-email"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompassError::Validation(_)));

        let mut input = create_input("a@example.com");
        input.advisor_email = Some("ghost@compass.example".into());
        let err = create_student(&repo, &admin(), input).await.unwrap_err();
        assert!(matches!(err, CompassError::NotFound(_)));
        assert_eq!(repo.count_students().await.unwrap(), 0);

        let created = seed(&repo, "B@Example.com", Some("sam@compass.example")).await;
        assert_eq!(created.email, "b@example.com");
        assert_eq!(created.advisor_email.as_deref(), Some("sam@compass.example"));
    }

    #[tokio::test]
    async fn register_then_conflict() {
        let repo = setup().await;
        let reg = Registration {
            email: "new@example.com".into(),
            password: "a long password".into(),
            first_name: "Nour".into(),
            last_name: "Saleh".into(),
            phone: None,
        };
        let student = register_student(&repo, reg.clone()).await.unwrap();
        assert_eq!(student.stage, DEFAULT_STAGE);
        let err = register_student(&repo, reg).await.unwrap_err();
        assert!(matches!(err, CompassError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_claims_record_without_password() {
        let repo = setup().await;
        seed(&repo, "crm@example.com", None).await;
        let claimed = register_student(
            &repo,
            Registration {
                email: "crm@example.com".into(),
                password: "a long password".into(),
                first_name: "Ignored".into(),
                last_name: "Ignored".into(),
                phone: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(claimed.first_name, "Lina");
        assert!(repo
            .get_password_hash(Role::Student, "crm@example.com")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn register_rejects_short_password() {
        let repo = setup().await;
        let err = register_student(
            &repo,
            Registration {
                email: "new@example.com".into(),
                password: "short".into(),
                first_name: "Nour".into(),
                last_name: "Saleh".into(),
                phone: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CompassError::Validation(_)));
    }

    #[tokio::test]
    async fn only_admin_assigns_and_deletes() {
        let repo = setup().await;
        seed(&repo, "lina@example.com", None).await;
        let sales = Caller::new(Role::Sales, "lee@compass.example");

        assert!(assign_advisor(&repo, &sales, "lina@example.com", "sam@compass.example")
            .await
            .is_err());
        let assigned = assign_advisor(&repo, &admin(), "lina@example.com", "sam@compass.example")
            .await
            .unwrap();
        assert_eq!(assigned.advisor_email.as_deref(), Some("sam@compass.example"));

        let cleared = unassign_advisor(&repo, &admin(), "lina@example.com")
            .await
            .unwrap();
        assert!(cleared.advisor_email.is_none());

        assert!(delete_student(&repo, &sales, "lina@example.com").await.is_err());
        delete_student(&repo, &admin(), "lina@example.com").await.unwrap();
        let err = delete_student(&repo, &admin(), "lina@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, CompassError::NotFound(_)));
    }

    #[tokio::test]
    async fn student_sees_own_advisor() {
        let repo = setup().await;
        seed(&repo, "lina@example.com", Some("sam@compass.example")).await;
        seed(&repo, "omar@example.com", None).await;

        let lina = Caller::new(Role::Student, "lina@example.com");
        let advisor = advisor_for_student(&repo, &lina).await.unwrap().unwrap();
        assert_eq!(advisor.email, "sam@compass.example");

        let omar = Caller::new(Role::Student, "omar@example.com");
        assert!(advisor_for_student(&repo, &omar).await.unwrap().is_none());
    }
}

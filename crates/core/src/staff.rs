//! Admin-managed advisor and sales accounts.

use serde::Deserialize;
use tracing::info;

use crate::access::{self, Caller};
use crate::audit;
use crate::auth;
use crate::db::repository::PortalRepository;
use crate::error::{CompassError, Result};
use crate::models::advisor::{Advisor, AdvisorWithLoad, NewAdvisor};
use crate::models::common::{normalize_email, require_text, validate_email, Role};
use crate::models::staff::{NewStaff, SalesUser};

/// Input for creating an advisor or sales account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl NewAccount {
    fn password_hash(&self) -> Result<Option<String>> {
        match self.password {
            Some(ref password) => {
                auth::validate_new_password(password)?;
                auth::hash_password(password).map(Some)
            }
            None => Ok(None),
        }
    }
}

pub async fn create_advisor<R>(repo: &R, caller: &Caller, input: NewAccount) -> Result<Advisor>
where
    R: PortalRepository + ?Sized,
{
    access::require_admin(caller)?;
    let advisor = repo
        .create_advisor(&NewAdvisor {
            email: validate_email(&input.email)?,
            name: require_text("name", &input.name)?,
            phone: input
                .phone
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from),
            password_hash: input.password_hash()?,
        })
        .await?;
    info!(advisor = %advisor.email, "advisor created");
    audit::record(repo, caller, "create_advisor", Some(&advisor.email)).await;
    Ok(advisor)
}

pub async fn list_advisors<R>(repo: &R, caller: &Caller) -> Result<Vec<AdvisorWithLoad>>
where
    R: PortalRepository + ?Sized,
{
    access::require_admin(caller)?;
    repo.list_advisors().await
}

/// Delete an advisor. Their students become unassigned.
pub async fn delete_advisor<R>(repo: &R, caller: &Caller, email: &str) -> Result<()>
where
    R: PortalRepository + ?Sized,
{
    access::require_admin(caller)?;
    let email = normalize_email(email);
    if !repo.delete_advisor(&email).await? {
        return Err(CompassError::NotFound(format!("advisor {email}")));
    }
    info!(advisor = %email, "advisor deleted");
    audit::record(repo, caller, "delete_advisor", Some(&email)).await;
    Ok(())
}

pub async fn create_sales_user<R>(repo: &R, caller: &Caller, input: NewAccount) -> Result<SalesUser>
where
    R: PortalRepository + ?Sized,
{
    access::require_admin(caller)?;
    let user = repo
        .create_sales_user(&NewStaff {
            email: validate_email(&input.email)?,
            name: require_text("name", &input.name)?,
            password_hash: input.password_hash()?,
        })
        .await?;
    info!(sales = %user.email, "sales user created");
    audit::record(repo, caller, "create_sales_user", Some(&user.email)).await;
    Ok(user)
}

pub async fn list_sales_users<R>(repo: &R, caller: &Caller) -> Result<Vec<SalesUser>>
where
    R: PortalRepository + ?Sized,
{
    access::require_admin(caller)?;
    repo.list_sales_users().await
}

pub async fn delete_sales_user<R>(repo: &R, caller: &Caller, email: &str) -> Result<()>
where
    R: PortalRepository + ?Sized,
{
    access::require_admin(caller)?;
    let email = normalize_email(email);
    if !repo.delete_sales_user(&email).await? {
        return Err(CompassError::NotFound(format!("sales user {email}")));
    }
    info!(sales = %email, "sales user deleted");
    audit::record(repo, caller, "delete_sales_user", Some(&email)).await;
    Ok(())
}

/// Resolve which role an email belongs to, checking admins, advisors, sales
/// and students in that order.
pub async fn resolve_role<R>(repo: &R, email: &str) -> Result<Option<Role>>
where
    R: PortalRepository + ?Sized,
{
    let email = normalize_email(email);
    if repo.get_admin_by_email(&email).await?.is_some() {
        return Ok(Some(Role::Admin));
    }
    if repo.get_advisor_by_email(&email).await?.is_some() {
        return Ok(Some(Role::Advisor));
    }
    if repo.get_sales_user_by_email(&email).await?.is_some() {
        return Ok(Some(Role::Sales));
    }
    if repo.get_student_by_email(&email).await?.is_some() {
        return Ok(Some(Role::Student));
    }
    Ok(None)
}

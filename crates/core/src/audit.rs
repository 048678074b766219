//! Best-effort audit trail for privileged actions.

use tracing::warn;

use crate::access::{self, Caller};
use crate::db::repository::AuditRepository;
use crate::error::Result;
use crate::models::audit::AuditEntry;

/// Append an audit entry for `caller`. Failures are logged, never returned,
/// so an audit outage does not block the action itself.
pub async fn record<R>(repo: &R, caller: &Caller, action: &str, details: Option<&str>)
where
    R: AuditRepository + ?Sized,
{
    if let Err(e) = repo
        .log_action(
            caller.role,
            &caller.email,
            action,
            details,
            caller.ip_address.as_deref(),
        )
        .await
    {
        warn!(action, actor = %caller.email, error = %e, "failed to write audit entry");
    }
}

/// Most recent audit entries, newest first. Admin only.
pub async fn recent<R>(repo: &R, caller: &Caller, limit: i64) -> Result<Vec<AuditEntry>>
where
    R: AuditRepository + ?Sized,
{
    access::require_admin(caller)?;
    repo.list_audit_log(limit).await
}

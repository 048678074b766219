//! Password hashing and database-backed sessions.
//!
//! Every role keeps an argon2 PHC hash in its own table. A successful login
//! creates an opaque random token stored in `sessions` with an expiry.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{Duration, Utc};
use rand::Rng;
use tracing::{info, warn};

use crate::access::Caller;
use crate::audit;
use crate::config::BootstrapAdmin;
use crate::db::repository::PortalRepository;
use crate::error::{CompassError, Result};
use crate::models::common::{normalize_email, Role};
use crate::models::session::Session;
use crate::models::staff::{Admin, NewStaff};

/// Shortest password accepted for self-registration and account creation.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password using argon2.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = argon2::password_hash::SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CompassError::PasswordHash(e.to_string()))
}

/// Verify a password against a hash. Malformed hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Check a new password meets the minimum length.
pub fn validate_new_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CompassError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Generate a random session token (64 hex characters).
pub fn generate_session_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Authenticate `email` as `role` and open a session.
///
/// Both an unknown account and a wrong password fail with the same
/// `Unauthorized` error.
pub async fn login<R>(
    repo: &R,
    session_hours: i64,
    role: Role,
    email: &str,
    password: &str,
    ip_address: Option<&str>,
) -> Result<Session>
where
    R: PortalRepository + ?Sized,
{
    let email = normalize_email(email);
    let caller = Caller::new(role, &email).with_ip(ip_address.map(String::from));

    let verified = match repo.get_password_hash(role, &email).await? {
        Some(hash) => verify_password(password, &hash),
        None => false,
    };

    if !verified {
        warn!(%role, %email, ip = ?ip_address, "failed login attempt");
        audit::record(repo, &caller, "login_failed", None).await;
        return Err(CompassError::Unauthorized("invalid credentials".into()));
    }

    let now = Utc::now();
    let expires_at = Duration::try_hours(session_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            CompassError::Config(format!("session_hours {session_hours} is out of range"))
        })?;
    let session = Session {
        token: generate_session_token(),
        role,
        email: email.clone(),
        created_at: now,
        expires_at,
        ip_address: ip_address.map(String::from),
    };
    repo.create_session(&session).await?;

    info!(%role, %email, "login");
    audit::record(repo, &caller, "login", None).await;
    Ok(session)
}

/// Look up the caller behind a session token.
///
/// Expired sessions are deleted and treated as absent.
pub async fn resolve_session<R>(repo: &R, token: &str) -> Result<Option<Caller>>
where
    R: PortalRepository + ?Sized,
{
    let Some(session) = repo.get_session(token).await? else {
        return Ok(None);
    };
    if session.is_expired(Utc::now()) {
        repo.delete_session(token).await?;
        return Ok(None);
    }
    Ok(Some(Caller::new(session.role, &session.email)))
}

/// End a session. Returns false if the token was unknown.
pub async fn logout<R>(repo: &R, token: &str) -> Result<bool>
where
    R: PortalRepository + ?Sized,
{
    repo.delete_session(token).await
}

/// Delete every expired session.
pub async fn purge_expired_sessions<R>(repo: &R) -> Result<u64>
where
    R: PortalRepository + ?Sized,
{
    let purged = repo.delete_expired_sessions().await?;
    if purged > 0 {
        info!(purged, "purged expired sessions");
    }
    Ok(purged)
}

/// Create or refresh the configured bootstrap admin account.
pub async fn ensure_bootstrap_admin<R>(repo: &R, admin: &BootstrapAdmin) -> Result<Admin>
where
    R: PortalRepository + ?Sized,
{
    let saved = repo
        .upsert_admin(&NewStaff {
            email: normalize_email(&admin.email),
            name: admin.name.clone(),
            password_hash: Some(admin.password_hash.clone()),
        })
        .await?;
    info!(email = %saved.email, "bootstrap admin ready");
    Ok(saved)
}

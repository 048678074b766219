//! TOML-based configuration system for Compass.

use crate::error::{CompassError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding `portal.database.path`.
pub const ENV_DATABASE_PATH: &str = "COMPASS_DATABASE_PATH";
/// Environment variable overriding `odoo.webhook_token`.
pub const ENV_ODOO_WEBHOOK_TOKEN: &str = "COMPASS_ODOO_WEBHOOK_TOKEN";
/// Environment variable overriding `odoo.signing_secret`.
pub const ENV_ODOO_SIGNING_SECRET: &str = "COMPASS_ODOO_SIGNING_SECRET";

/// Top-level Compass configuration, deserialized from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompassConfig {
    pub portal: PortalSection,
    #[serde(default)]
    pub odoo: OdooConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Core portal instance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSection {
    pub instance_name: String,
    pub data_dir: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default = "default_session_hours")]
    pub session_hours: i64,
}

/// Longest session lifetime accepted by [`CompassConfig::validate`] (one year).
pub const MAX_SESSION_HOURS: i64 = 8760;

fn default_session_hours() -> i64 {
    24
}

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path.
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    8
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "/var/lib/compass/compass.db".into(),
            max_connections: default_max_connections(),
        }
    }
}

/// Odoo CRM webhook ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdooConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Shared secret expected in the `token` query parameter.
    #[serde(default)]
    pub webhook_token: Option<String>,
    /// When set, requests must also carry a hex HMAC-SHA256 body signature
    /// in the `X-Odoo-Signature` header.
    #[serde(default)]
    pub signing_secret: Option<String>,
    /// Stage given to students created by the webhook when the payload has none.
    #[serde(default = "default_stage")]
    pub default_stage: String,
}

impl Default for OdooConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_token: None,
            signing_secret: None,
            default_stage: default_stage(),
        }
    }
}

fn default_stage() -> String {
    crate::models::student::DEFAULT_STAGE.into()
}

/// Messaging limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            max_message_length: default_max_message_length(),
        }
    }
}

fn default_max_message_length() -> usize {
    5000
}

/// Admin account created or refreshed at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub email: String,
    #[serde(default = "default_admin_name")]
    pub name: String,
    /// Argon2 PHC string, e.g. from `compass hash-password`.
    pub password_hash: String,
}

fn default_admin_name() -> String {
    "Administrator".into()
}

impl CompassConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CompassError::Config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using an arbitrary variable lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(ENV_DATABASE_PATH) {
            self.portal.database.path = path;
        }
        if let Some(token) = get(ENV_ODOO_WEBHOOK_TOKEN) {
            self.odoo.webhook_token = Some(token);
        }
        if let Some(secret) = get(ENV_ODOO_SIGNING_SECRET) {
            self.odoo.signing_secret = Some(secret);
        }
    }

    /// Validate the configuration, returning an error for invalid combinations.
    pub fn validate(&self) -> Result<()> {
        if self.portal.instance_name.is_empty() {
            return Err(CompassError::Config(
                "portal.instance_name must not be empty".into(),
            ));
        }

        if self.portal.data_dir.is_empty() {
            return Err(CompassError::Config(
                "portal.data_dir must not be empty".into(),
            ));
        }

        if self.portal.database.path.is_empty() {
            return Err(CompassError::Config(
                "portal.database.path must not be empty".into(),
            ));
        }

        if self.portal.database.max_connections == 0 {
            return Err(CompassError::Config(
                "portal.database.max_connections must be at least 1".into(),
            ));
        }

        if self.portal.session_hours <= 0 {
            return Err(CompassError::Config(
                "portal.session_hours must be positive".into(),
            ));
        }
        if self.portal.session_hours > MAX_SESSION_HOURS {
            return Err(CompassError::Config(format!(
                "portal.session_hours must be at most {MAX_SESSION_HOURS}"
            )));
        }

        if self.odoo.enabled {
            let token_missing = self
                .odoo
                .webhook_token
                .as_deref()
                .map(|t| t.trim().is_empty())
                .unwrap_or(true);
            if token_missing {
                return Err(CompassError::Config(
                    "odoo.webhook_token is required when Odoo ingestion is enabled".into(),
                ));
            }
        }

        if self.messaging.max_message_length == 0 {
            return Err(CompassError::Config(
                "messaging.max_message_length must be at least 1".into(),
            ));
        }

        if let Some(ref admin) = self.bootstrap_admin {
            if admin.email.trim().is_empty() {
                return Err(CompassError::Config(
                    "bootstrap_admin.email must not be empty".into(),
                ));
            }
            if !admin.password_hash.starts_with("$argon2") {
                return Err(CompassError::Config(
                    "bootstrap_admin.password_hash must be an argon2 hash".into(),
                ));
            }
        }

        Ok(())
    }

    /// Generate a sensible default configuration.
    pub fn generate_default() -> Self {
        Self {
            portal: PortalSection {
                instance_name: "Compass Consulting".into(),
                data_dir: "/var/lib/compass".into(),
                database: DatabaseConfig::default(),
                session_hours: default_session_hours(),
            },
            odoo: OdooConfig::default(),
            messaging: MessagingConfig::default(),
            bootstrap_admin: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE_TOML: &str = r#"
[portal]
instance_name = "Northstar Education"
data_dir = "/var/lib/compass"
session_hours = 12

[portal.database]
path = "/var/lib/compass/compass.db"
max_connections = 4

[odoo]
enabled = true
webhook_token = "0123456789abcdef0123"
default_stage = "Lead"

[messaging]
max_message_length = 2000

[bootstrap_admin]
email = "ops@northstar.example"
password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2g"
"#;

    fn parse_sample() -> CompassConfig {
        toml::from_str(SAMPLE_TOML).expect("sample TOML should parse")
    }

    #[test]
    fn parse_full_config() {
        let cfg = parse_sample();
        assert_eq!(cfg.portal.instance_name, "Northstar Education");
        assert_eq!(cfg.portal.session_hours, 12);
        assert_eq!(cfg.portal.database.path, "/var/lib/compass/compass.db");
        assert_eq!(cfg.portal.database.max_connections, 4);
        assert!(cfg.odoo.enabled);
        assert_eq!(cfg.odoo.default_stage, "Lead");
        assert!(cfg.odoo.signing_secret.is_none());
        assert_eq!(cfg.messaging.max_message_length, 2000);
        let admin = cfg.bootstrap_admin.as_ref().unwrap();
        assert_eq!(admin.name, "Administrator");
        cfg.validate().expect("sample should validate");
    }

    #[test]
    fn roundtrip_serialization() {
        let cfg = parse_sample();
        let serialized = toml::to_string(&cfg).expect("should serialize");
        let deserialized: CompassConfig =
            toml::from_str(&serialized).expect("should deserialize roundtrip");
        assert_eq!(deserialized.portal.instance_name, cfg.portal.instance_name);
        assert_eq!(deserialized.odoo.webhook_token, cfg.odoo.webhook_token);
    }

    #[test]
    fn minimal_config_parses() {
        let minimal = r#"
[portal]
instance_name = "Test"
data_dir = "/tmp/compass"
"#;
        let cfg: CompassConfig = toml::from_str(minimal).expect("minimal config should parse");
        assert_eq!(cfg.portal.session_hours, 24);
        assert!(!cfg.odoo.enabled);
        assert_eq!(cfg.odoo.default_stage, "New");
        assert_eq!(cfg.messaging.max_message_length, 5000);
        assert!(cfg.bootstrap_admin.is_none());
    }

    #[test]
    fn generate_default_is_valid() {
        let cfg = CompassConfig::generate_default();
        cfg.validate().expect("default config should be valid");
    }

    #[test]
    fn validate_requires_instance_name() {
        let mut cfg = CompassConfig::generate_default();
        cfg.portal.instance_name = String::new();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("instance_name"));
    }

    #[test]
    fn validate_requires_database_path() {
        let mut cfg = CompassConfig::generate_default();
        cfg.portal.database.path = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_positive_session_hours() {
        let mut cfg = CompassConfig::generate_default();
        cfg.portal.session_hours = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_bounds_session_hours() {
        let mut cfg = CompassConfig::generate_default();
        cfg.portal.session_hours = MAX_SESSION_HOURS;
        cfg.validate().expect("one year is allowed");

        cfg.portal.session_hours = 1_000_000_000_000_000;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("session_hours"));
    }

    #[test]
    fn validate_odoo_requires_token_when_enabled() {
        let mut cfg = CompassConfig::generate_default();
        cfg.odoo.enabled = true;
        assert!(cfg.validate().is_err());

        cfg.odoo.webhook_token = Some("   ".into());
        assert!(cfg.validate().is_err());

        cfg.odoo.webhook_token = Some("secret-token".into());
        cfg.validate().expect("token present should validate");
    }

    #[test]
    fn validate_odoo_disabled_no_token_ok() {
        let cfg = CompassConfig::generate_default();
        assert!(!cfg.odoo.enabled);
        cfg.validate().expect("disabled odoo needs no token");
    }

    #[test]
    fn validate_bootstrap_admin_requires_argon2_hash() {
        let mut cfg = CompassConfig::generate_default();
        cfg.bootstrap_admin = Some(BootstrapAdmin {
            email: "admin@example.com".into(),
            name: "Admin".into(),
            password_hash: "plaintext".into(),
        });
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("argon2"));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut cfg = CompassConfig::generate_default();
        let vars: HashMap<&str, &str> = [
            (ENV_DATABASE_PATH, "/srv/compass/db.sqlite"),
            (ENV_ODOO_WEBHOOK_TOKEN, "from-env"),
        ]
        .into_iter()
        .collect();
        cfg.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.portal.database.path, "/srv/compass/db.sqlite");
        assert_eq!(cfg.odoo.webhook_token.as_deref(), Some("from-env"));
        assert!(cfg.odoo.signing_secret.is_none());
    }

    #[test]
    fn empty_env_override_is_ignored() {
        let mut cfg = CompassConfig::generate_default();
        cfg.apply_overrides_from(|k| (k == ENV_DATABASE_PATH).then(|| "  ".to_string()));
        assert_eq!(cfg.portal.database.path, "/var/lib/compass/compass.db");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compass.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE_TOML.as_bytes()).unwrap();

        let cfg = CompassConfig::load(&path).expect("should load from file");
        assert_eq!(cfg.portal.instance_name, "Northstar Education");
    }

    #[test]
    fn load_nonexistent_file_returns_io_error() {
        let result = CompassConfig::load(Path::new("/nonexistent/compass.toml"));
        assert!(matches!(result, Err(CompassError::Io(_))));
    }

    #[test]
    fn load_invalid_toml_returns_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is [[[not valid toml").unwrap();

        let result = CompassConfig::load(&path);
        assert!(result.unwrap_err().to_string().contains("config"));
    }
}

//! Application configuration loaded from environment variables.
//!
//! Loading is fail-fast: a missing or malformed variable stops startup with
//! a message naming it. Insecure development defaults are tolerated with a
//! warning in development and refused in production.

use std::env;
use std::time::Duration;

use thiserror::Error;
use warden_crypto::MasterKey;
use warden_db::models::LinkedAccountColumns;
use warden_db::DatabaseUrl;

/// Development default for `WARDEN_ENCRYPTION_KEY`: 64 hex '0' characters.
pub const INSECURE_ENCRYPTION_KEY: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

// ── AppEnvironment ────────────────────────────────────────────────────────

/// Application environment mode.
///
/// - `Development`: insecure defaults are allowed with WARN-level logging.
/// - `Production`: insecure defaults cause the application to refuse startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl AppEnvironment {
    /// Parse an `APP_ENV` value. Unrecognized values mean `Development`.
    pub fn from_env_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => {
                tracing::warn!(
                    value = other,
                    "Unrecognized APP_ENV value, defaulting to Development"
                );
                Self::Development
            }
        }
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        *self == Self::Production
    }
}

impl std::fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Failed to parse port: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),
}

impl ConfigError {
    fn invalid(var: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            var: var.to_string(),
            message: message.into(),
        }
    }
}

/// Webhook subsystem settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Capacity of the delivery queue. Events beyond it are dropped.
    pub queue_capacity: usize,
    /// Delivery attempts per event, the first one included.
    pub max_attempts: u32,
    /// Deliveries in flight at once.
    pub max_concurrency: usize,
    /// Accept `http://` endpoints. Development only.
    pub allow_http: bool,
}

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    pub app_env: AppEnvironment,

    /// Platform Postgres database. Also the shared database of workspaces
    /// without their own connection.
    pub database_url: String,

    /// Parsed form of `database_url`.
    pub default_database: DatabaseUrl,

    /// Key sealing every stored secret.
    pub encryption_key: MasterKey,

    /// Raw `WARDEN_ENCRYPTION_KEY`, kept for the insecure-default check.
    encryption_key_source: String,

    /// Tracing filter directive (e.g., "info,warden_db=debug")
    pub rust_log: String,

    pub host: String,
    pub port: u16,

    /// Upper bound on opening a workspace engine.
    pub workspace_connect_timeout: Duration,

    /// Pool size of each workspace engine.
    pub workspace_max_connections: u32,

    pub webhooks: WebhookConfig,

    pub linked_accounts: LinkedAccountColumns,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("app_env", &self.app_env)
            .field("default_database", &self.default_database)
            .field("encryption_key", &"[REDACTED]")
            .field("rust_log", &self.rust_log)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("workspace_connect_timeout", &self.workspace_connect_timeout)
            .field("workspace_max_connections", &self.workspace_max_connections)
            .field("webhooks", &self.webhooks)
            .field("linked_accounts", &self.linked_accounts)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Required Variables
    ///
    /// - `DATABASE_URL` - Platform PostgreSQL connection string
    ///
    /// # Optional Variables
    ///
    /// - `APP_ENV` - `development` (default) or `production`
    /// - `WARDEN_ENCRYPTION_KEY` - 64 hex characters or base64 of 32 bytes
    ///   (development default: all zeros)
    /// - `RUST_LOG` - Log level filter (default: "info")
    /// - `HOST` / `PORT` - Bind address (default: 0.0.0.0:8080)
    /// - `WORKSPACE_CONNECT_TIMEOUT_SECS` (default 5)
    /// - `WORKSPACE_MAX_CONNECTIONS` (default 5)
    /// - `WEBHOOK_QUEUE_CAPACITY` (default 1024)
    /// - `WEBHOOK_MAX_ATTEMPTS` (default 6)
    /// - `WEBHOOK_MAX_CONCURRENCY` (default 32)
    /// - `WEBHOOK_ALLOW_HTTP` (default false)
    /// - `LINKED_ACCOUNT_EMAIL_NULLABLE` (default true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let app_env = AppEnvironment::from_env_str(
            &var("APP_ENV").unwrap_or_else(|| "development".to_string()),
        );

        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
        let default_database = DatabaseUrl::parse(&database_url)
            .map_err(|e| ConfigError::invalid("DATABASE_URL", e.to_string()))?;

        let encryption_key_source =
            var("WARDEN_ENCRYPTION_KEY").unwrap_or_else(|| INSECURE_ENCRYPTION_KEY.to_string());
        let encryption_key = MasterKey::parse(&encryption_key_source)
            .map_err(|e| ConfigError::invalid("WARDEN_ENCRYPTION_KEY", e.to_string()))?;

        let rust_log = var("RUST_LOG").unwrap_or_else(|| "info".to_string());
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port: u16 = var("PORT").unwrap_or_else(|| "8080".to_string()).parse()?;
        if port == 0 {
            return Err(ConfigError::invalid("PORT", "Port must be between 1 and 65535"));
        }

        let connect_timeout_secs: u64 = parse_or(&var, "WORKSPACE_CONNECT_TIMEOUT_SECS", 5)?;
        if connect_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "WORKSPACE_CONNECT_TIMEOUT_SECS",
                "must be at least 1",
            ));
        }
        let workspace_max_connections: u32 = parse_or(&var, "WORKSPACE_MAX_CONNECTIONS", 5)?;
        if workspace_max_connections == 0 {
            return Err(ConfigError::invalid("WORKSPACE_MAX_CONNECTIONS", "must be at least 1"));
        }

        let queue_capacity: usize = parse_or(&var, "WEBHOOK_QUEUE_CAPACITY", 1024)?;
        if queue_capacity == 0 {
            return Err(ConfigError::invalid("WEBHOOK_QUEUE_CAPACITY", "must be at least 1"));
        }
        let max_attempts: u32 = parse_or(&var, "WEBHOOK_MAX_ATTEMPTS", 6)?;
        if max_attempts == 0 {
            return Err(ConfigError::invalid("WEBHOOK_MAX_ATTEMPTS", "must be at least 1"));
        }
        let max_concurrency: usize = parse_or(&var, "WEBHOOK_MAX_CONCURRENCY", 32)?;
        if max_concurrency == 0 {
            return Err(ConfigError::invalid("WEBHOOK_MAX_CONCURRENCY", "must be at least 1"));
        }
        let allow_http = parse_flag(&var, "WEBHOOK_ALLOW_HTTP", false)?;
        let account_email_nullable = parse_flag(&var, "LINKED_ACCOUNT_EMAIL_NULLABLE", true)?;

        Ok(Config {
            app_env,
            database_url,
            default_database,
            encryption_key,
            encryption_key_source,
            rust_log,
            host,
            port,
            workspace_connect_timeout: Duration::from_secs(connect_timeout_secs),
            workspace_max_connections,
            webhooks: WebhookConfig {
                queue_capacity,
                max_attempts,
                max_concurrency,
                allow_http,
            },
            linked_accounts: LinkedAccountColumns {
                account_email_nullable,
            },
        })
    }

    /// Get the server bind address as a socket address string.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate security configuration based on the application environment.
    ///
    /// In **production** mode: returns `Err(issues)` listing every insecure
    /// setting found. In **development** mode: returns `Ok(warnings)`.
    pub fn validate_security_config(&self) -> Result<Vec<String>, Vec<String>> {
        let mut issues = Vec::new();

        if self.encryption_key_source == INSECURE_ENCRYPTION_KEY
            || self.encryption_key.as_bytes() == &[0u8; 32]
        {
            issues.push(
                "WARDEN_ENCRYPTION_KEY is using the default insecure value (all zeros)".to_string(),
            );
        }

        if self.webhooks.allow_http {
            issues.push(
                "WEBHOOK_ALLOW_HTTP is enabled; webhook payloads may travel unencrypted"
                    .to_string(),
            );
        }

        if issues.is_empty() {
            return Ok(Vec::new());
        }

        if self.app_env.is_production() {
            Err(issues)
        } else {
            Ok(issues)
        }
    }
}

fn parse_or<T, F>(var: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(name, e.to_string())),
        None => Ok(default),
    }
}

fn parse_flag<F>(var: &F, name: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name).map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes") => Ok(true),
        Some(v) if matches!(v.as_str(), "false" | "0" | "no") => Ok(false),
        Some(v) => Err(ConfigError::invalid(name, format!("expected true or false, got {v:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use warden_db::DatabaseType;

    const SECURE_KEY: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![("DATABASE_URL", "postgres://warden:pw@localhost:5432/warden")]
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            err.to_string(),
            "Missing required environment variable: TEST_VAR"
        );

        let err = ConfigError::InvalidValue {
            var: "PORT".to_string(),
            message: "Must be a number".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for PORT: Must be a number");
    }

    #[test]
    fn test_defaults() {
        let config = load(&base()).unwrap();
        assert_eq!(config.app_env, AppEnvironment::Development);
        assert_eq!(config.default_database.dialect(), DatabaseType::Postgres);
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.workspace_connect_timeout, Duration::from_secs(5));
        assert_eq!(config.workspace_max_connections, 5);
        assert_eq!(config.webhooks.queue_capacity, 1024);
        assert_eq!(config.webhooks.max_attempts, 6);
        assert_eq!(config.webhooks.max_concurrency, 32);
        assert!(!config.webhooks.allow_http);
        assert!(config.linked_accounts.account_email_nullable);
    }

    #[test]
    fn test_missing_database_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "DATABASE_URL"));
    }

    #[test]
    fn test_unknown_database_scheme_is_rejected() {
        let err = load(&[("DATABASE_URL", "oracle://db.example.com/warden")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref var, .. } if var == "DATABASE_URL"));
    }

    #[test]
    fn test_invalid_encryption_key() {
        let mut vars = base();
        vars.push(("WARDEN_ENCRYPTION_KEY", "too-short"));
        let err = load(&vars).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref var, .. } if var == "WARDEN_ENCRYPTION_KEY")
        );
    }

    #[test]
    fn test_port_validation() {
        let mut vars = base();
        vars.push(("PORT", "0"));
        assert!(matches!(load(&vars), Err(ConfigError::InvalidValue { .. })));

        let mut vars = base();
        vars.push(("PORT", "eighty"));
        assert!(matches!(load(&vars), Err(ConfigError::InvalidPort(_))));
    }

    #[test]
    fn test_overrides() {
        let mut vars = base();
        vars.extend([
            ("HOST", "127.0.0.1"),
            ("PORT", "3000"),
            ("WORKSPACE_CONNECT_TIMEOUT_SECS", "2"),
            ("WEBHOOK_QUEUE_CAPACITY", "16"),
            ("WEBHOOK_MAX_CONCURRENCY", "4"),
            ("WEBHOOK_ALLOW_HTTP", "true"),
            ("LINKED_ACCOUNT_EMAIL_NULLABLE", "false"),
        ]);
        let config = load(&vars).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
        assert_eq!(config.workspace_connect_timeout, Duration::from_secs(2));
        assert_eq!(config.webhooks.queue_capacity, 16);
        assert_eq!(config.webhooks.max_concurrency, 4);
        assert!(config.webhooks.allow_http);
        assert!(!config.linked_accounts.account_email_nullable);
    }

    #[test]
    fn test_bad_flag_is_rejected() {
        let mut vars = base();
        vars.push(("WEBHOOK_ALLOW_HTTP", "maybe"));
        assert!(matches!(load(&vars), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_zero_queue_capacity_is_rejected() {
        let mut vars = base();
        vars.push(("WEBHOOK_QUEUE_CAPACITY", "0"));
        assert!(matches!(load(&vars), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let mut vars = base();
        vars.push(("WEBHOOK_MAX_CONCURRENCY", "0"));
        assert!(matches!(load(&vars), Err(ConfigError::InvalidValue { .. })));
    }

    // ── AppEnvironment ────────────────────────────────────────────────

    #[test]
    fn test_app_environment_parse() {
        assert_eq!(
            AppEnvironment::from_env_str("production"),
            AppEnvironment::Production
        );
        assert_eq!(AppEnvironment::from_env_str("PROD"), AppEnvironment::Production);
        assert_eq!(AppEnvironment::from_env_str("dev"), AppEnvironment::Development);
        assert_eq!(
            AppEnvironment::from_env_str("staging"),
            AppEnvironment::Development
        );
        assert_eq!(AppEnvironment::Production.to_string(), "production");
    }

    // ── Security validation ───────────────────────────────────────────

    #[test]
    fn test_production_rejects_default_encryption_key() {
        let mut vars = base();
        vars.push(("APP_ENV", "production"));
        let config = load(&vars).unwrap();

        let issues = config.validate_security_config().unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("WARDEN_ENCRYPTION_KEY"));
    }

    #[test]
    fn test_development_allows_defaults_with_warnings() {
        let mut vars = base();
        vars.push(("WEBHOOK_ALLOW_HTTP", "true"));
        let config = load(&vars).unwrap();

        let warnings = config.validate_security_config().unwrap();
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_production_passes_with_secure_config() {
        let mut vars = base();
        vars.extend([("APP_ENV", "production"), ("WARDEN_ENCRYPTION_KEY", SECURE_KEY)]);
        let config = load(&vars).unwrap();

        assert_eq!(config.validate_security_config(), Ok(Vec::new()));
    }

    #[test]
    fn test_debug_redacts_key() {
        let mut vars = base();
        vars.push(("WARDEN_ENCRYPTION_KEY", SECURE_KEY));
        let config = load(&vars).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(SECURE_KEY));
        assert!(!debug.contains("pw@"));
    }
}

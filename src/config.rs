use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key (minimum 64 characters)
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    pub jwt_expiration: usize,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Payment gateway public key id, shared with the client payment UI
    pub gateway_key_id: String,

    /// Payment gateway shared secret; keys intent signatures, never sent to clients
    pub gateway_key_secret: String,

    /// Payment gateway REST endpoint
    #[serde(default = "default_gateway_base_url")]
    pub gateway_base_url: String,

    /// Smallest payable order total in minor currency units
    #[serde(default = "default_minimum_order_amount")]
    pub minimum_order_amount: i64,

    /// Currency code for all gateway charges
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Comma-separated emails granted the admin role at login
    #[serde(default)]
    pub admin_emails: Option<String>,
}

impl AppConfig {
    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Creates a new configuration (primarily for tests and embedding)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        host: String,
        port: u16,
        environment: String,
        gateway_key_id: String,
        gateway_key_secret: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            gateway_key_id,
            gateway_key_secret,
            gateway_base_url: default_gateway_base_url(),
            minimum_order_amount: default_minimum_order_amount(),
            default_currency: default_currency(),
            admin_emails: None,
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Whether the given email is granted the admin role at login
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .as_ref()
            .map(|raw| {
                raw.split(',')
                    .any(|entry| entry.trim().eq_ignore_ascii_case(email))
            })
            .unwrap_or(false)
    }

    /// The configured admin emails as a list
    pub fn admin_email_list(&self) -> Vec<String> {
        self.admin_emails
            .as_ref()
            .map(|raw| {
                raw.split(',')
                    .map(|entry| entry.trim().to_string())
                    .filter(|entry| !entry.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            let mut err = ValidationError::new("jwt_secret_default_dev");
            err.message = Some(
                "The bundled development JWT secret must not be used outside development. Set APP__JWT_SECRET to a unique, secure value."
                    .into(),
            );
            errors.add("jwt_secret", err);
        }

        if self.gateway_key_secret.trim().is_empty() {
            let mut err = ValidationError::new("gateway_key_secret_required");
            err.message =
                Some("Set APP__GATEWAY_KEY_SECRET; settlement signatures cannot be verified without it".into());
            errors.add("gateway_key_secret", err);
        }

        if self.minimum_order_amount <= 0 {
            let mut err = ValidationError::new("minimum_order_amount");
            err.message = Some("minimum_order_amount must be a positive number of minor units".into());
            errors.add("minimum_order_amount", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_gateway_base_url() -> String {
    "https://api.razorpay.com/v1".to_string()
}

fn default_minimum_order_amount() -> i64 {
    100 // one major currency unit in paise
}

fn default_currency() -> String {
    "INR".to_string()
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    if trimmed.len() < 64 {
        let mut err = ValidationError::new("jwt_secret");
        err.message =
            Some("JWT secret must be at least 64 characters for adequate security".into());
        return Err(err);
    }

    // Reject known insecure defaults and obvious placeholders
    const DISALLOWED: [&str; 4] = [
        "CHANGE_THIS_SECRET_IN_PRODUCTION",
        "INSECURE_DEFAULT_DO_NOT_USE_IN_PRODUCTION",
        "your-secret-key",
        "default-secret-key",
    ];
    if DISALLOWED
        .iter()
        .any(|&bad| trimmed.eq_ignore_ascii_case(bad))
    {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some("JWT secret must be overridden with a secure random value".into());
        return Err(err);
    }

    if let Some(first) = trimmed.chars().next() {
        if trimmed.chars().all(|c| c == first) {
            let mut err = ValidationError::new("jwt_secret");
            err.message = Some("JWT secret cannot be a repeated character sequence".into());
            return Err(err);
        }
    }

    let unique_chars: std::collections::HashSet<char> = trimmed.chars().collect();
    if unique_chars.len() < 10 {
        let mut err = ValidationError::new("jwt_secret");
        err.message =
            Some("JWT secret must have at least 10 unique characters for adequate entropy".into());
        return Err(err);
    }

    Ok(())
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Checks that the settings with no serde default are present before
/// deserializing, so a missing secret fails with a message naming the
/// environment variable to set rather than a generic deserialize error.
fn ensure_required_secrets(config: &Config) -> Result<(), AppConfigError> {
    const REQUIRED: [(&str, &str); 3] = [
        (
            "jwt_secret",
            "Set APP__JWT_SECRET with a secure random string (minimum 64 characters).",
        ),
        (
            "gateway_key_secret",
            "Set APP__GATEWAY_KEY_SECRET; settlement signatures cannot be verified without it.",
        ),
        (
            "gateway_key_id",
            "Set APP__GATEWAY_KEY_ID; the client payment widget cannot open without it.",
        ),
    ];

    for (key, hint) in REQUIRED {
        if config.get_string(key).is_err() {
            error!("{} is not configured. {}", key, hint);
            return Err(AppConfigError::Load(ConfigError::NotFound(format!(
                "{} is required but not configured. {}",
                key, hint
            ))));
        }
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("aurum_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // NOTE: jwt_secret and the gateway credentials have no defaults - they MUST
    // be provided via environment variable or config file.
    let builder = Config::builder()
        .set_default("database_url", "sqlite://aurum.db?mode=rwc")?
        .set_default("jwt_expiration", 3600)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    ensure_required_secrets(&config)?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".to_string(),
            DEV_DEFAULT_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            8080,
            "development".to_string(),
            "rzp_test_key".to_string(),
            "rzp_test_secret".to_string(),
        )
    }

    #[test]
    fn development_allows_permissive_cors() {
        let cfg = base_config();
        assert!(cfg.should_allow_permissive_cors());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn production_requires_explicit_origins() {
        let mut cfg = base_config();
        cfg.environment = "production".to_string();
        cfg.jwt_secret = "zK8mQ2vN4pX7rT1wY5bC9dF3gH6jL0aS8eU2iO4kM7nB1vZ5xJ9qW3tR6yP0cE4h".to_string();
        let err = cfg.validate_additional_constraints().unwrap_err();
        assert!(err.errors().contains_key("cors_allowed_origins"));

        cfg.cors_allowed_origins = Some("https://shop.example.com".to_string());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn production_rejects_dev_jwt_secret() {
        let mut cfg = base_config();
        cfg.environment = "production".to_string();
        cfg.cors_allow_any_origin = true;
        let err = cfg.validate_additional_constraints().unwrap_err();
        assert!(err.errors().contains_key("jwt_secret"));
    }

    #[test]
    fn gateway_secret_must_be_set() {
        let mut cfg = base_config();
        cfg.gateway_key_secret = "  ".to_string();
        let err = cfg.validate_additional_constraints().unwrap_err();
        assert!(err.errors().contains_key("gateway_key_secret"));
    }

    #[test]
    fn zero_event_channel_capacity_fails_validation() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());

        let mut cfg = base_config();
        cfg.event_channel_capacity = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.errors().contains_key("event_channel_capacity"));
    }

    #[test]
    fn missing_gateway_key_id_is_reported_by_name() {
        let config = Config::builder()
            .set_override("jwt_secret", DEV_DEFAULT_JWT_SECRET)
            .unwrap()
            .set_override("gateway_key_secret", "rzp_test_secret")
            .unwrap()
            .build()
            .unwrap();

        let err = ensure_required_secrets(&config).unwrap_err();
        assert!(err.to_string().contains("gateway_key_id"));

        let config = Config::builder()
            .set_override("jwt_secret", DEV_DEFAULT_JWT_SECRET)
            .unwrap()
            .set_override("gateway_key_secret", "rzp_test_secret")
            .unwrap()
            .set_override("gateway_key_id", "rzp_test_key")
            .unwrap()
            .build()
            .unwrap();
        assert!(ensure_required_secrets(&config).is_ok());
    }

    #[test]
    fn admin_email_matching_is_case_insensitive() {
        let mut cfg = base_config();
        cfg.admin_emails = Some("owner@example.com, Staff@Example.com".to_string());
        assert!(cfg.is_admin_email("OWNER@example.com"));
        assert!(cfg.is_admin_email("staff@example.com"));
        assert!(!cfg.is_admin_email("intruder@example.com"));
    }
}

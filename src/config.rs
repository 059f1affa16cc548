//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;

use crate::error::AppError;
use crate::naming::KeyTemplate;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8000)
    pub port: u16,
    /// Origins allowed to call the API from a browser; empty allows any
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

/// S3-compatible storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Endpoint URL (e.g., "https://<account>.r2.cloudflarestorage.com")
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Signing region; R2 accepts "auto"
    pub region: String,
    #[serde(default)]
    pub addressing_style: AddressingStyle,
    /// Public URL base for uploaded objects (e.g., "https://cdn.example.com")
    ///
    /// Falls back to `endpoint` when unset.
    pub public_url: Option<String>,
    /// Canned ACL applied to every upload (e.g., "public-read")
    ///
    /// Unset sends no ACL header; serve objects through `public_url` or a
    /// bucket policy instead.
    pub acl: Option<String>,
}

impl StorageConfig {
    /// Public URL base without a trailing slash
    pub fn public_base(&self) -> String {
        self.public_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(&self.endpoint)
            .trim_end_matches('/')
            .to_string()
    }
}

/// Bucket addressing style
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AddressingStyle {
    /// `{endpoint}/{bucket}/{key}`
    #[default]
    Path,
    /// `{bucket}.{endpoint}/{key}`
    Virtual,
}

/// Upload configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum request body size in megabytes
    pub max_size_mb: u64,
    /// Object key template, see [`crate::naming`]
    pub key_template: String,
}

impl UploadConfig {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Shared-secret authentication and lockout policy
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared secret expected in the `Authorization` header
    pub secret: String,
    /// Failed attempts before an IP is banned
    pub max_attempts: u32,
    /// Ban length in seconds
    pub ban_duration_seconds: u64,
    /// Chance that a check also sweeps expired records (0.0 - 1.0)
    pub sweep_probability: f64,
    /// Background sweep interval in seconds; 0 disables the task
    pub sweep_interval_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (BYTEGO__*)
    ///
    /// # Errors
    /// Returns error if a required setting is missing or invalid
    pub fn load() -> Result<Self, AppError> {
        use config::{Environment, File};

        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("BYTEGO")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_allowed_origins")
                    .try_parsing(true),
            );

        Self::from_builder(builder)
    }

    /// Builder pre-populated with default values
    pub fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, AppError> {
        Ok(config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("storage.region", "auto")?
            .set_default("storage.addressing_style", "path")?
            .set_default("upload.max_size_mb", 100)?
            .set_default(
                "upload.key_template",
                "{year}/{month}/{day}/{originname_without_ext}-{randomkey8}{ext}",
            )?
            .set_default("auth.max_attempts", 3)?
            .set_default("auth.ban_duration_seconds", 3600)?
            .set_default("auth.sweep_probability", 0.01)?
            .set_default("auth.sweep_interval_seconds", 300)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?)
    }

    /// Build, deserialize and validate
    pub fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, AppError> {
        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), AppError> {
        let required = [
            ("storage.endpoint", &self.storage.endpoint),
            ("storage.access_key", &self.storage.access_key),
            ("storage.secret_key", &self.storage.secret_key),
            ("storage.bucket", &self.storage.bucket),
            ("auth.secret", &self.auth.secret),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        url::Url::parse(&self.storage.endpoint).map_err(|e| {
            AppError::Config(format!("storage.endpoint is not a valid URL: {e}"))
        })?;

        if self.upload.max_size_mb == 0 {
            return Err(AppError::Config(
                "upload.max_size_mb must be greater than 0".to_string(),
            ));
        }

        if self.auth.max_attempts == 0 {
            return Err(AppError::Config(
                "auth.max_attempts must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.auth.sweep_probability) {
            return Err(AppError::Config(
                "auth.sweep_probability must be between 0.0 and 1.0".to_string(),
            ));
        }

        let template = KeyTemplate::parse(&self.upload.key_template);
        if template.is_empty() {
            return Err(AppError::Config(
                "upload.key_template must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Log settings that are accepted but probably not intended
    pub fn log_warnings(&self) {
        let template = KeyTemplate::parse(&self.upload.key_template);
        for token in template.unknown_tokens() {
            tracing::warn!(token = %token, "Unrecognized key template variable will be kept literally");
        }

        if self
            .storage
            .public_url
            .as_deref()
            .is_none_or(|value| value.trim().is_empty())
        {
            tracing::warn!(
                endpoint = %self.storage.endpoint,
                "storage.public_url not set; public URLs will use the storage endpoint"
            );
        }
    }
}

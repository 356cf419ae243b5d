use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use ml_client::{DetectionOptions, MlServiceConfig};
use serde::Deserialize;

/// Environment variable naming an alternate config file (without extension).
pub const CONFIG_PATH_ENV: &str = "LANDWATCH_CONFIG";

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    #[serde(default)]
    pub allow_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

fn default_cors_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: Vec::new(),
            max_age: default_cors_max_age(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Daily sweep settings.
#[derive(Debug, Deserialize, Clone)]
pub struct SweepConfig {
    /// Default: true.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// UTC wall-clock time, "HH:MM". Default: "02:00".
    #[serde(default = "default_daily_at")]
    pub daily_at: String,
    /// Plots processed in parallel. Default: 1 (sequential).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_true() -> bool {
    true
}
fn default_daily_at() -> String {
    "02:00".into()
}
fn default_concurrency() -> usize {
    1
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_at: default_daily_at(),
            concurrency: default_concurrency(),
        }
    }
}

/// Outbound mail settings. Mail is logged and dropped while `enabled` is false.
#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Implicit TLS when true, STARTTLS otherwise.
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
    #[serde(default = "default_from")]
    pub from: String,
}

fn default_smtp_host() -> String {
    "localhost".into()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_from() -> String {
    "alerts@landwatch.com".into()
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_smtp_host(),
            port: default_smtp_port(),
            secure: false,
            user: None,
            pass: None,
            from: default_from(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Receives sweep failure reports. Default: "admin@landwatch.com".
    #[serde(default = "default_operator_email")]
    pub operator_email: String,
}

fn default_operator_email() -> String {
    "admin@landwatch.com".into()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            operator_email: default_operator_email(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Default: "./data/documents".
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Bytes. Default: 50 MiB.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/documents")
}
fn default_max_upload_size() -> u64 {
    50 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub ml: MlServiceConfig,
    /// Options used when a detection request leaves them out.
    #[serde(default)]
    pub detection: DetectionOptions,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config/config".into());

        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("database.url", "sqlite://./data/landwatch.db?mode=rwc")?
            .add_source(File::with_name(&path).required(false))
            // e.g. LANDWATCH__AUTH__JWT_SECRET, LANDWATCH__SMTP__HOST
            .add_source(Environment::with_prefix("LANDWATCH").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::Message("auth.jwt_secret must be set".into()));
        }
        if self.sweep.concurrency == 0 {
            return Err(ConfigError::Message(
                "sweep.concurrency must be at least 1".into(),
            ));
        }
        crate::detection::schedule::parse_daily_at(&self.sweep.daily_at)
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        self.detection
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(())
    }
}

use std::time::Duration;

use serde::Deserialize;

/// Connection settings for the change-detection service.
#[derive(Debug, Deserialize, Clone)]
pub struct MlServiceConfig {
    /// Base URL, e.g. "http://localhost:8000". Default: "http://localhost:8000".
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Default: 5.
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
    /// Default: 10.
    #[serde(default = "default_detect_timeout_secs")]
    pub detect_timeout_secs: u64,
    /// Default: 10.
    #[serde(default = "default_image_timeout_secs")]
    pub image_timeout_secs: u64,
    /// Default: 20.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".into()
}
fn default_health_timeout_secs() -> u64 {
    5
}
fn default_detect_timeout_secs() -> u64 {
    10
}
fn default_image_timeout_secs() -> u64 {
    10
}
fn default_download_timeout_secs() -> u64 {
    20
}

impl Default for MlServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            health_timeout_secs: default_health_timeout_secs(),
            detect_timeout_secs: default_detect_timeout_secs(),
            image_timeout_secs: default_image_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

impl MlServiceConfig {
    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn detect_timeout(&self) -> Duration {
        Duration::from_secs(self.detect_timeout_secs)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

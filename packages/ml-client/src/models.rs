use serde::{Deserialize, Serialize};

use crate::error::MlError;
use crate::geometry::GeoPolygon;

/// Tuning knobs forwarded to `/detect-change`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionOptions {
    /// NDVI change threshold in `[0, 1]`.
    pub threshold: f64,
    /// Look-back window in days.
    pub days: u32,
    /// Only mask clouds and shadows.
    pub relax_mask: bool,
    /// Disable masking entirely when false.
    pub apply_mask: bool,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            days: 20,
            relax_mask: false,
            apply_mask: true,
        }
    }
}

impl DetectionOptions {
    pub fn validate(&self) -> Result<(), MlError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(MlError::InvalidOptions(
                "threshold must be between 0 and 1".into(),
            ));
        }
        if self.days == 0 {
            return Err(MlError::InvalidOptions("days must be positive".into()));
        }
        Ok(())
    }
}

/// Body of `POST /detect-change`.
#[derive(Debug, Serialize)]
pub(crate) struct DetectRequest<'a> {
    #[serde(rename = "plotId")]
    pub plot_id: &'a str,
    pub coordinates: &'a GeoPolygon,
    #[serde(flatten)]
    pub options: &'a DetectionOptions,
}

/// Body of `POST /latest-image` and `POST /download-latest-image`.
#[derive(Debug, Serialize)]
pub(crate) struct ImageRequest<'a> {
    #[serde(rename = "plotId")]
    pub plot_id: &'a str,
    pub coordinates: &'a GeoPolygon,
}

/// Answer from `/detect-change`.
///
/// A populated `error` means the service could not produce a measurement,
/// whether the transport failed or the service reported a failure itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    #[serde(default)]
    pub change_detected: bool,
    #[serde(
        rename = "percentChange",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub percent_change: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    /// Hectares of changed area.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            change_detected: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Percent change, treating an omitted value as zero.
    pub fn percent_change_or_zero(&self) -> f64 {
        self.percent_change.unwrap_or(0.0)
    }
}

/// Answer from `/health-check`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Any extra fields the service reports.
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl HealthStatus {
    pub fn down(error: impl Into<String>) -> Self {
        Self {
            status: "down".into(),
            error: Some(error.into()),
            details: serde_json::Map::new(),
        }
    }

    pub fn is_down(&self) -> bool {
        self.status == "down"
    }
}

/// Normalized answer from `/latest-image`.
///
/// Serializes as `{"imageUrl": ...}` or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LatestImage {
    /// The service answered; `image_url` is `None` when no cloud-free image exists.
    Available {
        #[serde(rename = "imageUrl")]
        image_url: Option<String>,
    },
    /// The service could not be reached or answered with garbage.
    Unavailable { error: String },
}

/// Raw `/latest-image` payload. Deployments have used three names for the URL.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawLatestImage {
    #[serde(default)]
    pub best_thumbnail_url: Option<String>,
    #[serde(default, rename = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RawLatestImage {
    pub fn into_latest_image(self) -> LatestImage {
        let url = self.best_thumbnail_url.or(self.image_url).or(self.url);
        if url.is_none()
            && let Some(reason) = self.error
        {
            tracing::debug!(reason = %reason, "ML service reported no latest image");
        }
        LatestImage::Available { image_url: url }
    }
}

/// Result of `/download-latest-image`; the service either links or streams.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageDownload {
    Link { download_url: String },
    Bytes { content_type: String, bytes: Vec<u8> },
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawDownload {
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

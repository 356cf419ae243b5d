use ml_client::{DetectionOptions, HealthStatus, LatestImage};
use serde::{Deserialize, Serialize};

use super::alert::AlertResponse;
use super::shared::flexible_id;

/// Request body for on-demand change detection.
///
/// Omitted options fall back to the server's configured defaults.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ChangeDetectRequest {
    /// Plot to analyse; a number or numeric string.
    #[serde(rename = "plotId", deserialize_with = "flexible_id")]
    #[schema(value_type = i32, example = 7)]
    pub plot_id: i32,
    /// NDVI change threshold in [0, 1].
    #[schema(example = 0.2)]
    pub threshold: Option<f64>,
    /// Look-back window in days.
    #[schema(example = 20)]
    pub days: Option<u32>,
    pub relax_mask: Option<bool>,
    pub apply_mask: Option<bool>,
    /// `[[lat, lng], ...]` overriding the stored outline.
    #[schema(value_type = Option<Vec<Vec<f64>>>)]
    pub coordinates: Option<Vec<[f64; 2]>>,
}

impl ChangeDetectRequest {
    pub fn options(&self, defaults: DetectionOptions) -> DetectionOptions {
        DetectionOptions {
            threshold: self.threshold.unwrap_or(defaults.threshold),
            days: self.days.unwrap_or(defaults.days),
            relax_mask: self.relax_mask.unwrap_or(defaults.relax_mask),
            apply_mask: self.apply_mask.unwrap_or(defaults.apply_mask),
        }
    }
}

/// Result of on-demand change detection.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDetectResponse {
    /// Reported even when no alert was created.
    #[schema(example = 40.0)]
    pub percent_change: f64,
    pub alert: Option<AlertResponse>,
    #[schema(example = "Change detected: high severity alert created.")]
    pub message: String,
}

/// Identifies a plot for image lookups, optionally overriding its outline.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PlotImageRequest {
    #[serde(rename = "plotId", deserialize_with = "flexible_id")]
    #[schema(value_type = i32, example = 7)]
    pub plot_id: i32,
    #[serde(default)]
    #[schema(value_type = Option<Vec<Vec<f64>>>)]
    pub coordinates: Option<Vec<[f64; 2]>>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LatestImageQuery {
    #[serde(rename = "plotId", deserialize_with = "flexible_id")]
    #[param(value_type = i32)]
    pub plot_id: i32,
}

/// Health of the change-detection service, passed through as reported.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MlHealthResponse {
    /// `down` when the service could not be reached.
    #[schema(example = "ok")]
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Any further fields the service reported, at the top level.
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl From<HealthStatus> for MlHealthResponse {
    fn from(status: HealthStatus) -> Self {
        Self {
            status: status.status,
            error: status.error,
            details: status.details,
        }
    }
}

/// Most recent cloud-free thumbnail for a plot.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LatestImageResponse {
    /// `null` when no usable image exists or the lookup failed.
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    /// Present when the lookup failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<LatestImage> for LatestImageResponse {
    fn from(image: LatestImage) -> Self {
        match image {
            LatestImage::Available { image_url } => Self {
                image_url,
                error: None,
            },
            LatestImage::Unavailable { error } => Self {
                image_url: None,
                error: Some(error),
            },
        }
    }
}

/// Download pointer for the latest full-resolution image.
#[derive(Serialize, utoipa::ToSchema)]
pub struct DownloadLinkResponse {
    #[schema(example = "https://earthengine.googleapis.com/v1/.../thumbnails/...:getPixels")]
    pub download_url: String,
}

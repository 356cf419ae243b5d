use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::MlServiceConfig;
use crate::error::MlError;
use crate::geometry::GeoPolygon;
use crate::models::{
    DetectRequest, DetectionOptions, DetectionResult, HealthStatus, ImageDownload, ImageRequest,
    LatestImage, RawDownload, RawLatestImage,
};

/// Operations the server needs from a change-detection backend.
///
/// Implemented by [`MlClient`] over HTTP; tests substitute in-process fakes.
#[async_trait]
pub trait ChangeDetection: Send + Sync {
    /// Never fails; an unreachable service reports `status: "down"`.
    async fn health_check(&self) -> HealthStatus;

    /// Never fails; any failure is carried in [`DetectionResult::error`].
    async fn detect_change(
        &self,
        plot_id: &str,
        polygon: &GeoPolygon,
        options: &DetectionOptions,
    ) -> DetectionResult;

    /// Never fails; any failure is carried in [`LatestImage::Unavailable`].
    async fn latest_image(&self, plot_id: &str, polygon: &GeoPolygon) -> LatestImage;

    async fn download_latest_image(
        &self,
        plot_id: &str,
        polygon: &GeoPolygon,
    ) -> Result<ImageDownload, MlError>;
}

/// HTTP client for the change-detection service.
#[derive(Clone)]
pub struct MlClient {
    http: reqwest::Client,
    base_url: String,
    config: MlServiceConfig,
}

impl MlClient {
    pub fn new(config: &MlServiceConfig) -> Result<Self, MlError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| MlError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config: config.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> Result<reqwest::Response, MlError> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| MlError::from_reqwest(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> Result<T, MlError> {
        let response = self.send(request, timeout).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| MlError::from_reqwest(e, timeout))
    }

    async fn try_detect(
        &self,
        plot_id: &str,
        polygon: &GeoPolygon,
        options: &DetectionOptions,
    ) -> Result<DetectionResult, MlError> {
        options.validate()?;
        let body = DetectRequest {
            plot_id,
            coordinates: polygon,
            options,
        };
        let request = self.http.post(self.url("/detect-change")).json(&body);
        self.send_json(request, self.config.detect_timeout()).await
    }

    async fn try_download(
        &self,
        plot_id: &str,
        polygon: &GeoPolygon,
    ) -> Result<ImageDownload, MlError> {
        let timeout = self.config.download_timeout();
        let body = ImageRequest {
            plot_id,
            coordinates: polygon,
        };
        let request = self
            .http
            .post(self.url("/download-latest-image"))
            .json(&body);
        let response = self.send(request, timeout).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        if !content_type.starts_with("application/json") {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| MlError::from_reqwest(e, timeout))?;
            return Ok(ImageDownload::Bytes {
                content_type,
                bytes: bytes.to_vec(),
            });
        }

        let raw: RawDownload = response
            .json()
            .await
            .map_err(|e| MlError::from_reqwest(e, timeout))?;
        match (raw.download_url, raw.error) {
            (Some(download_url), _) => Ok(ImageDownload::Link { download_url }),
            (None, Some(error)) => Err(MlError::DownloadFailed(error)),
            (None, None) => Err(MlError::DownloadFailed(
                "response carried no download_url".into(),
            )),
        }
    }
}

#[async_trait]
impl ChangeDetection for MlClient {
    async fn health_check(&self) -> HealthStatus {
        let request = self.http.get(self.url("/health-check"));
        match self
            .send_json::<HealthStatus>(request, self.config.health_timeout())
            .await
        {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "ML service health check failed");
                HealthStatus::down(e.to_string())
            }
        }
    }

    async fn detect_change(
        &self,
        plot_id: &str,
        polygon: &GeoPolygon,
        options: &DetectionOptions,
    ) -> DetectionResult {
        match self.try_detect(plot_id, polygon, options).await {
            Ok(result) => {
                debug!(
                    plot_id,
                    change_detected = result.change_detected,
                    percent_change = ?result.percent_change,
                    "Change detection finished"
                );
                result
            }
            Err(e) => {
                warn!(plot_id, error = %e, "Change detection failed");
                DetectionResult::failed(e.to_string())
            }
        }
    }

    async fn latest_image(&self, plot_id: &str, polygon: &GeoPolygon) -> LatestImage {
        let body = ImageRequest {
            plot_id,
            coordinates: polygon,
        };
        let request = self.http.post(self.url("/latest-image")).json(&body);
        match self
            .send_json::<RawLatestImage>(request, self.config.image_timeout())
            .await
        {
            Ok(raw) => raw.into_latest_image(),
            Err(e) => {
                warn!(plot_id, error = %e, "Latest image lookup failed");
                LatestImage::Unavailable {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn download_latest_image(
        &self,
        plot_id: &str,
        polygon: &GeoPolygon,
    ) -> Result<ImageDownload, MlError> {
        self.try_download(plot_id, polygon).await.map_err(|e| {
            warn!(plot_id, error = %e, "Latest image download failed");
            match e {
                MlError::DownloadFailed(_) => e,
                other => MlError::DownloadFailed(other.to_string()),
            }
        })
    }
}

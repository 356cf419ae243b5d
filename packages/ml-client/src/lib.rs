//! Client for the external change-detection (ML) service.
//!
//! Health, detection and image lookup fold upstream failures into their
//! result types; only [`ChangeDetection::download_latest_image`] returns an
//! error, because a download has no meaningful empty answer.

pub mod client;
pub mod config;
pub mod error;
pub mod geometry;
pub mod models;

pub use client::{ChangeDetection, MlClient};
pub use config::MlServiceConfig;
pub use error::MlError;
pub use geometry::{GeoPolygon, LatLng, normalize};
pub use models::{DetectionOptions, DetectionResult, HealthStatus, ImageDownload, LatestImage};

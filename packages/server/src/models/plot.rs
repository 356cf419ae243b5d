use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{double_option, validate_name, validate_vertices};
use crate::entity::plot;
use crate::error::AppError;

/// Request body for creating a plot.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreatePlotRequest {
    #[schema(example = "North Field")]
    pub name: String,
    /// `[[lat, lng], ...]`, at least 3 vertices. Closing the ring is optional.
    #[schema(value_type = Vec<Vec<f64>>, example = json!([[-1.28, 36.81], [-1.28, 36.82], [-1.29, 36.82]]))]
    pub coordinates: Vec<[f64; 2]>,
    /// Hectares.
    #[serde(default)]
    pub area: Option<f64>,
}

pub fn validate_create_plot(payload: &CreatePlotRequest) -> Result<(), AppError> {
    validate_name(&payload.name, "Plot name")?;
    validate_vertices(&payload.coordinates)?;
    validate_area(payload.area)
}

/// Request body for updating a plot. The owner cannot be changed.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdatePlotRequest {
    pub name: Option<String>,
    #[schema(value_type = Option<Vec<Vec<f64>>>)]
    pub coordinates: Option<Vec<[f64; 2]>>,
    /// `null` clears the area.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<f64>)]
    pub area: Option<Option<f64>>,
}

pub fn validate_update_plot(payload: &UpdatePlotRequest) -> Result<(), AppError> {
    if let Some(name) = &payload.name {
        validate_name(name, "Plot name")?;
    }
    if let Some(coordinates) = &payload.coordinates {
        validate_vertices(coordinates)?;
    }
    if let Some(area) = payload.area {
        validate_area(area)?;
    }
    Ok(())
}

fn validate_area(area: Option<f64>) -> Result<(), AppError> {
    if let Some(area) = area
        && !(area.is_finite() && area >= 0.0)
    {
        return Err(AppError::Validation(
            "Area must be a non-negative number".into(),
        ));
    }
    Ok(())
}

/// A plot as returned by the API.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlotResponse {
    #[schema(example = 7)]
    pub id: i32,
    #[schema(example = "North Field")]
    pub name: String,
    /// `[[lat, lng], ...]` as stored.
    #[schema(value_type = Vec<Vec<f64>>)]
    pub coordinates: Vec<[f64; 2]>,
    pub area: Option<f64>,
    pub owner_id: i32,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Present in list responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_count: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlotResponse {
    pub fn from_model(plot: plot::Model, alert_count: Option<u64>) -> Self {
        // Rows are only written through validated requests.
        let coordinates = plot.vertices().unwrap_or_default();
        Self {
            id: plot.id,
            name: plot.name,
            coordinates,
            area: plot.area,
            owner_id: plot.owner_id,
            last_checked_at: plot.last_checked_at,
            alert_count,
            created_at: plot.created_at,
            updated_at: plot.updated_at,
        }
    }
}

use common::AlertSource;
use ml_client::{DetectionOptions, LatLng};
use sea_orm::EntityTrait;
use tracing::instrument;

use super::pipeline::{DetectionError, DetectionOutcome, DetectionPipeline, Disposition};
use crate::entity::plot;
use crate::state::AppState;

pub const MANUAL_DESCRIPTION: &str = "Manual detection run";

pub const MSG_NO_CHANGE: &str = "No significant change detected.";
pub const MSG_DUPLICATE: &str =
    "Duplicate alert suppressed; an identical alert was raised within the last 24 hours.";

/// A user's on-demand detection request.
#[derive(Debug, Clone)]
pub struct ManualDetection {
    pub plot_id: i32,
    pub requester_id: i32,
    /// Overrides the stored plot outline when present.
    pub coordinates: Option<Vec<LatLng>>,
    pub options: DetectionOptions,
}

/// Load the plot and check that `requester_id` owns it.
pub async fn authorize_plot(
    state: &AppState,
    plot_id: i32,
    requester_id: i32,
) -> Result<plot::Model, DetectionError> {
    let plot = plot::Entity::find_by_id(plot_id)
        .one(&state.db)
        .await?
        .ok_or(DetectionError::PlotNotFound(plot_id))?;
    if plot.owner_id != requester_id {
        return Err(DetectionError::Unauthorized(plot_id));
    }
    Ok(plot)
}

/// The stored outline, or the caller's override.
pub fn effective_vertices(
    plot: &plot::Model,
    coordinates: Option<Vec<LatLng>>,
) -> Result<Vec<LatLng>, DetectionError> {
    match coordinates {
        Some(vertices) => Ok(vertices),
        None => plot
            .vertices()
            .map_err(|e| DetectionError::Validation(format!("Stored plot outline is invalid: {e}"))),
    }
}

/// Run detection for one plot on behalf of its owner.
#[instrument(skip(state, request), fields(plot_id = request.plot_id, user_id = request.requester_id))]
pub async fn run_manual_detection(
    state: &AppState,
    request: ManualDetection,
) -> Result<DetectionOutcome, DetectionError> {
    request
        .options
        .validate()
        .map_err(|e| DetectionError::Validation(e.to_string()))?;

    let plot = authorize_plot(state, request.plot_id, request.requester_id).await?;
    let vertices = effective_vertices(&plot, request.coordinates)?;

    let pipeline = DetectionPipeline {
        db: &state.db,
        detector: state.detector.as_ref(),
        gate: &state.alert_gate,
    };
    pipeline
        .run(
            &plot,
            &vertices,
            &request.options,
            AlertSource::Manual,
            MANUAL_DESCRIPTION,
        )
        .await
}

/// User-facing summary of an outcome.
pub fn outcome_message(outcome: &DetectionOutcome) -> String {
    match &outcome.disposition {
        Disposition::BelowThreshold => MSG_NO_CHANGE.to_string(),
        Disposition::Duplicate => MSG_DUPLICATE.to_string(),
        Disposition::Created(alert) => {
            format!("Change detected: {} severity alert created.", alert.severity)
        }
    }
}

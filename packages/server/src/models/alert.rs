use chrono::{DateTime, Utc};
use common::{AlertSeverity, AlertSource, AlertStatus};
use serde::{Deserialize, Serialize};

use crate::detection::AlertFilter;
use crate::entity::{alert, plot};
use crate::error::AppError;

/// An alert as returned by the API.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlertResponse {
    #[schema(example = 31)]
    pub id: i32,
    #[schema(example = 7)]
    pub plot_id: i32,
    /// Present in cross-plot listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "North Field")]
    pub plot_name: Option<String>,
    pub detected_at: DateTime<Utc>,
    #[serde(rename = "type")]
    #[schema(example = "change")]
    pub alert_type: String,
    pub severity: AlertSeverity,
    #[schema(example = 40.0)]
    pub percent_change: f64,
    pub source: AlertSource,
    pub status: AlertStatus,
    #[schema(example = "Change Detection")]
    pub title: String,
    #[schema(example = "Manual detection run")]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<alert::Model> for AlertResponse {
    fn from(alert: alert::Model) -> Self {
        Self {
            id: alert.id,
            plot_id: alert.plot_id,
            plot_name: None,
            detected_at: alert.detected_at,
            alert_type: alert.alert_type,
            severity: alert.severity,
            percent_change: alert.percent_change,
            source: alert.source,
            status: alert.status,
            title: alert.title,
            description: alert.description,
            created_at: alert.created_at,
        }
    }
}

impl AlertResponse {
    pub fn with_plot(alert: alert::Model, plot: &plot::Model) -> Self {
        Self {
            plot_name: Some(plot.name.clone()),
            ..Self::from(alert)
        }
    }
}

/// Query parameters for listing alerts across the requester's plots.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListAlertsParams {
    /// `low`, `medium` or `high`.
    pub severity: Option<String>,
    /// `unread`, `acknowledged` or `resolved`.
    pub status: Option<String>,
    /// `manual` or `automated`.
    pub source: Option<String>,
}

impl ListAlertsParams {
    pub fn into_filter(self) -> Result<AlertFilter, AppError> {
        let invalid = |e: common::ParseAlertFieldError| AppError::Validation(e.to_string());
        Ok(AlertFilter {
            severity: self
                .severity
                .map(|s| s.parse::<AlertSeverity>())
                .transpose()
                .map_err(invalid)?,
            status: self
                .status
                .map(|s| s.parse::<AlertStatus>())
                .transpose()
                .map_err(invalid)?,
            source: self
                .source
                .map(|s| s.parse::<AlertSource>())
                .transpose()
                .map_err(invalid)?,
        })
    }
}

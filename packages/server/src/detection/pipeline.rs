use chrono::Utc;
use common::{AlertSeverity, AlertSource};
use ml_client::{ChangeDetection, DetectionOptions, LatLng, normalize};
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set, TransactionTrait};
use thiserror::Error;
use tracing::{debug, info};

use super::dedup::{AlertDeduplicator, AlertGate};
use super::repository::{AlertCandidate, AlertRepository, NewAlert};
use super::severity::classify;
use crate::entity::{alert, plot};

/// Alert type recorded when the service does not name one.
pub const DEFAULT_ALERT_TYPE: &str = "change";

pub const ALERT_TITLE: &str = "Change Detection";

/// Minimum vertex count for a detectable polygon.
pub const MIN_VERTICES: usize = 3;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Plot {0} not found")]
    PlotNotFound(i32),
    #[error("Plot {0} belongs to another user")]
    Unauthorized(i32),
    #[error("{0}")]
    Validation(String),
    #[error("Change detection failed: {0}")]
    Upstream(String),
    #[error(transparent)]
    Db(#[from] DbErr),
}

/// What happened after a successful detection call.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Percent change too small to classify.
    BelowThreshold,
    /// An identical alert already exists in the dedup window.
    Duplicate,
    Created(alert::Model),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOutcome {
    pub percent_change: f64,
    pub severity: Option<AlertSeverity>,
    pub disposition: Disposition,
}

impl DetectionOutcome {
    pub fn alert(&self) -> Option<&alert::Model> {
        match &self.disposition {
            Disposition::Created(alert) => Some(alert),
            _ => None,
        }
    }
}

/// Shared detect, classify, dedup and persist steps for both entry points.
pub struct DetectionPipeline<'a> {
    pub db: &'a DatabaseConnection,
    pub detector: &'a dyn ChangeDetection,
    pub gate: &'a AlertGate,
}

impl DetectionPipeline<'_> {
    /// Run detection for `plot` over `vertices` and record any new alert.
    ///
    /// Nothing is persisted when the service fails.
    pub async fn run(
        &self,
        plot: &plot::Model,
        vertices: &[LatLng],
        options: &DetectionOptions,
        source: AlertSource,
        description: &str,
    ) -> Result<DetectionOutcome, DetectionError> {
        if vertices.len() < MIN_VERTICES {
            return Err(DetectionError::Validation(format!(
                "A plot needs at least {MIN_VERTICES} coordinates for change detection"
            )));
        }
        let polygon = normalize(vertices);

        let result = self
            .detector
            .detect_change(&plot.id.to_string(), &polygon, options)
            .await;
        if let Some(error) = result.error {
            return Err(DetectionError::Upstream(error));
        }
        let detected_at = Utc::now();

        // Held from the stamp through the insert; a plot deleted while this
        // run waited shows up as PlotNotFound.
        let _guard = self.gate.lock(plot.id).await;
        self.touch_last_checked(plot).await?;

        let percent_change = result.percent_change.unwrap_or(0.0);
        let Some(severity) = classify(percent_change) else {
            debug!(plot_id = plot.id, percent_change, "No significant change");
            return Ok(DetectionOutcome {
                percent_change,
                severity: None,
                disposition: Disposition::BelowThreshold,
            });
        };

        let candidate = AlertCandidate {
            plot_id: plot.id,
            alert_type: result
                .change_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ALERT_TYPE.to_string()),
            severity,
            percent_change,
            source,
        };

        let disposition = self
            .record(candidate, detected_at, description.to_string())
            .await?;

        Ok(DetectionOutcome {
            percent_change,
            severity: Some(severity),
            disposition,
        })
    }

    /// Dedup-check and insert in one transaction. Callers hold the plot's gate.
    async fn record(
        &self,
        candidate: AlertCandidate,
        detected_at: chrono::DateTime<Utc>,
        description: String,
    ) -> Result<Disposition, DbErr> {
        let txn = self.db.begin().await?;

        if !AlertDeduplicator::new(&txn)
            .should_create(&candidate, Utc::now())
            .await?
        {
            txn.rollback().await?;
            info!(
                plot_id = candidate.plot_id,
                severity = %candidate.severity,
                source = %candidate.source,
                "Duplicate alert suppressed"
            );
            return Ok(Disposition::Duplicate);
        }

        let alert = AlertRepository::new(&txn)
            .create(NewAlert {
                candidate,
                detected_at,
                title: ALERT_TITLE.to_string(),
                description,
            })
            .await?;
        txn.commit().await?;

        info!(
            alert_id = alert.id,
            plot_id = alert.plot_id,
            severity = %alert.severity,
            percent_change = alert.percent_change,
            "Alert created"
        );
        Ok(Disposition::Created(alert))
    }

    async fn touch_last_checked(&self, plot: &plot::Model) -> Result<(), DetectionError> {
        let mut active: plot::ActiveModel = plot.clone().into();
        active.last_checked_at = Set(Some(Utc::now()));
        match active.update(self.db).await {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => Err(DetectionError::PlotNotFound(plot.id)),
            Err(e) => Err(e.into()),
        }
    }
}

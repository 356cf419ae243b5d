use std::sync::Arc;

use common::AlertSource;
use futures::StreamExt;
use ml_client::{ChangeDetection, DetectionOptions};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::dedup::AlertGate;
use super::pipeline::{DetectionError, DetectionPipeline, Disposition};
use crate::entity::{alert, plot, user};
use crate::notify::{Notifier, alert_email, sweep_failure_email};
use crate::state::AppState;

pub const AUTOMATED_DESCRIPTION: &str = "Automated daily detection";

/// Dependencies of an unattended sweep.
#[derive(Clone)]
pub struct SweepContext {
    pub db: DatabaseConnection,
    pub detector: Arc<dyn ChangeDetection>,
    pub notifier: Arc<dyn Notifier>,
    pub gate: AlertGate,
    pub options: DetectionOptions,
    pub operator_email: String,
    /// Plots in flight at once; 1 processes them in id order.
    pub concurrency: usize,
}

impl SweepContext {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            detector: state.detector.clone(),
            notifier: state.notifier.clone(),
            gate: state.alert_gate.clone(),
            options: state.config.detection,
            operator_email: state.config.notification.operator_email.clone(),
            concurrency: state.config.sweep.concurrency.max(1),
        }
    }
}

/// Per-plot result of a sweep.
#[derive(Debug)]
enum PlotResult {
    Quiet,
    Duplicate,
    Alerted,
    Failed,
    Skipped,
}

/// Tally of one sweep, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub processed: usize,
    pub alerts_created: usize,
    pub duplicates: usize,
    /// Plots whose processing failed, in completion order.
    pub failed: Vec<i32>,
    /// Plots left untouched because the sweep was cancelled.
    pub skipped: usize,
}

/// Run detection over every stored plot.
///
/// A failing plot is logged and reported to the operator, then the sweep
/// moves on. Cancellation is observed between plots.
pub async fn run_sweep(ctx: &SweepContext, cancel: &CancellationToken) -> SweepReport {
    let plots = match plot::Entity::find()
        .order_by_asc(plot::Column::Id)
        .all(&ctx.db)
        .await
    {
        Ok(plots) => plots,
        Err(e) => {
            error!(error = %e, "Sweep could not load plots");
            return SweepReport::default();
        }
    };

    info!(plots = plots.len(), concurrency = ctx.concurrency, "Starting detection sweep");

    let results: Vec<(i32, PlotResult)> = futures::stream::iter(plots)
        .map(|plot| async move {
            if cancel.is_cancelled() {
                return (plot.id, PlotResult::Skipped);
            }
            let id = plot.id;
            (id, process_plot(ctx, plot).await)
        })
        .buffer_unordered(ctx.concurrency.max(1))
        .collect()
        .await;

    let mut report = SweepReport::default();
    for (plot_id, result) in results {
        match result {
            PlotResult::Quiet => report.processed += 1,
            PlotResult::Duplicate => {
                report.processed += 1;
                report.duplicates += 1;
            }
            PlotResult::Alerted => {
                report.processed += 1;
                report.alerts_created += 1;
            }
            PlotResult::Failed => report.failed.push(plot_id),
            PlotResult::Skipped => report.skipped += 1,
        }
    }

    info!(
        processed = report.processed,
        alerts_created = report.alerts_created,
        duplicates = report.duplicates,
        failed = report.failed.len(),
        skipped = report.skipped,
        "Detection sweep finished"
    );
    report
}

async fn process_plot(ctx: &SweepContext, plot: plot::Model) -> PlotResult {
    match detect_for_plot(ctx, &plot).await {
        Ok(Disposition::BelowThreshold) => PlotResult::Quiet,
        Ok(Disposition::Duplicate) => PlotResult::Duplicate,
        Ok(Disposition::Created(alert)) => {
            notify_owner(ctx, &plot, &alert).await;
            PlotResult::Alerted
        }
        Err(DetectionError::PlotNotFound(id)) => {
            info!(plot_id = id, "Plot deleted during sweep, skipped");
            PlotResult::Skipped
        }
        Err(e) => {
            error!(plot_id = plot.id, error = %e, "Sweep failed for plot");
            notify_operator(ctx, &plot, &e).await;
            PlotResult::Failed
        }
    }
}

async fn detect_for_plot(
    ctx: &SweepContext,
    plot: &plot::Model,
) -> Result<Disposition, DetectionError> {
    let vertices = plot
        .vertices()
        .map_err(|e| DetectionError::Validation(format!("Stored plot outline is invalid: {e}")))?;

    let pipeline = DetectionPipeline {
        db: &ctx.db,
        detector: ctx.detector.as_ref(),
        gate: &ctx.gate,
    };
    let outcome = pipeline
        .run(
            plot,
            &vertices,
            &ctx.options,
            AlertSource::Automated,
            AUTOMATED_DESCRIPTION,
        )
        .await?;
    Ok(outcome.disposition)
}

/// Email the owner; a send failure is logged and the alert stays.
async fn notify_owner(ctx: &SweepContext, plot: &plot::Model, alert: &alert::Model) {
    let owner = match user::Entity::find_by_id(plot.owner_id).one(&ctx.db).await {
        Ok(Some(owner)) => owner,
        Ok(None) => {
            warn!(plot_id = plot.id, owner_id = plot.owner_id, "Plot owner missing, alert email skipped");
            return;
        }
        Err(e) => {
            warn!(plot_id = plot.id, error = %e, "Failed to load plot owner, alert email skipped");
            return;
        }
    };

    let message = alert_email(&owner.email, &plot.name, alert.severity, alert.percent_change);
    if let Err(e) = ctx.notifier.send(message).await {
        warn!(plot_id = plot.id, alert_id = alert.id, error = %e, "Failed to email alert to owner");
    }
}

async fn notify_operator(ctx: &SweepContext, plot: &plot::Model, err: &DetectionError) {
    let message = sweep_failure_email(&ctx.operator_email, plot.id, &plot.name, &err.to_string());
    if let Err(e) = ctx.notifier.send(message).await {
        warn!(plot_id = plot.id, error = %e, "Failed to notify operator of sweep failure");
    }
}

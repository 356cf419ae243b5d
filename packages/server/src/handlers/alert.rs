use axum::Json;
use axum::extract::{Path, Query, State};
use common::AlertStatus;
use sea_orm::*;
use tracing::instrument;

use super::plot::find_owned_plot;
use crate::detection::{AlertRepository, StatusChange};
use crate::entity::plot;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::alert::{AlertResponse, ListAlertsParams};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/alerts",
    tag = "Alerts",
    operation_id = "listAlerts",
    summary = "List alerts across your plots",
    description = "Returns alerts on every plot the caller owns, newest first. Each item carries the plot name.",
    params(ListAlertsParams),
    responses(
        (status = 200, description = "Alerts", body = Vec<AlertResponse>),
        (status = 400, description = "Unknown filter value (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn list_alerts(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ListAlertsParams>,
) -> Result<Json<Vec<AlertResponse>>, AppError> {
    let filter = params.into_filter()?;

    let plot_ids: Vec<i32> = plot::Entity::find()
        .select_only()
        .column(plot::Column::Id)
        .filter(plot::Column::OwnerId.eq(auth_user.user_id))
        .into_tuple()
        .all(&state.db)
        .await?;

    let rows = AlertRepository::new(&state.db)
        .list_for_plots(&plot_ids, &filter)
        .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(alert, plot)| AlertResponse::with_plot(alert, &plot))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/plots/{id}/alerts",
    tag = "Alerts",
    operation_id = "listPlotAlerts",
    summary = "List alerts on one plot",
    params(("id" = i32, Path, description = "Plot ID")),
    responses(
        (status = 200, description = "Alerts, newest first", body = Vec<AlertResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Plot not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn list_plot_alerts(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<AlertResponse>>, AppError> {
    let plot = find_owned_plot(&state.db, id, auth_user.user_id).await?;
    let alerts = AlertRepository::new(&state.db)
        .list_for_plot(plot.id)
        .await?;
    Ok(Json(alerts.into_iter().map(AlertResponse::from).collect()))
}

/// Apply a lifecycle step to an alert on one of the caller's plots.
async fn change_status(
    state: &AppState,
    auth_user: &AuthUser,
    alert_id: i32,
    status: AlertStatus,
) -> Result<AlertResponse, AppError> {
    let not_found = || AppError::NotFound(format!("Alert {alert_id} not found"));
    let repo = AlertRepository::new(&state.db);

    let alert = repo.find_by_id(alert_id).await?.ok_or_else(not_found)?;
    find_owned_plot(&state.db, alert.plot_id, auth_user.user_id)
        .await
        .map_err(|_| not_found())?;

    match repo.set_status(alert_id, status).await? {
        StatusChange::Updated(model) => {
            tracing::info!(alert_id, status = %status, "Alert status changed");
            Ok(model.into())
        }
        StatusChange::Unchanged(model) => Ok(model.into()),
        StatusChange::Rejected { current } => Err(AppError::Conflict(format!(
            "Alert is already {current} and cannot move back to {status}"
        ))),
        StatusChange::NotFound => Err(not_found()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/alerts/{id}/acknowledge",
    tag = "Alerts",
    operation_id = "acknowledgeAlert",
    summary = "Acknowledge an alert",
    description = "Moves an unread alert to `acknowledged`. Acknowledging twice is a no-op.",
    params(("id" = i32, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Alert", body = AlertResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Alert not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Alert already resolved (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn acknowledge_alert(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<AlertResponse>, AppError> {
    change_status(&state, &auth_user, id, AlertStatus::Acknowledged)
        .await
        .map(Json)
}

#[utoipa::path(
    post,
    path = "/api/v1/alerts/{id}/resolve",
    tag = "Alerts",
    operation_id = "resolveAlert",
    summary = "Resolve an alert",
    description = "Moves an unread or acknowledged alert to `resolved`.",
    params(("id" = i32, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Alert", body = AlertResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Alert not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn resolve_alert(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<AlertResponse>, AppError> {
    change_status(&state, &auth_user, id, AlertStatus::Resolved)
        .await
        .map(Json)
}

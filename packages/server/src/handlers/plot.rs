use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::storage::BlobLocator;
use sea_orm::*;
use tracing::instrument;

use crate::detection::AlertRepository;
use crate::entity::{alert, document, plot};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::plot::*;
use crate::state::AppState;

/// Load a plot owned by `user_id`. Someone else's plot reads as missing.
pub(crate) async fn find_owned_plot<C: ConnectionTrait>(
    db: &C,
    plot_id: i32,
    user_id: i32,
) -> Result<plot::Model, AppError> {
    plot::Entity::find_by_id(plot_id)
        .filter(plot::Column::OwnerId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Plot {plot_id} not found")))
}

fn to_json(vertices: &[[f64; 2]]) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(vertices).map_err(|e| AppError::Internal(format!("Encode outline: {e}")))
}

#[utoipa::path(
    get,
    path = "/api/v1/plots",
    tag = "Plots",
    operation_id = "listPlots",
    summary = "List your plots",
    description = "Returns every plot owned by the caller, oldest first, with the number of alerts recorded on each.",
    responses(
        (status = 200, description = "Owned plots", body = Vec<PlotResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn list_plots(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PlotResponse>>, AppError> {
    let plots = plot::Entity::find()
        .filter(plot::Column::OwnerId.eq(auth_user.user_id))
        .order_by_asc(plot::Column::Id)
        .all(&state.db)
        .await?;

    let ids: Vec<i32> = plots.iter().map(|p| p.id).collect();
    let counts: HashMap<i32, i64> = if ids.is_empty() {
        HashMap::new()
    } else {
        alert::Entity::find()
            .select_only()
            .column(alert::Column::PlotId)
            .column_as(alert::Column::Id.count(), "alert_count")
            .filter(alert::Column::PlotId.is_in(ids))
            .group_by(alert::Column::PlotId)
            .into_tuple::<(i32, i64)>()
            .all(&state.db)
            .await?
            .into_iter()
            .collect()
    };

    let data = plots
        .into_iter()
        .map(|p| {
            let count = Ord::max(counts.get(&p.id).copied().unwrap_or(0), 0) as u64;
            PlotResponse::from_model(p, Some(count))
        })
        .collect();
    Ok(Json(data))
}

#[utoipa::path(
    post,
    path = "/api/v1/plots",
    tag = "Plots",
    operation_id = "createPlot",
    summary = "Register a plot",
    request_body = CreatePlotRequest,
    responses(
        (status = 201, description = "Plot created", body = PlotResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, name = %payload.name))]
pub async fn create_plot(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreatePlotRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_plot(&payload)?;

    let now = chrono::Utc::now();
    let model = plot::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        coordinates: Set(to_json(&payload.coordinates)?),
        area: Set(payload.area),
        last_checked_at: Set(None),
        owner_id: Set(auth_user.user_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(PlotResponse::from_model(model, None)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/plots/{id}",
    tag = "Plots",
    operation_id = "getPlot",
    summary = "Get a plot",
    params(("id" = i32, Path, description = "Plot ID")),
    responses(
        (status = 200, description = "Plot", body = PlotResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Plot not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn get_plot(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<PlotResponse>, AppError> {
    let plot = find_owned_plot(&state.db, id, auth_user.user_id).await?;
    Ok(Json(PlotResponse::from_model(plot, None)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/plots/{id}",
    tag = "Plots",
    operation_id = "updatePlot",
    summary = "Update a plot",
    description = "Partially updates name, outline or area. Sending `area: null` clears it.",
    params(("id" = i32, Path, description = "Plot ID")),
    request_body = UpdatePlotRequest,
    responses(
        (status = 200, description = "Plot updated", body = PlotResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Plot not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn update_plot(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdatePlotRequest>,
) -> Result<Json<PlotResponse>, AppError> {
    validate_update_plot(&payload)?;

    let existing = find_owned_plot(&state.db, id, auth_user.user_id).await?;
    let mut active: plot::ActiveModel = existing.into();

    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(coordinates) = payload.coordinates {
        active.coordinates = Set(to_json(&coordinates)?);
    }
    if let Some(area) = payload.area {
        active.area = Set(area);
    }
    active.updated_at = Set(chrono::Utc::now());

    let model = active.update(&state.db).await?;
    Ok(Json(PlotResponse::from_model(model, None)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/plots/{id}",
    tag = "Plots",
    operation_id = "deletePlot",
    summary = "Delete a plot",
    description = "Deletes the plot together with its alerts and documents.",
    params(("id" = i32, Path, description = "Plot ID")),
    responses(
        (status = 204, description = "Plot deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Plot not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn delete_plot(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    // Detections queued on the gate find the plot gone once it is released.
    let guard = state.alert_gate.lock(id).await;

    let txn = state.db.begin().await?;
    let plot = find_owned_plot(&txn, id, auth_user.user_id).await?;

    let documents = document::Entity::find()
        .filter(document::Column::PlotId.eq(plot.id))
        .all(&txn)
        .await?;

    let alerts_deleted = AlertRepository::new(&txn).delete_for_plot(plot.id).await?;
    document::Entity::delete_many()
        .filter(document::Column::PlotId.eq(plot.id))
        .exec(&txn)
        .await?;
    plot::Entity::delete_by_id(plot.id).exec(&txn).await?;
    txn.commit().await?;

    for doc in &documents {
        remove_blob(&state, &doc.storage_key).await;
    }
    drop(guard);
    state.alert_gate.forget(id);

    tracing::info!(
        plot_id = id,
        alerts_deleted,
        documents_deleted = documents.len(),
        "Plot deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a stored document body, logging instead of failing.
pub(crate) async fn remove_blob(state: &AppState, storage_key: &str) {
    let result = match BlobLocator::parse(storage_key) {
        Ok(locator) => state.blob_store.delete(&locator).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::warn!(storage_key, error = %e, "Failed to delete document blob");
    }
}

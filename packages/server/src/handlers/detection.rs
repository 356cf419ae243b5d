use axum::Json;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use ml_client::{GeoPolygon, ImageDownload, LatLng, normalize};
use tracing::instrument;

use crate::detection::manual::{
    ManualDetection, authorize_plot, effective_vertices, outcome_message, run_manual_detection,
};
use crate::detection::pipeline::MIN_VERTICES;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::alert::AlertResponse;
use crate::models::detection::*;
use crate::models::shared::validate_vertices;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/ml/health-check",
    tag = "Detection",
    operation_id = "mlHealth",
    summary = "Change-detection service health",
    description = "Always answers 200; `status` is `down` when the service cannot be reached.",
    responses(
        (status = 200, description = "Service health", body = MlHealthResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user))]
pub async fn ml_health(
    _auth_user: AuthUser,
    State(state): State<AppState>,
) -> Json<MlHealthResponse> {
    Json(state.detector.health_check().await.into())
}

#[utoipa::path(
    post,
    path = "/api/v1/ml/change-detect",
    tag = "Detection",
    operation_id = "changeDetect",
    summary = "Run change detection on a plot",
    description = "Runs detection now and records a `manual` alert when the change is significant. \
        An identical alert raised in the last 24 hours is not repeated; the measured change is still returned.",
    request_body = ChangeDetectRequest,
    responses(
        (status = 200, description = "Detection finished", body = ChangeDetectResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Plot belongs to another user (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Plot not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Detection service failed (UPSTREAM_UNAVAILABLE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, plot_id = payload.plot_id))]
pub async fn change_detect(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ChangeDetectRequest>,
) -> Result<Json<ChangeDetectResponse>, AppError> {
    if let Some(coordinates) = &payload.coordinates {
        validate_vertices(coordinates)?;
    }
    let options = payload.options(state.config.detection);

    let outcome = run_manual_detection(
        &state,
        ManualDetection {
            plot_id: payload.plot_id,
            requester_id: auth_user.user_id,
            coordinates: payload.coordinates,
            options,
        },
    )
    .await?;

    let message = outcome_message(&outcome);
    Ok(Json(ChangeDetectResponse {
        percent_change: outcome.percent_change,
        alert: outcome.alert().cloned().map(AlertResponse::from),
        message,
    }))
}

/// Resolve the polygon to send upstream for an owned plot.
async fn plot_polygon(
    state: &AppState,
    auth_user: &AuthUser,
    plot_id: i32,
    coordinates: Option<Vec<LatLng>>,
) -> Result<GeoPolygon, AppError> {
    if let Some(coordinates) = &coordinates {
        validate_vertices(coordinates)?;
    }
    let plot = authorize_plot(state, plot_id, auth_user.user_id).await?;
    let vertices = effective_vertices(&plot, coordinates)?;
    if vertices.len() < MIN_VERTICES {
        return Err(AppError::Validation(
            "A plot needs at least 3 coordinates".into(),
        ));
    }
    Ok(normalize(&vertices))
}

async fn latest_image(
    state: &AppState,
    auth_user: &AuthUser,
    request: PlotImageRequest,
) -> Result<LatestImageResponse, AppError> {
    let polygon = plot_polygon(state, auth_user, request.plot_id, request.coordinates).await?;
    let image = state
        .detector
        .latest_image(&request.plot_id.to_string(), &polygon)
        .await;
    Ok(image.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/ml/latest-image",
    tag = "Detection",
    operation_id = "getLatestImage",
    summary = "Latest thumbnail for a stored plot",
    description = "`imageUrl` is null when no cloud-free image exists; `error` is set when the lookup failed.",
    params(LatestImageQuery),
    responses(
        (status = 200, description = "Latest image", body = LatestImageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Plot belongs to another user (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Plot not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn get_latest_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<LatestImageQuery>,
) -> Result<Json<LatestImageResponse>, AppError> {
    let request = PlotImageRequest {
        plot_id: query.plot_id,
        coordinates: None,
    };
    latest_image(&state, &auth_user, request).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/api/v1/ml/latest-image",
    tag = "Detection",
    operation_id = "postLatestImage",
    summary = "Latest thumbnail, optionally for an edited outline",
    request_body = PlotImageRequest,
    responses(
        (status = 200, description = "Latest image", body = LatestImageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Plot belongs to another user (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Plot not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, plot_id = payload.plot_id))]
pub async fn post_latest_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<PlotImageRequest>,
) -> Result<Json<LatestImageResponse>, AppError> {
    latest_image(&state, &auth_user, payload).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/api/v1/ml/download-latest-image",
    tag = "Detection",
    operation_id = "downloadLatestImage",
    summary = "Full-resolution latest image",
    description = "Answers with `{\"download_url\": ...}` when the service links to the image, \
        or with the image bytes when it sends them directly.",
    request_body = PlotImageRequest,
    responses(
        (status = 200, description = "Download link or image bytes", body = DownloadLinkResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Plot belongs to another user (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Plot not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Download failed (UPSTREAM_UNAVAILABLE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, plot_id = payload.plot_id))]
pub async fn download_latest_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<PlotImageRequest>,
) -> Result<Response, AppError> {
    let polygon = plot_polygon(&state, &auth_user, payload.plot_id, payload.coordinates).await?;

    let download = state
        .detector
        .download_latest_image(&payload.plot_id.to_string(), &polygon)
        .await
        .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;

    match download {
        ImageDownload::Link { download_url } => {
            Ok(Json(DownloadLinkResponse { download_url }).into_response())
        }
        ImageDownload::Bytes {
            content_type,
            bytes,
        } => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, bytes.len())
            .body(Body::from(bytes))
            .map_err(|e| AppError::Internal(format!("Failed to build response: {e}"))),
    }
}

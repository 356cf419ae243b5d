use axum::Json;
use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use common::storage::BlobLocator;
use sea_orm::*;
use tokio_util::io::ReaderStream;
use tracing::instrument;

use super::plot::{find_owned_plot, remove_blob};
use crate::entity::{document, plot};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::document::{DEFAULT_DOCUMENT_TYPE, DocumentResponse};
use crate::models::shared::validate_name;
use crate::state::AppState;
use crate::utils::filename::{
    attachment_disposition, resolve_content_type, validate_document_filename,
};

/// Room for the multipart envelope and text fields around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn document_upload_body_limit(max_upload_size: u64) -> DefaultBodyLimit {
    let max = usize::try_from(max_upload_size).unwrap_or(usize::MAX);
    DefaultBodyLimit::max(max.saturating_add(MULTIPART_OVERHEAD))
}

struct UploadedFile {
    filename: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

async fn read_file_field(mut field: Field<'_>, max_size: u64) -> Result<UploadedFile, AppError> {
    let filename = field.file_name().map(str::to_string);
    let content_type = field.content_type().map(str::to_string);

    let mut bytes = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?
    {
        if (bytes.len() + chunk.len()) as u64 > max_size {
            return Err(AppError::Validation(format!(
                "File exceeds the {max_size} byte upload limit"
            )));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(UploadedFile {
        filename,
        content_type,
        bytes,
    })
}

async fn read_text_field(field: Field<'_>, name: &str) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read '{name}': {e}")))
}

/// Load a document on one of `user_id`'s plots.
async fn find_owned_document(
    db: &DatabaseConnection,
    document_id: i32,
    user_id: i32,
) -> Result<document::Model, AppError> {
    let not_found = || AppError::NotFound(format!("Document {document_id} not found"));
    let doc = document::Entity::find_by_id(document_id)
        .one(db)
        .await?
        .ok_or_else(not_found)?;
    find_owned_plot(db, doc.plot_id, user_id)
        .await
        .map_err(|_| not_found())?;
    Ok(doc)
}

#[utoipa::path(
    post,
    path = "/api/v1/documents",
    tag = "Documents",
    operation_id = "uploadDocument",
    summary = "Upload a document for a plot",
    description = "Multipart fields: `file` (required), `plotId` (required), `type` (defaults to `other`) \
        and `description`. The filename must be flat: no path separators, `..`, control characters or leading dot.",
    request_body(content_type = "multipart/form-data", description = "Document file with its plot and tags"),
    responses(
        (status = 201, description = "Document stored", body = DocumentResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Plot not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = auth_user.user_id, plot_id))]
pub async fn upload_document(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<UploadedFile> = None;
    let mut plot_id: Option<String> = None;
    let mut doc_type: Option<String> = None;
    let mut description: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        match field.name() {
            Some("file") => {
                file = Some(read_file_field(field, state.config.storage.max_upload_size).await?);
            }
            Some("plotId") => plot_id = Some(read_text_field(field, "plotId").await?),
            Some("type") => doc_type = Some(read_text_field(field, "type").await?),
            Some("description") => {
                description = Some(read_text_field(field, "description").await?)
            }
            _ => {}
        }
    }

    let plot_id: i32 = plot_id
        .ok_or_else(|| AppError::Validation("Missing 'plotId' field".into()))?
        .trim()
        .parse()
        .map_err(|_| AppError::Validation("'plotId' must be a number".into()))?;
    tracing::Span::current().record("plot_id", plot_id);

    let file = file.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;
    let filename = file
        .filename
        .as_deref()
        .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;
    let filename = validate_document_filename(filename)
        .map_err(|e| AppError::Validation(e.to_string()))?
        .to_string();

    let doc_type = match doc_type.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => {
            validate_name(t, "Document type")?;
            t.to_string()
        }
        _ => DEFAULT_DOCUMENT_TYPE.to_string(),
    };
    let description = description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let plot = find_owned_plot(&state.db, plot_id, auth_user.user_id).await?;

    let content_type = resolve_content_type(&filename, file.content_type.as_deref());
    let stored = state.blob_store.put(&file.bytes).await?;

    let inserted = document::ActiveModel {
        plot_id: Set(plot.id),
        uploaded_by: Set(auth_user.user_id),
        filename: Set(filename),
        storage_key: Set(stored.locator.as_str().to_string()),
        content_type: Set(content_type),
        size: Set(i64::try_from(stored.size).unwrap_or(i64::MAX)),
        sha256: Set(stored.sha256),
        doc_type: Set(doc_type),
        description: Set(description),
        uploaded_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await;

    let model = match inserted {
        Ok(model) => model,
        Err(e) => {
            remove_blob(&state, stored.locator.as_str()).await;
            return Err(e.into());
        }
    };

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/api/v1/documents",
    tag = "Documents",
    operation_id = "listDocuments",
    summary = "List documents across your plots",
    responses(
        (status = 200, description = "Documents, newest first", body = Vec<DocumentResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn list_documents(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    let plot_ids: Vec<i32> = plot::Entity::find()
        .select_only()
        .column(plot::Column::Id)
        .filter(plot::Column::OwnerId.eq(auth_user.user_id))
        .into_tuple()
        .all(&state.db)
        .await?;
    if plot_ids.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let docs = document::Entity::find()
        .filter(document::Column::PlotId.is_in(plot_ids))
        .order_by_desc(document::Column::UploadedAt)
        .order_by_desc(document::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(docs.into_iter().map(DocumentResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/plots/{id}/documents",
    tag = "Documents",
    operation_id = "listPlotDocuments",
    summary = "List documents on one plot",
    params(("id" = i32, Path, description = "Plot ID")),
    responses(
        (status = 200, description = "Documents, newest first", body = Vec<DocumentResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Plot not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn list_plot_documents(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    let plot = find_owned_plot(&state.db, id, auth_user.user_id).await?;
    let docs = document::Entity::find()
        .filter(document::Column::PlotId.eq(plot.id))
        .order_by_desc(document::Column::UploadedAt)
        .order_by_desc(document::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(docs.into_iter().map(DocumentResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/documents/{id}/content",
    tag = "Documents",
    operation_id = "downloadDocument",
    summary = "Download a document",
    description = "Streams the stored bytes with the recorded content type.",
    params(("id" = i32, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document bytes with the stored content type"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Document not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn download_document(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    let doc = find_owned_document(&state.db, id, auth_user.user_id).await?;

    let locator = BlobLocator::parse(&doc.storage_key)?;
    let reader = state.blob_store.open(&locator).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &doc.content_type)
        .header(header::CONTENT_LENGTH, doc.size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&doc.filename),
        )
        .header(header::CACHE_CONTROL, "private, no-store")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

#[utoipa::path(
    delete,
    path = "/api/v1/documents/{id}",
    tag = "Documents",
    operation_id = "deleteDocument",
    summary = "Delete a document",
    params(("id" = i32, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Document not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn delete_document(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let doc = find_owned_document(&state.db, id, auth_user.user_id).await?;
    document::Entity::delete_by_id(doc.id)
        .exec(&state.db)
        .await?;
    remove_blob(&state, &doc.storage_key).await;
    Ok(StatusCode::NO_CONTENT)
}

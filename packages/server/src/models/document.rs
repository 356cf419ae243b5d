use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entity::document;

/// Tag applied when the upload does not specify one.
pub const DEFAULT_DOCUMENT_TYPE: &str = "other";

/// Document metadata as returned by the API.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    #[schema(example = 3)]
    pub id: i32,
    #[schema(example = 7)]
    pub plot_id: i32,
    pub uploaded_by: i32,
    #[schema(example = "title-deed.pdf")]
    pub filename: String,
    #[schema(example = "application/pdf")]
    pub content_type: String,
    #[schema(example = 482133)]
    pub size: i64,
    pub sha256: String,
    #[serde(rename = "type")]
    #[schema(example = "title_deed")]
    pub doc_type: String,
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<document::Model> for DocumentResponse {
    fn from(doc: document::Model) -> Self {
        Self {
            id: doc.id,
            plot_id: doc.plot_id,
            uploaded_by: doc.uploaded_by,
            filename: doc.filename,
            content_type: doc.content_type,
            size: doc.size,
            sha256: doc.sha256,
            doc_type: doc.doc_type,
            description: doc.description,
            uploaded_at: doc.uploaded_at,
        }
    }
}

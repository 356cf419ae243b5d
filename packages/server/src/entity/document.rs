use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "document")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub plot_id: i32,
    #[sea_orm(belongs_to, from = "plot_id", to = "id")]
    pub plot: HasOne<super::plot::Entity>,

    pub uploaded_by: i32,
    #[sea_orm(belongs_to, from = "uploaded_by", to = "id")]
    pub uploader: HasOne<super::user::Entity>,

    /// Original client filename, validated flat.
    pub filename: String,
    /// Blob store locator.
    pub storage_key: String,
    pub content_type: String,
    pub size: i64,
    /// Lowercase hex SHA-256 of the stored bytes.
    pub sha256: String,
    /// Free-form tag such as "title_deed" or "survey".
    pub doc_type: String,
    pub description: Option<String>,

    pub uploaded_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

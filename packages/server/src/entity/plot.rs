use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "plot")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    /// `[[lat, lng], ...]` as drawn on the map; the ring is not necessarily closed.
    #[sea_orm(column_type = "JsonBinary")]
    pub coordinates: Json,
    /// Hectares, as reported by the client.
    pub area: Option<f64>,
    /// Last successful change-detection call for this plot.
    pub last_checked_at: Option<DateTimeUtc>,

    /// Fixed at creation.
    pub owner_id: i32,
    #[sea_orm(belongs_to, from = "owner_id", to = "id")]
    pub owner: HasOne<super::user::Entity>,

    #[sea_orm(has_many)]
    pub alerts: HasMany<super::alert::Entity>,

    #[sea_orm(has_many)]
    pub documents: HasMany<super::document::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decode the stored vertex list.
    pub fn vertices(&self) -> Result<Vec<[f64; 2]>, serde_json::Error> {
        serde_json::from_value(self.coordinates.clone())
    }
}

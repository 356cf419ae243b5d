use common::{AlertSeverity, AlertSource, AlertStatus};
use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "alert")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub plot_id: i32,
    #[sea_orm(belongs_to, from = "plot_id", to = "id")]
    pub plot: HasOne<super::plot::Entity>,

    pub detected_at: DateTimeUtc,
    /// Free-form upstream classification, e.g. "change" or "vegetation_loss".
    pub alert_type: String,
    pub severity: AlertSeverity,
    /// 0 when the service omitted it.
    pub percent_change: f64,
    pub source: AlertSource,
    pub status: AlertStatus,
    pub title: String,
    pub description: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

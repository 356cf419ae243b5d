use std::time::Duration;

use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::info;

use crate::entity::{alert, document, plot};

pub async fn connect(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);

    Database::connect(opt).await
}

/// Create or update tables for every entity.
pub async fn sync_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.get_schema_registry("landwatch_server::entity::*")
        .sync(db)
        .await
}

/// Secondary indexes the entity definitions cannot express.
pub async fn ensure_indexes(db: &DatabaseConnection) {
    let backend = db.get_database_backend();

    let statements = [
        // Dedup lookups and per-plot listings.
        (
            "idx_alert_plot_created",
            Index::create()
                .if_not_exists()
                .name("idx_alert_plot_created")
                .table(alert::Entity)
                .col(alert::Column::PlotId)
                .col(alert::Column::CreatedAt)
                .to_owned(),
        ),
        (
            "idx_plot_owner",
            Index::create()
                .if_not_exists()
                .name("idx_plot_owner")
                .table(plot::Entity)
                .col(plot::Column::OwnerId)
                .to_owned(),
        ),
        (
            "idx_document_plot",
            Index::create()
                .if_not_exists()
                .name("idx_document_plot")
                .table(document::Entity)
                .col(document::Column::PlotId)
                .to_owned(),
        ),
    ];

    for (name, stmt) in &statements {
        match db.execute_raw(backend.build(stmt)).await {
            Ok(_) => info!(index = %name, "Ensured index exists"),
            Err(e) => tracing::warn!(index = %name, error = %e, "Failed to create index"),
        }
    }
}

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = connect(db_url).await?;
    sync_schema(&db).await?;
    ensure_indexes(&db).await;
    info!("Database schema ready");
    Ok(db)
}

use std::sync::Arc;

use common::storage::BlobStore;
use ml_client::ChangeDetection;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::detection::AlertGate;
use crate::notify::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub detector: Arc<dyn ChangeDetection>,
    pub notifier: Arc<dyn Notifier>,
    pub blob_store: Arc<dyn BlobStore>,
    /// Serializes alert creation per plot across requests and the sweep.
    pub alert_gate: AlertGate,
}

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::storage::FilesystemBlobStore;
use ml_client::{
    ChangeDetection, DetectionOptions, DetectionResult, GeoPolygon, HealthStatus, ImageDownload,
    LatestImage, MlError, MlServiceConfig,
};
use reqwest::Client;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use tempfile::TempDir;

use landwatch_server::config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, NotificationConfig, ServerConfig,
    SmtpConfig, StorageConfig, SweepConfig,
};
use landwatch_server::detection::{AlertGate, SweepContext};
use landwatch_server::notify::{EmailMessage, Notifier, NotifyError};
use landwatch_server::state::AppState;

pub const OPERATOR_EMAIL: &str = "ops@landwatch.test";
pub const MAX_UPLOAD_SIZE: u64 = 1024;

pub mod routes {
    pub const REGISTER: &str = "/api/v1/auth/register";
    pub const LOGIN: &str = "/api/v1/auth/login";
    pub const ME: &str = "/api/v1/auth/me";
    pub const PLOTS: &str = "/api/v1/plots";
    pub const ALERTS: &str = "/api/v1/alerts";
    pub const DOCUMENTS: &str = "/api/v1/documents";
    pub const ML_HEALTH: &str = "/api/v1/ml/health-check";
    pub const CHANGE_DETECT: &str = "/api/v1/ml/change-detect";
    pub const LATEST_IMAGE: &str = "/api/v1/ml/latest-image";
    pub const DOWNLOAD_LATEST_IMAGE: &str = "/api/v1/ml/download-latest-image";

    pub fn plot(id: i32) -> String {
        format!("/api/v1/plots/{id}")
    }

    pub fn plot_alerts(id: i32) -> String {
        format!("/api/v1/plots/{id}/alerts")
    }

    pub fn plot_documents(id: i32) -> String {
        format!("/api/v1/plots/{id}/documents")
    }

    pub fn acknowledge(alert_id: i32) -> String {
        format!("/api/v1/alerts/{alert_id}/acknowledge")
    }

    pub fn resolve(alert_id: i32) -> String {
        format!("/api/v1/alerts/{alert_id}/resolve")
    }

    pub fn document(id: i32) -> String {
        format!("/api/v1/documents/{id}")
    }

    pub fn document_content(id: i32) -> String {
        format!("/api/v1/documents/{id}/content")
    }
}

/// One recorded `detect_change` call.
#[derive(Debug, Clone)]
pub struct DetectCall {
    pub plot_id: String,
    pub ring: Vec<[f64; 2]>,
    pub options: DetectionOptions,
}

/// In-process change-detection backend with per-plot scripted answers.
pub struct FakeDetector {
    results: Mutex<HashMap<String, DetectionResult>>,
    calls: Mutex<Vec<DetectCall>>,
    image: Mutex<LatestImage>,
    download: Mutex<Result<ImageDownload, String>>,
    healthy: AtomicBool,
}

impl Default for FakeDetector {
    fn default() -> Self {
        Self {
            results: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            image: Mutex::new(LatestImage::Available { image_url: None }),
            download: Mutex::new(Err("no image scripted".into())),
            healthy: AtomicBool::new(true),
        }
    }
}

impl FakeDetector {
    /// Answer detection for `plot_id` with `percent` change.
    pub fn set_percent(&self, plot_id: i32, percent: f64) {
        self.results.lock().unwrap().insert(
            plot_id.to_string(),
            DetectionResult {
                change_detected: percent > 0.0,
                percent_change: Some(percent),
                change_type: Some("change".into()),
                ..Default::default()
            },
        );
    }

    /// Make detection for `plot_id` report a service failure.
    pub fn fail_for(&self, plot_id: i32, error: &str) {
        self.results
            .lock()
            .unwrap()
            .insert(plot_id.to_string(), DetectionResult::failed(error));
    }

    pub fn set_image(&self, image: LatestImage) {
        *self.image.lock().unwrap() = image;
    }

    pub fn set_download(&self, download: Result<ImageDownload, String>) {
        *self.download.lock().unwrap() = download;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<DetectCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChangeDetection for FakeDetector {
    async fn health_check(&self) -> HealthStatus {
        if self.healthy.load(Ordering::SeqCst) {
            let mut details = serde_json::Map::new();
            details.insert("gee".into(), json!("initialized"));
            HealthStatus {
                status: "ok".into(),
                error: None,
                details,
            }
        } else {
            HealthStatus::down("connection refused")
        }
    }

    async fn detect_change(
        &self,
        plot_id: &str,
        polygon: &GeoPolygon,
        options: &DetectionOptions,
    ) -> DetectionResult {
        self.calls.lock().unwrap().push(DetectCall {
            plot_id: plot_id.to_string(),
            ring: polygon.ring().to_vec(),
            options: *options,
        });
        self.results
            .lock()
            .unwrap()
            .get(plot_id)
            .cloned()
            .unwrap_or_else(|| DetectionResult {
                percent_change: Some(0.0),
                ..Default::default()
            })
    }

    async fn latest_image(&self, _plot_id: &str, _polygon: &GeoPolygon) -> LatestImage {
        self.image.lock().unwrap().clone()
    }

    async fn download_latest_image(
        &self,
        _plot_id: &str,
        _polygon: &GeoPolygon,
    ) -> Result<ImageDownload, MlError> {
        self.download
            .lock()
            .unwrap()
            .clone()
            .map_err(MlError::DownloadFailed)
    }
}

/// Notifier that keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, to: &str) -> Vec<EmailMessage> {
        self.sent().into_iter().filter(|m| m.to == to).collect()
    }

    /// Make every later send fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: EmailMessage) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("mailbox unavailable".into()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// A running test server.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub db: DatabaseConnection,
    pub state: AppState,
    pub detector: Arc<FakeDetector>,
    pub notifier: Arc<RecordingNotifier>,
    _dir: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("landwatch.db").display()
        );
        let db = landwatch_server::database::init_db(&db_url)
            .await
            .expect("Failed to initialize test database");

        let app_config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig::default(),
            },
            database: DatabaseConfig { url: db_url },
            auth: AuthConfig {
                jwt_secret: "test-secret-for-integration-tests".to_string(),
            },
            ml: MlServiceConfig::default(),
            detection: DetectionOptions::default(),
            sweep: SweepConfig {
                enabled: false,
                ..Default::default()
            },
            smtp: SmtpConfig::default(),
            notification: NotificationConfig {
                operator_email: OPERATOR_EMAIL.to_string(),
            },
            storage: StorageConfig {
                data_dir: dir.path().join("documents"),
                max_upload_size: MAX_UPLOAD_SIZE,
            },
        };

        let blob_store = FilesystemBlobStore::new(
            app_config.storage.data_dir.clone(),
            app_config.storage.max_upload_size,
        )
        .await
        .expect("Failed to create blob store");

        let detector = Arc::new(FakeDetector::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let state = AppState {
            db: db.clone(),
            config: app_config,
            detector: detector.clone(),
            notifier: notifier.clone(),
            blob_store: Arc::new(blob_store),
            alert_gate: AlertGate::new(),
        };

        let app = landwatch_server::build_router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            db,
            state,
            detector,
            notifier,
            _dir: dir,
        }
    }

    pub fn sweep_context(&self) -> SweepContext {
        SweepContext::from_state(&self.state)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_without_token(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn patch_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .patch(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send PATCH request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    /// Upload a document through the multipart endpoint.
    pub async fn upload_with_token(
        &self,
        plot_id: Option<i32>,
        file_name: &str,
        file_bytes: Vec<u8>,
        doc_type: Option<&str>,
        token: &str,
    ) -> TestResponse {
        let part = reqwest::multipart::Part::bytes(file_bytes)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .expect("Failed to set MIME type");
        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(plot_id) = plot_id {
            form = form.text("plotId", plot_id.to_string());
        }
        if let Some(doc_type) = doc_type {
            form = form.text("type", doc_type.to_string());
        }

        let res = self
            .client
            .post(self.url(routes::DOCUMENTS))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// Register an account and return its bearer token.
    pub async fn create_authenticated_user(&self, name: &str) -> String {
        let res = self
            .post_without_token(
                routes::REGISTER,
                &json!({
                    "name": name,
                    "email": format!("{}@example.com", name.to_lowercase()),
                    "password": "securepass",
                }),
            )
            .await;
        assert_eq!(res.status, 201, "Registration failed: {}", res.text);

        res.body["token"]
            .as_str()
            .expect("Registration response should contain a token")
            .to_string()
    }

    /// Create a triangular plot via the API and return its `id`.
    pub async fn create_plot(&self, token: &str, name: &str) -> i32 {
        let res = self
            .post_with_token(
                routes::PLOTS,
                &json!({
                    "name": name,
                    "coordinates": [[-1.28, 36.81], [-1.28, 36.82], [-1.29, 36.82]],
                    "area": 2.5,
                }),
                token,
            )
            .await;
        assert_eq!(res.status, 201, "create_plot failed: {}", res.text);
        res.id()
    }

    /// Run manual detection on `plot_id`.
    pub async fn detect(&self, plot_id: i32, token: &str) -> TestResponse {
        self.post_with_token(routes::CHANGE_DETECT, &json!({"plotId": plot_id}), token)
            .await
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }

    pub fn id(&self) -> i32 {
        self.body["id"]
            .as_i64()
            .expect("response body should contain 'id'") as i32
    }
}

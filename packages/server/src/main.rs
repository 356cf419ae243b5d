use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use common::storage::FilesystemBlobStore;
use landwatch_server::config::AppConfig;
use landwatch_server::detection::schedule::parse_daily_at;
use landwatch_server::detection::{AlertGate, SweepContext, SweepScheduler};
use landwatch_server::notify::{LogNotifier, Notifier, SmtpNotifier};
use landwatch_server::state::AppState;
use landwatch_server::{build_router, database};
use ml_client::MlClient;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = database::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;

    let detector = MlClient::new(&config.ml).context("Failed to build ML service client")?;
    info!(base_url = detector.base_url(), "Change-detection client ready");

    let notifier: Arc<dyn Notifier> = if config.smtp.enabled {
        let smtp = SmtpNotifier::new(&config.smtp).context("Failed to configure SMTP")?;
        info!(host = %config.smtp.host, port = config.smtp.port, "SMTP notifications enabled");
        Arc::new(smtp)
    } else {
        info!("SMTP disabled, notifications will only be logged");
        Arc::new(LogNotifier)
    };

    let blob_store = FilesystemBlobStore::new(
        config.storage.data_dir.clone(),
        config.storage.max_upload_size,
    )
    .await
    .context("Failed to initialize document storage")?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host/server.port")?;

    let state = AppState {
        db,
        config,
        detector: Arc::new(detector),
        notifier,
        blob_store: Arc::new(blob_store),
        alert_gate: AlertGate::new(),
    };

    let scheduler = if state.config.sweep.enabled {
        let at = parse_daily_at(&state.config.sweep.daily_at)?;
        Some(SweepScheduler::start(SweepContext::from_state(&state), at))
    } else {
        info!("Daily detection sweep disabled");
        None
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);
    info!("API docs at http://{}/scalar", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}

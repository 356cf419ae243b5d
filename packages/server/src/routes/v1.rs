use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/plots", plot_routes())
        .nest("/alerts", alert_routes())
        .nest("/documents", document_routes(config))
        .nest("/ml", ml_routes())
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/me", get(handlers::auth::me))
}

fn plot_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::plot::list_plots).post(handlers::plot::create_plot),
        )
        .route(
            "/{id}",
            get(handlers::plot::get_plot)
                .patch(handlers::plot::update_plot)
                .delete(handlers::plot::delete_plot),
        )
        .route("/{id}/alerts", get(handlers::alert::list_plot_alerts))
        .route(
            "/{id}/documents",
            get(handlers::document::list_plot_documents),
        )
}

fn alert_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::alert::list_alerts))
        .route(
            "/{id}/acknowledge",
            post(handlers::alert::acknowledge_alert),
        )
        .route("/{id}/resolve", post(handlers::alert::resolve_alert))
}

fn document_routes(config: &AppConfig) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::document::list_documents)
                .post(handlers::document::upload_document)
                .layer(handlers::document::document_upload_body_limit(
                    config.storage.max_upload_size,
                )),
        )
        .route("/{id}", delete(handlers::document::delete_document))
        .route(
            "/{id}/content",
            get(handlers::document::download_document),
        )
}

fn ml_routes() -> Router<AppState> {
    Router::new()
        .route("/health-check", get(handlers::detection::ml_health))
        .route("/change-detect", post(handlers::detection::change_detect))
        .route(
            "/latest-image",
            get(handlers::detection::get_latest_image).post(handlers::detection::post_latest_image),
        )
        .route(
            "/download-latest-image",
            post(handlers::detection::download_latest_image),
        )
}

pub mod config;
pub mod database;
pub mod detection;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod routes;
pub mod state;
pub mod utils;

use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_scalar::{Scalar, Servable as ScalarServable};

use crate::config::CorsConfig;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Landwatch API",
        version = "1.0.0",
        description = "Land parcel monitoring: plots, satellite change detection, alerts and documents"
    ),
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::me,
        handlers::plot::list_plots,
        handlers::plot::create_plot,
        handlers::plot::get_plot,
        handlers::plot::update_plot,
        handlers::plot::delete_plot,
        handlers::alert::list_alerts,
        handlers::alert::list_plot_alerts,
        handlers::alert::acknowledge_alert,
        handlers::alert::resolve_alert,
        handlers::detection::ml_health,
        handlers::detection::change_detect,
        handlers::detection::get_latest_image,
        handlers::detection::post_latest_image,
        handlers::detection::download_latest_image,
        handlers::document::upload_document,
        handlers::document::list_documents,
        handlers::document::list_plot_documents,
        handlers::document::download_document,
        handlers::document::delete_document,
    ),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Plots", description = "Plot outlines owned by the caller"),
        (name = "Alerts", description = "Change alerts and their lifecycle"),
        (name = "Detection", description = "On-demand change detection and satellite imagery"),
        (name = "Documents", description = "Files attached to plots"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allow_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let list: Vec<HeaderValue> = config
            .allow_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(list)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(config.max_age))
}

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let api = ApiDoc::openapi();
    let cors = cors_layer(&state.config.server.cors);

    axum::Router::new()
        .nest("/api", routes::api_routes(&state.config))
        .with_state(state)
        .route(
            "/api-docs/openapi.json",
            axum::routing::get({
                let api = api.clone();
                move || async move { axum::Json(api) }
            }),
        )
        .merge(Scalar::with_url("/scalar", api))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

//! HTTP surface: the editor views and the tile map service, all mounted
//! under `/shape-editor`.

mod error;
mod tms;
mod views;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::{AppError, AppResult};

use crate::{config::Config, editor::BASE_PATH, store::Store};

/// Shared by every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Store, config: Config) -> Self {
        Self { store, config: Arc::new(config) }
    }
}

pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.upload_limit;

    let routes = Router::new()
        .route("/", get(views::list))
        .route("/import", get(views::import_form).post(views::import))
        .route("/export/:id", get(views::export))
        .route("/edit/:id", get(views::edit))
        .route("/delete/:id", get(views::delete_summary).post(views::delete))
        .route("/findFeature", get(views::find_feature))
        .route("/addFeature/:id", get(views::add_feature_form).post(views::add_feature))
        .route("/editFeature/:id/:feature_id", get(views::edit_feature_form).post(views::edit_feature))
        .route("/deleteFeature/:id/:feature_id", get(views::delete_feature_summary).post(views::delete_feature))
        // Tile map service
        .route("/tms", get(tms::root))
        .route("/tms/:version", get(tms::service))
        .route("/tms/:version/:id", get(tms::tile_map))
        .route("/tms/:version/:id/:zoom/:x/:y", get(tms::tile));

    Router::new()
        .nest(BASE_PATH, routes)
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the store named by `config` and serve until the process is stopped.
pub async fn serve(config: Config) -> Result<()> {
    let store = Store::connect(&config.database_url).await?;
    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    info!("listening on http://{}{BASE_PATH}", listener.local_addr()?);

    axum::serve(listener, router(AppState::new(store, config)))
        .await
        .context("server stopped")
}

use anyhow::Context;
use axum::{
    extract::{OriginalUri, Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::{AppError, AppResult, AppState};
use crate::{
    store::{FeatureQuery, Shapefile},
    tms::{self, TileBounds, TileMapEntry},
};

/// Absolute URL of the requested resource, without a trailing slash.
fn base_url(headers: &HeaderMap, uri: &OriginalUri) -> String {
    let host = headers.get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}{}", uri.0.path().trim_end_matches('/'))
}

fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

fn check_version(version: &str) -> AppResult<()> {
    if tms::is_supported_version(version) { Ok(()) } else { Err(AppError::NotFound) }
}

#[inline]
fn parse<T: std::str::FromStr>(text: &str) -> AppResult<T> {
    text.parse().map_err(|_| AppError::NotFound)
}

async fn shapefile_or_404(state: &AppState, id: &str) -> AppResult<Shapefile> {
    let id: i64 = parse(id)?;
    state.store.shapefile(id).await?.ok_or(AppError::NotFound)
}

pub(super) async fn root(State(state): State<AppState>, headers: HeaderMap, uri: OriginalUri) -> AppResult<Response> {
    let body = tms::root_document(&base_url(&headers, &uri), &state.config.tms_title)?;
    Ok(xml(body))
}

pub(super) async fn service(
    State(state): State<AppState>,
    Path(version): Path<String>,
    headers: HeaderMap,
    uri: OriginalUri,
) -> AppResult<Response> {
    check_version(&version)?;
    let maps: Vec<_> = state.store.list_shapefiles().await?
        .into_iter()
        .map(|s| TileMapEntry { id: s.id, title: s.filename })
        .collect();
    let body = tms::service_document(&base_url(&headers, &uri), &state.config.tms_title, &maps)?;
    Ok(xml(body))
}

pub(super) async fn tile_map(
    State(state): State<AppState>,
    Path((version, id)): Path<(String, String)>,
    headers: HeaderMap,
    uri: OriginalUri,
) -> AppResult<Response> {
    check_version(&version)?;
    let shapefile = shapefile_or_404(&state, &id).await?;
    let body = tms::tile_map_document(&base_url(&headers, &uri), &shapefile.filename)?;
    Ok(xml(body))
}

/// `/tms/<version>/<id>/<zoom>/<x>/<y>.png`
pub(super) async fn tile(
    State(state): State<AppState>,
    Path((version, id, zoom, x, y)): Path<(String, String, String, String, String)>,
) -> AppResult<Response> {
    check_version(&version)?;
    let y = y.strip_suffix(".png").ok_or(AppError::NotFound)?;
    let (zoom, x, y): (i64, i64, i64) = (parse(&zoom)?, parse(&x)?, parse(y)?);

    let Some(bounds) = TileBounds::new(zoom, x, y) else {
        warn!("rejected tile {zoom}/{x}/{y}: outside zoom range or world bounds");
        return Err(AppError::NotFound);
    };
    let shapefile = shapefile_or_404(&state, &id).await?;
    debug!("tile {zoom}/{x}/{y} of shapefile {} covers {:?}", shapefile.id, bounds.rect);

    let base_map = state.store.base_map_in(bounds.rect).await?;
    let kind = shapefile.storage_kind();
    let query = FeatureQuery::new(shapefile.id, kind).intersecting(bounds.rect);
    let features = state.store.query_features(&query).await?;

    let png = tokio::task::spawn_blocking(move || tms::render_tile(&bounds, &base_map, kind, &features))
        .await
        .context("tile renderer panicked")??;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{AppError, AppResult, AppState};
use crate::{
    editor::{self, MapForm},
    io::{dbf::CharacterEncoding, export::export_data, import::import_data},
    store::{Feature, Shapefile},
    tms::TMS_VERSION,
};

type Params = HashMap<String, String>;

/// A shapefile as listed, with the links that act on it.
#[derive(Serialize)]
struct ShapefileEntry<'a> {
    #[serde(flatten)]
    shapefile: &'a Shapefile,
    edit_url: String,
    export_url: String,
    delete_url: String,
}

impl<'a> ShapefileEntry<'a> {
    fn new(shapefile: &'a Shapefile) -> Self {
        let id = shapefile.id;
        Self {
            shapefile,
            edit_url: editor::edit_path(id),
            export_url: format!("{}/export/{id}", editor::BASE_PATH),
            delete_url: format!("{}/delete/{id}", editor::BASE_PATH),
        }
    }
}

async fn shapefile_or_404(state: &AppState, id: i64) -> AppResult<Shapefile> {
    state.store.shapefile(id).await?.ok_or(AppError::NotFound)
}

async fn feature_or_404(state: &AppState, shapefile_id: i64, feature_id: i64) -> AppResult<Feature> {
    state.store.feature(shapefile_id, feature_id).await?.ok_or(AppError::NotFound)
}

#[inline]
fn confirmed(params: &Params) -> bool {
    params.get("confirm").is_some_and(|v| v == "1")
}

/// Every imported shapefile, ordered by filename.
pub(super) async fn list(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let shapefiles = state.store.list_shapefiles().await?;
    let entries: Vec<_> = shapefiles.iter().map(ShapefileEntry::new).collect();
    Ok(Json(json!({ "shapefiles": entries, "import_url": format!("{}/import", editor::BASE_PATH) })))
}

pub(super) async fn import_form() -> Json<Value> {
    let encodings: Vec<_> = CharacterEncoding::ALL.iter()
        .map(|e| json!({ "value": e.name(), "label": e.label() }))
        .collect();
    Json(json!({
        "fields": ["import_file", "character_encoding"],
        "character_encodings": encodings,
        "default_encoding": CharacterEncoding::default().name(),
    }))
}

/// Multipart upload of a zipped shapefile.
pub(super) async fn import(State(state): State<AppState>, mut multipart: Multipart) -> AppResult<Redirect> {
    let mut upload: Option<Bytes> = None;
    let mut encoding = CharacterEncoding::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::BadRequest(e.body_text()))? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("import_file") => {
                upload = Some(field.bytes().await.map_err(|e| AppError::BadRequest(e.body_text()))?);
            }
            Some("character_encoding") => {
                let text = field.text().await.map_err(|e| AppError::BadRequest(e.body_text()))?;
                encoding = text.parse().map_err(|_| AppError::BadRequest(format!("Unknown character encoding: {text}")))?;
            }
            other => debug!("ignoring form field {other:?}"),
        }
    }

    let upload = upload
        .filter(|data| !data.is_empty())
        .ok_or_else(|| AppError::BadRequest("Please choose a file to import.".into()))?;
    info!("import upload of {} bytes ({encoding})", upload.len());
    import_data(&state.store, upload, encoding).await?;
    Ok(Redirect::to(&editor::list_path()))
}

/// Zip download; unknown ids go back to the list.
pub(super) async fn export(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    let Some(archive) = export_data(&state.store, id).await? else {
        return Ok(Redirect::to(&editor::list_path()).into_response());
    };
    let disposition = format!("attachment; filename=\"{}\"", archive.filename);
    Ok((
        [(header::CONTENT_TYPE, "application/zip".to_string()), (header::CONTENT_DISPOSITION, disposition)],
        archive.bytes,
    ).into_response())
}

/// The map editor page for one shapefile.
pub(super) async fn edit(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Value>> {
    let shapefile = shapefile_or_404(&state, id).await?;
    Ok(Json(json!({
        "shapefile": shapefile,
        "tms_url": editor::tms_path(),
        "tile_map_url": format!("{}/{TMS_VERSION}/{id}", editor::tms_path()),
        "find_feature_url": editor::find_feature_path(),
        "add_feature_url": editor::add_feature_path(id),
    })))
}

pub(super) async fn delete_summary(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Value>> {
    let shapefile = shapefile_or_404(&state, id).await?;
    Ok(Json(json!({ "shapefile": shapefile, "confirm_field": "confirm" })))
}

pub(super) async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(params): Form<Params>,
) -> AppResult<Redirect> {
    if confirmed(&params) && state.store.delete_shapefile(id).await? {
        info!("deleted shapefile {id}");
    }
    Ok(Redirect::to(&editor::list_path()))
}

/// Click lookup. The body is the matching feature's edit path, or empty when
/// nothing (or more than one thing) is near the click.
pub(super) async fn find_feature(State(state): State<AppState>, Query(params): Query<Params>) -> String {
    match lookup(&state, &params).await {
        Ok(Some((shapefile_id, feature_id))) => editor::edit_feature_path(shapefile_id, feature_id),
        Ok(None) => String::new(),
        Err(e) => {
            debug!("findFeature {params:?}: {e:#}");
            String::new()
        }
    }
}

async fn lookup(state: &AppState, params: &Params) -> anyhow::Result<Option<(i64, i64)>> {
    fn param<T: std::str::FromStr>(params: &Params, name: &str) -> anyhow::Result<T> {
        params.get(name)
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| anyhow::anyhow!("missing or invalid {name}"))
    }

    let shapefile_id: i64 = param(params, "shapefile_id")?;
    let latitude: f64 = param(params, "latitude")?;
    let longitude: f64 = param(params, "longitude")?;
    let click = editor::click_location(longitude, latitude)
        .ok_or_else(|| anyhow::anyhow!("click ({longitude}, {latitude}) is off the globe"))?;

    let Some(shapefile) = state.store.shapefile(shapefile_id).await? else { return Ok(None) };
    let radius = editor::search_radius(longitude, latitude, state.config.search_radius_m);
    let found = editor::find_feature(&state.store, &shapefile, click, radius).await?;
    Ok(found.map(|feature_id| (shapefile_id, feature_id)))
}

pub(super) async fn add_feature_form(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Value>> {
    let shapefile = shapefile_or_404(&state, id).await?;
    let form = MapForm::for_kind(shapefile.storage_kind());
    Ok(Json(json!({ "shapefile": shapefile, "form": form })))
}

pub(super) async fn add_feature(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(params): Form<Params>,
) -> AppResult<Redirect> {
    let shapefile = shapefile_or_404(&state, id).await?;
    let geometry = MapForm::for_kind(shapefile.storage_kind()).clean(params.get(MapForm::FIELD).map(String::as_str))?;
    let feature_id = state.store.add_feature(id, &geometry).await?;
    info!("added feature {feature_id} to shapefile {id}");
    Ok(Redirect::to(&editor::edit_path(id)))
}

pub(super) async fn edit_feature_form(
    State(state): State<AppState>,
    Path((id, feature_id)): Path<(i64, i64)>,
) -> AppResult<Json<Value>> {
    let shapefile = shapefile_or_404(&state, id).await?;
    let feature = feature_or_404(&state, id, feature_id).await?;
    let attributes: Vec<_> = state.store.feature_attributes(feature_id).await?
        .into_iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();

    let form = MapForm::for_kind(shapefile.storage_kind());
    Ok(Json(json!({
        "shapefile": shapefile,
        "feature_id": feature.id,
        "form": form,
        "geometry": form.initial(&feature.geometry),
        "attributes": attributes,
        "delete_url": editor::delete_feature_path(id, feature_id),
    })))
}

pub(super) async fn edit_feature(
    State(state): State<AppState>,
    Path((id, feature_id)): Path<(i64, i64)>,
    Form(params): Form<Params>,
) -> AppResult<Redirect> {
    if params.contains_key("delete") {
        return Ok(Redirect::to(&editor::delete_feature_path(id, feature_id)));
    }

    let shapefile = shapefile_or_404(&state, id).await?;
    feature_or_404(&state, id, feature_id).await?;
    let geometry = MapForm::for_kind(shapefile.storage_kind()).clean(params.get(MapForm::FIELD).map(String::as_str))?;
    state.store.update_feature_geometry(id, feature_id, &geometry).await?;
    info!("updated geometry of feature {feature_id} in shapefile {id}");
    Ok(Redirect::to(&editor::edit_path(id)))
}

pub(super) async fn delete_feature_summary(
    State(state): State<AppState>,
    Path((id, feature_id)): Path<(i64, i64)>,
) -> AppResult<Json<Value>> {
    let shapefile = shapefile_or_404(&state, id).await?;
    let feature = feature_or_404(&state, id, feature_id).await?;
    Ok(Json(json!({
        "shapefile": shapefile,
        "feature_id": feature.id,
        "geometry": feature.geometry.to_wkt(),
        "confirm_field": "confirm",
    })))
}

pub(super) async fn delete_feature(
    State(state): State<AppState>,
    Path((id, feature_id)): Path<(i64, i64)>,
    Form(params): Form<Params>,
) -> AppResult<Redirect> {
    if !confirmed(&params) {
        return Ok(Redirect::to(&editor::edit_feature_path(id, feature_id)));
    }
    if state.store.delete_feature(id, feature_id).await? {
        info!("deleted feature {feature_id} from shapefile {id}");
    }
    Ok(Redirect::to(&editor::edit_path(id)))
}

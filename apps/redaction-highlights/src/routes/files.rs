//! Per-file and per-page highlight routes, plus file lifecycle actions

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{matches_all, require_pages, validate_page, HighlightQuery};
use crate::error::{AppError, Result};
use crate::highlights::{BoundingBox, Highlight, HighlightProperty, Region};
use crate::state::AppState;
use crate::sync::CleanupOutcome;

/// Create the files router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_files))
        .route(
            "/:file_key/highlights",
            get(list_file_highlights)
                .post(add_file_highlights)
                .delete(remove_file_highlights),
        )
        .route(
            "/:file_key/pages/:page/highlights",
            get(list_page_highlights)
                .post(add_page_highlights)
                .delete(remove_page_highlights),
        )
        .route("/:file_key/pages/:page/detections", post(add_detections))
        .route("/:file_key/detections", get(list_detections))
        .route("/:file_key/preload", post(preload_file))
        .route("/:file_key/cleanup", post(cleanup_file))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileSummary {
    file_key: String,
    count: usize,
}

/// Files that currently hold highlights
async fn list_files(State(state): State<AppState>) -> Json<Vec<FileSummary>> {
    let store = state.store();
    let files = store
        .file_keys()
        .into_iter()
        .map(|file_key| FileSummary {
            count: store.highlight_count(&file_key),
            file_key,
        })
        .collect();
    Json(files)
}

/// List a file's highlights, optionally filtered
async fn list_file_highlights(
    State(state): State<AppState>,
    Path(file_key): Path<String>,
    Query(query): Query<HighlightQuery>,
) -> Result<Json<Vec<Highlight>>> {
    let properties = query.properties()?;
    let highlights = match properties.as_slice() {
        [] => state.store().get_highlights_for_file(&file_key),
        [HighlightProperty::Type(highlight_type)] => {
            state.store().get_highlights_by_type(&file_key, *highlight_type)
        }
        _ => state
            .store()
            .get_highlights_by_property(&file_key, |h| matches_all(&properties, h)),
    };
    Ok(Json(highlights))
}

/// Add highlights to a file. A `type` query stamps that type on every record.
async fn add_file_highlights(
    State(state): State<AppState>,
    Path(file_key): Path<String>,
    Query(query): Query<HighlightQuery>,
    Json(highlights): Json<Vec<Highlight>>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    require_pages(&highlights)?;

    let ids = match query.properties()?.as_slice() {
        [] => state.store().add_highlights_to_file(&file_key, highlights).await?,
        [HighlightProperty::Type(highlight_type)] => {
            state
                .store()
                .add_highlights_by_type(&file_key, *highlight_type, highlights)
                .await?
        }
        _ => {
            return Err(AppError::BadRequest(
                "Only the type filter applies when adding".to_string(),
            ))
        }
    };
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "ids": ids }))))
}

/// Remove a file's highlights, all of them or those matching the filter
async fn remove_file_highlights(
    State(state): State<AppState>,
    Path(file_key): Path<String>,
    Query(query): Query<HighlightQuery>,
) -> Result<Json<serde_json::Value>> {
    let properties = query.properties()?;
    let store = state.store();

    let removed = match properties.as_slice() {
        [] => store.remove_highlights_from_file(&file_key).await?,
        [HighlightProperty::Type(highlight_type)] => {
            store.remove_highlights_by_type(&file_key, *highlight_type).await?
        }
        [HighlightProperty::Text(text)] => store.remove_highlights_by_text(&file_key, text).await?,
        _ => {
            store
                .remove_highlights_by_property(&file_key, |h| matches_all(&properties, h))
                .await?
        }
    };
    Ok(Json(serde_json::json!({ "removed": removed })))
}

async fn list_page_highlights(
    State(state): State<AppState>,
    Path((file_key, page)): Path<(String, u32)>,
) -> Result<Json<Vec<Highlight>>> {
    let page = validate_page(page)?;
    Ok(Json(state.store().get_highlights_for_page(&file_key, page)))
}

async fn add_page_highlights(
    State(state): State<AppState>,
    Path((file_key, page)): Path<(String, u32)>,
    Json(highlights): Json<Vec<Highlight>>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let page = validate_page(page)?;
    let ids = state
        .store()
        .add_highlights_to_page(&file_key, page, highlights)
        .await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "ids": ids }))))
}

/// Optional hit-test region: a point, or a rectangle when `w` and `h` are set
#[derive(Debug, Default, Deserialize)]
struct PositionQuery {
    x: Option<f64>,
    y: Option<f64>,
    w: Option<f64>,
    h: Option<f64>,
}

impl PositionQuery {
    fn region(&self) -> Result<Option<Region>> {
        match (self.x, self.y, self.w, self.h) {
            (None, None, None, None) => Ok(None),
            (Some(x), Some(y), None, None) => Ok(Some(Region::Point { x, y })),
            (Some(x), Some(y), Some(w), Some(h)) => {
                Ok(Some(Region::Rect(BoundingBox::raw(x, y, w, h))))
            }
            _ => Err(AppError::BadRequest(
                "Position needs x and y, plus w and h for a rectangle".to_string(),
            )),
        }
    }
}

/// Clear a page, or only the highlights under a point or rectangle
async fn remove_page_highlights(
    State(state): State<AppState>,
    Path((file_key, page)): Path<(String, u32)>,
    Query(position): Query<PositionQuery>,
) -> Result<Json<serde_json::Value>> {
    let page = validate_page(page)?;
    let removed = match position.region()? {
        Some(region) => {
            state
                .store()
                .remove_highlights_by_position(&file_key, page, &region)
                .await?
        }
        None => state.store().remove_highlights_from_page(&file_key, page).await?,
    };
    Ok(Json(serde_json::json!({ "removed": removed })))
}

/// Store entity detection results for a page
async fn add_detections(
    State(state): State<AppState>,
    Path((file_key, page)): Path<(String, u32)>,
    Json(highlights): Json<Vec<Highlight>>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let page = validate_page(page)?;
    let ids = state
        .lifecycle()
        .apply_detection_results(&file_key, page, highlights)
        .await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "ids": ids }))))
}

/// Pages that already ran entity detection
async fn list_detections(
    State(state): State<AppState>,
    Path(file_key): Path<String>,
) -> Json<serde_json::Value> {
    let pages = state.lifecycle().tracker().processed_pages(&file_key);
    Json(serde_json::json!({ "fileKey": file_key, "pages": pages }))
}

/// Reconcile a file's highlights as it opens
async fn preload_file(
    State(state): State<AppState>,
    Path(file_key): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let count = state.lifecycle().preload(&file_key).await?;
    Ok(Json(serde_json::json!({ "fileKey": file_key, "count": count })))
}

/// Request cleanup through the event bus and report whether it was confirmed
async fn cleanup_file(
    State(state): State<AppState>,
    Path(file_key): Path<String>,
) -> Json<serde_json::Value> {
    let body = match state.lifecycle().request_cleanup(&file_key).await {
        CleanupOutcome::Confirmed { removed } => {
            serde_json::json!({ "fileKey": file_key, "confirmed": true, "removed": removed })
        }
        CleanupOutcome::TimedOut => {
            serde_json::json!({ "fileKey": file_key, "confirmed": false })
        }
    };
    Json(body)
}

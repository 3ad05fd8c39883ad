//! Highlight API routes addressed by id or spanning every file

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::{matches_all, require_pages, HighlightQuery};
use crate::error::{AppError, Result};
use crate::highlights::{Highlight, HighlightProperty};
use crate::state::AppState;

/// Create the highlights router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_highlights).post(add_highlights).delete(remove_highlights))
        .route("/:id", get(get_highlight).delete(remove_highlight))
}

/// Filters for the cross-file endpoints
#[derive(Debug, Default, Deserialize)]
struct GlobalQuery {
    /// Comma-separated file keys
    #[serde(rename = "fileKeys")]
    file_keys: Option<String>,
    #[serde(flatten)]
    filter: HighlightQuery,
}

impl GlobalQuery {
    fn file_keys(&self) -> Vec<String> {
        self.file_keys
            .as_deref()
            .map(|keys| {
                keys.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// List highlights across files, optionally filtered
async fn list_highlights(
    State(state): State<AppState>,
    Query(query): Query<GlobalQuery>,
) -> Result<Json<Vec<Highlight>>> {
    let properties = query.filter.properties()?;
    let mut file_keys = query.file_keys();
    if file_keys.is_empty() {
        file_keys = state.store().file_keys();
    }

    let highlights = file_keys
        .iter()
        .flat_map(|file_key| {
            state
                .store()
                .get_highlights_by_property(file_key, |h| matches_all(&properties, h))
        })
        .collect();
    Ok(Json(highlights))
}

/// Add a batch of highlights, each carrying its own file key
async fn add_highlights(
    State(state): State<AppState>,
    Json(highlights): Json<Vec<Highlight>>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    if let Some(missing) = highlights.iter().position(|h| h.file_key.is_empty()) {
        return Err(AppError::BadRequest(format!(
            "Highlight at index {} has no fileKey",
            missing
        )));
    }
    require_pages(&highlights)?;

    let ids = state.store().add_multiple_highlights(highlights).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "ids": ids }))))
}

/// Remove highlights across files.
///
/// With only `type` set, every highlight of that type goes. Other filters
/// apply to all files. Without filters the listed files are cleared, or
/// everything when no file keys are given.
async fn remove_highlights(
    State(state): State<AppState>,
    Query(query): Query<GlobalQuery>,
) -> Result<Json<serde_json::Value>> {
    let properties = query.filter.properties()?;
    let file_keys = query.file_keys();
    let store = state.store();

    let removed = match properties.as_slice() {
        [] => store.remove_all_highlights(&file_keys).await?,
        [HighlightProperty::Type(highlight_type)] if file_keys.is_empty() => {
            store.remove_all_highlights_by_type(*highlight_type).await?
        }
        _ if file_keys.is_empty() => {
            store
                .remove_highlights_by_property_from_all_files(|h| matches_all(&properties, h))
                .await?
        }
        _ => {
            let mut total = 0;
            for file_key in &file_keys {
                total += store
                    .remove_highlights_by_property(file_key, |h| matches_all(&properties, h))
                    .await?;
            }
            total
        }
    };

    Ok(Json(serde_json::json!({ "removed": removed })))
}

/// Get a specific highlight
async fn get_highlight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Highlight>> {
    let highlight = state
        .store()
        .get_highlight(&id)
        .ok_or_else(|| AppError::NotFound(format!("Highlight not found: {}", id)))?;
    Ok(Json(highlight))
}

/// Delete a highlight
async fn remove_highlight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if state.store().remove_highlight(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Highlight not found: {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use super::super::{router, test_support::{send, state}};

    fn batch() -> serde_json::Value {
        json!([
            { "id": "m1", "fileKey": "a.pdf", "page": 1, "x": 10.0, "y": 10.0, "w": 20.0, "h": 5.0 },
            { "fileKey": "a.pdf", "page": 2, "x": 0.0, "y": 0.0, "w": 4.0, "h": 4.0,
              "type": "ENTITY", "entity": "EMAIL", "text": "x@y.z" },
            { "fileKey": "b.pdf", "page": 1, "x": 0.0, "y": 0.0, "w": 4.0, "h": 4.0,
              "type": "SEARCH", "text": "Jane" }
        ])
    }

    #[tokio::test]
    async fn test_add_get_and_delete() {
        let app = router(state());

        let (status, body) = send(&app, Method::POST, "/api/v1/highlights", Some(batch())).await;
        assert_eq!(status, StatusCode::CREATED);
        let ids = body["ids"].as_array().unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], "m1");
        assert!(ids[1].as_str().unwrap().starts_with("entity-"));

        let (status, body) = send(&app, Method::GET, "/api/v1/highlights/m1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fileKey"], "a.pdf");
        assert_eq!(body["type"], "MANUAL");

        let (status, _) = send(&app, Method::DELETE, "/api/v1/highlights/m1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, Method::DELETE, "/api/v1/highlights/m1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_batch_without_file_key_is_rejected() {
        let app = router(state());
        let body = json!([{ "x": 0.0, "y": 0.0, "w": 1.0, "h": 1.0 }]);

        let (status, body) = send(&app, Method::POST, "/api/v1/highlights", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_batch_without_page_is_rejected() {
        let app = router(state());
        let body = json!([
            { "fileKey": "a.pdf", "page": 2, "x": 0.0, "y": 0.0, "w": 1.0, "h": 1.0 },
            { "fileKey": "a.pdf", "x": 0.0, "y": 0.0, "w": 1.0, "h": 1.0 }
        ]);

        let (status, body) = send(&app, Method::POST, "/api/v1/highlights", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Highlight at index 1 has no page");

        let (_, body) = send(&app, Method::GET, "/api/v1/highlights", None).await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_and_remove_across_files() {
        let app = router(state());
        send(&app, Method::POST, "/api/v1/highlights", Some(batch())).await;

        let (_, body) = send(&app, Method::GET, "/api/v1/highlights?text=Jane", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = send(&app, Method::DELETE, "/api/v1/highlights?type=entity", None).await;
        assert_eq!(body["removed"], 1);

        let (_, body) = send(&app, Method::DELETE, "/api/v1/highlights?fileKeys=b.pdf", None).await;
        assert_eq!(body["removed"], 1);

        let (_, body) = send(&app, Method::GET, "/api/v1/highlights", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = send(&app, Method::DELETE, "/api/v1/highlights", None).await;
        assert_eq!(body["removed"], 1);
    }

    #[tokio::test]
    async fn test_unknown_type_filter() {
        let app = router(state());
        let (status, _) = send(&app, Method::GET, "/api/v1/highlights?type=sticky", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

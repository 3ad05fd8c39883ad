//! Route modules for the highlight server

pub mod files;
pub mod health;
pub mod highlights;

use axum::{routing::get, Router};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::highlights::{Highlight, HighlightProperty, HighlightType};
use crate::state::AppState;

/// Build the full API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/health", get(health::health_check))
        .nest("/api/v1/files", files::router())
        .nest("/api/v1/highlights", highlights::router())
        .with_state(state)
}

/// Field filters shared by list and delete endpoints
#[derive(Debug, Default, Deserialize)]
pub struct HighlightQuery {
    #[serde(rename = "type")]
    pub highlight_type: Option<String>,
    pub text: Option<String>,
    pub entity: Option<String>,
    pub color: Option<String>,
}

impl HighlightQuery {
    /// Selected properties; all must match
    pub fn properties(&self) -> Result<Vec<HighlightProperty>> {
        let mut properties = Vec::new();

        if let Some(value) = &self.highlight_type {
            let highlight_type = HighlightType::parse(value)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown highlight type: {}", value)))?;
            properties.push(HighlightProperty::Type(highlight_type));
        }
        if let Some(text) = &self.text {
            properties.push(HighlightProperty::Text(text.clone()));
        }
        if let Some(entity) = &self.entity {
            properties.push(HighlightProperty::Entity(entity.clone()));
        }
        if let Some(color) = &self.color {
            properties.push(HighlightProperty::Color(color.clone()));
        }

        Ok(properties)
    }
}

fn matches_all(properties: &[HighlightProperty], highlight: &Highlight) -> bool {
    properties.iter().all(|p| p.matches(highlight))
}

/// Every highlight in a body that is not page-scoped must name its page
fn require_pages(highlights: &[Highlight]) -> Result<()> {
    match highlights.iter().position(|h| h.page == 0) {
        Some(index) => Err(AppError::BadRequest(format!(
            "Highlight at index {} has no page",
            index
        ))),
        None => Ok(()),
    }
}

fn validate_page(page: u32) -> Result<u32> {
    if page == 0 {
        return Err(AppError::BadRequest("Pages are numbered from 1".to_string()));
    }
    Ok(page)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::db::MemoryHighlightStore;
    use crate::highlights::HighlightStore;
    use crate::state::AppState;

    pub fn state() -> AppState {
        let store = HighlightStore::new(Arc::new(MemoryHighlightStore::new()));
        AppState::new(Config::default(), Arc::new(store))
    }

    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_properties() {
        let query = HighlightQuery {
            highlight_type: Some("entity".to_string()),
            entity: Some("EMAIL".to_string()),
            ..Default::default()
        };
        let properties = query.properties().unwrap();
        assert_eq!(
            properties,
            vec![
                HighlightProperty::Type(HighlightType::Entity),
                HighlightProperty::Entity("EMAIL".to_string()),
            ]
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let query = HighlightQuery {
            highlight_type: Some("sticky".to_string()),
            ..Default::default()
        };
        assert!(matches!(query.properties(), Err(AppError::BadRequest(_))));
    }
}

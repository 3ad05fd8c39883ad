//! Health check endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub files: usize,
    pub bus_subscribers: usize,
    pub cleanup_confirm_timeout_ms: u64,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "redaction-highlights",
        files: state.store().file_keys().len(),
        bus_subscribers: state.bus().subscriber_count(),
        cleanup_confirm_timeout_ms: state.config().highlights.cleanup_confirm_timeout_ms,
    })
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use super::super::{router, test_support};

    #[tokio::test]
    async fn test_health_on_both_paths() {
        let app = router(test_support::state());

        for uri in ["/health", "/api/v1/health"] {
            let (status, body) = test_support::send(&app, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "healthy");
            assert_eq!(body["service"], "redaction-highlights");
            assert_eq!(body["cleanupConfirmTimeoutMs"], 2000);
        }
    }
}

use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::state::BotState;

/// Build the status server router.
pub fn build(state: Arc<BotState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::root))
        .route("/qr", get(handlers::qr))
        .route("/api/v1/status", get(handlers::status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    async fn get_path(state: Arc<BotState>, uri: &str) -> (StatusCode, String, String) {
        let response = build(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 64)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health_always_ok() {
        let state = BotState::new();
        let (status, content_type, body) = get_path(state.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/plain"));
        assert_eq!(body, "OK");

        state.readiness.mark_server_ready();
        state.readiness.mark_client_ready();
        let (status, _, _) = get_path(state, "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_root_initializing_then_connected() {
        let state = BotState::new();
        let (status, content_type, body) = get_path(state.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/html"));
        assert!(body.contains("WhatsApp bot is running! WhatsApp client is initializing..."));
        assert!(!body.contains("href='/qr'"));

        state.readiness.mark_client_ready();
        let (_, _, body) = get_path(state, "/").await;
        assert!(body.contains("WhatsApp bot is running! WhatsApp client is connected."));
        assert!(!body.contains("initializing"));
    }

    #[tokio::test]
    async fn test_root_links_qr_when_available() {
        let state = BotState::new();
        state.pairing.publish("code", "cG5n").await;
        let (_, _, body) = get_path(state, "/").await;
        assert!(body.contains("QR code is available at <a href='/qr'>/qr</a> endpoint."));
    }

    #[tokio::test]
    async fn test_qr_404_before_publish() {
        let (status, content_type, body) = get_path(BotState::new(), "/qr").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(content_type.starts_with("text/plain"));
        assert_eq!(body, handlers::QR_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_qr_serves_latest_artifact() {
        let state = BotState::new();
        state.pairing.publish("code-1", "Zmlyc3Q=").await;
        state.pairing.publish("code-2", "c2Vjb25k").await;

        let (status, content_type, body) = get_path(state, "/qr").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/html"));
        assert!(body.contains("data:image/png;base64,c2Vjb25k"));
        assert!(!body.contains("Zmlyc3Q="));
    }

    #[tokio::test]
    async fn test_qr_404_after_clear() {
        let state = BotState::new();
        state.pairing.publish("code-1", "Zmlyc3Q=").await;
        state.pairing.clear().await;
        let (status, _, _) = get_path(state, "/qr").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_status_json() {
        let state = BotState::new();
        state.readiness.mark_server_ready();
        state.pairing.publish("code", "cG5n").await;

        let (status, content_type, body) = get_path(state, "/api/v1/status").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("application/json"));

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["serverReady"], true);
        assert_eq!(json["clientReady"], false);
        assert_eq!(json["pairingAvailable"], true);
        assert_eq!(json["pairingGeneration"], 1);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let (status, _, _) = get_path(BotState::new(), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

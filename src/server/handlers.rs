//! Status endpoint handlers
//!
//! - GET /health: liveness, never touches session state
//! - GET /: human-readable status page
//! - GET /qr: current pairing QR as an HTML page
//! - GET /api/v1/status: machine-readable status

use crate::state::BotState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

pub const QR_UNAVAILABLE: &str = "QR code not available yet. Please try again later.";

const STATUS_RUNNING: &str = "WhatsApp bot is running!";
const STATUS_CONNECTED: &str = " WhatsApp client is connected.";
const STATUS_INITIALIZING: &str = " WhatsApp client is initializing...";

/// Body of `GET /api/v1/status`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub server_ready: bool,
    pub client_ready: bool,
    pub pairing_available: bool,
    pub pairing_generation: u64,
    pub version: &'static str,
}

pub async fn health() -> &'static str {
    "OK"
}

/// Status line shown on the root page
pub fn status_line(client_ready: bool) -> String {
    let qualifier = if client_ready {
        STATUS_CONNECTED
    } else {
        STATUS_INITIALIZING
    };
    format!("{STATUS_RUNNING}{qualifier}")
}

pub async fn root(State(state): State<Arc<BotState>>) -> Html<String> {
    let status = status_line(state.readiness.client_ready());
    let qr_status = if state.pairing.is_available().await {
        "QR code is available at <a href='/qr'>/qr</a> endpoint."
    } else {
        ""
    };

    Html(format!(
        r#"<html>
<head>
    <title>WhatsApp Bot Status</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        body {{ font-family: Arial, sans-serif; margin: 40px; line-height: 1.6; }}
        .container {{ max-width: 800px; margin: 0 auto; }}
        h1 {{ color: #4CAF50; }}
        .status {{ padding: 15px; background-color: #f5f5f5; border-radius: 5px; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>WhatsApp Bot Status</h1>
        <div class="status">
            <p>{status}</p>
            <p>{qr_status}</p>
        </div>
    </div>
</body>
</html>
"#
    ))
}

pub async fn qr(State(state): State<Arc<BotState>>) -> Response {
    let Some(artifact) = state.pairing.current().await else {
        return (StatusCode::NOT_FOUND, QR_UNAVAILABLE).into_response();
    };

    Html(format!(
        r#"<html>
<head>
    <title>WhatsApp QR Code</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body style="display: flex; justify-content: center; align-items: center; height: 100vh; flex-direction: column;">
    <h1>Scan this QR code with WhatsApp</h1>
    <img src="data:image/png;base64,{}" alt="WhatsApp QR Code" />
    <p style="margin-top: 20px;">Scan this QR code with your WhatsApp app to log in</p>
</body>
</html>
"#,
        artifact.png_base64
    ))
    .into_response()
}

pub async fn status(State(state): State<Arc<BotState>>) -> Json<StatusResponse> {
    let artifact = state.pairing.current().await;
    Json(StatusResponse {
        server_ready: state.readiness.server_ready(),
        client_ready: state.readiness.client_ready(),
        pairing_available: artifact.is_some(),
        pairing_generation: state.pairing.generation().await,
        version: env!("CARGO_PKG_VERSION"),
    })
}

//! Publisher Routes
//!
//! - POST /water-monitor/publish - one reading per request
//! - GET /water-monitor/publish (WebSocket) - persistent device/control stream
//!
//! The one-shot form only understands readings; mode commands sent here
//! are treated like any other payload.

use axum::{
    body::Bytes,
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
    Json,
};
use futures_util::StreamExt;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::telemetry::{Ingress, PublishReply};
use crate::websocket::run_publisher;

/// POST /water-monitor/publish
pub async fn publish_once(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<PublishReply>> {
    let text = std::str::from_utf8(&body).map_err(|_| ApiError::MalformedJson)?;

    tracing::info!(payload = %text, "HTTP publish received");

    let outcome = state.publisher.handle_text(text, Ingress::OneShot).await?;
    Ok(Json(outcome.reply()))
}

/// GET /water-monitor/publish (WebSocket upgrade)
pub async fn publish_socket(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let handler = state.publisher.clone();
    let shutdown = state.shutdown.clone();
    let gauge = state.publishers.clone();

    ws.on_upgrade(move |socket| async move {
        let _guard = gauge.track();
        let (sink, stream) = socket.split();
        run_publisher(sink, stream, handler, shutdown).await;
    })
}

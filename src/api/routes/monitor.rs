//! Monitor Routes
//!
//! - GET /water-monitor - viewer WebSocket, or the monitor page for plain
//!   browser requests
//! - GET /water-monitor/control - mode switch page

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::{Html, IntoResponse, Response},
};
use futures_util::StreamExt;
use std::sync::Arc;

use crate::api::state::AppState;
use crate::websocket::run_viewer;

/// Page served from the static directory
pub const MONITOR_PAGE: &str = "ws_client.html";

const MONITOR_PAGE_MISSING: &str =
    "<html><body><h1>Página de monitoreo no encontrada</h1></body></html>";

const CONTROL_PAGE: &str = include_str!("../../../assets/control.html");

/// GET /water-monitor
pub async fn monitor(
    ws: Option<WebSocketUpgrade>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match ws {
        Some(ws) => {
            let session = state.viewer_session();
            let gauge = state.viewers.clone();
            ws.on_upgrade(move |socket| async move {
                let _guard = gauge.track();
                let (sink, stream) = socket.split();
                run_viewer(sink, stream, session).await;
            })
        }
        None => monitor_page(&state).await.into_response(),
    }
}

async fn monitor_page(state: &AppState) -> Html<String> {
    let path = state.monitor.static_dir.join(MONITOR_PAGE);
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Html(page),
        Err(e) => {
            tracing::debug!(path = ?path, error = %e, "Monitor page unavailable");
            Html(MONITOR_PAGE_MISSING.to_string())
        }
    }
}

/// GET /water-monitor/control
pub async fn control_page() -> Html<&'static str> {
    Html(CONTROL_PAGE)
}

//! Water Monitor HTTP API
//!
//! HTTP and WebSocket layer, built with Axum.
//!
//! # Endpoints
//!
//! ## Publishers
//! - `POST /water-monitor/publish` - One-shot reading submission
//! - `GET /water-monitor/publish` (WebSocket) - Persistent publisher stream
//!
//! ## Viewers
//! - `GET /water-monitor` (WebSocket) - Current reading, then periodic pushes
//! - `GET /water-monitor` - Monitor page (`static/ws_client.html`)
//! - `GET /water-monitor/control` - Mode switch page
//! - `GET /water-pubsub` (WebSocket) - Topic pub/sub
//! - `GET /static/*` - Static files
//!
//! ## Health
//! - `GET /` - Welcome message
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use water_monitor::api::{serve, AppState};
//! use water_monitor::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default()?;
//!     let state = AppState::from_config(&config);
//!     serve(state, &config).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::{Config, ServerConfig};
use crate::telemetry::MockGenerator;
use crate::websocket::pubsub_handler;

/// How long shutdown waits for the generator before aborting it
const GENERATOR_GRACE: Duration = Duration::from_secs(5);

/// Build the API router with all routes and middleware
pub fn build_router(state: Arc<AppState>, server: &ServerConfig) -> Router {
    let monitor_routes = Router::new()
        .route("/", get(routes::monitor::monitor))
        .route("/control", get(routes::monitor::control_page))
        .route(
            "/publish",
            get(routes::publish::publish_socket).post(routes::publish::publish_once),
        );

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let static_files = ServeDir::new(&state.monitor.static_dir);

    let router = Router::new()
        .route("/", get(routes::health::root))
        .route("/water-pubsub", get(pubsub_handler))
        .nest("/water-monitor", monitor_routes)
        .nest("/health", health_routes)
        .nest_service("/static", static_files)
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(TraceLayer::new_for_http());

    let router = if server.cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.with_state(state)
}

/// Start the API server
///
/// Runs the mock generator for the lifetime of the server. On shutdown the
/// open connections are closed first, then the generator is cancelled and
/// joined.
pub async fn serve(state: AppState, config: &Config) -> Result<(), ApiError> {
    let state = Arc::new(state);

    tokio::fs::create_dir_all(&state.monitor.static_dir).await?;
    tracing::info!(path = ?state.monitor.static_dir, "Static directory ready");

    let generator_token = CancellationToken::new();
    let generator = MockGenerator::new(
        Arc::clone(&state.telemetry),
        Arc::clone(&state.hub),
        state.mock_interval(),
    )
    .spawn(&generator_token);

    let router = build_router(Arc::clone(&state), &config.server);

    let addr = config.server.addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            generator.shutdown().await;
            return Err(e.into());
        }
    };

    tracing::info!(
        addr = %addr,
        mode = %state.telemetry.mode(),
        "Water monitor listening"
    );

    let connections = state.shutdown.clone();
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            connections.cancel();
        })
        .await;

    // Reached on error as well; make sure sockets are released
    state.shutdown.cancel();

    let name = generator.name();
    let outcome = generator.shutdown_within(GENERATOR_GRACE).await;
    if outcome.is_cancelled() {
        tracing::info!(task = name, "Background task stopped");
    } else {
        tracing::warn!(task = name, outcome = ?outcome, "Background task did not stop cleanly");
    }

    served.map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Water monitor shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::telemetry::{Mode, Reading};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, Arc<AppState>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let monitor = MonitorConfig {
            static_dir: dir.path().to_path_buf(),
            ..MonitorConfig::default()
        };
        let state = Arc::new(AppState::new(monitor));
        let router = build_router(Arc::clone(&state), &ServerConfig::default());
        (router, state, dir)
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post_publish(app: Router, body: &'static str) -> Response {
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri("/water-monitor/publish")
                .header("Content-Type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_root() {
        let (app, _state, _dir) = create_test_app();
        let response = get(app, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["message"].is_string());
    }

    #[tokio::test]
    async fn test_health_probes() {
        let (app, _state, _dir) = create_test_app();
        assert_eq!(get(app.clone(), "/health/live").await.status(), StatusCode::OK);
        assert_eq!(get(app, "/health/ready").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (app, _state, _dir) = create_test_app();
        let response = get(app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["mode"], "synthetic");
        assert_eq!(body["reading"], json!({"T": 25.0, "PH": 7.0, "C": 300.0}));
        assert_eq!(body["viewers"], 0);
        assert_eq!(body["pubsub_connections"], 0);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_publish_malformed_json() {
        let (app, _state, _dir) = create_test_app();
        let response = post_publish(app, "{not json").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"status": "error", "message": "Formato JSON inválido"})
        );
    }

    #[tokio::test]
    async fn test_publish_ignored_in_mock_mode() {
        let (app, state, _dir) = create_test_app();
        let before = state.telemetry.get();

        let response = post_publish(app, r#"{"T":12.3,"PH":6.8,"C":310.0}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": "info", "message": "Datos ignorados (modo mock activo)"})
        );
        assert_eq!(state.telemetry.get(), before);
    }

    #[tokio::test]
    async fn test_publish_accepted_in_real_mode() {
        let (app, state, _dir) = create_test_app();
        state.telemetry.set_mode(Mode::Real);

        let response = post_publish(app, r#"{"T":12.3,"PH":6.8,"C":310.0}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": "ok", "message": "Datos recibidos"})
        );
        assert_eq!(state.telemetry.get(), Reading::new(12.3, 6.8, 310.0));
    }

    #[tokio::test]
    async fn test_publish_incomplete_in_real_mode() {
        let (app, state, _dir) = create_test_app();
        state.telemetry.set_mode(Mode::Real);

        let response = post_publish(app, r#"{"T":1,"PH":2}"#).await;
        assert_eq!(
            body_json(response).await,
            json!({"status": "info", "message": "Datos incompletos"})
        );
    }

    #[tokio::test]
    async fn test_http_publish_does_not_switch_mode() {
        let (app, state, _dir) = create_test_app();
        state.telemetry.set_mode(Mode::Real);

        let response = post_publish(app, r#"{"command":"use_mock_data","value":true}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "info");
        assert_eq!(state.telemetry.mode(), Mode::Real);
    }

    #[tokio::test]
    async fn test_publish_invalid_value_is_internal_error() {
        let (app, state, _dir) = create_test_app();
        state.telemetry.set_mode(Mode::Real);
        let before = state.telemetry.get();

        let response = post_publish(app, r#"{"T":"abc","PH":6.8,"C":310.0}"#).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["status"], "error");
        assert_eq!(state.telemetry.get(), before);
    }

    #[tokio::test]
    async fn test_control_page() {
        let (app, _state, _dir) = create_test_app();
        let response = get(app, "/water-monitor/control").await;
        assert_eq!(response.status(), StatusCode::OK);

        let page = body_text(response).await;
        assert!(page.contains("/water-monitor/publish"));
        assert!(page.contains("use_mock_data"));
    }

    #[tokio::test]
    async fn test_monitor_page_fallback_and_static_file() {
        let (app, _state, dir) = create_test_app();

        let response = get(app.clone(), "/water-monitor").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("no encontrada"));

        std::fs::write(dir.path().join("ws_client.html"), "<html>monitor</html>").unwrap();

        let page = body_text(get(app.clone(), "/water-monitor").await).await;
        assert_eq!(page, "<html>monitor</html>");

        let response = get(app, "/static/ws_client.html").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "<html>monitor</html>");
    }

    #[tokio::test]
    async fn test_publish_socket_requires_upgrade() {
        let (app, _state, _dir) = create_test_app();
        let response = get(app, "/water-monitor/publish").await;
        assert!(response.status().is_client_error());
    }
}

//! # Water Monitor
//!
//! Real-time water-quality telemetry relay. Readings (turbidity, pH,
//! conductivity) come from a synthetic generator or from a device, and are
//! fanned out to any number of connected viewers over WebSockets.
//!
//! ## Modules
//!
//! - [`telemetry`]: shared reading state, mode switch, generator, publisher handling
//! - [`websocket`]: viewer, publisher and pub/sub connections, broadcast hub
//! - [`api`]: HTTP server with Axum
//! - [`config`]: TOML + environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use water_monitor::{serve, AppState, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default()?;
//!     let state = AppState::from_config(&config);
//!
//!     // Runs until Ctrl+C / SIGTERM
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod telemetry;
pub mod websocket;

// Re-export top-level types for convenience
pub use telemetry::{
    BackgroundTask, IngestError, Ingress, MockGenerator, Mode, PublishOutcome, PublishReply,
    PublisherHandler, PublisherMessage, Reading, SharedState, TaskOutcome,
};

pub use api::{build_router, serve, ApiError, AppState};

pub use websocket::{
    BroadcastHub, ClientMessage, HubConfig, HubError, ServerMessage, WsEvent, pubsub_handler,
};

pub use config::{Config, ConfigError, LoggingConfig, MonitorConfig, ServerConfig};

//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, MonitorConfig};
use crate::telemetry::{Mode, PublisherHandler, SharedState};
use crate::websocket::{BroadcastHub, ConnectionGauge, HubConfig, ViewerSession};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Current reading and data-source mode
    pub telemetry: Arc<SharedState>,
    /// Topic fan-out for `/water-pubsub`
    pub hub: Arc<BroadcastHub>,
    /// Applies publisher messages to `telemetry`
    pub publisher: PublisherHandler,
    /// Monitor settings (intervals, static dir)
    pub monitor: Arc<MonitorConfig>,
    /// Cancelled when the server starts shutting down
    pub shutdown: CancellationToken,
    /// Server start time for uptime tracking
    pub start_time: Instant,
    /// Open `/water-monitor` viewer sockets
    pub viewers: ConnectionGauge,
    /// Open `/water-monitor/publish` sockets
    pub publishers: ConnectionGauge,
}

impl AppState {
    /// Create state from monitor settings with a default hub
    pub fn new(monitor: MonitorConfig) -> Self {
        Self::with_hub_config(monitor, HubConfig::default())
    }

    /// Create state with custom pub/sub hub limits
    pub fn with_hub_config(monitor: MonitorConfig, hub_config: HubConfig) -> Self {
        let telemetry = Arc::new(SharedState::new(
            monitor.initial_reading,
            Mode::from_use_mock(monitor.start_in_mock),
        ));
        let hub = Arc::new(BroadcastHub::new(hub_config));
        let publisher = PublisherHandler::new(Arc::clone(&telemetry), Arc::clone(&hub));

        Self {
            telemetry,
            hub,
            publisher,
            monitor: Arc::new(monitor),
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
            viewers: ConnectionGauge::new(),
            publishers: ConnectionGauge::new(),
        }
    }

    /// Create state from the full configuration
    pub fn from_config(config: &Config) -> Self {
        Self::with_hub_config(
            config.monitor.clone(),
            HubConfig {
                max_connections: config.hub.max_connections,
            },
        )
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Mock generator tick interval
    pub fn mock_interval(&self) -> Duration {
        self.monitor.mock_interval()
    }

    /// Everything a new viewer connection needs
    pub fn viewer_session(&self) -> ViewerSession {
        ViewerSession {
            state: Arc::clone(&self.telemetry),
            interval: self.monitor.viewer_interval(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Get pub/sub connection count
    pub async fn pubsub_connection_count(&self) -> usize {
        self.hub.connection_count().await
    }
}

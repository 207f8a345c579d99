//! Data Transfer Objects
//!
//! Response types for the service endpoints. Publisher replies live in
//! `telemetry::ingest` since both ingress forms share them.

use serde::Serialize;

use crate::telemetry::{Mode, Reading};

// ============================================
// SERVICE DTOs
// ============================================

/// `GET /` response
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
}

/// Full health status response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy"
    pub status: String,
    /// Active data source
    pub mode: Mode,
    /// Current reading, read together with `mode`
    pub reading: Reading,
    /// Open viewer connections on `/water-monitor`
    pub viewers: usize,
    /// Open publisher connections on `/water-monitor/publish`
    pub publishers: usize,
    /// Registered `/water-pubsub` connections
    pub pubsub_connections: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Server version
    pub version: String,
}

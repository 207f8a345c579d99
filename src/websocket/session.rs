//! Connection bookkeeping shared by the WebSocket endpoints

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Why a connection loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer closed the connection or the stream ended
    Disconnected,
    /// Receiving or sending failed at the transport level
    TransportError,
    /// A message could not be processed
    ProcessingError,
    /// Server shutdown was requested
    Shutdown,
}

/// Live connection counter
#[derive(Debug, Clone, Default)]
pub struct ConnectionGauge {
    active: Arc<AtomicUsize>,
}

impl ConnectionGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one connection until the returned guard is dropped
    pub fn track(&self) -> GaugeGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        GaugeGuard {
            active: Arc::clone(&self.active),
        }
    }

    pub fn count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Decrements its gauge on drop
#[derive(Debug)]
pub struct GaugeGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

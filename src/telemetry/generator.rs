//! Mock Reading Generator
//!
//! Background task that, on a fixed interval, draws a random reading into
//! the shared state while the synthetic mode is active, then publishes the
//! current reading on the `water_data` topic whatever the mode.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::reading::{Mode, Reading};
use super::state::SharedState;
use super::task::{BackgroundTask, TaskOutcome};
use crate::websocket::{BroadcastHub, WsEvent};

/// Default tick interval
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

/// Periodic synthetic reading source
pub struct MockGenerator<R = StdRng> {
    state: Arc<SharedState>,
    hub: Arc<BroadcastHub>,
    interval: Duration,
    rng: R,
}

impl MockGenerator<StdRng> {
    pub fn new(state: Arc<SharedState>, hub: Arc<BroadcastHub>, interval: Duration) -> Self {
        Self::with_rng(state, hub, interval, StdRng::from_entropy())
    }
}

impl<R: Rng + Send + 'static> MockGenerator<R> {
    /// Generator with an explicit random source
    pub fn with_rng(
        state: Arc<SharedState>,
        hub: Arc<BroadcastHub>,
        interval: Duration,
        rng: R,
    ) -> Self {
        Self {
            state,
            hub,
            interval,
            rng,
        }
    }

    /// One generation step
    ///
    /// Returns the reading that was published.
    pub async fn tick(&mut self) -> Reading {
        let candidate = Reading::random(&mut self.rng);
        match self.state.set_if_mode(Mode::Synthetic, candidate) {
            Ok(()) => tracing::debug!(reading = %candidate, "Mock reading generated"),
            Err(mode) => tracing::trace!(%mode, "Real mode active, keeping current reading"),
        }

        let current = self.state.get();
        let report = self.hub.publish(WsEvent::reading(current)).await;
        tracing::debug!(
            reading = %current,
            subscribers = report.delivered,
            "Reading published"
        );
        current
    }

    /// Tick until `token` is cancelled
    ///
    /// Cancellation only interrupts the sleep between ticks; a tick in
    /// progress always completes.
    pub async fn run(mut self, token: CancellationToken) -> TaskOutcome {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Mock generator started");

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::info!("Mock generator cancelled");
                    return TaskOutcome::Cancelled;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            self.tick().await;
        }
    }

    /// Spawn the generator as an owned background task
    pub fn spawn(self, parent: &CancellationToken) -> BackgroundTask {
        BackgroundTask::spawn("mock-generator", parent, move |token| self.run(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::reading::{CONDUCTIVITY_RANGE, PH_RANGE, TURBIDITY_RANGE};
    use crate::websocket::{ServerMessage, TopicPayload, WATER_DATA_TOPIC};
    use tokio::sync::mpsc;

    fn generator(state: &Arc<SharedState>, hub: &Arc<BroadcastHub>) -> MockGenerator {
        MockGenerator::with_rng(
            Arc::clone(state),
            Arc::clone(hub),
            DEFAULT_INTERVAL,
            StdRng::seed_from_u64(42),
        )
    }

    async fn subscriber(hub: &BroadcastHub) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();
        hub.subscribe(&id, vec![WATER_DATA_TOPIC.to_string()])
            .await
            .unwrap();
        rx
    }

    fn published_reading(msg: ServerMessage) -> Reading {
        match msg {
            ServerMessage::Publish {
                data: TopicPayload::Reading(r),
                ..
            } => r,
            other => panic!("Expected reading publish, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tick_in_synthetic_mode_writes_state() {
        let state = Arc::new(SharedState::default());
        let hub = Arc::new(BroadcastHub::default());
        let mut rx = subscriber(&hub).await;
        let mut gen = generator(&state, &hub);

        for _ in 0..200 {
            let published = gen.tick().await;
            assert_eq!(state.get(), published);
            assert!(TURBIDITY_RANGE.contains(&published.turbidity));
            assert!(PH_RANGE.contains(&published.ph));
            assert!(CONDUCTIVITY_RANGE.contains(&published.conductivity));
            assert_eq!(published_reading(rx.try_recv().unwrap()), published);
        }
    }

    #[tokio::test]
    async fn test_tick_in_real_mode_publishes_without_writing() {
        let state = Arc::new(SharedState::default());
        let hub = Arc::new(BroadcastHub::default());
        let mut rx = subscriber(&hub).await;

        let device = Reading::new(12.3, 6.8, 310.0);
        state.set_mode(Mode::Real);
        state.set(device);

        let mut gen = generator(&state, &hub);
        assert_eq!(gen.tick().await, device);
        assert_eq!(state.get(), device);
        assert_eq!(published_reading(rx.try_recv().unwrap()), device);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_one_interval() {
        let state = Arc::new(SharedState::default());
        let hub = Arc::new(BroadcastHub::default());
        let mut rx = subscriber(&hub).await;
        let root = CancellationToken::new();

        let task = generator(&state, &hub).spawn(&root);

        tokio::time::sleep(DEFAULT_INTERVAL - Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(state.get(), Reading::default());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_ok());

        assert_eq!(task.shutdown().await, TaskOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_broadcasts_and_keeps_state() {
        let state = Arc::new(SharedState::default());
        let hub = Arc::new(BroadcastHub::default());
        let mut rx = subscriber(&hub).await;
        let root = CancellationToken::new();

        let task = generator(&state, &hub).spawn(&root);
        tokio::time::sleep(DEFAULT_INTERVAL * 2 + Duration::from_millis(10)).await;
        while rx.try_recv().is_ok() {}

        let before = state.get();
        let started = tokio::time::Instant::now();
        let outcome = task.shutdown().await;
        assert_eq!(outcome, TaskOutcome::Cancelled);
        assert!(started.elapsed() < DEFAULT_INTERVAL);

        tokio::time::sleep(DEFAULT_INTERVAL * 3).await;
        assert_eq!(state.get(), before);
        assert!(rx.try_recv().is_err());
    }
}

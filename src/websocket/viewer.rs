//! Viewer Connections
//!
//! A viewer receives the current reading as soon as it connects, then the
//! latest reading again on its own fixed interval. Any JSON it sends is
//! echoed back with a server timestamp; other text is logged and dropped.
//!
//! Lifecycle: `Connected → Streaming → Closed`. The read loop owns the
//! connection. When it ends, the periodic sender is cancelled and joined
//! before the writer is released.

use axum::extract::ws::Message;
use chrono::{SecondsFormat, Utc};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::session::SessionEnd;
use crate::telemetry::{BackgroundTask, Reading, SharedState, TaskOutcome};

/// Frames queued per viewer before new ones are dropped
pub const VIEWER_QUEUE: usize = 8;

/// Frames sent to a viewer
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ViewerMessage {
    /// Bare `{"T", "PH", "C"}` reading
    Reading(Reading),
    /// `{"status": "echo", "data": .., "timestamp": ..}`
    Echo {
        status: &'static str,
        data: Value,
        timestamp: String,
    },
}

impl ViewerMessage {
    pub fn echo(data: Value) -> Self {
        ViewerMessage::Echo {
            status: "echo",
            data,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

/// Everything a viewer connection needs from the server
#[derive(Clone)]
pub struct ViewerSession {
    pub state: Arc<SharedState>,
    pub interval: Duration,
    pub shutdown: CancellationToken,
}

/// Drive one viewer connection until it closes
pub async fn run_viewer<W, R, E>(sink: W, stream: R, session: ViewerSession) -> SessionEnd
where
    W: Sink<Message> + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Send,
    E: Display,
{
    let connection_id = Uuid::new_v4().to_string();
    tracing::info!(connection_id = %connection_id, "Viewer connected");

    let (tx, rx) = mpsc::channel::<ViewerMessage>(VIEWER_QUEUE);
    let writer = tokio::spawn(write_frames(sink, rx, connection_id.clone()));

    // Connected: current reading goes out before any periodic tick
    let _ = tx.try_send(ViewerMessage::Reading(session.state.get()));

    // Streaming
    let periodic = {
        let tx = tx.clone();
        let state = Arc::clone(&session.state);
        let interval = session.interval;
        BackgroundTask::spawn("viewer-periodic", &session.shutdown, move |token| {
            send_periodic(tx, state, interval, token)
        })
    };

    let end = read_loop(stream, &tx, &session.shutdown, &connection_id).await;

    // Closed
    let periodic_outcome = periodic.shutdown().await;
    drop(tx);
    if let Err(e) = writer.await {
        tracing::error!(connection_id = %connection_id, error = %e, "Viewer writer failed");
    }

    tracing::info!(
        connection_id = %connection_id,
        reason = ?end,
        periodic = ?periodic_outcome,
        "Viewer disconnected"
    );
    end
}

async fn read_loop<R, E>(
    stream: R,
    tx: &mpsc::Sender<ViewerMessage>,
    shutdown: &CancellationToken,
    connection_id: &str,
) -> SessionEnd
where
    R: Stream<Item = Result<Message, E>>,
    E: Display,
{
    let mut stream = std::pin::pin!(stream);

    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => return SessionEnd::Shutdown,
            frame = stream.next() => frame,
        };

        match frame {
            None => return SessionEnd::Disconnected,
            Some(Err(e)) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Viewer receive error");
                return SessionEnd::TransportError;
            }
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(&text) {
                Ok(data) => {
                    tracing::info!(connection_id = %connection_id, payload = %data, "Viewer message received");
                    match tx.try_send(ViewerMessage::echo(data)) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            tracing::debug!(connection_id = %connection_id, "Viewer queue full, echo dropped");
                        }
                        Err(TrySendError::Closed(_)) => return SessionEnd::TransportError,
                    }
                }
                Err(_) => {
                    tracing::warn!(connection_id = %connection_id, text = %text, "Invalid JSON from viewer");
                }
            },
            Some(Ok(Message::Close(_))) => return SessionEnd::Disconnected,
            Some(Ok(_)) => {}
        }
    }
}

/// Push the latest reading every `interval` until cancelled
///
/// A tick is skipped while the queue is full, so a stalled peer holds at
/// most `VIEWER_QUEUE` frames. Ends with `Finished` once the writer is
/// gone; that never stops the read loop.
async fn send_periodic(
    tx: mpsc::Sender<ViewerMessage>,
    state: Arc<SharedState>,
    interval: Duration,
    token: CancellationToken,
) -> TaskOutcome {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return TaskOutcome::Cancelled,
            _ = tokio::time::sleep(interval) => {}
        }

        match tx.try_send(ViewerMessage::Reading(state.get())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::debug!("Viewer queue full, reading skipped"),
            Err(TrySendError::Closed(_)) => return TaskOutcome::Finished,
        }
    }
}

/// Forward queued frames to the socket until the queue closes or a send fails
async fn write_frames<W>(
    sink: W,
    mut rx: mpsc::Receiver<ViewerMessage>,
    connection_id: String,
) where
    W: Sink<Message>,
{
    let mut sink = std::pin::pin!(sink);

    while let Some(msg) = rx.recv().await {
        match serde_json::to_string(&msg) {
            Ok(text) => {
                if sink.send(Message::Text(text)).await.is_err() {
                    tracing::debug!(connection_id = %connection_id, "Viewer send failed, stopping writer");
                    return;
                }
            }
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "Failed to serialize viewer frame");
            }
        }
    }

    let _ = sink.close().await;
}

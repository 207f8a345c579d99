//! Persistent Publisher Connections
//!
//! Devices and the control page keep a socket open and send one JSON
//! message per frame. Every frame gets a status reply. Malformed JSON is
//! answered inline and the loop continues; any other processing error is
//! logged and ends the connection.

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::session::SessionEnd;
use crate::telemetry::ingest::MSG_MALFORMED;
use crate::telemetry::{IngestError, Ingress, PublisherHandler};

/// Drive one publisher connection until it closes
pub async fn run_publisher<W, R, E>(
    sink: W,
    stream: R,
    handler: PublisherHandler,
    shutdown: CancellationToken,
) -> SessionEnd
where
    W: Sink<Message>,
    R: Stream<Item = Result<Message, E>>,
    E: Display,
{
    let connection_id = Uuid::new_v4().to_string();
    tracing::info!(connection_id = %connection_id, "Publisher connected");

    let mut sink = std::pin::pin!(sink);
    let mut stream = std::pin::pin!(stream);

    let end = loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break SessionEnd::Shutdown,
            frame = stream.next() => frame,
        };

        let text = match frame {
            None | Some(Ok(Message::Close(_))) => break SessionEnd::Disconnected,
            Some(Err(e)) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Publisher receive error");
                break SessionEnd::TransportError;
            }
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(_)) => continue,
        };

        tracing::info!(connection_id = %connection_id, payload = %text, "Publisher message received");

        let reply = match handler.handle_text(&text, Ingress::Stream).await {
            Ok(outcome) => match serde_json::to_string(&outcome.reply()) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(connection_id = %connection_id, error = %e, "Failed to serialize reply");
                    break SessionEnd::ProcessingError;
                }
            },
            Err(IngestError::MalformedJson) => {
                tracing::warn!(connection_id = %connection_id, payload = %text, "Invalid JSON from publisher");
                format!("{}: {}", MSG_MALFORMED, text)
            }
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "Publisher message failed");
                break SessionEnd::ProcessingError;
            }
        };

        if sink.send(Message::Text(reply)).await.is_err() {
            tracing::debug!(connection_id = %connection_id, "Publisher send failed");
            break SessionEnd::TransportError;
        }
    };

    let _ = sink.close().await;
    tracing::info!(connection_id = %connection_id, reason = ?end, "Publisher disconnected");
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{Mode, Reading, SharedState};
    use crate::websocket::testing::socket_pair;
    use crate::websocket::BroadcastHub;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_millis(200);

    fn handler() -> (PublisherHandler, Arc<SharedState>) {
        let state = Arc::new(SharedState::default());
        let hub = Arc::new(BroadcastHub::default());
        (PublisherHandler::new(Arc::clone(&state), hub), state)
    }

    #[tokio::test]
    async fn test_mode_switch_and_reading_flow() {
        let (handler, state) = handler();
        let (sink, stream, mut client) = socket_pair();
        let conn = tokio::spawn(run_publisher(sink, stream, handler, CancellationToken::new()));

        client.send_text(r#"{"command":"use_mock_data","value":false}"#);
        let reply = client.next_json(WAIT).await.unwrap();
        assert_eq!(reply["status"], "ok");
        assert_eq!(reply["message"], "Modo cambiado a real");
        assert_eq!(state.mode(), Mode::Real);

        client.send_text(r#"{"T":1,"PH":2}"#);
        let reply = client.next_json(WAIT).await.unwrap();
        assert_eq!(reply, json!({"status": "info", "message": "Datos incompletos"}));

        client.send_text(r#"{"T":12.3,"PH":6.8,"C":310.0}"#);
        let reply = client.next_json(WAIT).await.unwrap();
        assert_eq!(reply, json!({"status": "ok", "message": "Datos recibidos"}));
        assert_eq!(state.get(), Reading::new(12.3, 6.8, 310.0));

        client.disconnect();
        assert_eq!(conn.await.unwrap(), SessionEnd::Disconnected);
    }

    #[tokio::test]
    async fn test_malformed_json_keeps_connection_open() {
        let (handler, _state) = handler();
        let (sink, stream, mut client) = socket_pair();
        let conn = tokio::spawn(run_publisher(sink, stream, handler, CancellationToken::new()));

        client.send_text("{not json");
        let reply = client.next_text(WAIT).await.unwrap();
        assert_eq!(reply, "Formato JSON inválido: {not json");

        client.send_text(r#"{"T":1,"PH":2,"C":3}"#);
        let reply = client.next_json(WAIT).await.unwrap();
        assert_eq!(reply["message"], "Datos ignorados (modo mock activo)");

        client.disconnect();
        assert_eq!(conn.await.unwrap(), SessionEnd::Disconnected);
    }

    #[tokio::test]
    async fn test_non_bool_mode_value_is_answered_and_connection_stays_open() {
        let (handler, state) = handler();
        let (sink, stream, mut client) = socket_pair();
        let conn = tokio::spawn(run_publisher(sink, stream, handler, CancellationToken::new()));

        client.send_text(r#"{"command":"use_mock_data","value":"false"}"#);
        let reply = client.next_json(WAIT).await.unwrap();
        assert_eq!(reply["status"], "info");
        assert_eq!(state.mode(), Mode::Synthetic);

        client.send_text(r#"{"command":"get_mode"}"#);
        let reply = client.next_json(WAIT).await.unwrap();
        assert_eq!(reply, json!({"status": "ok", "message": "Modo actual: mock", "mode": true}));

        client.disconnect();
        assert_eq!(conn.await.unwrap(), SessionEnd::Disconnected);
    }

    #[tokio::test]
    async fn test_processing_error_ends_connection() {
        let (handler, state) = handler();
        state.set_mode(Mode::Real);
        let before = state.get();
        let (sink, stream, client) = socket_pair();
        let conn = tokio::spawn(run_publisher(sink, stream, handler, CancellationToken::new()));

        client.send_text(r#"{"T":"abc","PH":2,"C":3}"#);
        assert_eq!(conn.await.unwrap(), SessionEnd::ProcessingError);
        assert_eq!(state.get(), before);
    }

    #[tokio::test]
    async fn test_shutdown_ends_connection() {
        let (handler, _state) = handler();
        let (sink, stream, _client) = socket_pair();
        let shutdown = CancellationToken::new();
        let conn = tokio::spawn(run_publisher(sink, stream, handler, shutdown.clone()));

        shutdown.cancel();
        assert_eq!(conn.await.unwrap(), SessionEnd::Shutdown);
    }
}

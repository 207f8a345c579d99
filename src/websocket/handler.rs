//! Pub/Sub WebSocket Handler
//!
//! Clients on `/water-pubsub` register with the hub, pick topics with
//! `subscribe` / `unsubscribe` frames, and receive `publish` frames for
//! every event on those topics.

use axum::{
    extract::{
        ws::{Message, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::hub::BroadcastHub;
use super::messages::{ClientMessage, ServerMessage};
use super::session::SessionEnd;
use crate::api::AppState;

/// WebSocket upgrade handler for `/water-pubsub`
pub async fn pubsub_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let hub = Arc::clone(&state.hub);
    let shutdown = state.shutdown.clone();
    ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        run_pubsub(sink, stream, hub, shutdown).await;
    })
}

/// Drive one pub/sub connection until it closes
pub async fn run_pubsub<W, R, E>(
    sink: W,
    stream: R,
    hub: Arc<BroadcastHub>,
    shutdown: CancellationToken,
) -> SessionEnd
where
    W: Sink<Message> + Send + 'static,
    R: Stream<Item = Result<Message, E>>,
    E: Display,
{
    let (tx, rx) = mpsc::unbounded_channel::<ServerMessage>();

    let connection_id = match hub.register(tx).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register pub/sub connection");
            let mut sink = std::pin::pin!(sink);
            if let Ok(text) = serde_json::to_string(&ServerMessage::Error {
                message: e.to_string(),
            }) {
                let _ = sink.send(Message::Text(text)).await;
            }
            let _ = sink.close().await;
            return SessionEnd::ProcessingError;
        }
    };

    let _ = hub
        .send_to(
            &connection_id,
            ServerMessage::Connected {
                connection_id: connection_id.clone(),
            },
        )
        .await;

    let mut writer = tokio::spawn(forward_messages(sink, rx, connection_id.clone()));
    let mut stream = std::pin::pin!(stream);

    let end = loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break SessionEnd::Shutdown,
            _ = &mut writer => break SessionEnd::TransportError,
            frame = stream.next() => frame,
        };

        match frame {
            None => break SessionEnd::Disconnected,
            Some(Err(e)) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Pub/sub receive error");
                break SessionEnd::TransportError;
            }
            Some(Ok(msg)) => {
                if !handle_ws_message(&hub, &connection_id, msg).await {
                    break SessionEnd::Disconnected;
                }
            }
        }
    };

    // Dropping the hub's sender ends the writer once its queue drains
    hub.unregister(&connection_id).await;
    if !writer.is_finished() {
        let _ = writer.await;
    }
    end
}

/// Forward queued server messages to the socket
async fn forward_messages<W>(
    sink: W,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
    connection_id: String,
) where
    W: Sink<Message>,
{
    let mut sink = std::pin::pin!(sink);

    while let Some(msg) = rx.recv().await {
        match serde_json::to_string(&msg) {
            Ok(text) => {
                if sink.send(Message::Text(text)).await.is_err() {
                    tracing::debug!(
                        connection_id = %connection_id,
                        "WebSocket send failed, closing connection"
                    );
                    return;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize message");
            }
        }
    }

    let _ = sink.close().await;
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(hub: &BroadcastHub, connection_id: &str, message: Message) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_client_message(hub, connection_id, client_msg).await,
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        text = %text,
                        "Invalid client message"
                    );
                    let error_msg = ServerMessage::Error {
                        message: format!("Invalid message format: {}", e),
                    };
                    let _ = hub.send_to(connection_id, error_msg).await;
                }
            }
            true
        }
        Message::Binary(_) => {
            let error_msg = ServerMessage::Error {
                message: "Binary messages not supported".to_string(),
            };
            let _ = hub.send_to(connection_id, error_msg).await;
            true
        }
        // Axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            false
        }
    }
}

/// Handle a parsed client message
async fn handle_client_message(hub: &BroadcastHub, connection_id: &str, message: ClientMessage) {
    let response = match message {
        ClientMessage::Subscribe { topics } => hub
            .subscribe(connection_id, topics)
            .await
            .map(|topics| ServerMessage::Subscribed { topics }),
        ClientMessage::Unsubscribe { topics } => hub
            .unsubscribe(connection_id, topics)
            .await
            .map(|topics| ServerMessage::Unsubscribed { topics }),
        ClientMessage::Ping => Ok(ServerMessage::Pong),
    };

    let response = response.unwrap_or_else(|e| {
        tracing::error!(connection_id = %connection_id, error = %e, "Subscription error");
        ServerMessage::Error {
            message: e.to_string(),
        }
    });
    let _ = hub.send_to(connection_id, response).await;
}

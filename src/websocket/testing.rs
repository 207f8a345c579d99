//! In-memory stand-ins for a split WebSocket, for handler tests

use axum::extract::ws::Message;
use futures_util::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;

/// Client end of a fake socket
pub struct FakeClient {
    /// Frames the client sends; drop it to disconnect
    pub to_server: Option<mpsc::UnboundedSender<Result<Message, Infallible>>>,
    /// Frames the server wrote
    pub from_server: mpsc::Receiver<Message>,
}

impl FakeClient {
    pub fn send_text(&self, text: &str) {
        if let Some(tx) = &self.to_server {
            tx.send(Ok(Message::Text(text.to_string()))).unwrap();
        }
    }

    pub fn disconnect(&mut self) {
        self.to_server = None;
    }

    /// Next text frame written by the server, within `wait`
    pub async fn next_text(&mut self, wait: Duration) -> Option<String> {
        loop {
            match tokio::time::timeout(wait, self.from_server.recv()).await {
                Ok(Some(Message::Text(text))) => return Some(text),
                Ok(Some(_)) => continue,
                _ => return None,
            }
        }
    }

    /// Next text frame parsed as JSON
    pub async fn next_json(&mut self, wait: Duration) -> Option<serde_json::Value> {
        let text = self.next_text(wait).await?;
        Some(serde_json::from_str(&text).unwrap())
    }
}

/// Server halves (sink, stream) plus the matching client
pub fn socket_pair() -> (
    PollSender<Message>,
    impl Stream<Item = Result<Message, Infallible>> + Send + 'static,
    FakeClient,
) {
    let (out_tx, out_rx) = mpsc::channel(64);
    let (in_tx, in_rx) = mpsc::unbounded_channel();

    let stream = futures_util::stream::unfold(in_rx, |mut rx| async move {
        rx.recv().await.map(|frame| (frame, rx))
    });

    (
        PollSender::new(out_tx),
        stream,
        FakeClient {
            to_server: Some(in_tx),
            from_server: out_rx,
        },
    )
}

//! WebSocket write half exposed to the broadcaster

use async_trait::async_trait;
use axum::extract::ws::{Message as Frame, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::Mutex;
use tracing::debug;
use wsrelay_broadcaster::{BroadcasterError, ClientSink, ConnectionId, Message};

/// Send half of one WebSocket connection.
///
/// Concurrent broadcasts targeting the same client queue on the mutex, so
/// frames are never interleaved. Once [`close`](Self::close) has run, every
/// send fails with [`BroadcasterError::ConnectionClosed`].
pub struct WsSink {
    id: ConnectionId,
    sender: Mutex<Option<SplitSink<WebSocket, Frame>>>,
}

impl WsSink {
    pub fn new(id: ConnectionId, sender: SplitSink<WebSocket, Frame>) -> Self {
        Self {
            id,
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Close the connection; further sends are rejected
    pub async fn close(&self) {
        if let Some(mut sender) = self.sender.lock().await.take() {
            if let Err(e) = sender.close().await {
                debug!(id = %self.id, error = %e, "Error while closing WebSocket");
            }
        }
    }
}

#[async_trait]
impl ClientSink for WsSink {
    async fn send(&self, message: &Message) -> wsrelay_broadcaster::Result<()> {
        let mut guard = self.sender.lock().await;
        let sender = guard
            .as_mut()
            .ok_or(BroadcasterError::ConnectionClosed(self.id))?;

        sender
            .send(to_frame(message))
            .await
            .map_err(|e| BroadcasterError::Send {
                id: self.id,
                reason: e.to_string(),
            })
    }
}

/// Text frame for UTF-8 payloads, binary frame otherwise
pub fn to_frame(message: &Message) -> Frame {
    match message.as_text() {
        Some(text) => Frame::Text(text.into()),
        None => Frame::Binary(message.clone().into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::WebSocketUpgrade;
    use axum::routing::get;
    use axum::Router;
    use futures::stream::SplitStream;
    use futures::StreamExt;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message as ClientFrame;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
    use wsrelay_broadcaster::{BroadcastCoordinator, ConnectionRegistry, FanoutStrategy};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// Upgrade one real connection and hand back both ends
    async fn connected_sink() -> (Arc<WsSink>, SplitStream<WebSocket>, Client) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/",
            get(move |ws: WebSocketUpgrade| {
                let tx = tx.clone();
                async move {
                    ws.on_upgrade(move |socket| async move {
                        let (sender, receiver) = socket.split();
                        let sink = Arc::new(WsSink::new(ConnectionId::generate(), sender));
                        let _ = tx.send((sink, receiver));
                    })
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let (client, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
        let (sink, receiver) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        (sink, receiver, client)
    }

    #[test]
    fn test_text_payload_becomes_text_frame() {
        match to_frame(&Message::from("hello")) {
            Frame::Text(text) => assert_eq!(text.as_str(), "hello"),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_utf8_becomes_binary_frame() {
        match to_frame(&Message::from(vec![0xc3, 0x28])) {
            Frame::Binary(data) => assert_eq!(data.as_ref(), &[0xc3, 0x28]),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_after_close_is_rejected() {
        let (sink, _receiver, mut client) = connected_sink().await;

        sink.send(&Message::from("before")).await.unwrap();
        let frame = client.next().await.unwrap().unwrap();
        assert_eq!(frame.to_text().unwrap(), "before");

        sink.close().await;
        let result = sink.send(&Message::from("after")).await;
        assert!(matches!(result, Err(BroadcasterError::ConnectionClosed(_))));

        // Closing twice is harmless
        sink.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_broadcasts_arrive_as_whole_frames() {
        const BROADCASTS: usize = 32;
        const BODY_LEN: usize = 16 * 1024;

        let (sink, _receiver, mut client) = connected_sink().await;
        let registry = Arc::new(ConnectionRegistry::new());
        registry.add(ConnectionId::generate(), sink).await;
        let coordinator = BroadcastCoordinator::new(registry, FanoutStrategy::Concurrent);

        // Drain the client while the broadcasts run so socket buffers never fill
        let reader = tokio::spawn(async move {
            let mut frames = Vec::new();
            while frames.len() < BROADCASTS {
                let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
                    .await
                    .expect("timed out waiting for frame")
                    .expect("stream ended")
                    .expect("malformed frame");
                frames.push(frame);
            }
            frames
        });

        let mut tasks = Vec::new();
        for i in 0..BROADCASTS {
            let coordinator = coordinator.clone();
            tasks.push(tokio::spawn(async move {
                let payload = format!("{}:{}", i, "x".repeat(BODY_LEN));
                coordinator.broadcast_and_wait(payload).await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().delivered, 1);
        }

        let mut seen = HashSet::new();
        for frame in reader.await.unwrap() {
            let text = match frame {
                ClientFrame::Text(text) => text,
                other => panic!("expected a text frame, got {:?}", other),
            };
            let (index, body) = text.as_str().split_once(':').unwrap();
            assert_eq!(body.len(), BODY_LEN);
            assert!(body.bytes().all(|b| b == b'x'));
            assert!(seen.insert(index.parse::<usize>().unwrap()));
        }
        assert_eq!(seen.len(), BROADCASTS);
    }
}

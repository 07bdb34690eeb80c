use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::{MessageChannel, TransportError};

/// WebSocket-backed channel. The session id is baked into the path the
/// caller connects with (`/ws/voice/{client_id}`).
pub struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsChannel {
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::info!(
            target: "transport",
            status = %response.status(),
            "voice channel opened"
        );
        Ok(Self { stream })
    }
}

#[async_trait]
impl MessageChannel for WsChannel {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<String> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(text.to_string()),
                Ok(Message::Close(_)) => return None,
                // Control frames are handled by tungstenite; binary
                // frames are not part of this protocol.
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(target: "transport", "channel error: {}", e);
                    return None;
                }
            }
        }
        None
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

//! Transport seam of the chat connection and its WebSocket implementation.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

use crate::error::ConnectionError;

/// One open, bidirectional text connection
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<(), ConnectionError>;

    /// Next inbound text frame; `None` once the peer closed the connection
    async fn recv(&mut self) -> Option<Result<String, ConnectionError>>;

    async fn close(&mut self) -> Result<(), ConnectionError>;
}

/// Opens transports for a URL
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>, ConnectionError>;
}

/// [`Connector`] backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>, ConnectionError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| ConnectionError::Connect(e.to_string()))?;
        tracing::debug!(
            "WebSocket handshake with {} completed ({})",
            url,
            response.status()
        );
        Ok(Box::new(WsTransport { stream }))
    }
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), ConnectionError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ConnectionError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ConnectionError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(data)) => {
                    tracing::debug!("Ignoring {} bytes of binary data", data.len());
                }
                Ok(Message::Close(frame)) => {
                    tracing::debug!("Server closed the connection: {:?}", frame);
                    return None;
                }
                // ping/pong are answered by tungstenite
                Ok(_) => {}
                Err(e) => return Some(Err(ConnectionError::Receive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| ConnectionError::Send(e.to_string()))
    }
}

//! In-process transport used by the chat unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ConnectionError;

use super::transport::{Connector, Transport};

/// Server side of one connection opened through [`ChannelConnector`]
pub(crate) struct ServerEnd {
    pub url: String,
    /// Frames pushed here are received by the client; dropping it closes the connection
    pub to_client: mpsc::UnboundedSender<String>,
    pub from_client: mpsc::UnboundedReceiver<String>,
    pub closed: Arc<AtomicBool>,
}

impl ServerEnd {
    pub fn push(&self, frame: &str) {
        self.to_client.send(frame.to_string()).unwrap();
    }

    pub fn sent_frames(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.from_client.try_recv() {
            frames.push(frame);
        }
        frames
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct ChannelTransport {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, text: String) -> Result<(), ConnectionError> {
        self.outbound
            .send(text)
            .map_err(|e| ConnectionError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ConnectionError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing the server end of every opened connection to the test
pub(crate) struct ChannelConnector {
    servers: mpsc::UnboundedSender<ServerEnd>,
    refuse: bool,
}

impl ChannelConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEnd>) {
        let (servers, rx) = mpsc::unbounded_channel();
        (
            Self {
                servers,
                refuse: false,
            },
            rx,
        )
    }

    pub fn refusing() -> Self {
        let (servers, _rx) = mpsc::unbounded_channel();
        Self {
            servers,
            refuse: true,
        }
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>, ConnectionError> {
        if self.refuse {
            return Err(ConnectionError::Connect("connection refused".to_string()));
        }
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let server = ServerEnd {
            url: url.to_string(),
            to_client,
            from_client,
            closed: Arc::clone(&closed),
        };
        self.servers
            .send(server)
            .map_err(|e| ConnectionError::Connect(e.to_string()))?;
        Ok(Box::new(ChannelTransport {
            inbound,
            outbound,
            closed,
        }))
    }
}

//! Connection wrapper: owns at most one live chat transport.
//!
//! ## 責務
//!
//! - `connect()` ごとに送受信タスクを 1 つ起動し、その接続専用のイベント受信口を返す
//! - 新しい `connect()` は既存の接続を先に閉じる
//! - 未接続時の `send()` は何もしない（エラーにしない）
//! - `disconnect()` は何度呼んでもよい

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot};

use super::transport::{Connector, Transport};

/// Lifecycle notification of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Message(String),
    Error(String),
    /// Always the last event of a connection
    Closed { reason: Option<String> },
}

/// Per-connection listener returned by [`Connection::connect`].
///
/// Dropping it unsubscribes from the connection.
#[derive(Debug)]
pub struct ConnectionEvents {
    id: u64,
    rx: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl ConnectionEvents {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// `None` once the connection task has finished and all events were read
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.rx.recv().await
    }
}

struct ActiveConnection {
    id: u64,
    outgoing: mpsc::UnboundedSender<String>,
    shutdown: Option<oneshot::Sender<()>>,
    connected: Arc<AtomicBool>,
}

impl ActiveConnection {
    fn close(mut self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(shutdown) = self.shutdown.take() {
            // the task may already be gone
            let _ = shutdown.send(());
        }
        tracing::debug!("Connection #{} closed by client", self.id);
    }
}

/// Builds the chat endpoint URL from the page scheme, host and path
pub fn websocket_url(secure: bool, host: &str, path: &str) -> String {
    let host = host.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if host.contains("://") {
        return format!("{}/{}", host, path);
    }
    let scheme = if secure { "wss" } else { "ws" };
    format!("{}://{}/{}", scheme, host, path)
}

pub struct Connection {
    connector: Arc<dyn Connector>,
    secure: bool,
    default_host: String,
    active: Option<ActiveConnection>,
    next_id: u64,
}

impl Connection {
    /// # Arguments
    ///
    /// * `connector` - Opens the underlying transport
    /// * `secure` - Use `wss` instead of `ws`
    /// * `default_host` - Host (and port) used when `connect` gets no host
    pub fn new(connector: Arc<dyn Connector>, secure: bool, default_host: impl Into<String>) -> Self {
        Self {
            connector,
            secure,
            default_host: default_host.into(),
            active: None,
            next_id: 0,
        }
    }

    /// Open a connection to `path` on `host` (or the default host).
    ///
    /// Any previous connection is closed first. The returned listener yields
    /// [`ConnectionEvent::Opened`] once the transport is up, then inbound
    /// frames, and finally [`ConnectionEvent::Closed`].
    pub fn connect(&mut self, path: &str, host: Option<&str>) -> ConnectionEvents {
        self.disconnect();

        let url = websocket_url(self.secure, host.unwrap_or(&self.default_host), path);
        self.next_id += 1;
        let id = self.next_id;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let connected = Arc::new(AtomicBool::new(false));

        tracing::info!("Connecting #{} to {}", id, url);
        tokio::spawn(connection_loop(
            id,
            Arc::clone(&self.connector),
            url,
            outgoing_rx,
            shutdown_rx,
            events_tx,
            Arc::clone(&connected),
        ));

        self.active = Some(ActiveConnection {
            id,
            outgoing: outgoing_tx,
            shutdown: Some(shutdown_tx),
            connected,
        });

        ConnectionEvents { id, rx: events_rx }
    }

    /// Close the current connection, if any
    pub fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            active.close();
        }
    }

    /// Queue `text` on the open connection.
    ///
    /// Returns `false` (and sends nothing) when no connection is open.
    pub fn send(&self, text: impl Into<String>) -> bool {
        match &self.active {
            Some(active) if active.connected.load(Ordering::SeqCst) => {
                active.outgoing.send(text.into()).is_ok()
            }
            _ => {
                tracing::debug!("Send skipped: not connected");
                false
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.connected.load(Ordering::SeqCst))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn connection_loop(
    id: u64,
    connector: Arc<dyn Connector>,
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    mut shutdown: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    connected: Arc<AtomicBool>,
) {
    // the listener may be gone; events are then dropped
    let emit = |event: ConnectionEvent| {
        let _ = events.send(event);
    };

    let opened = tokio::select! {
        result = connector.open(&url) => result,
        _ = &mut shutdown => {
            emit(ConnectionEvent::Closed {
                reason: Some("disconnected before open".to_string()),
            });
            return;
        }
    };

    let mut transport: Box<dyn Transport> = match opened {
        Ok(transport) => transport,
        Err(e) => {
            tracing::warn!("Connection #{} to {} failed: {}", id, url, e);
            emit(ConnectionEvent::Error(e.to_string()));
            emit(ConnectionEvent::Closed {
                reason: Some(e.to_string()),
            });
            return;
        }
    };

    connected.store(true, Ordering::SeqCst);
    tracing::info!("Connection #{} open", id);
    emit(ConnectionEvent::Opened);

    let reason: Option<String> = loop {
        tokio::select! {
            text = outgoing.recv() => match text {
                Some(text) => {
                    if let Err(e) = transport.send(text).await {
                        tracing::warn!("Connection #{} send failed: {}", id, e);
                        emit(ConnectionEvent::Error(e.to_string()));
                        break Some(e.to_string());
                    }
                }
                None => {
                    close_quietly(id, transport.as_mut()).await;
                    break Some("connection dropped".to_string());
                }
            },
            _ = &mut shutdown => {
                // frames queued before disconnect() still go out
                while let Ok(text) = outgoing.try_recv() {
                    if transport.send(text).await.is_err() {
                        break;
                    }
                }
                close_quietly(id, transport.as_mut()).await;
                break Some("disconnected by client".to_string());
            }
            incoming = transport.recv() => match incoming {
                Some(Ok(text)) => emit(ConnectionEvent::Message(text)),
                Some(Err(e)) => {
                    tracing::warn!("Connection #{} receive failed: {}", id, e);
                    emit(ConnectionEvent::Error(e.to_string()));
                    break Some(e.to_string());
                }
                None => {
                    tracing::info!("Connection #{} closed by server", id);
                    break None;
                }
            },
        }
    };

    connected.store(false, Ordering::SeqCst);
    emit(ConnectionEvent::Closed { reason });
}

async fn close_quietly(id: u64, transport: &mut dyn Transport) {
    if let Err(e) = transport.close().await {
        tracing::debug!("Connection #{} close failed: {}", id, e);
    }
}

use crate::core::errors::ExchangeError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{instrument, warn};

/// WebSocket session trait - pure transport layer
///
/// Reconnection policy lives above this trait; implementations manage a
/// single physical connection and support repeated `connect` calls so a
/// supervisor can reuse one instance across reconnect cycles.
#[async_trait]
pub trait WsSession: Send {
    /// Connect (or reconnect) to the WebSocket endpoint
    async fn connect(&mut self) -> Result<(), ExchangeError>;

    /// Send a raw message
    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError>;

    /// Receive the next raw message; `None` means the connection closed
    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), ExchangeError>;

    /// Check if the connection is alive
    fn is_connected(&self) -> bool;
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Tungstenite-based WebSocket transport
pub struct TungsteniteWs {
    url: String,
    write: Option<futures_util::stream::SplitSink<WsStream, Message>>,
    read: Option<futures_util::stream::SplitStream<WsStream>>,
    connected: bool,
    connect_timeout: Duration,
}

impl TungsteniteWs {
    /// Create a new WebSocket transport for the given endpoint URL
    pub fn new(url: String) -> Self {
        Self {
            url,
            write: None,
            read: None,
            connected: false,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WsSession for TungsteniteWs {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&mut self) -> Result<(), ExchangeError> {
        let connection_future = tokio::time::timeout(self.connect_timeout, connect_async(&self.url));

        let (ws_stream, _) = connection_future
            .await
            .map_err(|_| {
                ExchangeError::ConnectionTimeout("WebSocket connection timeout".to_string())
            })?
            .map_err(|e| {
                ExchangeError::ConnectionError(format!("WebSocket connection failed: {}", e))
            })?;

        let (write, read) = ws_stream.split();
        self.write = Some(write);
        self.read = Some(read);
        self.connected = true;

        Ok(())
    }

    #[instrument(skip(self, msg), fields(url = %self.url))]
    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError> {
        let write = self.write.as_mut().ok_or_else(|| {
            ExchangeError::ConnectionError("WebSocket not connected".to_string())
        })?;

        write.send(msg).await.map_err(|e| {
            self.connected = false;
            ExchangeError::ConnectionError(format!("Failed to send WebSocket message: {}", e))
        })?;

        Ok(())
    }

    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>> {
        loop {
            let read = self.read.as_mut()?;

            match read.next().await {
                Some(Ok(message)) => match message {
                    Message::Close(_) => {
                        self.connected = false;
                        return None;
                    }
                    Message::Ping(data) => {
                        // Answer transport-level pings, keep reading
                        if let Err(e) = self.send_raw(Message::Pong(data)).await {
                            warn!("Failed to send pong response: {}", e);
                        }
                    }
                    Message::Pong(_) => {}
                    other => return Some(Ok(other)),
                },
                Some(Err(e)) => {
                    self.connected = false;
                    return Some(Err(ExchangeError::ConnectionError(format!(
                        "WebSocket error: {}",
                        e
                    ))));
                }
                None => {
                    self.connected = false;
                    return None;
                }
            }
        }
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn close(&mut self) -> Result<(), ExchangeError> {
        if let Some(write) = self.write.as_mut() {
            let _ = write.send(Message::Close(None)).await;
        }
        self.connected = false;
        self.write = None;
        self.read = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

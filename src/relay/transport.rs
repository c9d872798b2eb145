//! Relay transport seam.
//!
//! A [`RelayConnector`] opens one text-frame connection per session.
//! [`TungsteniteConnector`] is the production implementation over
//! `tokio-tungstenite`; tests plug in scripted transports.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::TransportError;

/// One open text-frame connection to the relay.
#[async_trait]
pub trait RelayTransport: Send {
    /// Sends one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Send`] if the write fails.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Waits for the next text frame. `None` means the relay closed the
    /// connection.
    async fn next_text(&mut self) -> Option<Result<String, TransportError>>;

    /// Closes the connection. Errors are ignored.
    async fn close(&mut self);
}

/// Opens relay connections.
#[async_trait]
pub trait RelayConnector: Send + Sync {
    /// Connects to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] if the socket cannot be opened.
    async fn connect(&self, url: &str) -> Result<Box<dyn RelayTransport>, TransportError>;
}

/// [`RelayConnector`] over `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    /// Creates a connector that gives up opening a socket after
    /// `connect_timeout`.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

#[async_trait]
impl RelayConnector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn RelayTransport>, TransportError> {
        let (stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| TransportError::Connect("timed out".to_string()))?
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!(url, "relay socket open");
        Ok(Box::new(TungsteniteTransport { stream }))
    }
}

struct TungsteniteTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl RelayTransport for TungsteniteTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.as_str().to_owned())),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => tracing::debug!("dropping non-UTF-8 binary frame"),
                },
                // Protocol pings are answered by tungstenite itself.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Err(e)) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

//! Outbound connections to the game server.
//!
//! The engine only needs a bidirectional text channel. [`Transport`] is that
//! seam; [`WsTransport`] is the WebSocket implementation used in production
//! and tests substitute their own.

use crate::error::TransportError;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::COOKIE, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use vghw_common::TargetConfig;

/// Upper bound on how long a close handshake may take.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// An established, bidirectional text-frame channel.
///
/// All methods take `&self`: the receive loop and the movement emitter of a
/// driver use the same connection concurrently.
pub trait Transport: Send + Sync + 'static {
    /// Send one text frame.
    fn send(&self, payload: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait for the next text frame. `Ok(None)` means the peer closed the
    /// connection cleanly; [`TransportError::Closed`] means we closed it.
    fn receive(&self) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    /// Close the connection. Calling this more than once is a no-op.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Opens new transports to the target.
pub trait Dialer: Send + Sync + 'static {
    type Transport: Transport;

    fn dial(&self) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsTransport {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: CancellationToken,
}

impl WsTransport {
    pub fn new(ws: WsStream) -> Self {
        let (sink, stream) = ws.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: CancellationToken::new(),
        }
    }
}

impl Transport for WsTransport {
    async fn send(&self, payload: String) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }

        let mut sink = self.sink.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportError::Closed),
            res = sink.send(Message::Text(payload)) => res.map_err(TransportError::from),
        }
    }

    async fn receive(&self) -> Result<Option<String>, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            let msg = tokio::select! {
                biased;
                _ = self.closed.cancelled() => return Err(TransportError::Closed),
                msg = stream.next() => msg,
            };

            match msg {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Server closed the connection");
                    return Ok(None);
                }
                // Pings are answered by tungstenite itself.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    async fn close(&self) {
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();

        let mut sink = self.sink.lock().await;
        match timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Close handshake failed"),
            Err(_) => debug!("Close handshake timed out"),
        }
    }
}

/// Dials the game server's WebSocket endpoint as a fixed username.
#[derive(Debug, Clone)]
pub struct WsDialer {
    url: String,
    username: String,
    dial_timeout: Duration,
}

impl WsDialer {
    pub fn new(target: &TargetConfig) -> Self {
        Self {
            url: target.url.clone(),
            username: target.username.clone(),
            dial_timeout: target.dial_timeout(),
        }
    }
}

impl Dialer for WsDialer {
    type Transport = WsTransport;

    async fn dial(&self) -> Result<WsTransport, TransportError> {
        let mut request = self.url.as_str().into_client_request()?;
        let cookie = HeaderValue::from_str(&format!("VGHW-Username={}", self.username))
            .map_err(|e| TransportError::Io(format!("invalid username header: {}", e)))?;
        request.headers_mut().insert(COOKIE, cookie);

        match timeout(self.dial_timeout, connect_async(request)).await {
            Ok(Ok((ws, _response))) => Ok(WsTransport::new(ws)),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(TransportError::Timeout(self.dial_timeout)),
        }
    }
}

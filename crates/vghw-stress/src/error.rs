//! Error types surfaced by the load generator.
//!
//! Drivers never return these directly; terminal errors are forwarded to the
//! phase's error channel and the presentation layer decides what to print.

use thiserror::Error;

/// Errors produced by a [`Transport`](crate::engine::transport::Transport).
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connection was closed, usually by our own cancellation. Not fatal.
    #[error("connection closed")]
    Closed,

    #[error("dial timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    pub fn is_closed(&self) -> bool {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match self {
            TransportError::Closed => true,
            TransportError::WebSocket(WsError::ConnectionClosed | WsError::AlreadyClosed) => true,
            _ => false,
        }
    }
}

/// Wire payload could not be encoded or decoded.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("cannot unmarshal event: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("cannot marshal command: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Terminal error of a single driver or emitter.
#[derive(Error, Debug)]
pub enum StressError {
    #[error("cannot dial: {0}")]
    Dial(#[source] TransportError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("warning received from server: {0}")]
    Warning(String),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("cannot send {command}: {source}")]
    Send {
        command: &'static str,
        #[source]
        source: TransportError,
    },
}

impl StressError {
    /// True for errors that are a normal consequence of shutting a phase
    /// down and should not be shown to the user. Cancellation itself never
    /// produces an error; it only surfaces as a closed connection.
    pub fn is_expected(&self) -> bool {
        match self {
            StressError::Dial(e) | StressError::Transport(e) => e.is_closed(),
            StressError::Send { source, .. } => source.is_closed(),
            _ => false,
        }
    }
}

//! Error types for the client runtime and its transports.

use roomfeed_core::SessionError;
use roomfeed_proto::ProtocolError;
use thiserror::Error;

/// Errors returned to callers of [`crate::SessionHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The session refused the operation.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The runtime task is gone.
    #[error("session runtime stopped")]
    Shutdown,
}

/// Errors from a broker transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Underlying I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket protocol failure.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Byte stream no longer splits into frames; the socket is unusable.
    #[error("framing lost: {0}")]
    Framing(ProtocolError),

    /// One message did not decode; the socket is still fine.
    #[error("malformed message: {0}")]
    Malformed(ProtocolError),
}

/// Errors from a history store.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Request could not be sent or the response not read.
    #[error("history request failed: {0}")]
    Request(String),

    /// Server answered with a non-success status.
    #[error("history request returned status {0}")]
    Status(u16),

    /// Response body is not a message list.
    #[error("history response undecodable: {0}")]
    Decode(#[from] ProtocolError),
}

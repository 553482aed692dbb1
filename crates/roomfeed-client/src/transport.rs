//! I/O seams of the runtime.
//!
//! Production uses a WebSocket for frames and HTTP for history (behind the
//! `transport` feature); tests use the simulated broker from
//! `roomfeed-harness` over Turmoil TCP.

use async_trait::async_trait;
use roomfeed_core::Credentials;
use roomfeed_proto::{ChatRecord, Frame, RoomId};

use crate::error::{HistoryError, TransportError};

/// Opens sockets to the broker.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Write half of an open socket.
    type Sink: FrameSink;

    /// Read half of an open socket.
    type Stream: FrameStream;

    /// Open a socket, presenting `credentials` on the upgrade request.
    async fn open(
        &self,
        credentials: &Credentials,
    ) -> Result<(Self::Sink, Self::Stream), TransportError>;
}

/// Write half of a broker socket.
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Write one frame.
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Flush and close the socket.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of a broker socket.
#[async_trait]
pub trait FrameStream: Send + 'static {
    /// Next frame, or `None` once the socket is closed.
    ///
    /// [`TransportError::Malformed`] items may be followed by more frames;
    /// any other error ends the stream.
    async fn next(&mut self) -> Option<Result<Frame, TransportError>>;
}

/// Source of room history.
#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
    /// Stored messages of `room_id`, oldest first.
    async fn fetch_history(&self, room_id: RoomId) -> Result<Vec<ChatRecord>, HistoryError>;
}

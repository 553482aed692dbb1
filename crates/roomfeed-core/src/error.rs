//! Error types for the session state machines.

use roomfeed_proto::{Command, ProtocolError, RoomId};
use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors from the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Operation needs an established broker session.
    #[error("not connected (state: {state:?})")]
    NotConnected {
        /// State at the time of the call
        state: ConnectionState,
    },

    /// Operation is not allowed in the current state.
    #[error("invalid state {state:?} for {operation}")]
    InvalidState {
        /// State at the time of the call
        state: ConnectionState,
        /// Operation that was refused
        operation: &'static str,
    },

    /// Broker sent a frame that makes no sense in the current state.
    #[error("unexpected {command} frame in state {state:?}")]
    UnexpectedFrame {
        /// State when the frame arrived
        state: ConnectionState,
        /// Command of the offending frame
        command: Command,
    },

    /// Frame was structurally valid STOMP but missing what we need.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Errors surfaced by the session facade to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Operation needs an established broker session.
    #[error("not connected to the broker (state: {state:?})")]
    NotConnected {
        /// State at the time of the call
        state: ConnectionState,
    },

    /// `send` before any room was selected.
    #[error("no room selected")]
    NoActiveRoom,

    /// A live frame body could not be decoded.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] ProtocolError),

    /// History could not be fetched for a room.
    #[error("history for room {room_id} unavailable: {reason}")]
    HistoryFetch {
        /// Room whose history was requested
        room_id: RoomId,
        /// Reason reported by the history store
        reason: String,
    },

    /// Any other connection failure.
    #[error(transparent)]
    Connection(ConnectionError),
}

impl From<ConnectionError> for SessionError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::NotConnected { state } => Self::NotConnected { state },
            other => Self::Connection(other),
        }
    }
}

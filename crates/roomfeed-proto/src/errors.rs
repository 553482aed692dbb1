//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding STOMP frames and chat payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The command line does not name a STOMP command we understand.
    #[error("unknown STOMP command: {0:?}")]
    UnknownCommand(String),

    /// A header line has no `:` separator.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// A header contains an escape sequence STOMP 1.2 does not define.
    #[error("invalid escape sequence in header: {0:?}")]
    InvalidEscape(String),

    /// The body is not followed by the NUL terminator.
    #[error("frame body is not terminated by NUL")]
    MissingTerminator,

    /// The input ended before a complete frame.
    #[error("incomplete frame")]
    Incomplete,

    /// The frame (or buffered partial frame) exceeds the decoder limit.
    #[error("frame exceeds {limit} bytes")]
    FrameTooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },

    /// The `content-length` header is not a valid length.
    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),

    /// Command line, headers or body are not valid UTF-8.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    /// Non-heartbeat bytes follow a complete frame in a single message.
    #[error("unexpected bytes after frame")]
    TrailingData,

    /// A frame lacks a header its command requires.
    #[error("{command} frame is missing the {header} header")]
    MissingHeader {
        /// Command of the offending frame.
        command: &'static str,
        /// Name of the missing header.
        header: &'static str,
    },

    /// The body is not the JSON shape we expect.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A destination does not name a room topic.
    #[error("destination {0:?} is not a room topic")]
    NotARoomTopic(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}

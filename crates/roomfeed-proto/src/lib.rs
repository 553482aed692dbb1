//! Wire format for the roomfeed session client.
//!
//! The broker speaks STOMP 1.2: a text command line, `key:value` headers, a
//! blank line, an opaque body and a NUL terminator. Chat traffic rides in the
//! body as JSON. This crate owns both layers so that the state machines in
//! `roomfeed-core` never touch raw bytes.
//!
//! # Layers
//!
//! - [`frame`]: frame model, encoder and decoders (one-shot and streaming)
//! - [`destinations`]: room topic naming and the publish route
//! - [`payloads`]: JSON bodies for outbound chat, live frames and history
//! - [`ids`]: strongly typed identifiers shared by every layer
//!
//! # Robustness
//!
//! Decoders never panic on hostile input. A streaming decoder enforces a
//! frame size limit so a peer that never sends NUL cannot grow the buffer
//! without bound.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod destinations;
pub mod errors;
pub mod frame;
pub mod headers;
pub mod ids;
pub mod payloads;

pub use destinations::{PUBLISH_DESTINATION, room_from_topic, room_topic};
pub use errors::{ProtocolError, Result};
pub use frame::{Command, DEFAULT_MAX_FRAME_SIZE, Frame, FrameDecoder};
pub use ids::{AuthorId, RoomId};
pub use payloads::{ChatRecord, OutboundChat};

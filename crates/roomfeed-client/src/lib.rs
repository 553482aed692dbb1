//! Roomfeed client runtime
//!
//! Runs a [`roomfeed_core::Session`] as a Tokio actor and connects it to
//! real I/O.
//!
//! # Components
//!
//! - [`Runtime`]: the actor owning the session
//! - [`SessionHandle`]: the async API and observers given to callers
//! - [`transport`]: traits for the broker socket and the history store
//! - `ws` / `http`: WebSocket and HTTP implementations (feature
//!   `transport`)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
#[cfg(feature = "transport")]
pub mod http;
pub mod runtime;
pub mod transport;
#[cfg(feature = "transport")]
pub mod ws;

pub use error::{ClientError, HistoryError, TransportError};
#[cfg(feature = "transport")]
pub use http::HttpHistoryStore;
pub use runtime::{ClientConfig, Runtime, SessionHandle, TimelineView};
pub use transport::{FrameSink, FrameStream, HistoryStore, Transport};
#[cfg(feature = "transport")]
pub use ws::{WebSocketFrames, WebSocketSink, WebSocketTransport};

/// Spawn a runtime on the current Tokio runtime and return its handle.
pub fn spawn<T, H, E>(transport: T, history: H, env: E, config: ClientConfig) -> SessionHandle
where
    T: Transport,
    H: HistoryStore,
    E: roomfeed_core::Environment,
{
    let (runtime, handle) = Runtime::new(transport, history, env, config);
    tokio::spawn(runtime.run());
    handle
}

//! Roomfeed session core
//!
//! Pure state machines for a room-scoped chat session over a STOMP broker,
//! decoupled from sockets, HTTP and clocks.
//!
//! # Architecture
//!
//! Every component consumes inputs and returns declarative actions; none of
//! them performs I/O. A runtime owns one [`Session`], feeds it events from
//! a single ordered queue and executes the actions it returns. The same
//! session therefore runs unchanged in production, in unit tests and in the
//! deterministic simulation harness.
//!
//! # Components
//!
//! - [`connection`]: broker connection (handshake, subscribe, publish,
//!   graceful disconnect, timeouts)
//! - [`subscription`]: the single live room subscription
//! - [`reconciler`]: history fetch, live buffering, merge and stale guard
//! - [`timeline`]: ordered, duplicate-free messages of one room
//! - [`session`]: the facade composing all of the above
//! - [`mod@env`]: time abstraction
//! - [`error`]: error types

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;
pub mod message;
pub mod reconciler;
pub mod session;
pub mod subscription;
pub mod timeline;

pub use connection::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionState, Credentials, FailureReason,
    SubscriptionHandle,
};
pub use env::{Environment, ManualEnv, SystemEnv};
pub use error::{ConnectionError, SessionError};
pub use message::{DedupIndex, Message, Origin, OutboundIntent};
pub use reconciler::{EnterRoom, HistoryOutcome, HistoryReconciler, HistoryRequest};
pub use session::{Session, SessionAction, SessionConfig, SessionEvent, SessionNotice};
pub use subscription::{RoomSubscriptions, Subscription, Switch};
pub use timeline::Timeline;

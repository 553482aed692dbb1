//! Deterministic simulation harness for roomfeed session testing.
//!
//! Turmoil-based implementations of the broker, the broker transport, the
//! history store and the environment, so the real client runtime can be
//! driven end to end with reproducible timing.
//!
//! # Components
//!
//! - [`SimBroker`]: STOMP broker host with a request log and injection hooks
//! - [`SimTransport`]: [`roomfeed_client::Transport`] over Turmoil TCP
//! - [`SimHistory`]: scripted [`roomfeed_client::HistoryStore`]
//! - [`SimEnv`]: clocks that follow simulated time
//! - [`scenario`]: scripted runs verified by oracles

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod scenario;
pub mod sim_broker;
pub mod sim_env;
pub mod sim_history;
pub mod sim_transport;

pub use sim_broker::{BROKER_PORT, BrokerEvent, SimBroker};
pub use sim_env::SimEnv;
pub use sim_history::SimHistory;
pub use sim_transport::SimTransport;

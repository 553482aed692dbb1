//! Terminal front end for roomfeed
//!
//! A thin line-oriented shell over [`roomfeed_client::SessionHandle`]: input
//! lines become session commands, and timeline, state and notice updates
//! are printed as they arrive. All session logic lives in the client
//! runtime.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cli;
pub mod commands;
pub mod render;

pub use cli::Args;
pub use commands::Command;
pub use render::TimelinePrinter;

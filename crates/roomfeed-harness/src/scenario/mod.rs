//! Scenario tests.
//!
//! A scenario scripts what a user does (connect, join, send) and what the
//! rest of the world does (other participants posting, history being slow
//! or broken, the broker dropping the socket), runs the script against the
//! real runtime under Turmoil, and hands the final [`World`] to an oracle.
//! Building a scenario without an oracle does not give a runnable value.

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario, Step};
pub use world::{Refusal, World};

/// Verifies the world after a run.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;

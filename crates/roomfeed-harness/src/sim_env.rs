//! Simulated environment.
//!
//! Inside a Turmoil host Tokio's clock is virtual, so both clocks below
//! advance with simulated time and a run is reproducible.

use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use roomfeed_core::Environment;

/// 2024-01-01T00:00:00Z, the wall-clock time at which simulations start.
const SIM_EPOCH_SECS: i64 = 1_704_067_200;

/// Environment backed by Tokio's (virtual) clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    started: tokio::time::Instant,
    wall_start: DateTime<Utc>,
}

impl SimEnv {
    /// Start the wall clock at the simulation epoch.
    pub fn new() -> Self {
        Self::starting_at(
            DateTime::from_timestamp(SIM_EPOCH_SECS, 0).unwrap_or(DateTime::UNIX_EPOCH),
        )
    }

    /// Start the wall clock at `wall_start`.
    pub fn starting_at(wall_start: DateTime<Utc>) -> Self {
        Self { started: tokio::time::Instant::now(), wall_start }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        TimeDelta::from_std(self.started.elapsed())
            .map_or(self.wall_start, |elapsed| self.wall_start + elapsed)
    }
}

//! Environment abstraction.
//!
//! State machines never read clocks directly. The monotonic clock drives
//! timeouts; the wall clock stamps outbound messages and live frames that
//! arrive without a timestamp. Production passes [`SystemEnv`], tests pass
//! [`ManualEnv`] and move time by hand.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};

/// Source of time for the session.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic time, for timeouts.
    fn now(&self) -> Instant;

    /// Wall-clock time, for message timestamps.
    fn wall_clock(&self) -> DateTime<Utc>;
}

/// Real clocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clocks. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualEnv {
    inner: Arc<Mutex<ManualClock>>,
}

#[derive(Debug)]
struct ManualClock {
    instant: Instant,
    wall: DateTime<Utc>,
}

impl ManualEnv {
    /// Start both clocks at the given wall-clock time.
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self { inner: Arc::new(Mutex::new(ManualClock { instant: Instant::now(), wall })) }
    }

    /// Move both clocks forward.
    pub fn advance(&self, by: Duration) {
        let mut clock = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        clock.instant += by;
        clock.wall += by;
    }
}

impl Environment for ManualEnv {
    fn now(&self) -> Instant {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).instant
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).wall
    }
}

//! Injectable wall-clock abstraction.
//!
//! Every time-triggered condition in the scheduler compares against a
//! [`Clock`] rather than calling the system time directly, so hour/minute
//! transitions can be pinned in tests.

use chrono::{DateTime, Local};

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

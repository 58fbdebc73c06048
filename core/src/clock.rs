//! Wall-clock source for window resolution and watermark stamps.
//!
//! The controller never reads the system time directly; tests drive
//! it with a FixedClock they can move between runs.

use crate::types::Timestamp;
use std::cell::Cell;

pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Local wall-clock time, naive like the warehouse columns.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Local::now().naive_local()
    }
}

#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<Timestamp>,
}

impl FixedClock {
    pub fn new(now: Timestamp) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.set(now);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }
}

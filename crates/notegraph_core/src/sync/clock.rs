//! Hybrid logical clock for locally produced events.
//!
//! # Invariants
//! - Readings returned by one clock are strictly increasing.
//! - After `observe(remote)`, the next local reading orders after `remote`.

use crate::model::event::ClockStamp;

/// Monotonic HLC source owned by one replica.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HybridClock {
    last: ClockStamp,
}

impl HybridClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes from a previously issued reading, e.g. the max clock in a log.
    pub fn resume_from(last: ClockStamp) -> Self {
        Self { last }
    }

    /// Last issued or observed reading.
    pub fn last(&self) -> ClockStamp {
        self.last
    }

    /// Issues a reading for a local event at physical time `wall_ms`.
    pub fn now(&mut self, wall_ms: i64) -> ClockStamp {
        self.last = if wall_ms > self.last.wall_ms {
            ClockStamp {
                wall_ms,
                counter: 0,
            }
        } else {
            increment(self.last)
        };
        self.last
    }

    /// Merges a remote reading so later local readings order after it.
    pub fn observe(&mut self, remote: ClockStamp, wall_ms: i64) -> ClockStamp {
        let local = self.last;
        let wall = wall_ms.max(local.wall_ms).max(remote.wall_ms);

        self.last = if wall == local.wall_ms && wall == remote.wall_ms {
            increment(ClockStamp {
                wall_ms: wall,
                counter: local.counter.max(remote.counter),
            })
        } else if wall == local.wall_ms {
            increment(local)
        } else if wall == remote.wall_ms {
            increment(remote)
        } else {
            ClockStamp {
                wall_ms: wall,
                counter: 0,
            }
        };
        self.last
    }
}

fn increment(stamp: ClockStamp) -> ClockStamp {
    match stamp.counter.checked_add(1) {
        Some(counter) => ClockStamp {
            wall_ms: stamp.wall_ms,
            counter,
        },
        None => ClockStamp {
            wall_ms: stamp.wall_ms.saturating_add(1),
            counter: 0,
        },
    }
}

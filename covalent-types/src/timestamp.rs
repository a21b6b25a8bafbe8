//! Hybrid Logical Clock timestamps.
//!
//! Every CRDT write in the store is stamped with one of these. Ordering is
//! wall time first, then the logical counter, so two writes in the same
//! millisecond still compare strictly.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Hybrid Logical Clock timestamp (Kulkarni et al.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HybridTimestamp {
    /// Milliseconds since Unix epoch.
    wall_time: u64,
    /// Counter for events sharing a wall time.
    logical: u32,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl HybridTimestamp {
    /// Creates a timestamp at the current wall time.
    #[must_use]
    pub fn now() -> Self {
        Self {
            wall_time: now_millis(),
            logical: 0,
        }
    }

    #[must_use]
    pub const fn new(wall_time: u64, logical: u32) -> Self {
        Self { wall_time, logical }
    }

    /// The zero timestamp, older than any real write.
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    #[must_use]
    pub const fn wall_time(&self) -> u64 {
        self.wall_time
    }

    #[must_use]
    pub const fn logical(&self) -> u32 {
        self.logical
    }

    /// Next local timestamp. Always strictly greater than `self`.
    #[must_use]
    pub fn tick(&self) -> Self {
        let now = now_millis();
        if now > self.wall_time {
            Self::new(now, 0)
        } else {
            Self::new(self.wall_time, self.logical.saturating_add(1))
        }
    }

    /// Advances past a timestamp observed from another replica.
    #[must_use]
    pub fn receive(&self, other: &Self) -> Self {
        let now = now_millis();
        let wall = now.max(self.wall_time).max(other.wall_time);

        let logical = match (wall == self.wall_time, wall == other.wall_time) {
            (true, true) => self.logical.max(other.logical).saturating_add(1),
            (true, false) => self.logical.saturating_add(1),
            (false, true) => other.logical.saturating_add(1),
            (false, false) => 0,
        };

        Self::new(wall, logical)
    }
}

impl Default for HybridTimestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl PartialOrd for HybridTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HybridTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wall_time
            .cmp(&other.wall_time)
            .then(self.logical.cmp(&other.logical))
    }
}

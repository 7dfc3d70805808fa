//! Per-publisher event timestamps
//!
//! Envelope timestamps must be non-decreasing per publisher even if the
//! wall clock steps backwards (NTP adjustment). The clock pins each reading
//! to the maximum of the wall clock and the previous reading.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Monotonically non-decreasing epoch-millisecond source
#[derive(Debug, Default)]
pub struct EventClock {
    last: AtomicI64,
}

impl EventClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current timestamp in epoch milliseconds, never less than any value
    /// previously returned by this clock
    pub fn now_millis(&self) -> i64 {
        let wall = Utc::now().timestamp_millis();
        let prev = self.last.fetch_max(wall, Ordering::SeqCst);
        prev.max(wall)
    }
}

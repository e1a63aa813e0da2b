//! When to ping the broker while no beacon message is arriving.

/// Due once half the keep-alive has passed since the last ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingSchedule {
    interval_ms: u64,
    last_ms: u64,
}

impl PingSchedule {
    pub fn new(keep_alive_secs: u16, now_ms: u64) -> Self {
        Self {
            interval_ms: u64::from(keep_alive_secs) * 1000 / 2,
            last_ms: now_ms,
        }
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_ms) >= self.interval_ms
    }

    pub fn sent(&mut self, now_ms: u64) {
        self.last_ms = now_ms;
    }
}

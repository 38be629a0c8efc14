//! Wall clock in unix seconds, swappable in tests.

use chrono::Utc;

pub trait Clock: Send + Sync + 'static {
    fn now_unix(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        Utc::now().timestamp().max(0) as u64
    }
}

/// Unix time that follows tokio's (pausable) clock from a fixed origin.
#[cfg(test)]
pub struct TestClock {
    origin_unix: u64,
    started: tokio::time::Instant,
}

#[cfg(test)]
impl TestClock {
    pub fn starting_at(origin_unix: u64) -> Self {
        Self {
            origin_unix,
            started: tokio::time::Instant::now(),
        }
    }
}

#[cfg(test)]
impl Clock for TestClock {
    fn now_unix(&self) -> u64 {
        self.origin_unix + self.started.elapsed().as_secs()
    }
}

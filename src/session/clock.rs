//! Time source for history timestamps

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Seconds since the Unix epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }
}

/// Manually driven clock for tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, secs: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now += secs;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.lock().map(|now| *now).unwrap_or_default()
    }
}

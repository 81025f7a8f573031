//! Shared request pacing.
//!
//! Upstream feeds rate-limit by source address, so the minimum gap between
//! requests must be shared by every fetch going through one provider
//! instance — per-call-local delays would not help concurrent bulk workers.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Enforces a minimum gap between successive upstream requests.
#[derive(Debug)]
pub struct RequestPacer {
    min_gap: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last_request: Mutex::new(None),
        }
    }

    /// Default pacing for the FactSet feed.
    pub fn factset_default() -> Self {
        Self::new(Duration::from_millis(200))
    }

    /// Default pacing for the Yahoo feed.
    pub fn yahoo_default() -> Self {
        Self::new(Duration::from_millis(100))
    }

    /// Block until the minimum gap since the previous request has elapsed,
    /// then claim the slot. The lock is held across the sleep so that
    /// concurrent callers are serialized rather than all waking at once.
    pub fn wait(&self) {
        let mut last = self.last_request.lock().unwrap();
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_gap {
                std::thread::sleep(self.min_gap - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_is_immediate() {
        let pacer = RequestPacer::new(Duration::from_millis(50));
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() < Duration::from_millis(40));
    }

    #[test]
    fn second_request_waits_for_gap() {
        let pacer = RequestPacer::new(Duration::from_millis(30));
        pacer.wait();
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(25));
    }
}

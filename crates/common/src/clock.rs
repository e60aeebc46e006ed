//! Session clock for progress and timing reports.
//!
//! Every export session is anchored to a monotonic epoch recorded when the
//! session starts. The clock reports elapsed time and a simple linear
//! estimate of the time remaining.

use std::time::Instant;

/// A session clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment the export session started).
#[derive(Debug, Clone)]
pub struct SessionClock {
    /// The instant the session started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string).
    epoch_wall: String,
}

impl SessionClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Seconds elapsed since the session started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at session start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Estimated seconds remaining after `done` of `total` units of work.
    pub fn eta_secs(&self, done: usize, total: usize) -> f64 {
        estimate_remaining(self.elapsed_secs(), done, total)
    }
}

/// Linear extrapolation of the remaining time. Zero until one unit is done.
pub fn estimate_remaining(elapsed_secs: f64, done: usize, total: usize) -> f64 {
    if done == 0 || total == 0 || done >= total {
        return 0.0;
    }
    let per_unit = elapsed_secs / done as f64;
    (per_unit * (total - done) as f64).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = SessionClock::start();
        assert!(clock.elapsed_secs() < 1.0);
        assert!(!clock.epoch_wall().is_empty());
    }

    #[test]
    fn test_estimate_remaining() {
        assert_eq!(estimate_remaining(10.0, 0, 4), 0.0);
        assert!((estimate_remaining(10.0, 2, 4) - 10.0).abs() < 1e-9);
        assert_eq!(estimate_remaining(10.0, 4, 4), 0.0);
        assert_eq!(estimate_remaining(10.0, 1, 0), 0.0);
    }
}

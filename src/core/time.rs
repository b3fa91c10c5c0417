//! Time tracking

use std::time::{Duration, Instant};

/// Tick timing, measured from the wall clock or advanced by fixed steps
#[derive(Debug)]
pub struct Time {
    last_update: Instant,
    delta: Duration,
    elapsed: Duration,
    frame_count: u64,
}

impl Time {
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Measure the time since the previous update
    pub fn update(&mut self) {
        let now = Instant::now();
        self.advance(now - self.last_update);
        self.last_update = now;
    }

    /// Advance by a fixed step
    pub fn advance(&mut self, delta: Duration) {
        self.delta = delta;
        self.elapsed += delta;
        self.frame_count += 1;
    }

    pub fn delta(&self) -> Duration {
        self.delta
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_steps_accumulate() {
        let mut time = Time::new();
        time.advance(Duration::from_millis(250));
        time.advance(Duration::from_millis(250));

        assert_eq!(time.frame_count(), 2);
        assert!((time.elapsed_seconds() - 0.5).abs() < 1e-6);
        assert!((time.delta_seconds() - 0.25).abs() < 1e-6);
    }
}

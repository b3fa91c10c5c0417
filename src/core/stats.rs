//! Tick statistics

use std::collections::VecDeque;
use std::ops::AddAssign;
use std::time::Duration;

/// Lifecycle counters of one or more ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub objects_started: usize,
    pub components_started: usize,
    pub component_updates: usize,
    pub objects_destroyed: usize,
    pub components_destroyed: usize,
}

impl AddAssign for TickStats {
    fn add_assign(&mut self, other: Self) {
        self.objects_started += other.objects_started;
        self.components_started += other.components_started;
        self.component_updates += other.component_updates;
        self.objects_destroyed += other.objects_destroyed;
        self.components_destroyed += other.components_destroyed;
    }
}

/// Rolling tick-time statistics
#[derive(Debug)]
pub struct FrameStats {
    tick_times: VecDeque<Duration>,
    max_samples: usize,
    avg_tick_ms: f32,
    max_tick_ms: f32,
    total_ticks: u64,
    /// Counters of the most recent tick
    last: TickStats,
    /// Counters since start-up
    totals: TickStats,
}

impl FrameStats {
    pub fn new() -> Self {
        Self {
            tick_times: VecDeque::with_capacity(120),
            max_samples: 120,
            avg_tick_ms: 0.0,
            max_tick_ms: 0.0,
            total_ticks: 0,
            last: TickStats::default(),
            totals: TickStats::default(),
        }
    }

    /// Record how long a tick took and what it did
    pub fn record_tick(&mut self, duration: Duration, stats: TickStats) {
        self.total_ticks += 1;
        self.last = stats;
        self.totals += stats;

        if self.tick_times.len() >= self.max_samples {
            self.tick_times.pop_front();
        }
        self.tick_times.push_back(duration);

        let total: Duration = self.tick_times.iter().sum();
        let max = self.tick_times.iter().max().copied().unwrap_or_default();
        self.avg_tick_ms = total.as_secs_f32() * 1000.0 / self.tick_times.len() as f32;
        self.max_tick_ms = max.as_secs_f32() * 1000.0;
    }

    pub fn avg_tick_ms(&self) -> f32 {
        self.avg_tick_ms
    }

    pub fn max_tick_ms(&self) -> f32 {
        self.max_tick_ms
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn last(&self) -> TickStats {
        self.last
    }

    pub fn totals(&self) -> TickStats {
        self.totals
    }

    pub fn format_stats(&self) -> String {
        format!(
            "Tick: {:.2}ms (max: {:.2}) | started: {} objects, {} components | updates: {} | destroyed: {} objects, {} components",
            self.avg_tick_ms,
            self.max_tick_ms,
            self.last.objects_started,
            self.last.components_started,
            self.last.component_updates,
            self.last.objects_destroyed,
            self.last.components_destroyed,
        )
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

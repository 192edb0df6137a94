//! Frame timing statistics for the render loop.

use std::time::{Duration, Instant};

/// Summary of one reporting window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Frames presented during the window.
    pub presented: u32,
    /// Ticks that were skipped because the swapchain had to be rebuilt.
    pub skipped: u32,
    /// Presented frames per second.
    pub fps: f32,
    /// Average time between ticks, in milliseconds.
    pub avg_frame_ms: f32,
}

/// Accumulates per-tick timings and emits a [`FrameReport`] once per interval.
#[derive(Debug)]
pub struct FrameStats {
    interval: Duration,
    window_start: Instant,
    last_tick: Instant,
    presented: u32,
    skipped: u32,
    frame_time: Duration,
    ticks: u32,
}

impl FrameStats {
    /// Creates a new accumulator reporting every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    fn starting_at(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            window_start: now,
            last_tick: now,
            presented: 0,
            skipped: 0,
            frame_time: Duration::ZERO,
            ticks: 0,
        }
    }

    /// Records one render tick. Returns a report when the interval elapsed.
    pub fn tick(&mut self, presented: bool) -> Option<FrameReport> {
        self.tick_at(presented, Instant::now())
    }

    fn tick_at(&mut self, presented: bool, now: Instant) -> Option<FrameReport> {
        self.frame_time += now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.ticks += 1;
        if presented {
            self.presented += 1;
        } else {
            self.skipped += 1;
        }

        let window = now.saturating_duration_since(self.window_start);
        if window < self.interval {
            return None;
        }

        let report = FrameReport {
            presented: self.presented,
            skipped: self.skipped,
            fps: self.presented as f32 / window.as_secs_f32(),
            avg_frame_ms: self.frame_time.as_secs_f32() * 1000.0 / self.ticks as f32,
        };
        *self = Self::starting_at(self.interval, now);
        Some(report)
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_report_before_interval() {
        let start = Instant::now();
        let mut stats = FrameStats::starting_at(Duration::from_secs(1), start);
        assert!(stats.tick_at(true, start + Duration::from_millis(16)).is_none());
        assert!(stats.tick_at(true, start + Duration::from_millis(32)).is_none());
    }

    #[test]
    fn test_report_after_interval() {
        let start = Instant::now();
        let mut stats = FrameStats::starting_at(Duration::from_secs(1), start);
        for i in 1..=3 {
            assert!(stats.tick_at(true, start + Duration::from_millis(250 * i)).is_none());
        }
        let report = stats
            .tick_at(false, start + Duration::from_millis(1000))
            .expect("interval elapsed");

        assert_eq!(report.presented, 3);
        assert_eq!(report.skipped, 1);
        assert!((report.fps - 3.0).abs() < 1e-3);
        assert!((report.avg_frame_ms - 250.0).abs() < 1e-3);
    }

    #[test]
    fn test_counters_reset_after_report() {
        let start = Instant::now();
        let mut stats = FrameStats::starting_at(Duration::from_millis(100), start);
        assert!(stats.tick_at(true, start + Duration::from_millis(100)).is_some());
        assert_eq!(stats.presented, 0);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.ticks, 0);
    }
}

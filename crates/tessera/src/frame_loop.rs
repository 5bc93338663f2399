//! # Frame Loop
//!
//! Drives a [`Manager`] for a fixed number of frames:
//! ```text
//! Frame N:
//! ┌────────────────────────────────────────────────┐
//! │ 1. UPDATE  flush deferred adds, apply          │
//! │            priorities, run every system        │
//! │ 2. RENDER  run every system's render hook      │
//! │ 3. RECORD  frame time against the budget       │
//! └────────────────────────────────────────────────┘
//! ```

use std::time::{Duration, Instant};

use tessera_core::{EcsResult, Manager};

/// Target frame time for 60 FPS.
pub const TARGET_FRAME_TIME: Duration = Duration::from_micros(16_666);

/// Configuration for the frame loop.
#[derive(Clone, Debug)]
pub struct FrameLoopConfig {
    /// Frames to run.
    pub frames: u64,
    /// Frame time above which a frame counts as over budget.
    pub frame_budget: Duration,
    /// Log every over-budget frame.
    pub enable_timing_logs: bool,
}

impl Default for FrameLoopConfig {
    fn default() -> Self {
        Self {
            frames: 1000,
            frame_budget: TARGET_FRAME_TIME,
            enable_timing_logs: false,
        }
    }
}

/// Accumulated frame timing.
#[derive(Clone, Debug)]
pub struct FrameStats {
    /// Frames recorded.
    pub frames_recorded: u64,
    /// Sum of update times.
    pub update_us_sum: u64,
    /// Sum of render times.
    pub render_us_sum: u64,
    /// Shortest frame.
    pub min_frame_us: u64,
    /// Longest frame.
    pub max_frame_us: u64,
    /// Frames above the budget.
    pub frames_over_budget: u64,
}

impl FrameStats {
    /// Creates an empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames_recorded: 0,
            update_us_sum: 0,
            render_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
        }
    }

    /// Records one frame. Returns whether it exceeded `budget`.
    pub fn record(&mut self, update: Duration, render: Duration, budget: Duration) -> bool {
        let update_us = micros(update);
        let render_us = micros(render);
        let total_us = update_us + render_us;

        self.frames_recorded += 1;
        self.update_us_sum += update_us;
        self.render_us_sum += render_us;
        self.min_frame_us = self.min_frame_us.min(total_us);
        self.max_frame_us = self.max_frame_us.max(total_us);

        let over = total_us > micros(budget);
        if over {
            self.frames_over_budget += 1;
        }
        over
    }

    /// Average frame time in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        ((self.update_us_sum + self.render_us_sum) as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Fraction of frames over budget.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    /// Prints a summary table.
    #[allow(clippy::cast_precision_loss)]
    pub fn print_summary(&self) {
        let min_us = if self.frames_recorded == 0 { 0 } else { self.min_frame_us };
        println!("┌─ FRAME TIMING ─────────────────────────────────────────────────┐");
        println!("│ Frames Recorded:    {}", self.frames_recorded);
        println!("│ Average Frame:      {:.3} ms", self.avg_frame_ms());
        println!("│ Min Frame:          {:.3} ms", min_us as f64 / 1000.0);
        println!("│ Max Frame:          {:.3} ms", self.max_frame_us as f64 / 1000.0);
        println!(
            "│ Over Budget:        {} frames ({:.1}%)",
            self.frames_over_budget,
            self.over_budget_ratio() * 100.0
        );
        println!("└──────────────────────────────────────────────────────────────────┘");
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Runs update and render on a manager for a fixed frame count.
#[derive(Debug, Default)]
pub struct FrameLoop {
    config: FrameLoopConfig,
    frame_count: u64,
    stats: FrameStats,
}

impl FrameLoop {
    /// Creates a loop with the given configuration.
    #[must_use]
    pub fn new(config: FrameLoopConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            stats: FrameStats::new(),
        }
    }

    /// Runs one frame.
    ///
    /// # Errors
    ///
    /// Propagates the manager's error if it is not running.
    pub fn step(&mut self, manager: &mut Manager) -> EcsResult<()> {
        let start = Instant::now();
        manager.update()?;
        let update = start.elapsed();

        let start = Instant::now();
        manager.render()?;
        let render = start.elapsed();

        self.frame_count += 1;
        let over = self.stats.record(update, render, self.config.frame_budget);
        if over && self.config.enable_timing_logs {
            tracing::warn!(
                "Frame {} exceeded budget: {:?} (budget {:?})",
                self.frame_count,
                update + render,
                self.config.frame_budget
            );
        }
        Ok(())
    }

    /// Runs the configured number of frames.
    ///
    /// # Errors
    ///
    /// Stops at the first failing frame and returns its error.
    pub fn run(&mut self, manager: &mut Manager) -> EcsResult<&FrameStats> {
        for _ in 0..self.config.frames {
            self.step(manager)?;
        }
        tracing::debug!(
            "Frame loop finished: {} frames, avg {:.3} ms",
            self.frame_count,
            self.stats.avg_frame_ms()
        );
        Ok(&self.stats)
    }

    /// Frames run so far.
    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Accumulated statistics.
    #[must_use]
    pub const fn stats(&self) -> &FrameStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::EcsError;

    #[test]
    fn test_record_budget() {
        let mut stats = FrameStats::new();
        let budget = Duration::from_millis(10);
        assert!(!stats.record(Duration::from_millis(2), Duration::from_millis(3), budget));
        assert!(stats.record(Duration::from_millis(8), Duration::from_millis(4), budget));

        assert_eq!(stats.frames_recorded, 2);
        assert_eq!(stats.frames_over_budget, 1);
        assert_eq!(stats.min_frame_us, 5_000);
        assert_eq!(stats.max_frame_us, 12_000);
        assert!((stats.avg_frame_ms() - 8.5).abs() < 1e-9);
        assert!((stats.over_budget_ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_stats() {
        let stats = FrameStats::default();
        assert!(stats.avg_frame_ms().abs() < f64::EPSILON);
        assert!(stats.over_budget_ratio().abs() < f64::EPSILON);
    }

    #[test]
    fn test_run_counts_frames() {
        let mut manager = Manager::new();
        manager.init().unwrap();

        let mut frame_loop = FrameLoop::new(FrameLoopConfig {
            frames: 25,
            ..FrameLoopConfig::default()
        });
        assert_eq!(frame_loop.run(&mut manager).unwrap().frames_recorded, 25);
        assert_eq!(frame_loop.frame_count(), 25);
    }

    #[test]
    fn test_run_before_init_fails() {
        let mut manager = Manager::new();
        let mut frame_loop = FrameLoop::default();
        assert!(matches!(frame_loop.run(&mut manager), Err(EcsError::NotInitialized)));
        assert_eq!(frame_loop.frame_count(), 0);
    }
}

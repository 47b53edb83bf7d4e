//! Fixed-timestep planning for the external driver. The driver feeds frame
//! durations in, runs the planned ticks and renders with the returned alpha.

use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
        }
    }
}

impl LoopConfig {
    pub fn fixed_dt(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_tps.max(1) as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    pub ticks_to_run: u32,
    /// Leftover fraction of a tick, for render interpolation.
    pub alpha: f32,
    pub dropped_backlog: Duration,
}

/// Ticks owed for the time currently banked in the accumulator.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TickBudget {
    ticks: u32,
    carry: Duration,
    dropped: Duration,
}

#[derive(Debug, Clone)]
pub struct FixedStepClock {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
}

impl FixedStepClock {
    pub fn new(config: &LoopConfig) -> Self {
        let fallback = LoopConfig::default();
        Self {
            fixed_dt: non_zero_or(config.fixed_dt(), fallback.fixed_dt()),
            max_frame_delta: non_zero_or(config.max_frame_delta, fallback.max_frame_delta),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn advance(&mut self, frame_dt: Duration) -> FramePlan {
        self.accumulator = self
            .accumulator
            .saturating_add(frame_dt.min(self.max_frame_delta));
        let budget = budget_ticks(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        self.accumulator = budget.carry;

        if !budget.dropped.is_zero() {
            warn!(
                dropped_backlog_ms = budget.dropped.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }

        FramePlan {
            ticks_to_run: budget.ticks,
            alpha: (self.accumulator.as_secs_f64() / self.fixed_dt.as_secs_f64()) as f32,
            dropped_backlog: budget.dropped,
        }
    }
}

/// Spends whole ticks out of `banked`, at most `cap` of them. Whatever would
/// still cover a full tick after the cap is dropped rather than carried.
fn budget_ticks(mut banked: Duration, fixed_dt: Duration, cap: u32) -> TickBudget {
    let mut ticks = 0u32;
    while ticks < cap {
        let Some(rest) = banked.checked_sub(fixed_dt) else {
            break;
        };
        banked = rest;
        ticks += 1;
    }
    if banked >= fixed_dt {
        return TickBudget {
            ticks,
            carry: Duration::ZERO,
            dropped: banked,
        };
    }
    TickBudget {
        ticks,
        carry: banked,
        dropped: Duration::ZERO,
    }
}

fn non_zero_or(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_spends_whole_ticks_and_carries_the_rest() {
        let budget = budget_ticks(Duration::from_millis(50), Duration::from_millis(16), 5);
        assert_eq!(
            budget,
            TickBudget {
                ticks: 3,
                carry: Duration::from_millis(2),
                dropped: Duration::ZERO,
            }
        );
    }

    #[test]
    fn budget_drops_backlog_past_the_cap() {
        let budget = budget_ticks(Duration::from_millis(120), Duration::from_millis(16), 3);
        assert_eq!(budget.ticks, 3);
        assert_eq!(budget.carry, Duration::ZERO);
        assert_eq!(budget.dropped, Duration::from_millis(72));
    }

    #[test]
    fn long_frames_are_clamped_before_banking() {
        let config = LoopConfig {
            target_tps: 10,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 10,
            ..LoopConfig::default()
        };
        let mut clock = FixedStepClock::new(&config);
        let plan = clock.advance(Duration::from_millis(600));
        assert_eq!(plan.ticks_to_run, 2);
        assert_eq!(plan.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn clock_carries_partial_tick_as_alpha() {
        let config = LoopConfig {
            target_tps: 50,
            ..LoopConfig::default()
        };
        let mut clock = FixedStepClock::new(&config);

        let first = clock.advance(Duration::from_millis(30));
        assert_eq!(first.ticks_to_run, 1);
        assert!((first.alpha - 0.5).abs() < 1e-3);

        let second = clock.advance(Duration::from_millis(10));
        assert_eq!(second.ticks_to_run, 1);
        assert!(second.alpha.abs() < 1e-3);
    }

    #[test]
    fn clock_caps_ticks_after_a_long_stall() {
        let mut clock = FixedStepClock::new(&LoopConfig::default());
        let plan = clock.advance(Duration::from_secs(3));
        assert_eq!(plan.ticks_to_run, 5);
        assert!(plan.dropped_backlog > Duration::ZERO);
        assert!(plan.alpha.abs() < 1e-3);
    }

    #[test]
    fn zero_tick_rate_runs_one_tick_per_second() {
        let config = LoopConfig {
            target_tps: 0,
            max_frame_delta: Duration::ZERO,
            ..LoopConfig::default()
        };
        let clock = FixedStepClock::new(&config);
        assert_eq!(clock.fixed_dt(), Duration::from_secs_f64(1.0));
    }
}

use std::time::Duration;

/// One reporting window of the headless driver.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct PaceReport {
    pub(crate) frames_per_second: f32,
    pub(crate) ticks_per_second: f32,
    pub(crate) events_per_tick: f32,
    pub(crate) dropped_backlog_ms: u64,
}

/// Counts frames, ticks and drained events over windows of driver time. The
/// driver clock is simulated, so reports are identical between runs with the
/// same seed and frame length.
#[derive(Debug)]
pub(crate) struct PaceMeter {
    window: Duration,
    window_start: Duration,
    frames: u32,
    ticks: u32,
    events: u64,
    dropped_backlog: Duration,
}

impl PaceMeter {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window: window.max(Duration::from_millis(1)),
            window_start: Duration::ZERO,
            frames: 0,
            ticks: 0,
            events: 0,
            dropped_backlog: Duration::ZERO,
        }
    }

    pub(crate) fn frame(&mut self, dropped_backlog: Duration) {
        self.frames = self.frames.saturating_add(1);
        self.dropped_backlog = self.dropped_backlog.saturating_add(dropped_backlog);
    }

    pub(crate) fn tick(&mut self, drained_events: usize) {
        self.ticks = self.ticks.saturating_add(1);
        self.events = self.events.saturating_add(drained_events as u64);
    }

    /// Closes the window once `now` has moved a full window past its start.
    pub(crate) fn report(&mut self, now: Duration) -> Option<PaceReport> {
        let span = now.checked_sub(self.window_start)?;
        if span < self.window {
            return None;
        }
        let seconds = span.as_secs_f32();
        let report = PaceReport {
            frames_per_second: self.frames as f32 / seconds,
            ticks_per_second: self.ticks as f32 / seconds,
            events_per_tick: match self.ticks {
                0 => 0.0,
                ticks => self.events as f32 / ticks as f32,
            },
            dropped_backlog_ms: self.dropped_backlog.as_millis() as u64,
        };
        *self = Self {
            window_start: now,
            ..Self::new(self.window)
        };
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_averages_over_the_window() {
        let mut meter = PaceMeter::new(Duration::from_secs(1));
        for _ in 0..50 {
            meter.frame(Duration::ZERO);
        }
        for events in [3, 0, 1, 0] {
            meter.tick(events);
        }

        let report = meter.report(Duration::from_secs(1)).expect("window closed");
        assert!((report.frames_per_second - 50.0).abs() < 0.01);
        assert!((report.ticks_per_second - 4.0).abs() < 0.01);
        assert!((report.events_per_tick - 1.0).abs() < f32::EPSILON);
        assert_eq!(report.dropped_backlog_ms, 0);
    }

    #[test]
    fn open_window_reports_nothing() {
        let mut meter = PaceMeter::new(Duration::from_secs(1));
        meter.frame(Duration::ZERO);
        assert_eq!(meter.report(Duration::from_millis(999)), None);
    }

    #[test]
    fn counters_restart_with_each_window() {
        let mut meter = PaceMeter::new(Duration::from_secs(1));
        meter.frame(Duration::from_millis(40));
        meter.tick(2);
        let first = meter.report(Duration::from_secs(1)).expect("first window");
        assert_eq!(first.dropped_backlog_ms, 40);

        meter.tick(0);
        let second = meter.report(Duration::from_secs(2)).expect("second window");
        assert_eq!(second.dropped_backlog_ms, 0);
        assert!((second.frames_per_second).abs() < f32::EPSILON);
        assert!((second.ticks_per_second - 1.0).abs() < 0.01);
    }
}

//! Periodic progress reports while a simulation runs
//!
//! The reporter schedules itself every `step` of simulated time and logs the
//! clock, the number of events executed and the event rate against the wall
//! clock. The step is rescaled after each report so that reports arrive
//! roughly once per wall-clock interval. It stops rescheduling once no other
//! event is pending, so it never keeps a run alive on its own.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use evsim_core::{log_function, log_info, LogComponent, Time};
use evsim_sched::{EventId, Simulator};

static LOG: LogComponent = LogComponent::new("ShowProgress");

/// Tolerated relative deviation from the wall-clock interval before the
/// step is rescaled
const HYSTERESIS: f64 = 0.25;
const MAX_GAIN: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    pub now: Time,
    pub events: u64,
    /// Events per wall-clock second since the previous report
    pub event_rate: f64,
    /// Simulated seconds per wall-clock second since the previous report
    pub speed: f64,
}

struct ProgressState {
    interval: Duration,
    step: Time,
    event: EventId,
    last_wall: Instant,
    last_now: Time,
    last_events: u64,
    reports: u64,
    last_report: Option<ProgressReport>,
}

pub struct ShowProgress {
    state: Rc<RefCell<ProgressState>>,
}

impl std::fmt::Debug for ShowProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ShowProgress")
            .field("interval", &state.interval)
            .field("step", &state.step)
            .field("reports", &state.reports)
            .finish()
    }
}

impl ShowProgress {
    /// Start reporting about once per `interval` of wall-clock time, with a
    /// first report after one simulated second
    pub fn new(interval: Duration) -> Self {
        Self::with_step(interval, Time::seconds(1.0))
    }

    /// Like `new`, with the first report after `step` of simulated time
    pub fn with_step(interval: Duration, step: Time) -> Self {
        let state = Rc::new(RefCell::new(ProgressState {
            interval,
            step,
            event: EventId::default(),
            last_wall: Instant::now(),
            last_now: Simulator::now(),
            last_events: Simulator::get_event_count(),
            reports: 0,
            last_report: None,
        }));
        schedule_check(&state, step);
        Self { state }
    }

    pub fn report_count(&self) -> u64 {
        self.state.borrow().reports
    }

    pub fn last_report(&self) -> Option<ProgressReport> {
        self.state.borrow().last_report
    }

    /// Simulated time between reports
    pub fn step(&self) -> Time {
        self.state.borrow().step
    }

    pub fn stop(&self) {
        self.state.borrow().event.cancel();
    }
}

impl Drop for ShowProgress {
    fn drop(&mut self) {
        if let Ok(state) = self.state.try_borrow() {
            state.event.cancel();
        }
    }
}

fn schedule_check(state: &Rc<RefCell<ProgressState>>, step: Time) {
    let weak = Rc::downgrade(state);
    let event = Simulator::schedule(step, move || check_progress(weak));
    state.borrow_mut().event = event;
}

fn rescaled_step(step: Time, interval: Duration, elapsed: Duration) -> Time {
    let elapsed = elapsed.as_secs_f64().max(f64::EPSILON);
    let ratio = interval.as_secs_f64() / elapsed;
    if (ratio - 1.0).abs() <= HYSTERESIS {
        return step;
    }
    let gain = ratio.clamp(1.0 / MAX_GAIN, MAX_GAIN);
    Time::from_ticks(((step.ticks() as f64 * gain) as i64).max(1))
}

fn check_progress(weak: Weak<RefCell<ProgressState>>) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    let now = Simulator::now();
    let events = Simulator::get_event_count();
    let wall = Instant::now();
    let next_step = {
        let mut s = state.borrow_mut();
        let elapsed = wall.duration_since(s.last_wall);
        let seconds = elapsed.as_secs_f64().max(f64::EPSILON);
        let report = ProgressReport {
            now,
            events,
            event_rate: (events - s.last_events) as f64 / seconds,
            speed: (now - s.last_now).as_secs_f64() / seconds,
        };
        log_info!(
            LOG,
            "{} {} events ({:.0} ev/s, {:.3} sim s per wall s)",
            now.format_seconds(),
            events,
            report.event_rate,
            report.speed
        );
        s.reports += 1;
        s.last_report = Some(report);
        s.last_wall = wall;
        s.last_now = now;
        s.last_events = events;
        s.step = rescaled_step(s.step, s.interval, elapsed);
        s.step
    };
    if Simulator::pending_event_count() == 0 {
        log_function!(LOG, "no pending events, reporter idle");
        return;
    }
    schedule_check(&state, next_step);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_while_running() {
        for i in 1..=10 {
            Simulator::schedule(Time::seconds(i as f64), || {});
        }
        // Reports come far faster than the interval, so the step doubles:
        // checks at 2s, 6s and 14s, the last one finding the queue empty.
        let progress = ShowProgress::with_step(Duration::from_secs(3600), Time::seconds(2.0));
        Simulator::run();
        assert_eq!(progress.report_count(), 3);
        let last = progress.last_report().unwrap();
        assert_eq!(last.now, Time::seconds(14.0));
        assert_eq!(last.events, 13);
        assert_eq!(progress.step(), Time::seconds(16.0));
        assert_eq!(Simulator::now(), Time::seconds(14.0));
    }

    #[test]
    fn test_idle_reporter_lets_run_end() {
        let progress = ShowProgress::new(Duration::from_millis(1));
        Simulator::run();
        assert_eq!(progress.report_count(), 1);
        assert_eq!(Simulator::now(), Time::seconds(1.0));
    }

    #[test]
    fn test_stop_cancels_pending_check() {
        let progress = ShowProgress::new(Duration::from_millis(1));
        progress.stop();
        Simulator::run();
        assert_eq!(progress.report_count(), 0);
    }

    #[test]
    fn test_step_rescaling() {
        let step = Time::seconds(1.0);
        let interval = Duration::from_secs(1);
        assert_eq!(rescaled_step(step, interval, Duration::from_millis(900)), step);
        assert_eq!(rescaled_step(step, interval, Duration::from_millis(100)), Time::seconds(2.0));
        assert_eq!(rescaled_step(step, interval, Duration::from_secs(10)), Time::seconds(0.5));
    }
}

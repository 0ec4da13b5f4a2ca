//! One-shot timer bound to a function
//!
//! A timer owns at most one pending event. What happens to that event when
//! the timer is dropped is chosen by its `DestroyPolicy`.

use std::fmt;
use std::rc::Rc;

use evsim_core::{log_error, log_function, log_warn, LogComponent, Time};

use crate::event::EventId;
use crate::simulator::Simulator;

static LOG: LogComponent = LogComponent::new("Timer");

/// Fate of a pending event when its timer is dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DestroyPolicy {
    #[default]
    CancelOnDestroy,
    RemoveOnDestroy,
    /// Report a still-running timer as an error
    CheckOnDestroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Running,
    Expired,
    Suspended,
}

pub struct Timer {
    policy: DestroyPolicy,
    delay: Time,
    function: Option<Rc<dyn Fn()>>,
    event: EventId,
    delay_left: Time,
    suspended: bool,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new(DestroyPolicy::default())
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("policy", &self.policy)
            .field("delay", &self.delay)
            .field("state", &self.get_state())
            .finish()
    }
}

impl Timer {
    pub fn new(policy: DestroyPolicy) -> Self {
        Self {
            policy,
            delay: Time::ZERO,
            function: None,
            event: EventId::default(),
            delay_left: Time::ZERO,
            suspended: false,
        }
    }

    /// Function invoked on expiry
    pub fn set_function(&mut self, f: impl Fn() + 'static) {
        self.function = Some(Rc::new(f));
    }

    /// Default delay used by `schedule`
    pub fn set_delay(&mut self, delay: Time) {
        self.delay = delay;
    }

    pub fn get_delay(&self) -> Time {
        self.delay
    }

    pub fn policy(&self) -> DestroyPolicy {
        self.policy
    }

    /// Time until expiry; the frozen remainder while suspended
    pub fn get_delay_left(&self) -> Time {
        match self.get_state() {
            TimerState::Running => Simulator::get_delay_left(&self.event),
            TimerState::Expired => Time::ZERO,
            TimerState::Suspended => self.delay_left,
        }
    }

    pub fn cancel(&mut self) {
        self.event.cancel();
    }

    pub fn remove(&mut self) {
        self.event.remove();
    }

    pub fn is_expired(&self) -> bool {
        !self.suspended && self.event.is_expired()
    }

    pub fn is_running(&self) -> bool {
        !self.suspended && self.event.is_pending()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn get_state(&self) -> TimerState {
        if self.suspended {
            TimerState::Suspended
        } else if self.event.is_pending() {
            TimerState::Running
        } else {
            TimerState::Expired
        }
    }

    /// Arm the timer with the default delay
    #[track_caller]
    pub fn schedule(&mut self) {
        self.schedule_in(self.delay);
    }

    /// Arm the timer to expire after `delay`
    #[track_caller]
    pub fn schedule_in(&mut self, delay: Time) {
        let Some(function) = self.function.clone() else {
            log_error!(LOG, "schedule without a function");
            return;
        };
        if self.event.is_pending() {
            log_warn!(LOG, "timer still running while rescheduled; cancelling previous expiry");
            self.event.cancel();
        }
        log_function!(LOG, "schedule in {}", delay);
        self.suspended = false;
        self.event = Simulator::schedule(delay, move || function());
    }

    /// Stop the clock, remembering the time left
    pub fn suspend(&mut self) {
        if !self.is_running() {
            log_warn!(LOG, "suspend on a timer that is not running");
            return;
        }
        self.delay_left = Simulator::get_delay_left(&self.event);
        match self.policy {
            DestroyPolicy::RemoveOnDestroy => self.event.remove(),
            _ => self.event.cancel(),
        }
        self.suspended = true;
    }

    /// Restart the clock with the time left at `suspend`
    #[track_caller]
    pub fn resume(&mut self) {
        if !self.suspended {
            log_warn!(LOG, "resume on a timer that is not suspended");
            return;
        }
        let left = self.delay_left;
        self.schedule_in(left);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        match self.policy {
            DestroyPolicy::CancelOnDestroy => self.event.cancel(),
            DestroyPolicy::RemoveOnDestroy => self.event.remove(),
            DestroyPolicy::CheckOnDestroy => {
                if self.event.is_pending() {
                    log_error!(LOG, "timer dropped while still running");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn counting_timer(policy: DestroyPolicy) -> (Timer, Rc<Cell<u32>>) {
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let mut timer = Timer::new(policy);
        timer.set_function(move || counter.set(counter.get() + 1));
        (timer, hits)
    }

    #[test]
    fn test_schedule_and_expire() {
        let (mut timer, hits) = counting_timer(DestroyPolicy::CancelOnDestroy);
        timer.set_delay(Time::seconds(2.0));
        assert_eq!(timer.get_state(), TimerState::Expired);
        timer.schedule();
        assert!(timer.is_running());
        assert_eq!(timer.get_delay_left(), Time::seconds(2.0));
        Simulator::run();
        assert_eq!(hits.get(), 1);
        assert!(timer.is_expired());
        assert_eq!(Simulator::now(), Time::seconds(2.0));
    }

    #[test]
    fn test_reschedule_cancels_previous() {
        let (mut timer, hits) = counting_timer(DestroyPolicy::CancelOnDestroy);
        timer.schedule_in(Time::seconds(1.0));
        timer.schedule_in(Time::seconds(3.0));
        Simulator::run();
        assert_eq!(hits.get(), 1);
        assert_eq!(Simulator::now(), Time::seconds(3.0));
    }

    #[test]
    fn test_suspend_and_resume() {
        let timer = Rc::new(RefCell::new(counting_timer(DestroyPolicy::CancelOnDestroy)));
        timer.borrow_mut().0.schedule_in(Time::seconds(10.0));

        let t = timer.clone();
        Simulator::schedule(Time::seconds(4.0), move || t.borrow_mut().0.suspend());
        let t = timer.clone();
        Simulator::schedule(Time::seconds(5.0), move || {
            let timer = &t.borrow().0;
            assert_eq!(timer.get_state(), TimerState::Suspended);
            assert_eq!(timer.get_delay_left(), Time::seconds(6.0));
        });
        let t = timer.clone();
        Simulator::schedule(Time::seconds(20.0), move || t.borrow_mut().0.resume());
        Simulator::run();

        assert_eq!(timer.borrow().1.get(), 1);
        assert_eq!(Simulator::now(), Time::seconds(26.0));
    }

    #[test]
    fn test_drop_policies() {
        let (mut cancel, cancel_hits) = counting_timer(DestroyPolicy::CancelOnDestroy);
        cancel.schedule_in(Time::seconds(1.0));
        drop(cancel);

        let (mut remove, remove_hits) = counting_timer(DestroyPolicy::RemoveOnDestroy);
        remove.schedule_in(Time::seconds(1.0));
        assert_eq!(Simulator::pending_event_count(), 2);
        drop(remove);
        assert_eq!(Simulator::pending_event_count(), 1);

        let (mut check, check_hits) = counting_timer(DestroyPolicy::CheckOnDestroy);
        check.schedule_in(Time::seconds(1.0));
        drop(check);

        Simulator::run();
        assert_eq!(cancel_hits.get(), 0);
        assert_eq!(remove_hits.get(), 0);
        assert_eq!(check_hits.get(), 1);
    }

    #[test]
    fn test_schedule_without_function_is_ignored() {
        let mut timer = Timer::default();
        timer.schedule_in(Time::seconds(1.0));
        assert!(!timer.is_running());
        assert_eq!(Simulator::pending_event_count(), 0);
    }
}

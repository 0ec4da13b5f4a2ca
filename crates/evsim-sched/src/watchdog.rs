//! Watchdog: fires unless pinged before its deadline
//!
//! Each `ping(delay)` pushes the deadline to at least now + `delay`. Only
//! one event is ever queued; on wake-up it re-arms itself for the remaining
//! time until the clock reaches the deadline.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use evsim_core::{log_function, LogComponent, Time};

use crate::event::EventId;
use crate::simulator::Simulator;

static LOG: LogComponent = LogComponent::new("Watchdog");

#[derive(Default)]
struct WatchdogState {
    event: EventId,
    end: Time,
    function: Option<Rc<dyn Fn()>>,
}

#[derive(Default)]
pub struct Watchdog {
    state: Rc<RefCell<WatchdogState>>,
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Watchdog")
            .field("end", &state.end)
            .field("armed", &state.event.is_pending())
            .finish()
    }
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_function(&mut self, f: impl Fn() + 'static) {
        self.state.borrow_mut().function = Some(Rc::new(f));
    }

    /// Deadline currently in force
    pub fn deadline(&self) -> Time {
        self.state.borrow().end
    }

    pub fn is_armed(&self) -> bool {
        self.state.borrow().event.is_pending()
    }

    /// Delay expiry until at least now + `delay`
    #[track_caller]
    pub fn ping(&mut self, delay: Time) {
        let now = Simulator::now();
        let mut state = self.state.borrow_mut();
        let end = now + delay;
        if end > state.end {
            state.end = end;
        }
        log_function!(LOG, "ping, deadline {}", state.end);
        if state.event.is_pending() {
            return;
        }
        let wait = state.end - now;
        let weak = Rc::downgrade(&self.state);
        state.event = Simulator::schedule(wait, move || expire(weak));
    }

    /// Disarm without firing
    pub fn cancel(&mut self) {
        self.state.borrow().event.cancel();
    }
}

fn expire(weak: Weak<RefCell<WatchdogState>>) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    let now = Simulator::now();
    let function = {
        let mut s = state.borrow_mut();
        if s.end > now {
            let wait = s.end - now;
            let weak = Rc::downgrade(&state);
            s.event = Simulator::schedule(wait, move || expire(weak));
            return;
        }
        s.function.clone()
    };
    log_function!(LOG, "expired");
    if let Some(f) = function {
        f();
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        if let Ok(state) = self.state.try_borrow() {
            state.event.cancel();
        }
    }
}

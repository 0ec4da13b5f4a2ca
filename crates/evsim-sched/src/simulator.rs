//! Simulator façade
//!
//! One simulator context exists per thread. It owns the event queue, the
//! virtual clock and the context of the executing event:
//!
//! ```text
//! schedule*() --> [scheduler] --run()--> pop, advance clock, set context,
//!                                        invoke, clear context
//! ```
//!
//! Handlers run to completion and schedule continuations for later work.
//! `destroy()` runs destroy hooks last-in first-out, drops every pending
//! event unexecuted and refuses further scheduling until `reset()`.

use std::cell::RefCell;

use evsim_core::{
    freeze_resolution, log_function, log_logic, log_warn, reset_resolution, set_node_printer, set_time_printer,
    ContextId, EventUid, KernelError, KernelResult, LogComponent, OrFatal, Time,
};
use evsim_object::{clear_pending_objects, initialize_pending_objects, GlobalValue, Names, DEFAULT_SCHEDULER, SCHEDULER_TYPE};

use crate::event::{Event, EventId, EventImpl, EventKey};
use crate::scheduler::{Scheduler, SchedulerKind};

static LOG: LogComponent = LogComponent::new("Simulator");

struct SimulatorImpl {
    scheduler: Box<dyn Scheduler>,
    current_ts: i64,
    current_uid: EventUid,
    current_context: ContextId,
    next_uid: EventUid,
    event_count: u64,
    stop: bool,
    destroy_events: Vec<EventId>,
    destroyed: bool,
}

impl SimulatorImpl {
    fn new() -> Self {
        set_time_printer(Some(print_time));
        set_node_printer(Some(print_context));
        let kind = configured_scheduler();
        log_function!(LOG, "new context with {}", kind);
        Self {
            scheduler: kind.build(),
            current_ts: 0,
            current_uid: EventUid::INVALID,
            current_context: ContextId::NONE,
            next_uid: EventUid::FIRST,
            event_count: 0,
            stop: false,
            destroy_events: Vec::new(),
            destroyed: false,
        }
    }

    fn insert(&mut self, delay: Time, context: ContextId, f: impl FnOnce() + 'static) -> KernelResult<EventId> {
        if self.destroyed {
            return Err(KernelError::KernelDestroyed);
        }
        if delay.is_strictly_negative() {
            return Err(KernelError::ScheduleBackwards {
                at: self.current_ts.saturating_add(delay.ticks()),
                now: self.current_ts,
            });
        }
        freeze_resolution();
        let key = EventKey {
            ts: self.current_ts.saturating_add(delay.ticks()),
            uid: self.next_uid,
            context,
        };
        self.next_uid = self.next_uid.next();
        let inner = EventImpl::new(f);
        self.scheduler.insert(Event::new(key, inner.clone()));
        log_logic!(LOG, "schedule uid {} at {} ticks", key.uid.0, key.ts);
        Ok(EventId::new(inner, key))
    }

    fn is_expired(&self, id: &EventId) -> bool {
        let Some(event) = id.peek_event_impl() else {
            return true;
        };
        if event.is_cancelled() {
            return true;
        }
        if id.uid() == EventUid::DESTROY {
            return !self.destroy_events.iter().any(|e| e == id);
        }
        let key = id.key();
        key.ts < self.current_ts || (key.ts == self.current_ts && key.uid <= self.current_uid)
    }
}

thread_local! {
    static SIMULATOR: RefCell<Option<SimulatorImpl>> = const { RefCell::new(None) };
}

fn configured_scheduler() -> SchedulerKind {
    let name = GlobalValue::get_value_by_name_fail_safe(SCHEDULER_TYPE)
        .and_then(|v| v.get::<String>())
        .unwrap_or_else(|| DEFAULT_SCHEDULER.to_string());
    name.parse().unwrap_or_else(|e| {
        log_warn!(LOG, "{}; using the heap scheduler", e);
        SchedulerKind::Heap
    })
}

fn with_sim<R>(f: impl FnOnce(&mut SimulatorImpl) -> R) -> R {
    SIMULATOR.with(|s| {
        let mut slot = s.borrow_mut();
        f(slot.get_or_insert_with(SimulatorImpl::new))
    })
}

/// Like `with_sim`, but `None` when the context is busy, missing or torn
/// down. Used on paths reachable from `Drop`.
fn try_with_sim<R>(f: impl FnOnce(&mut SimulatorImpl) -> R) -> Option<R> {
    SIMULATOR
        .try_with(|s| {
            let mut slot = s.try_borrow_mut().ok()?;
            slot.as_mut().map(f)
        })
        .ok()
        .flatten()
}

fn ticks_to_time(ticks: i64) -> Time {
    if ticks == 0 {
        Time::ZERO
    } else {
        Time::from_ticks(ticks)
    }
}

fn print_time() -> Option<String> {
    let ts = SIMULATOR
        .try_with(|s| s.try_borrow().ok().and_then(|slot| slot.as_ref().map(|sim| sim.current_ts)))
        .ok()
        .flatten()?;
    Some(ticks_to_time(ts).format_seconds())
}

fn print_context() -> Option<String> {
    SIMULATOR
        .try_with(|s| {
            s.try_borrow()
                .ok()
                .and_then(|slot| slot.as_ref().map(|sim| sim.current_context.to_string()))
        })
        .ok()
        .flatten()
}

pub struct Simulator;

impl Simulator {
    // Scheduling

    /// Schedule `f` after `delay`, in the context of the current event
    pub fn try_schedule(delay: Time, f: impl FnOnce() + 'static) -> KernelResult<EventId> {
        with_sim(|s| {
            let context = s.current_context;
            s.insert(delay, context, f)
        })
    }

    #[track_caller]
    pub fn schedule(delay: Time, f: impl FnOnce() + 'static) -> EventId {
        Self::try_schedule(delay, f).or_fatal()
    }

    /// Schedule `f` at the current time, after every event already
    /// scheduled for it
    #[track_caller]
    pub fn schedule_now(f: impl FnOnce() + 'static) -> EventId {
        Self::schedule(Time::ZERO, f)
    }

    pub fn try_schedule_with_context(
        context: u32,
        delay: Time,
        f: impl FnOnce() + 'static,
    ) -> KernelResult<EventId> {
        with_sim(|s| s.insert(delay, ContextId::new(context), f))
    }

    #[track_caller]
    pub fn schedule_with_context(context: u32, delay: Time, f: impl FnOnce() + 'static) -> EventId {
        Self::try_schedule_with_context(context, delay, f).or_fatal()
    }

    #[track_caller]
    pub fn schedule_with_context_now(context: u32, f: impl FnOnce() + 'static) -> EventId {
        Self::schedule_with_context(context, Time::ZERO, f)
    }

    /// Register `f` to run when the simulator is destroyed
    pub fn try_schedule_destroy(f: impl FnOnce() + 'static) -> KernelResult<EventId> {
        with_sim(|s| {
            if s.destroyed {
                return Err(KernelError::KernelDestroyed);
            }
            let key = EventKey {
                ts: s.current_ts,
                uid: EventUid::DESTROY,
                context: ContextId::NONE,
            };
            let id = EventId::new(EventImpl::new(f), key);
            s.destroy_events.push(id.clone());
            Ok(id)
        })
    }

    #[track_caller]
    pub fn schedule_destroy(f: impl FnOnce() + 'static) -> EventId {
        Self::try_schedule_destroy(f).or_fatal()
    }

    /// Mark the event to be skipped; idempotent
    pub fn cancel(id: &EventId) {
        if let Some(event) = id.peek_event_impl() {
            event.cancel();
        }
    }

    /// Take the event out of the queue right away
    pub fn remove(id: &EventId) {
        let Some(event) = id.peek_event_impl() else {
            return;
        };
        let removed = try_with_sim(|s| {
            if id.uid() == EventUid::DESTROY {
                s.destroy_events.retain(|e| e != id);
                None
            } else if !s.is_expired(id) {
                s.scheduler.remove(&id.key())
            } else {
                None
            }
        })
        .flatten();
        event.cancel();
        drop(removed);
    }

    pub fn is_expired(id: &EventId) -> bool {
        match try_with_sim(|s| s.is_expired(id)) {
            Some(expired) => expired,
            None => id.peek_event_impl().map_or(true, |e| e.is_cancelled()),
        }
    }

    /// Time until the event fires; zero once expired
    pub fn get_delay_left(id: &EventId) -> Time {
        let left = with_sim(|s| {
            if s.is_expired(id) {
                0
            } else {
                id.key().ts - s.current_ts
            }
        });
        ticks_to_time(left)
    }

    // Running

    fn next_event() -> Option<Event> {
        with_sim(|s| {
            if s.stop {
                return None;
            }
            let event = s.scheduler.remove_next()?;
            debug_assert!(event.key.ts >= s.current_ts, "clock moved backwards");
            s.current_ts = event.key.ts;
            s.current_uid = event.key.uid;
            s.current_context = event.key.context;
            if !event.inner.is_cancelled() {
                s.event_count += 1;
            }
            Some(event)
        })
    }

    /// Execute events until the queue is empty or `stop` is called
    pub fn try_run() -> KernelResult<()> {
        if with_sim(|s| s.destroyed) {
            return Err(KernelError::KernelDestroyed);
        }
        initialize_pending_objects();
        with_sim(|s| s.stop = false);
        log_function!(LOG, "run");
        while let Some(event) = Self::next_event() {
            event.inner.invoke();
            with_sim(|s| s.current_context = ContextId::NONE);
        }
        log_function!(LOG, "run returned");
        Ok(())
    }

    #[track_caller]
    pub fn run() {
        Self::try_run().or_fatal()
    }

    /// Stop after the executing event
    pub fn stop() {
        log_function!(LOG, "stop");
        with_sim(|s| s.stop = true);
    }

    /// Stop once the clock reaches now + `delay`
    #[track_caller]
    pub fn stop_at(delay: Time) -> EventId {
        Self::schedule(delay, Self::stop)
    }

    /// Run destroy hooks, drop pending events and close the context
    pub fn destroy() {
        let armed = with_sim(|s| !s.destroyed);
        if !armed {
            return;
        }
        log_function!(LOG, "destroy");
        while let Some(hook) = with_sim(|s| s.destroy_events.pop()) {
            if let Some(event) = hook.peek_event_impl() {
                event.invoke();
            }
        }
        let mut pending = with_sim(|s| {
            s.destroyed = true;
            s.stop = true;
            let kind = s.scheduler.kind();
            std::mem::replace(&mut s.scheduler, kind.build())
        });
        let mut dropped = 0usize;
        while let Some(event) = pending.remove_next() {
            event.inner.cancel();
            dropped += 1;
        }
        drop(pending);
        Names::clear();
        clear_pending_objects();
        log_logic!(LOG, "dropped {} pending events", dropped);
    }

    /// Whether `destroy` has closed the context
    pub fn is_destroyed() -> bool {
        with_sim(|s| s.destroyed)
    }

    /// Destroy the context if needed and start a fresh one with the default
    /// resolution and the configured scheduler
    pub fn reset() {
        Self::destroy();
        let old = SIMULATOR.with(|s| s.borrow_mut().take());
        drop(old);
        reset_resolution();
        log_function!(LOG, "reset");
    }

    // Introspection

    pub fn now() -> Time {
        ticks_to_time(with_sim(|s| s.current_ts))
    }

    /// Context of the executing event, `ContextId::NONE` outside events
    pub fn get_context() -> ContextId {
        with_sim(|s| s.current_context)
    }

    /// Number of events executed so far, cancelled ones excluded
    pub fn get_event_count() -> u64 {
        with_sim(|s| s.event_count)
    }

    pub fn is_finished() -> bool {
        with_sim(|s| s.stop || s.scheduler.is_empty())
    }

    pub fn get_maximum_simulation_time() -> Time {
        Time::MAX
    }

    /// Number of queued events, cancelled ones included
    pub fn pending_event_count() -> usize {
        with_sim(|s| s.scheduler.len())
    }

    pub fn scheduler_kind() -> SchedulerKind {
        with_sim(|s| s.scheduler.kind())
    }

    /// Switch to another scheduler, moving every pending event over
    pub fn set_scheduler(kind: SchedulerKind) {
        with_sim(|s| {
            if s.scheduler.kind() == kind {
                return;
            }
            let mut next = kind.build();
            while let Some(event) = s.scheduler.remove_next() {
                next.insert(event);
            }
            log_function!(LOG, "scheduler now {}", kind);
            s.scheduler = next;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type Trace = Rc<RefCell<Vec<(&'static str, i64)>>>;

    fn record(trace: &Trace, label: &'static str) -> impl FnOnce() + 'static {
        let trace = trace.clone();
        move || trace.borrow_mut().push((label, Simulator::now().ticks()))
    }

    #[test]
    fn test_equal_times_fire_in_schedule_order() {
        let trace = Trace::default();
        Simulator::schedule(Time::seconds(5.0), record(&trace, "A"));
        Simulator::schedule(Time::seconds(5.0), record(&trace, "B"));
        Simulator::stop_at(Time::seconds(10.0));
        Simulator::run();
        assert_eq!(*trace.borrow(), vec![("A", 5_000_000_000), ("B", 5_000_000_000)]);
        Simulator::destroy();
    }

    #[test]
    fn test_cancelled_event_never_runs() {
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let id = Simulator::schedule(Time::seconds(1.0), move || counter.set(counter.get() + 1));
        id.cancel();
        id.cancel();
        assert!(id.is_expired());
        Simulator::run();
        assert_eq!(hits.get(), 0);
        assert_eq!(Simulator::get_event_count(), 0);
        Simulator::destroy();
    }

    #[test]
    fn test_cancel_after_fire_is_noop() {
        let id = Simulator::schedule(Time::millis(1), || {});
        assert!(id.is_pending());
        assert_eq!(Simulator::get_delay_left(&id), Time::millis(1));
        Simulator::run();
        assert!(id.is_expired());
        id.cancel();
        assert_eq!(Simulator::get_event_count(), 1);
        assert_eq!(Simulator::get_delay_left(&id), Time::ZERO);
    }

    #[test]
    fn test_schedule_now_runs_after_same_time_events() {
        let trace = Trace::default();
        let inner = trace.clone();
        Simulator::schedule(Time::seconds(1.0), move || {
            Simulator::schedule_now(record(&inner, "now"));
            inner.borrow_mut().push(("first", Simulator::now().ticks()));
        });
        Simulator::schedule(Time::seconds(1.0), record(&trace, "second"));
        Simulator::run();
        let labels: Vec<&str> = trace.borrow().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, vec!["first", "second", "now"]);
    }

    #[test]
    fn test_context_follows_events() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        assert!(Simulator::get_context().is_none());
        Simulator::schedule_with_context(7, Time::seconds(1.0), move || {
            log.borrow_mut().push(Simulator::get_context());
            let nested = log.clone();
            Simulator::schedule(Time::seconds(1.0), move || nested.borrow_mut().push(Simulator::get_context()));
        });
        Simulator::run();
        assert_eq!(*seen.borrow(), vec![ContextId::new(7), ContextId::new(7)]);
        assert!(Simulator::get_context().is_none());
    }

    #[test]
    fn test_negative_delay_rejected() {
        let err = Simulator::try_schedule(Time::seconds(-1.0), || {}).unwrap_err();
        assert_eq!(err.kind(), "ScheduleBackwards");
    }

    #[test]
    #[should_panic(expected = "ScheduleBackwards")]
    fn test_negative_delay_is_fatal() {
        Simulator::schedule(Time::millis(-5), || {});
    }

    #[test]
    fn test_stop_at_leaves_later_events() {
        let trace = Trace::default();
        Simulator::schedule(Time::seconds(1.0), record(&trace, "early"));
        Simulator::schedule(Time::seconds(20.0), record(&trace, "late"));
        Simulator::stop_at(Time::seconds(10.0));
        Simulator::run();
        assert_eq!(trace.borrow().len(), 1);
        assert_eq!(Simulator::now(), Time::seconds(10.0));
        assert!(Simulator::is_finished());
        Simulator::run();
        assert_eq!(trace.borrow().len(), 2);
    }

    #[test]
    fn test_destroy_hooks_run_lifo_and_events_dropped() {
        let trace = Trace::default();
        Simulator::schedule_destroy(record(&trace, "first"));
        Simulator::schedule_destroy(record(&trace, "second"));
        let cancelled = Simulator::schedule_destroy(record(&trace, "cancelled"));
        cancelled.cancel();
        let removed = Simulator::schedule_destroy(record(&trace, "removed"));
        removed.remove();
        assert!(removed.is_expired());
        Simulator::schedule(Time::seconds(1.0), record(&trace, "never"));
        Simulator::destroy();
        let labels: Vec<&str> = trace.borrow().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, vec!["second", "first"]);
        assert!(Simulator::is_destroyed());
        assert_eq!(
            Simulator::try_schedule(Time::ZERO, || {}).unwrap_err().kind(),
            "KernelDestroyed"
        );
        assert_eq!(Simulator::try_run().unwrap_err().kind(), "KernelDestroyed");

        Simulator::reset();
        assert!(!Simulator::is_destroyed());
        assert_eq!(Simulator::now(), Time::ZERO);
        Simulator::schedule(Time::seconds(1.0), record(&trace, "after reset"));
        Simulator::run();
        assert_eq!(trace.borrow().len(), 3);
    }

    #[test]
    fn test_remove_takes_event_out() {
        let id = Simulator::schedule(Time::seconds(1.0), || {});
        Simulator::schedule(Time::seconds(2.0), || {});
        assert_eq!(Simulator::pending_event_count(), 2);
        Simulator::remove(&id);
        assert_eq!(Simulator::pending_event_count(), 1);
        assert!(id.is_expired());
        Simulator::remove(&id);
        assert_eq!(Simulator::pending_event_count(), 1);
    }

    #[test]
    fn test_set_scheduler_migrates_events() {
        let trace = Trace::default();
        for (label, secs) in [("c", 3.0), ("a", 1.0), ("b", 2.0)] {
            Simulator::schedule(Time::seconds(secs), record(&trace, label));
        }
        assert_eq!(Simulator::scheduler_kind(), SchedulerKind::Heap);
        Simulator::set_scheduler(SchedulerKind::Calendar);
        assert_eq!(Simulator::scheduler_kind(), SchedulerKind::Calendar);
        assert_eq!(Simulator::pending_event_count(), 3);
        Simulator::run();
        let labels: Vec<&str> = trace.borrow().iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_scheduler_type_global_selects_scheduler() {
        GlobalValue::bind(SCHEDULER_TYPE, "evsim::MapScheduler");
        Simulator::reset();
        assert_eq!(Simulator::scheduler_kind(), SchedulerKind::Map);
        GlobalValue::bind(SCHEDULER_TYPE, "evsim::Bogus");
        Simulator::reset();
        assert_eq!(Simulator::scheduler_kind(), SchedulerKind::Heap);
    }

    #[test]
    fn test_scheduling_after_run_returns() {
        Simulator::schedule(Time::seconds(1.0), || {});
        Simulator::run();
        let id = Simulator::schedule(Time::ZERO, || {});
        assert!(id.is_pending());
        Simulator::run();
        assert!(id.is_expired());
        assert_eq!(Simulator::get_event_count(), 2);
        assert_eq!(Simulator::get_maximum_simulation_time(), Time::MAX);
    }
}

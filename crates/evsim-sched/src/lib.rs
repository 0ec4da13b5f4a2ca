//! evsim Sched - Event scheduling and the simulator façade
//!
//! This crate provides:
//! - Events, event handles and the `(timestamp, ticket)` total order
//! - Heap, map, list and calendar queue schedulers behind one trait
//! - The per-thread simulator context: clock, run loop, stop and destroy
//! - Timers, watchdogs and an event garbage collector built on top

pub mod calendar_scheduler;
pub mod event;
pub mod event_garbage_collector;
pub mod heap_scheduler;
pub mod list_scheduler;
pub mod map_scheduler;
pub mod scheduler;
pub mod simulator;
pub mod timer;
pub mod watchdog;

pub use calendar_scheduler::CalendarScheduler;
pub use event::{Event, EventId, EventImpl, EventKey};
pub use event_garbage_collector::EventGarbageCollector;
pub use heap_scheduler::HeapScheduler;
pub use list_scheduler::ListScheduler;
pub use map_scheduler::MapScheduler;
pub use scheduler::{Scheduler, SchedulerKind};
pub use simulator::Simulator;
pub use timer::{DestroyPolicy, Timer, TimerState};
pub use watchdog::Watchdog;

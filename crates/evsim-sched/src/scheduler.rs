//! Event scheduler interface
//!
//! A scheduler keeps pending events ordered by `(timestamp, ticket)`. Events
//! with equal timestamps come out in insertion order.

use std::fmt;
use std::str::FromStr;

use evsim_core::{KernelError, KernelResult};

use crate::calendar_scheduler::CalendarScheduler;
use crate::event::{Event, EventKey};
use crate::heap_scheduler::HeapScheduler;
use crate::list_scheduler::ListScheduler;
use crate::map_scheduler::MapScheduler;

pub trait Scheduler {
    fn insert(&mut self, event: Event);

    fn is_empty(&self) -> bool;

    fn len(&self) -> usize;

    /// Earliest event, left in place
    fn peek_next(&self) -> Option<&Event>;

    /// Take out the earliest event
    fn remove_next(&mut self) -> Option<Event>;

    /// Take out the event with `key`, if still queued
    fn remove(&mut self, key: &EventKey) -> Option<Event>;

    fn kind(&self) -> SchedulerKind;
}

/// The available scheduler implementations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SchedulerKind {
    #[default]
    Heap,
    Map,
    List,
    Calendar,
}

impl SchedulerKind {
    pub const ALL: [SchedulerKind; 4] = [
        SchedulerKind::Heap,
        SchedulerKind::Map,
        SchedulerKind::List,
        SchedulerKind::Calendar,
    ];

    /// Registered type name, as used by the `SchedulerType` global value
    pub fn type_name(self) -> &'static str {
        match self {
            SchedulerKind::Heap => "evsim::HeapScheduler",
            SchedulerKind::Map => "evsim::MapScheduler",
            SchedulerKind::List => "evsim::ListScheduler",
            SchedulerKind::Calendar => "evsim::CalendarScheduler",
        }
    }

    pub fn build(self) -> Box<dyn Scheduler> {
        match self {
            SchedulerKind::Heap => Box::new(HeapScheduler::new()),
            SchedulerKind::Map => Box::new(MapScheduler::new()),
            SchedulerKind::List => Box::new(ListScheduler::new()),
            SchedulerKind::Calendar => Box::new(CalendarScheduler::new()),
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for SchedulerKind {
    type Err = KernelError;

    /// Accepts the full type name or its short form (`HeapScheduler`)
    fn from_str(s: &str) -> KernelResult<Self> {
        let short = s.strip_prefix("evsim::").unwrap_or(s);
        Self::ALL
            .into_iter()
            .find(|k| k.type_name().strip_prefix("evsim::") == Some(short))
            .ok_or_else(|| KernelError::UnknownType(s.to_string()))
    }
}

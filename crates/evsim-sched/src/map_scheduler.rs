//! Ordered map scheduler

use std::collections::BTreeMap;

use evsim_core::{log_function, LogComponent};

use crate::event::{Event, EventKey};
use crate::scheduler::{Scheduler, SchedulerKind};

static LOG: LogComponent = LogComponent::new("MapScheduler");

/// Events in a balanced tree keyed by `(timestamp, ticket)`; every
/// operation is O(log n)
#[derive(Debug, Default)]
pub struct MapScheduler {
    events: BTreeMap<EventKey, Event>,
}

impl MapScheduler {
    pub fn new() -> Self {
        log_function!(LOG, "new");
        Self::default()
    }
}

impl Scheduler for MapScheduler {
    fn insert(&mut self, event: Event) {
        self.events.insert(event.key, event);
    }

    fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn peek_next(&self) -> Option<&Event> {
        self.events.values().next()
    }

    fn remove_next(&mut self) -> Option<Event> {
        self.events.pop_first().map(|(_, event)| event)
    }

    fn remove(&mut self, key: &EventKey) -> Option<Event> {
        self.events.remove(key)
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Map
    }
}

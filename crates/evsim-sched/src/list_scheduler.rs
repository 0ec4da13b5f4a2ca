//! Sorted list scheduler

use std::collections::VecDeque;

use evsim_core::{log_function, LogComponent};

use crate::event::{Event, EventKey};
use crate::scheduler::{Scheduler, SchedulerKind};

static LOG: LogComponent = LogComponent::new("ListScheduler");

/// Events kept sorted in a single sequence. Remove-next is O(1); insert
/// and removal are linear. Suits queues that stay short.
#[derive(Debug, Default)]
pub struct ListScheduler {
    events: VecDeque<Event>,
}

impl ListScheduler {
    pub fn new() -> Self {
        log_function!(LOG, "new");
        Self::default()
    }
}

impl Scheduler for ListScheduler {
    fn insert(&mut self, event: Event) {
        let at = self.events.partition_point(|e| e.key < event.key);
        self.events.insert(at, event);
    }

    fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn peek_next(&self) -> Option<&Event> {
        self.events.front()
    }

    fn remove_next(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    fn remove(&mut self, key: &EventKey) -> Option<Event> {
        let at = self.events.iter().position(|e| e.key.uid == key.uid)?;
        self.events.remove(at)
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::List
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::tests::exercise;

    #[test]
    fn test_scheduler_contract() {
        exercise(Box::new(ListScheduler::new()));
    }
}

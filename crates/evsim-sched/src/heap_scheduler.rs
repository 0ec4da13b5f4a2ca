//! Binary heap scheduler, the default

use evsim_core::{log_debug, log_function, LogComponent};

use crate::event::{Event, EventKey};
use crate::scheduler::{Scheduler, SchedulerKind};

static LOG: LogComponent = LogComponent::new("HeapScheduler");

/// Array-backed binary min-heap. Insert and remove-next are O(log n),
/// removal of an arbitrary event is O(n).
#[derive(Debug, Default)]
pub struct HeapScheduler {
    heap: Vec<Event>,
}

impl HeapScheduler {
    pub fn new() -> Self {
        log_function!(LOG, "new");
        Self::default()
    }

    #[inline]
    fn parent(index: usize) -> usize {
        (index - 1) / 2
    }

    #[inline]
    fn left_child(index: usize) -> usize {
        index * 2 + 1
    }

    #[inline]
    fn is_less(&self, a: usize, b: usize) -> bool {
        self.heap[a].key < self.heap[b].key
    }

    fn bottom_up(&mut self, start: usize) {
        let mut index = start;
        while index > 0 && self.is_less(index, Self::parent(index)) {
            let parent = Self::parent(index);
            log_debug!(LOG, "exchange {} {}", index, parent);
            self.heap.swap(index, parent);
            index = parent;
        }
    }

    fn top_down(&mut self, start: usize) {
        let mut index = start;
        loop {
            let left = Self::left_child(index);
            if left >= self.heap.len() {
                return;
            }
            let right = left + 1;
            let smallest = if right < self.heap.len() && self.is_less(right, left) {
                right
            } else {
                left
            };
            if !self.is_less(smallest, index) {
                return;
            }
            log_debug!(LOG, "exchange {} {}", index, smallest);
            self.heap.swap(index, smallest);
            index = smallest;
        }
    }

    fn take(&mut self, index: usize) -> Option<Event> {
        let last = self.heap.len().checked_sub(1)?;
        self.heap.swap(index, last);
        let event = self.heap.pop()?;
        if index < self.heap.len() {
            self.bottom_up(index);
            self.top_down(index);
        }
        Some(event)
    }
}

impl Scheduler for HeapScheduler {
    fn insert(&mut self, event: Event) {
        self.heap.push(event);
        self.bottom_up(self.heap.len() - 1);
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn peek_next(&self) -> Option<&Event> {
        self.heap.first()
    }

    fn remove_next(&mut self) -> Option<Event> {
        self.take(0)
    }

    fn remove(&mut self, key: &EventKey) -> Option<Event> {
        let index = self.heap.iter().position(|e| e.key.uid == key.uid)?;
        self.take(index)
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Heap
    }
}

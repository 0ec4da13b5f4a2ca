//! Keeps event handles so they can be cancelled together
//!
//! Expired handles are swept out whenever the tracked set reaches the
//! cleanup threshold. The threshold doubles while sweeps free little and
//! halves once the set has shrunk well below it. Dropping the collector
//! cancels every event still tracked.

use evsim_core::{log_logic, LogComponent};

use crate::event::EventId;

static LOG: LogComponent = LogComponent::new("EventGarbageCollector");

const CHUNK_INIT_SIZE: usize = 8;
const CHUNK_MAX_SIZE: usize = 1024;

#[derive(Debug)]
pub struct EventGarbageCollector {
    events: Vec<EventId>,
    next_cleanup_size: usize,
}

impl Default for EventGarbageCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EventGarbageCollector {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_cleanup_size: CHUNK_INIT_SIZE,
        }
    }

    pub fn track(&mut self, event: EventId) {
        self.events.push(event);
        if self.events.len() >= self.next_cleanup_size {
            self.cleanup();
        }
    }

    /// Handles currently tracked, expired ones not yet swept included
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn grow_cleanup_size(&mut self) {
        if self.next_cleanup_size < CHUNK_MAX_SIZE {
            self.next_cleanup_size *= 2;
        } else {
            self.next_cleanup_size += CHUNK_MAX_SIZE;
        }
    }

    fn shrink_cleanup_size(&mut self) {
        if self.next_cleanup_size <= CHUNK_MAX_SIZE {
            self.next_cleanup_size = (self.next_cleanup_size / 2).max(CHUNK_INIT_SIZE);
        } else {
            self.next_cleanup_size -= CHUNK_MAX_SIZE;
        }
    }

    fn cleanup(&mut self) {
        let before = self.events.len();
        self.events.retain(|e| !e.is_expired());
        log_logic!(LOG, "swept {} expired events", before - self.events.len());
        if self.events.len() >= self.next_cleanup_size {
            self.grow_cleanup_size();
        } else if self.events.len() < self.next_cleanup_size / 2 {
            self.shrink_cleanup_size();
        }
    }
}

impl Drop for EventGarbageCollector {
    fn drop(&mut self) {
        for event in &self.events {
            event.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::Simulator;
    use evsim_core::Time;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_drop_cancels_tracked_events() {
        let hits = Rc::new(Cell::new(0));
        let mut collector = EventGarbageCollector::new();
        for i in 1..=5 {
            let counter = hits.clone();
            collector.track(Simulator::schedule(Time::seconds(i as f64), move || {
                counter.set(counter.get() + 1)
            }));
        }
        drop(collector);
        Simulator::run();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_expired_handles_swept() {
        let mut collector = EventGarbageCollector::new();
        for _ in 0..CHUNK_INIT_SIZE - 1 {
            collector.track(Simulator::schedule(Time::millis(1), || {}));
        }
        Simulator::run();
        collector.track(Simulator::schedule(Time::millis(1), || {}));
        assert_eq!(collector.len(), 1);
        assert_eq!(collector.next_cleanup_size, CHUNK_INIT_SIZE);
    }

    #[test]
    fn test_threshold_grows_with_live_events() {
        let mut collector = EventGarbageCollector::new();
        for _ in 0..CHUNK_INIT_SIZE * 4 {
            collector.track(Simulator::schedule(Time::seconds(1.0), || {}));
        }
        assert_eq!(collector.len(), CHUNK_INIT_SIZE * 4);
        assert!(collector.next_cleanup_size > CHUNK_INIT_SIZE * 4);
    }
}

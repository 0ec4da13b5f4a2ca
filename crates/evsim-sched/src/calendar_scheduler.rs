//! Calendar queue scheduler
//!
//! Events hash into a ring of buckets ("days") of fixed width by timestamp.
//! Each bucket is kept sorted. Dequeuing walks the ring from the bucket of
//! the last dequeued event, looking for an event that falls within the
//! current "year". The ring doubles when the queue grows past twice the
//! bucket count and halves when it shrinks below half of it; the bucket
//! width is re-estimated from a sample of the earliest events on resize.

use std::collections::VecDeque;

use evsim_core::{log_function, log_logic, LogComponent};

use crate::event::{Event, EventKey};
use crate::scheduler::{Scheduler, SchedulerKind};

static LOG: LogComponent = LogComponent::new("CalendarScheduler");

const INITIAL_BUCKETS: usize = 2;
const MAX_BUCKETS: usize = 32768;

#[derive(Debug)]
pub struct CalendarScheduler {
    buckets: Vec<VecDeque<Event>>,
    width: u64,
    last_bucket: usize,
    bucket_top: u64,
    last_prio: u64,
    qsize: usize,
}

impl Default for CalendarScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn prio(key: &EventKey) -> u64 {
    key.ts.max(0) as u64
}

impl CalendarScheduler {
    pub fn new() -> Self {
        log_function!(LOG, "new");
        let mut scheduler = Self {
            buckets: Vec::new(),
            width: 1,
            last_bucket: 0,
            bucket_top: 0,
            last_prio: 0,
            qsize: 0,
        };
        scheduler.init(INITIAL_BUCKETS, 1, 0);
        scheduler
    }

    /// Number of buckets in the ring
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn init(&mut self, n_buckets: usize, width: u64, start_prio: u64) {
        self.buckets = (0..n_buckets).map(|_| VecDeque::new()).collect();
        self.width = width.max(1);
        self.last_prio = start_prio;
        self.last_bucket = self.hash(start_prio);
        self.bucket_top = (start_prio / self.width + 1) * self.width;
    }

    #[inline]
    fn hash(&self, key: u64) -> usize {
        ((key / self.width) % self.buckets.len() as u64) as usize
    }

    fn do_insert(&mut self, event: Event) {
        let index = self.hash(prio(&event.key));
        let bucket = &mut self.buckets[index];
        let at = bucket.partition_point(|e| e.key < event.key);
        bucket.insert(at, event);
    }

    /// Bucket holding the next event, and whether it lies in the current
    /// year
    fn find_next(&self) -> Option<(usize, bool, u64)> {
        let n = self.buckets.len();
        let mut i = self.last_bucket;
        let mut bucket_top = self.bucket_top;
        let mut min: Option<(EventKey, usize)> = None;
        loop {
            if let Some(front) = self.buckets[i].front() {
                if prio(&front.key) < bucket_top {
                    return Some((i, true, bucket_top));
                }
                if min.map_or(true, |(k, _)| front.key < k) {
                    min = Some((front.key, i));
                }
            }
            i = (i + 1) % n;
            bucket_top += self.width;
            if i == self.last_bucket {
                break;
            }
        }
        min.map(|(_, i)| (i, false, 0))
    }

    fn do_remove_next(&mut self) -> Option<Event> {
        let (index, in_year, bucket_top) = self.find_next()?;
        let event = self.buckets[index].pop_front()?;
        let p = prio(&event.key);
        self.last_prio = p;
        if in_year {
            self.last_bucket = index;
            self.bucket_top = bucket_top;
        } else {
            self.last_bucket = self.hash(p);
            self.bucket_top = (p / self.width + 1) * self.width;
        }
        Some(event)
    }

    /// Average gap between the earliest events, ignoring outliers
    fn calculate_new_width(&mut self) -> u64 {
        if self.qsize < 2 {
            return 1;
        }
        let n_samples = if self.qsize <= 5 {
            self.qsize
        } else {
            (5 + self.qsize / 10).min(25)
        };

        let saved = (self.last_bucket, self.bucket_top, self.last_prio);
        let mut samples = Vec::with_capacity(n_samples);
        for _ in 0..n_samples {
            match self.do_remove_next() {
                Some(event) => samples.push(event),
                None => break,
            }
        }
        (self.last_bucket, self.bucket_top, self.last_prio) = saved;

        let gaps: Vec<u64> = samples
            .windows(2)
            .map(|w| prio(&w[1].key) - prio(&w[0].key))
            .collect();
        for event in samples {
            self.do_insert(event);
        }
        if gaps.is_empty() {
            return 1;
        }

        let total: u64 = gaps.iter().sum();
        let average = total / gaps.len() as u64;
        let (kept_total, kept) = gaps
            .iter()
            .filter(|&&gap| gap <= average * 2)
            .fold((0u64, 0u64), |(t, n), &gap| (t + gap, n + 1));
        let average = if kept > 0 { kept_total / kept } else { average };
        (average * 3).max(1)
    }

    fn resize(&mut self, n_buckets: usize) {
        let width = self.calculate_new_width();
        log_logic!(LOG, "resize to {} buckets of width {}", n_buckets, width);
        let old = std::mem::take(&mut self.buckets);
        self.init(n_buckets, width, self.last_prio);
        for event in old.into_iter().flatten() {
            self.do_insert(event);
        }
    }

    fn resize_up(&mut self) {
        if self.qsize > self.buckets.len() * 2 && self.buckets.len() < MAX_BUCKETS {
            self.resize(self.buckets.len() * 2);
        }
    }

    fn resize_down(&mut self) {
        if self.qsize < self.buckets.len() / 2 {
            self.resize(self.buckets.len() / 2);
        }
    }
}

impl Scheduler for CalendarScheduler {
    fn insert(&mut self, event: Event) {
        self.do_insert(event);
        self.qsize += 1;
        self.resize_up();
    }

    fn is_empty(&self) -> bool {
        self.qsize == 0
    }

    fn len(&self) -> usize {
        self.qsize
    }

    fn peek_next(&self) -> Option<&Event> {
        let (index, _, _) = self.find_next()?;
        self.buckets[index].front()
    }

    fn remove_next(&mut self) -> Option<Event> {
        let event = self.do_remove_next()?;
        self.qsize -= 1;
        self.resize_down();
        Some(event)
    }

    fn remove(&mut self, key: &EventKey) -> Option<Event> {
        let index = self.hash(prio(key));
        let bucket = &mut self.buckets[index];
        let at = bucket.iter().position(|e| e.key.uid == key.uid)?;
        let event = bucket.remove(at)?;
        self.qsize -= 1;
        self.resize_down();
        Some(event)
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Calendar
    }
}

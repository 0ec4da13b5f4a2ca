//! Scheduled events and their handles

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use evsim_core::{ContextId, EventUid, Time};

use crate::simulator::Simulator;

/// Ordering key of a scheduled event: timestamp, then insertion ticket
#[derive(Clone, Copy, Debug)]
pub struct EventKey {
    pub ts: i64,
    pub uid: EventUid,
    pub context: ContextId,
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        (self.ts, self.uid) == (other.ts, other.uid)
    }
}

impl Eq for EventKey {}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.ts, self.uid).cmp(&(other.ts, other.uid))
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The closure of a scheduled event and its cancellation flag
pub struct EventImpl {
    callback: RefCell<Option<Box<dyn FnOnce()>>>,
    cancelled: Cell<bool>,
}

impl EventImpl {
    pub fn new(f: impl FnOnce() + 'static) -> Rc<Self> {
        Rc::new(Self {
            callback: RefCell::new(Some(Box::new(f))),
            cancelled: Cell::new(false),
        })
    }

    /// Run the closure unless cancelled; a second call does nothing
    pub fn invoke(&self) {
        if self.cancelled.get() {
            return;
        }
        let callback = self.callback.borrow_mut().take();
        if let Some(f) = callback {
            f();
        }
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
        self.callback.borrow_mut().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

impl fmt::Debug for EventImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventImpl")
            .field("cancelled", &self.cancelled.get())
            .finish()
    }
}

/// An entry of a scheduler queue
#[derive(Clone, Debug)]
pub struct Event {
    pub key: EventKey,
    pub inner: Rc<EventImpl>,
}

impl Event {
    pub fn new(key: EventKey, inner: Rc<EventImpl>) -> Self {
        Self { key, inner }
    }
}

/// Handle to a scheduled event
#[derive(Clone, Default)]
pub struct EventId {
    event: Option<Rc<EventImpl>>,
    ts: i64,
    context: ContextId,
    uid: EventUid,
}

impl EventId {
    pub(crate) fn new(event: Rc<EventImpl>, key: EventKey) -> Self {
        Self {
            event: Some(event),
            ts: key.ts,
            context: key.context,
            uid: key.uid,
        }
    }

    pub(crate) fn peek_event_impl(&self) -> Option<&Rc<EventImpl>> {
        self.event.as_ref()
    }

    pub(crate) fn key(&self) -> EventKey {
        EventKey {
            ts: self.ts,
            uid: self.uid,
            context: self.context,
        }
    }

    /// Handle that refers to no event
    pub fn is_null(&self) -> bool {
        self.event.is_none()
    }

    pub fn ts(&self) -> Time {
        Time::from_ticks(self.ts)
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn uid(&self) -> EventUid {
        self.uid
    }

    /// Skip the event when it comes up; a no-op once expired
    pub fn cancel(&self) {
        Simulator::cancel(self);
    }

    /// Take the event out of the queue right away
    pub fn remove(&self) {
        Simulator::remove(self);
    }

    pub fn is_expired(&self) -> bool {
        Simulator::is_expired(self)
    }

    pub fn is_pending(&self) -> bool {
        !self.is_expired()
    }
}

impl PartialEq for EventId {
    fn eq(&self, other: &Self) -> bool {
        let same_impl = match (&self.event, &other.event) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_impl && self.uid == other.uid
    }
}

impl Eq for EventId {}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventId")
            .field("ts", &self.ts)
            .field("uid", &self.uid)
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(ts: i64, uid: u64) -> EventKey {
        EventKey {
            ts,
            uid: EventUid(uid),
            context: ContextId::NONE,
        }
    }

    #[test]
    fn test_key_order_ignores_context() {
        assert!(key(1, 9) < key(2, 4));
        assert!(key(2, 4) < key(2, 5));
        let mut a = key(3, 7);
        a.context = ContextId::new(0);
        assert_eq!(a.cmp(&key(3, 7)), Ordering::Equal);
        assert_eq!(a, key(3, 7));
    }

    #[test]
    fn test_invoke_once_and_cancel() {
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let event = EventImpl::new(move || counter.set(counter.get() + 1));
        event.invoke();
        event.invoke();
        assert_eq!(hits.get(), 1);

        let counter = hits.clone();
        let cancelled = EventImpl::new(move || counter.set(counter.get() + 1));
        cancelled.cancel();
        cancelled.cancel();
        cancelled.invoke();
        assert!(cancelled.is_cancelled());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_null_handle() {
        let id = EventId::default();
        assert!(id.is_null());
        assert!(id.is_expired());
        id.cancel();
        assert_eq!(id, EventId::default());
    }
}

//! Multicast trace points
//!
//! A [`TracedCallback`] keeps its sinks in connection order. Firing walks a
//! snapshot of the list, so sinks connected or disconnected while a fire is
//! in progress take effect on the next fire.

use std::cell::RefCell;
use std::fmt;

use evsim_core::{log_function, LogComponent};

use crate::callback::{Callback, ContextCallback};

static LOG: LogComponent = LogComponent::new("TracedCallback");

/// A bare multicast point with signature `A`
pub struct TracedCallback<A> {
    sinks: RefCell<Vec<Callback<A>>>,
}

impl<A: Clone + 'static> TracedCallback<A> {
    pub fn new() -> Self {
        TracedCallback {
            sinks: RefCell::new(Vec::new()),
        }
    }

    /// Append a sink that receives only the source arguments
    pub fn connect_without_context(&self, cb: Callback<A>) {
        log_function!(LOG, "connect {:?}", cb);
        self.sinks.borrow_mut().push(cb);
    }

    /// Append a sink that receives `context` before the source arguments
    pub fn connect(&self, cb: &ContextCallback<A>, context: &str) {
        self.connect_without_context(cb.bind_context(context));
    }

    /// Remove the first sink equal to `cb`. Returns whether one was found.
    pub fn disconnect_without_context(&self, cb: &Callback<A>) -> bool {
        log_function!(LOG, "disconnect {:?}", cb);
        let mut sinks = self.sinks.borrow_mut();
        match sinks.iter().position(|s| s == cb) {
            Some(index) => {
                sinks.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove the sink connected with `cb` under `context`
    pub fn disconnect(&self, cb: &ContextCallback<A>, context: &str) -> bool {
        self.disconnect_without_context(&cb.bind_context(context))
    }

    /// Invoke every sink in connection order
    pub fn fire(&self, args: A) {
        let snapshot: Vec<Callback<A>> = self.sinks.borrow().clone();
        for sink in &snapshot {
            sink.invoke(args.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.borrow().len()
    }

    pub fn clear(&self) {
        self.sinks.borrow_mut().clear();
    }
}

impl<A: Clone + 'static> Default for TracedCallback<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for TracedCallback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TracedCallback({} sinks)", self.sinks.borrow().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_fires_in_connection_order() {
        let tc = TracedCallback::<u32>::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in 0..3 {
            let o = order.clone();
            tc.connect_without_context(Callback::new(move |v: u32| o.borrow_mut().push((tag, v))));
        }
        tc.fire(7);
        assert_eq!(*order.borrow(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn test_disconnect_stops_delivery() {
        let tc = TracedCallback::<u32>::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let cb = Callback::new(move |_: u32| c.set(c.get() + 1));
        tc.connect_without_context(cb.clone());
        tc.fire(1);
        assert!(tc.disconnect_without_context(&cb));
        tc.fire(2);
        assert_eq!(count.get(), 1);
        assert!(!tc.disconnect_without_context(&cb));
    }

    #[test]
    fn test_context_sink_receives_path() {
        let tc = TracedCallback::<i32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let cb = ContextCallback::new(move |ctx: &str, v: i32| s.borrow_mut().push((ctx.to_string(), v)));
        tc.connect(&cb, "/NodeList/0/$Ipv4/Rx");
        tc.fire(42);
        assert!(tc.disconnect(&cb, "/NodeList/0/$Ipv4/Rx"));
        tc.fire(43);
        assert_eq!(*seen.borrow(), vec![("/NodeList/0/$Ipv4/Rx".to_string(), 42)]);
    }

    #[test]
    fn test_self_removal_during_fire_applies_next_time() {
        let tc = Rc::new(TracedCallback::<u32>::new());
        let count = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Callback<u32>>>> = Rc::new(RefCell::new(None));

        let (t, c, sl) = (tc.clone(), count.clone(), slot.clone());
        let cb = Callback::new(move |_: u32| {
            c.set(c.get() + 1);
            if let Some(me) = sl.borrow().as_ref() {
                t.disconnect_without_context(me);
            }
        });
        *slot.borrow_mut() = Some(cb.clone());

        let late = Rc::new(Cell::new(0));
        let l = late.clone();
        tc.connect_without_context(cb);
        tc.connect_without_context(Callback::new(move |_: u32| l.set(l.get() + 1)));

        tc.fire(1);
        tc.fire(2);
        assert_eq!(count.get(), 1);
        assert_eq!(late.get(), 2);
    }

    #[test]
    fn test_connect_during_fire_applies_next_time() {
        let tc = Rc::new(TracedCallback::<u32>::new());
        let added = Rc::new(Cell::new(0));
        let (t, a) = (tc.clone(), added.clone());
        tc.connect_without_context(Callback::new(move |_: u32| {
            let a = a.clone();
            t.connect_without_context(Callback::new(move |_: u32| a.set(a.get() + 1)));
        }));
        tc.fire(1);
        assert_eq!(added.get(), 0);
        tc.fire(2);
        assert_eq!(added.get(), 1);
    }
}

//! Traced variables
//!
//! Assigning a new value to a [`TracedValue`] fires its sinks with
//! `(old, new)` before `set` returns. Assigning an equal value fires nothing.

use std::cell::RefCell;
use std::fmt;

use crate::callback::{Callback, ContextCallback};
use crate::traced_callback::TracedCallback;

pub struct TracedValue<T> {
    value: RefCell<T>,
    changed: TracedCallback<(T, T)>,
}

impl<T: Clone + PartialEq + 'static> TracedValue<T> {
    pub fn new(value: T) -> Self {
        TracedValue {
            value: RefCell::new(value),
            changed: TracedCallback::new(),
        }
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Store `value`, notifying sinks if it differs from the current one
    pub fn set(&self, value: T) {
        let old = {
            let mut current = self.value.borrow_mut();
            if *current == value {
                return;
            }
            std::mem::replace(&mut *current, value.clone())
        };
        self.changed.fire((old, value));
    }

    /// Apply `f` to a copy of the value and store the result
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.value.borrow());
        self.set(next);
    }

    pub fn connect_without_context(&self, cb: Callback<(T, T)>) {
        self.changed.connect_without_context(cb);
    }

    pub fn connect(&self, cb: &ContextCallback<(T, T)>, context: &str) {
        self.changed.connect(cb, context);
    }

    pub fn disconnect_without_context(&self, cb: &Callback<(T, T)>) -> bool {
        self.changed.disconnect_without_context(cb)
    }

    pub fn disconnect(&self, cb: &ContextCallback<(T, T)>, context: &str) -> bool {
        self.changed.disconnect(cb, context)
    }

    /// The underlying multicast point
    pub fn source(&self) -> &TracedCallback<(T, T)> {
        &self.changed
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for TracedValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for TracedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TracedValue({:?})", self.value.borrow())
    }
}

impl<T: fmt::Display> fmt::Display for TracedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.borrow().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_fires_old_and_new() {
        let tv = TracedValue::new(1u32);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        tv.connect_without_context(Callback::new(move |(old, new): (u32, u32)| {
            s.borrow_mut().push((old, new))
        }));
        tv.set(5);
        tv.update(|v| v + 1);
        assert_eq!(*seen.borrow(), vec![(1, 5), (5, 6)]);
        assert_eq!(tv.get(), 6);
    }

    #[test]
    fn test_equal_assignment_is_silent() {
        let tv = TracedValue::new(3i64);
        let count = Rc::new(std::cell::Cell::new(0));
        let c = count.clone();
        tv.connect_without_context(Callback::new(move |_: (i64, i64)| c.set(c.get() + 1)));
        tv.set(3);
        assert_eq!(count.get(), 0);
        tv.set(4);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_sink_may_read_value_during_fire() {
        let tv = Rc::new(TracedValue::new(0u8));
        let t = tv.clone();
        let observed = Rc::new(std::cell::Cell::new(0u8));
        let o = observed.clone();
        tv.connect_without_context(Callback::new(move |_: (u8, u8)| o.set(t.get())));
        tv.set(9);
        assert_eq!(observed.get(), 9);
    }
}

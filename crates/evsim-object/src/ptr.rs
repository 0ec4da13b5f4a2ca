//! Counted object handles
//!
//! A [`Ptr`] is a strong handle to an object. Handles are counted per
//! aggregate: the last handle to any member of an aggregate disposes the
//! whole set and releases it. Weak references are expressed through
//! aggregation lookups or config paths, not through a typed handle.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;
use std::rc::Rc;

use crate::object::{object_cast, Object, ObjectType};

pub struct Ptr<T: ?Sized + Object> {
    rc: Rc<T>,
}

impl<T: Object> Ptr<T> {
    /// Adopt a freshly built object as the sole member of a new aggregate.
    ///
    /// This does not register the instance type nor apply attributes; use
    /// `create_object` for that.
    pub fn new(object: T) -> Self {
        let rc = Rc::new(object);
        let member: Rc<dyn Object> = rc.clone();
        rc.core().aggregate().adopt(member);
        Ptr::from_rc(rc)
    }
}

impl<T: ?Sized + Object> Ptr<T> {
    pub(crate) fn from_rc(rc: Rc<T>) -> Self {
        rc.core().aggregate().acquire();
        Ptr { rc }
    }

    /// Borrow the object for the lifetime of this handle
    #[inline]
    pub fn peek(&self) -> &T {
        &self.rc
    }

    #[inline]
    pub fn as_rc(&self) -> &Rc<T> {
        &self.rc
    }

    /// Handle to the same object as `dyn Object`
    pub fn upcast(&self) -> Ptr<dyn Object> {
        Ptr::from_rc(self.rc.clone().into_object_rc())
    }

    /// Handle to the same object as its concrete type `U`
    pub fn downcast<U: ObjectType>(&self) -> Option<Ptr<U>> {
        self.rc
            .clone()
            .into_any_rc()
            .downcast::<U>()
            .ok()
            .map(Ptr::from_rc)
    }

    /// Address of the object, stable for its lifetime
    #[inline]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.rc) as *const () as usize
    }

    #[inline]
    pub fn ptr_eq<U: ?Sized + Object>(&self, other: &Ptr<U>) -> bool {
        self.addr() == other.addr()
    }

    /// Number of live handles to members of this object's aggregate
    pub fn aggregate_handles(&self) -> usize {
        self.rc.core().aggregate().handles()
    }
}

impl<T: ?Sized + Object> Clone for Ptr<T> {
    fn clone(&self) -> Self {
        Ptr::from_rc(self.rc.clone())
    }
}

impl<T: ?Sized + Object> Drop for Ptr<T> {
    fn drop(&mut self) {
        self.rc.core().aggregate().release();
    }
}

impl<T: ?Sized + Object> Deref for Ptr<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.rc
    }
}

impl<T: ?Sized + Object, U: ?Sized + Object> PartialEq<Ptr<U>> for Ptr<T> {
    fn eq(&self, other: &Ptr<U>) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: ?Sized + Object> Eq for Ptr<T> {}

impl<T: ?Sized + Object> Hash for Ptr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl<T: ?Sized + Object> fmt::Debug for Ptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ptr({}@{:#x})", self.rc.core().type_id(), self.addr())
    }
}

/// Handle to an object viewed as `U`, its own type or one of its bases.
///
/// Aggregate lookups return this view so that a member of a derived type
/// answers for its base. It counts as a handle like any [`Ptr`].
pub struct ObjectRef<U: ObjectType> {
    ptr: Ptr<dyn Object>,
    _view: PhantomData<fn() -> U>,
}

impl<U: ObjectType> ObjectRef<U> {
    /// View `ptr` as `U`; `None` if `U` is not in its chain of bases
    pub fn new(ptr: Ptr<dyn Object>) -> Option<Self> {
        object_cast::<U>(ptr.peek())?;
        Some(ObjectRef {
            ptr,
            _view: PhantomData,
        })
    }

    /// The underlying handle to the most-derived object
    #[inline]
    pub fn as_ptr(&self) -> &Ptr<dyn Object> {
        &self.ptr
    }

    pub fn into_ptr(self) -> Ptr<dyn Object> {
        self.ptr
    }

    /// Typed handle, when the most-derived type is exactly `U`
    pub fn exact(&self) -> Option<Ptr<U>> {
        self.ptr.downcast::<U>()
    }

    #[inline]
    pub fn ptr_eq<V: ?Sized + Object>(&self, other: &Ptr<V>) -> bool {
        self.ptr.ptr_eq(other)
    }
}

impl<U: ObjectType> Clone for ObjectRef<U> {
    fn clone(&self) -> Self {
        ObjectRef {
            ptr: self.ptr.clone(),
            _view: PhantomData,
        }
    }
}

impl<U: ObjectType> Deref for ObjectRef<U> {
    type Target = U;

    fn deref(&self) -> &U {
        match object_cast::<U>(self.ptr.peek()) {
            Some(view) => view,
            None => unreachable!("ObjectRef checked its base at construction"),
        }
    }
}

impl<U: ObjectType, V: ObjectType> PartialEq<ObjectRef<V>> for ObjectRef<U> {
    fn eq(&self, other: &ObjectRef<V>) -> bool {
        self.ptr.ptr_eq(&other.ptr)
    }
}

impl<U: ObjectType, V: ?Sized + Object> PartialEq<Ptr<V>> for ObjectRef<U> {
    fn eq(&self, other: &Ptr<V>) -> bool {
        self.ptr.ptr_eq(other)
    }
}

impl<T: ?Sized + Object, U: ObjectType> PartialEq<ObjectRef<U>> for Ptr<T> {
    fn eq(&self, other: &ObjectRef<U>) -> bool {
        self.ptr_eq(&other.ptr)
    }
}

impl<U: ObjectType> fmt::Debug for ObjectRef<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef<{}>({:?})", U::get_type_id(), self.ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectCore, ObjectExt};
    use std::cell::Cell;

    struct Tracked {
        core: ObjectCore,
        disposed: &'static Cell<bool>,
    }

    fn flag() -> &'static Cell<bool> {
        Box::leak(Box::new(Cell::new(false)))
    }

    impl Object for Tracked {
        fn core(&self) -> &ObjectCore {
            &self.core
        }

        fn do_dispose(&self) {
            self.disposed.set(true);
        }
    }

    #[test]
    fn test_clone_counts_handles() {
        let p = Ptr::new(Tracked { core: ObjectCore::new(), disposed: flag() });
        assert_eq!(p.aggregate_handles(), 1);
        let q = p.clone();
        assert_eq!(p.aggregate_handles(), 2);
        assert_eq!(p, q);
        drop(q);
        assert_eq!(p.aggregate_handles(), 1);
    }

    #[test]
    fn test_last_handle_disposes_then_frees() {
        let disposed = flag();
        let p = Ptr::new(Tracked { core: ObjectCore::new(), disposed });
        let weak = Rc::downgrade(p.as_rc());
        let up = p.upcast();
        drop(p);
        assert!(!disposed.get());
        drop(up);
        assert!(disposed.get());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_upcast_same_object() {
        let p = Ptr::new(Tracked { core: ObjectCore::new(), disposed: flag() });
        let up: Ptr<dyn Object> = p.upcast();
        assert!(up.ptr_eq(&p));
        assert!(!up.is_disposed());
    }
}

//! Value-semantic callbacks
//!
//! A [`Callback`] pairs an invoker with an identity. Two callbacks compare
//! equal when their identities match:
//! - closures built with [`Callback::new`] are unique
//! - free functions compare by address
//! - methods compare by target object and method address
//! - bound callbacks compare by base identity and bound value
//!
//! Arguments are passed by value; multi-argument sinks take a tuple.

use std::any::{type_name, Any};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use evsim_core::{KernelError, KernelResult};

thread_local! {
    static NEXT_UNIQUE: Cell<u64> = const { Cell::new(1) };
}

fn next_unique() -> u64 {
    NEXT_UNIQUE.with(|n| {
        let id = n.get();
        n.set(id + 1);
        id
    })
}

fn bound_eq<B: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<B>(), b.downcast_ref::<B>()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Identity used for callback equality
#[derive(Clone)]
pub enum CallbackIdentity {
    Unique(u64),
    Function(usize),
    Method {
        target: usize,
        method: usize,
    },
    Bound {
        base: Rc<CallbackIdentity>,
        value: Rc<dyn Any>,
        eq: fn(&dyn Any, &dyn Any) -> bool,
    },
}

impl CallbackIdentity {
    fn bound<B: PartialEq + 'static>(base: CallbackIdentity, value: B) -> Self {
        CallbackIdentity::Bound {
            base: Rc::new(base),
            value: Rc::new(value),
            eq: bound_eq::<B>,
        }
    }
}

impl PartialEq for CallbackIdentity {
    fn eq(&self, other: &Self) -> bool {
        use CallbackIdentity::*;
        match (self, other) {
            (Unique(a), Unique(b)) => a == b,
            (Function(a), Function(b)) => a == b,
            (
                Method { target: t1, method: m1 },
                Method { target: t2, method: m2 },
            ) => t1 == t2 && m1 == m2,
            (
                Bound { base: b1, value: v1, eq },
                Bound { base: b2, value: v2, .. },
            ) => b1 == b2 && eq(v1.as_ref(), v2.as_ref()),
            _ => false,
        }
    }
}

impl fmt::Debug for CallbackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackIdentity::Unique(id) => write!(f, "Unique({id})"),
            CallbackIdentity::Function(addr) => write!(f, "Function({addr:#x})"),
            CallbackIdentity::Method { target, method } => {
                write!(f, "Method({target:#x}, {method:#x})")
            }
            CallbackIdentity::Bound { base, .. } => write!(f, "Bound({base:?})"),
        }
    }
}

/// A callback without context
pub struct Callback<A> {
    invoker: Rc<dyn Fn(A)>,
    identity: CallbackIdentity,
}

impl<A: 'static> Callback<A> {
    /// Wrap a closure; the result only equals its own clones
    pub fn new(f: impl Fn(A) + 'static) -> Self {
        Callback {
            invoker: Rc::new(f),
            identity: CallbackIdentity::Unique(next_unique()),
        }
    }

    /// Wrap a free function; equal to any other callback of the same function
    pub fn from_fn(f: fn(A)) -> Self {
        Callback {
            invoker: Rc::new(f),
            identity: CallbackIdentity::Function(f as usize),
        }
    }

    /// Bind a method to a target. The target is held weakly; invoking after
    /// the target is gone does nothing.
    pub fn from_method<T: 'static>(target: &Rc<T>, method: fn(&T, A)) -> Self {
        let weak = Rc::downgrade(target);
        Callback {
            invoker: Rc::new(move |a| {
                if let Some(t) = weak.upgrade() {
                    method(&t, a)
                }
            }),
            identity: CallbackIdentity::Method {
                target: Rc::as_ptr(target) as *const () as usize,
                method: method as usize,
            },
        }
    }

    #[inline]
    pub fn invoke(&self, args: A) {
        (self.invoker)(args)
    }

    pub fn identity(&self) -> &CallbackIdentity {
        &self.identity
    }

    /// Signature tag, the argument type name
    pub fn signature() -> &'static str {
        type_name::<A>()
    }
}

impl<B, R> Callback<(B, R)>
where
    B: Clone + PartialEq + 'static,
    R: 'static,
{
    /// Partially apply the leading argument
    pub fn bind(&self, b: B) -> Callback<R> {
        let inner = self.invoker.clone();
        let bound = b.clone();
        Callback {
            invoker: Rc::new(move |r| inner((bound.clone(), r))),
            identity: CallbackIdentity::bound(self.identity.clone(), b),
        }
    }
}

impl<B, R1, R2> Callback<(B, R1, R2)>
where
    B: Clone + PartialEq + 'static,
    R1: 'static,
    R2: 'static,
{
    /// Partially apply the leading argument
    pub fn bind(&self, b: B) -> Callback<(R1, R2)> {
        let inner = self.invoker.clone();
        let bound = b.clone();
        Callback {
            invoker: Rc::new(move |(r1, r2)| inner((bound.clone(), r1, r2))),
            identity: CallbackIdentity::bound(self.identity.clone(), b),
        }
    }
}

impl<A> Clone for Callback<A> {
    fn clone(&self) -> Self {
        Callback {
            invoker: self.invoker.clone(),
            identity: self.identity.clone(),
        }
    }
}

impl<A> PartialEq for Callback<A> {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl<A> fmt::Debug for Callback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback<{}>({:?})", type_name::<A>(), self.identity)
    }
}

/// A callback receiving the config path of its source before the arguments
pub struct ContextCallback<A> {
    invoker: Rc<dyn Fn(&str, A)>,
    identity: CallbackIdentity,
}

impl<A: 'static> ContextCallback<A> {
    pub fn new(f: impl Fn(&str, A) + 'static) -> Self {
        ContextCallback {
            invoker: Rc::new(f),
            identity: CallbackIdentity::Unique(next_unique()),
        }
    }

    pub fn from_fn(f: fn(&str, A)) -> Self {
        ContextCallback {
            invoker: Rc::new(f),
            identity: CallbackIdentity::Function(f as usize),
        }
    }

    pub fn from_method<T: 'static>(target: &Rc<T>, method: fn(&T, &str, A)) -> Self {
        let weak = Rc::downgrade(target);
        ContextCallback {
            invoker: Rc::new(move |ctx, a| {
                if let Some(t) = weak.upgrade() {
                    method(&t, ctx, a)
                }
            }),
            identity: CallbackIdentity::Method {
                target: Rc::as_ptr(target) as *const () as usize,
                method: method as usize,
            },
        }
    }

    #[inline]
    pub fn invoke(&self, context: &str, args: A) {
        (self.invoker)(context, args)
    }

    pub fn identity(&self) -> &CallbackIdentity {
        &self.identity
    }

    /// Fix the context string, yielding a plain callback. Binding the same
    /// path twice yields equal callbacks.
    pub fn bind_context(&self, context: impl Into<String>) -> Callback<A> {
        let context: String = context.into();
        let inner = self.invoker.clone();
        let bound = context.clone();
        Callback {
            invoker: Rc::new(move |a| inner(&bound, a)),
            identity: CallbackIdentity::bound(self.identity.clone(), context),
        }
    }
}

impl<A> Clone for ContextCallback<A> {
    fn clone(&self) -> Self {
        ContextCallback {
            invoker: self.invoker.clone(),
            identity: self.identity.clone(),
        }
    }
}

impl<A> PartialEq for ContextCallback<A> {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl<A> fmt::Debug for ContextCallback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextCallback<{}>({:?})", type_name::<A>(), self.identity)
    }
}

/// Type-erased callback, as carried through config paths
#[derive(Clone)]
pub struct CallbackBase {
    inner: Rc<dyn Any>,
    signature: &'static str,
    with_context: bool,
}

impl CallbackBase {
    pub fn signature(&self) -> &'static str {
        self.signature
    }

    pub fn has_context(&self) -> bool {
        self.with_context
    }

    pub fn downcast<A: 'static>(&self) -> Option<Callback<A>> {
        self.inner.downcast_ref::<Callback<A>>().cloned()
    }

    pub fn downcast_context<A: 'static>(&self) -> Option<ContextCallback<A>> {
        self.inner.downcast_ref::<ContextCallback<A>>().cloned()
    }

    /// Recover a plain callback for `source`, or fail with `SignatureMismatch`
    pub fn to_callback<A: 'static>(&self, source: &str) -> KernelResult<Callback<A>> {
        self.downcast().ok_or_else(|| self.mismatch::<A>(source))
    }

    /// Recover a context callback and bind `context` to it
    pub fn to_bound_callback<A: 'static>(
        &self,
        source: &str,
        context: &str,
    ) -> KernelResult<Callback<A>> {
        self.downcast_context::<A>()
            .map(|cb| cb.bind_context(context))
            .ok_or_else(|| self.mismatch::<A>(source))
    }

    fn mismatch<A>(&self, source: &str) -> KernelError {
        KernelError::SignatureMismatch {
            source_name: format!("{} ({})", source, type_name::<A>()),
            sink: self.signature.to_string(),
        }
    }
}

impl<A: 'static> From<Callback<A>> for CallbackBase {
    fn from(cb: Callback<A>) -> Self {
        CallbackBase {
            inner: Rc::new(cb),
            signature: type_name::<A>(),
            with_context: false,
        }
    }
}

impl<A: 'static> From<ContextCallback<A>> for CallbackBase {
    fn from(cb: ContextCallback<A>) -> Self {
        CallbackBase {
            inner: Rc::new(cb),
            signature: type_name::<A>(),
            with_context: true,
        }
    }
}

impl fmt::Debug for CallbackBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CallbackBase({}{})",
            if self.with_context { "context, " } else { "" },
            self.signature
        )
    }
}

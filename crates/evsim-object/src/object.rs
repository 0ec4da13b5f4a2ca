//! Objects and aggregation
//!
//! An object embeds an [`ObjectCore`] and implements [`Object`]. Derived
//! types embed their base and return it from [`Object::parent`], so
//! attribute accessors registered on a base type keep working on every
//! subtype.
//!
//! Every object belongs to exactly one aggregate. Aggregation merges two
//! sets; any member can then find any other by type. The aggregate counts
//! the [`Ptr`] handles to all of its members: when the count drops to zero,
//! every member is disposed and the set is released.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use evsim_core::{log_function, log_logic, KernelError, KernelResult, LogComponent, OrFatal};
use evsim_trace::CallbackBase;

use crate::ptr::{ObjectRef, Ptr};
use crate::type_id::{AttributeFlags, TypeId};
use crate::value::AttributeValue;

static LOG: LogComponent = LogComponent::new("Object");

thread_local! {
    static PENDING_INITIALIZATION: RefCell<Vec<Weak<dyn Object>>> = const { RefCell::new(Vec::new()) };
}

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

pub trait AsObject {
    fn as_object(&self) -> &dyn Object;
    fn into_object_rc(self: Rc<Self>) -> Rc<dyn Object>;
}

impl<T: Object> AsObject for T {
    fn as_object(&self) -> &dyn Object {
        self
    }

    fn into_object_rc(self: Rc<Self>) -> Rc<dyn Object> {
        self
    }
}

/// A member of the configurable object graph
pub trait Object: AsAny + AsObject + 'static {
    fn core(&self) -> &ObjectCore;

    /// The embedded base object, for derived types
    fn parent(&self) -> Option<&dyn Object> {
        None
    }

    /// Second-phase setup, run at most once
    fn do_initialize(&self) {}

    /// Release references to other objects. Derived types chain to their base.
    fn do_dispose(&self) {}

    /// Called on every member after an aggregation changed the set
    fn notify_new_aggregate(&self) {}
}

/// An object type with a registered [`TypeId`]
pub trait ObjectType: Object + Sized {
    fn get_type_id() -> TypeId;
}

/// Find `T` in `object` or along its chain of embedded bases
pub fn object_cast<T: 'static>(object: &dyn Object) -> Option<&T> {
    let mut current = Some(object);
    while let Some(o) = current {
        if let Some(t) = o.as_any().downcast_ref::<T>() {
            return Some(t);
        }
        current = o.parent();
    }
    None
}

/// The shared state of an aggregate set
pub struct Aggregate {
    members: RefCell<Vec<Rc<dyn Object>>>,
    handles: Cell<usize>,
    disposing: Cell<bool>,
    disposed: Cell<bool>,
}

impl Aggregate {
    fn new() -> Rc<Self> {
        Rc::new(Aggregate {
            members: RefCell::new(Vec::new()),
            handles: Cell::new(0),
            disposing: Cell::new(false),
            disposed: Cell::new(false),
        })
    }

    pub(crate) fn adopt(&self, member: Rc<dyn Object>) {
        self.members.borrow_mut().push(member);
    }

    pub(crate) fn acquire(&self) {
        self.handles.set(self.handles.get() + 1);
    }

    pub(crate) fn release(&self) {
        let remaining = self.handles.get().saturating_sub(1);
        self.handles.set(remaining);
        if remaining == 0 {
            self.dispose_members();
            let members = std::mem::take(&mut *self.members.borrow_mut());
            drop(members);
        }
    }

    pub(crate) fn handles(&self) -> usize {
        self.handles.get()
    }

    fn snapshot(&self) -> Vec<Rc<dyn Object>> {
        self.members.borrow().clone()
    }

    fn len(&self) -> usize {
        self.members.borrow().len()
    }

    fn is_dead(&self) -> bool {
        self.disposed.get() || self.disposing.get()
    }

    fn dispose_members(&self) {
        if self.is_dead() {
            return;
        }
        self.disposing.set(true);
        for member in self.snapshot() {
            let core = member.core();
            if !core.disposed.get() {
                log_logic!(LOG, "dispose {}", core.type_id());
                member.do_dispose();
                core.disposed.set(true);
            }
        }
        self.disposing.set(false);
        self.disposed.set(true);
    }
}

/// Kernel bookkeeping embedded in every object
pub struct ObjectCore {
    tid: Cell<TypeId>,
    aggregate: RefCell<Rc<Aggregate>>,
    initialized: Cell<bool>,
    initializing: Cell<bool>,
    disposed: Cell<bool>,
    /// Attributes set explicitly on this instance, in first-set order
    overrides: RefCell<Vec<(String, AttributeValue)>>,
}

impl ObjectCore {
    pub fn new() -> Self {
        ObjectCore {
            tid: Cell::new(TypeId::NONE),
            aggregate: RefCell::new(Aggregate::new()),
            initialized: Cell::new(false),
            initializing: Cell::new(false),
            disposed: Cell::new(false),
            overrides: RefCell::new(Vec::new()),
        }
    }

    /// Most-derived type of the instance
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.tid.get()
    }

    pub(crate) fn set_type_id(&self, tid: TypeId) {
        self.tid.set(tid);
    }

    pub(crate) fn aggregate(&self) -> Rc<Aggregate> {
        self.aggregate.borrow().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get() || self.aggregate.borrow().disposed.get()
    }

    fn record_override(&self, name: &str, value: AttributeValue) {
        let mut overrides = self.overrides.borrow_mut();
        match overrides.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => overrides.push((name.to_string(), value)),
        }
    }

    /// Attributes set explicitly on this instance
    pub fn overrides(&self) -> Vec<(String, AttributeValue)> {
        self.overrides.borrow().clone()
    }
}

impl Default for ObjectCore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObjectCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectCore({})", self.type_id())
    }
}

fn already_disposed(object: &dyn Object) -> KernelError {
    KernelError::AlreadyDisposed(object.core().type_id().name())
}

fn ensure_alive(object: &dyn Object) -> KernelResult<()> {
    if object.core().is_disposed() {
        return Err(already_disposed(object));
    }
    Ok(())
}

/// Apply construction-time attributes: explicit values first, type defaults
/// for the rest. Validates everything before touching the object.
fn construct_attributes(
    object: &dyn Object,
    tid: TypeId,
    attributes: &[(String, AttributeValue)],
) -> KernelResult<()> {
    let mut explicit = Vec::with_capacity(attributes.len());
    for (name, value) in attributes {
        let info = tid.lookup_attribute_by_name(name)?;
        if !info.flags.contains(AttributeFlags::CONSTRUCT) && !info.flags.contains(AttributeFlags::SET) {
            return Err(KernelError::UnknownAttribute {
                type_name: tid.name(),
                name: format!("{name} (not settable)"),
            });
        }
        let full = format!("{}::{}", tid.name(), name);
        explicit.push((name.clone(), info.checker.create_valid_value(value, &full)?));
    }

    let mut current = tid;
    while !current.is_none() {
        for info in current.attributes() {
            if !info.flags.contains(AttributeFlags::CONSTRUCT) || !info.accessor.has_setter() {
                continue;
            }
            let value = match explicit.iter().find(|(n, _)| *n == info.name) {
                Some((_, v)) => v.clone(),
                None => info.initial_value.clone(),
            };
            if matches!(value, AttributeValue::Empty) {
                continue;
            }
            info.accessor.set(object, &value)?;
        }
        current = current.parent();
    }

    for (name, value) in explicit {
        let info = tid.lookup_attribute_by_name(&name)?;
        if !info.flags.contains(AttributeFlags::CONSTRUCT) {
            info.accessor.set(object, &value)?;
        }
        object.core().record_override(&name, value);
    }
    Ok(())
}

/// Build a new object of type `T` with `attributes` applied over the defaults
pub fn try_create_object_with_attributes<T: ObjectType>(
    object: T,
    attributes: &[(String, AttributeValue)],
) -> KernelResult<Ptr<T>> {
    let tid = T::get_type_id();
    let ptr = Ptr::new(object);
    ptr.core().set_type_id(tid);
    construct_attributes(ptr.as_object(), tid, attributes)?;
    let weak: Weak<dyn Object> = Rc::downgrade(&ptr.as_rc().clone().into_object_rc());
    PENDING_INITIALIZATION.with(|p| p.borrow_mut().push(weak));
    log_function!(LOG, "created {}", tid);
    Ok(ptr)
}

pub fn create_object_with_attributes<T: ObjectType>(
    object: T,
    attributes: &[(&str, AttributeValue)],
) -> Ptr<T> {
    let owned: Vec<(String, AttributeValue)> = attributes
        .iter()
        .map(|(n, v)| (n.to_string(), v.clone()))
        .collect();
    try_create_object_with_attributes(object, &owned).or_fatal()
}

/// Build a new object from an explicit value, applying type defaults
pub fn create_object_from<T: ObjectType>(object: T) -> Ptr<T> {
    try_create_object_with_attributes(object, &[]).or_fatal()
}

/// Build a default-constructed object, applying type defaults
pub fn create_object<T: ObjectType + Default>() -> Ptr<T> {
    create_object_from(T::default())
}

/// Initialize every created object that is still alive and pending. The
/// simulator calls this when a run starts.
pub fn initialize_pending_objects() {
    let pending = PENDING_INITIALIZATION.with(|p| std::mem::take(&mut *p.borrow_mut()));
    for weak in pending {
        if let Some(object) = weak.upgrade() {
            if !object.core().is_initialized() && !object.core().is_disposed() {
                object.initialize();
            }
        }
    }
}

/// Forget objects awaiting initialization
pub fn clear_pending_objects() {
    PENDING_INITIALIZATION.with(|p| p.borrow_mut().clear());
}

/// Operations available on every object
pub trait ObjectExt: Object {
    fn instance_type_id(&self) -> TypeId {
        self.core().type_id()
    }

    // Attributes

    fn try_set_attribute(&self, name: &str, value: impl Into<AttributeValue>) -> KernelResult<()> {
        let object = self.as_object();
        ensure_alive(object)?;
        let tid = object.core().type_id();
        let info = tid.lookup_attribute_by_name(name)?;
        if !info.flags.contains(AttributeFlags::SET) || !info.accessor.has_setter() {
            return Err(KernelError::UnknownAttribute {
                type_name: tid.name(),
                name: format!("{name} (not writable)"),
            });
        }
        let full = format!("{}::{}", tid.name(), name);
        let value = info.checker.create_valid_value(&value.into(), &full)?;
        info.accessor.set(object, &value)?;
        object.core().record_override(name, value);
        Ok(())
    }

    fn set_attribute(&self, name: &str, value: impl Into<AttributeValue>) {
        self.try_set_attribute(name, value).or_fatal()
    }

    fn set_attribute_fail_safe(&self, name: &str, value: impl Into<AttributeValue>) -> bool {
        self.try_set_attribute(name, value).is_ok()
    }

    fn try_get_attribute(&self, name: &str) -> KernelResult<AttributeValue> {
        let object = self.as_object();
        ensure_alive(object)?;
        let tid = object.core().type_id();
        let info = tid.lookup_attribute_by_name(name)?;
        if !info.flags.contains(AttributeFlags::GET) || !info.accessor.has_getter() {
            return Err(KernelError::UnknownAttribute {
                type_name: tid.name(),
                name: format!("{name} (not readable)"),
            });
        }
        info.accessor.get(object)
    }

    fn get_attribute(&self, name: &str) -> AttributeValue {
        self.try_get_attribute(name).or_fatal()
    }

    fn get_attribute_fail_safe(&self, name: &str) -> Option<AttributeValue> {
        self.try_get_attribute(name).ok()
    }

    // Trace sources

    fn try_trace_connect(&self, name: &str, context: &str, cb: impl Into<CallbackBase>) -> KernelResult<()> {
        let object = self.as_object();
        ensure_alive(object)?;
        let info = object.core().type_id().lookup_trace_source_by_name(name)?;
        info.accessor.connect(object, context, &cb.into())
    }

    fn try_trace_connect_without_context(&self, name: &str, cb: impl Into<CallbackBase>) -> KernelResult<()> {
        let object = self.as_object();
        ensure_alive(object)?;
        let info = object.core().type_id().lookup_trace_source_by_name(name)?;
        info.accessor.connect_without_context(object, &cb.into())
    }

    fn try_trace_disconnect(&self, name: &str, context: &str, cb: impl Into<CallbackBase>) -> KernelResult<bool> {
        let object = self.as_object();
        ensure_alive(object)?;
        let info = object.core().type_id().lookup_trace_source_by_name(name)?;
        info.accessor.disconnect(object, context, &cb.into())
    }

    fn try_trace_disconnect_without_context(&self, name: &str, cb: impl Into<CallbackBase>) -> KernelResult<bool> {
        let object = self.as_object();
        ensure_alive(object)?;
        let info = object.core().type_id().lookup_trace_source_by_name(name)?;
        info.accessor.disconnect_without_context(object, &cb.into())
    }

    /// Connect a context sink; `false` if no such trace source
    fn trace_connect(&self, name: &str, context: &str, cb: impl Into<CallbackBase>) -> bool {
        fail_safe_unless_fatal(self.try_trace_connect(name, context, cb))
    }

    fn trace_connect_without_context(&self, name: &str, cb: impl Into<CallbackBase>) -> bool {
        fail_safe_unless_fatal(self.try_trace_connect_without_context(name, cb))
    }

    fn trace_disconnect(&self, name: &str, context: &str, cb: impl Into<CallbackBase>) -> bool {
        matches!(self.try_trace_disconnect(name, context, cb), Ok(true))
    }

    fn trace_disconnect_without_context(&self, name: &str, cb: impl Into<CallbackBase>) -> bool {
        matches!(self.try_trace_disconnect_without_context(name, cb), Ok(true))
    }

    // Aggregation

    fn try_aggregate_object<U: ?Sized + Object>(&self, other: &Ptr<U>) -> KernelResult<()> {
        let object = self.as_object();
        let a = object.core().aggregate();
        let b = other.core().aggregate();
        if a.is_dead() {
            return Err(already_disposed(object));
        }
        if b.is_dead() {
            return Err(already_disposed(other.as_object()));
        }
        if Rc::ptr_eq(&a, &b) {
            return Ok(());
        }

        let present: Vec<TypeId> = a
            .snapshot()
            .iter()
            .map(|m| m.core().type_id())
            .filter(|t| !t.is_none())
            .collect();
        for member in b.snapshot() {
            let tid = member.core().type_id();
            if present.contains(&tid) {
                return Err(KernelError::AggregateTypeConflict(tid.name()));
            }
        }

        let moved = std::mem::take(&mut *b.members.borrow_mut());
        for member in &moved {
            *member.core().aggregate.borrow_mut() = a.clone();
        }
        a.members.borrow_mut().extend(moved);
        a.handles.set(a.handles.get() + b.handles.get());
        b.handles.set(0);
        log_logic!(LOG, "aggregate now has {} members", a.len());

        for member in a.snapshot() {
            member.notify_new_aggregate();
        }
        Ok(())
    }

    fn aggregate_object<U: ?Sized + Object>(&self, other: &Ptr<U>) {
        self.try_aggregate_object(other).or_fatal()
    }

    /// First aggregate member whose type is `U` or a subtype of it
    fn try_get_object<U: ObjectType>(&self) -> KernelResult<Option<ObjectRef<U>>> {
        let object = self.as_object();
        let aggregate = object.core().aggregate();
        if aggregate.is_dead() {
            return Err(already_disposed(object));
        }
        let target = U::get_type_id();
        Ok(aggregate
            .snapshot()
            .into_iter()
            .filter(|m| m.core().type_id().is_child_of(target))
            .find_map(|m| ObjectRef::new(Ptr::from_rc(m))))
    }

    fn get_object<U: ObjectType>(&self) -> Option<ObjectRef<U>> {
        self.try_get_object().or_fatal()
    }

    /// Untyped lookup; `None` also when the aggregate is disposed
    fn get_object_by_type_id(&self, tid: TypeId) -> Option<Ptr<dyn Object>> {
        let aggregate = self.core().aggregate();
        if aggregate.is_dead() {
            return None;
        }
        aggregate
            .snapshot()
            .into_iter()
            .find(|m| m.core().type_id().is_child_of(tid))
            .map(Ptr::from_rc)
    }

    /// Every member of this object's aggregate, in aggregation order
    fn aggregate_members(&self) -> Vec<Ptr<dyn Object>> {
        self.core()
            .aggregate()
            .snapshot()
            .into_iter()
            .map(Ptr::from_rc)
            .collect()
    }

    // Lifecycle

    /// Initialize every member of the aggregate not yet initialized
    fn try_initialize(&self) -> KernelResult<()> {
        let object = self.as_object();
        ensure_alive(object)?;
        if object.core().initializing.get() {
            return Err(KernelError::InitializationLoop(object.core().type_id().name()));
        }
        for member in object.core().aggregate().snapshot() {
            let core = member.core();
            if core.initialized.get() || core.initializing.get() {
                continue;
            }
            log_logic!(LOG, "initialize {}", core.type_id());
            core.initializing.set(true);
            member.do_initialize();
            core.initializing.set(false);
            core.initialized.set(true);
        }
        Ok(())
    }

    fn initialize(&self) {
        self.try_initialize().or_fatal()
    }

    fn is_initialized(&self) -> bool {
        self.core().is_initialized()
    }

    /// Dispose every member of the aggregate; idempotent
    fn dispose(&self) {
        self.core().aggregate().dispose_members();
    }

    fn is_disposed(&self) -> bool {
        self.core().is_disposed()
    }

    /// Attributes set explicitly on this instance
    fn attribute_overrides(&self) -> Vec<(String, AttributeValue)> {
        self.core().overrides()
    }
}

impl<T: ?Sized + Object> ObjectExt for T {}

fn fail_safe_unless_fatal(result: KernelResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) if e.is_always_fatal() => e.fatal(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{make_accessor, make_trace_source_accessor};
    use crate::checker::make_uinteger_checker_range;
    use evsim_trace::{Callback, ContextCallback, TracedCallback};

    #[derive(Default)]
    struct Host {
        core: ObjectCore,
        disposed_with: Cell<usize>,
    }

    impl Object for Host {
        fn core(&self) -> &ObjectCore {
            &self.core
        }

        fn do_dispose(&self) {
            self.disposed_with.set(self.disposed_with.get() + 1);
        }
    }

    impl ObjectType for Host {
        fn get_type_id() -> TypeId {
            TypeId::lookup_or_register("test::Host", |tid| tid.add_constructor::<Host>())
        }
    }

    #[derive(Default)]
    struct Stack {
        core: ObjectCore,
        mtu: Cell<u32>,
        rx: TracedCallback<i32>,
        initialized_count: Cell<u32>,
        notified: Cell<u32>,
    }

    impl Stack {
        fn mtu(&self) -> u32 {
            self.mtu.get()
        }

        fn set_mtu(&self, v: u32) {
            self.mtu.set(v);
        }

        fn rx_trace(&self) -> &TracedCallback<i32> {
            &self.rx
        }
    }

    impl Object for Stack {
        fn core(&self) -> &ObjectCore {
            &self.core
        }

        fn do_initialize(&self) {
            self.initialized_count.set(self.initialized_count.get() + 1);
        }

        fn notify_new_aggregate(&self) {
            self.notified.set(self.notified.get() + 1);
        }
    }

    impl ObjectType for Stack {
        fn get_type_id() -> TypeId {
            TypeId::lookup_or_register("test::Stack", |tid| {
                tid.add_constructor::<Stack>()
                    .add_attribute(
                        "Mtu",
                        "Maximum transmission unit",
                        1500u32,
                        make_accessor(Stack::mtu, Stack::set_mtu),
                        make_uinteger_checker_range::<u32>(68, 9000),
                    )
                    .add_trace_source(
                        "Rx",
                        "Packet received",
                        make_trace_source_accessor(Stack::rx_trace),
                        "i32",
                    )
            })
        }
    }

    /// Derived type embedding Stack
    #[derive(Default)]
    struct FastStack {
        base: Stack,
    }

    impl Object for FastStack {
        fn core(&self) -> &ObjectCore {
            self.base.core()
        }

        fn parent(&self) -> Option<&dyn Object> {
            Some(&self.base)
        }
    }

    impl ObjectType for FastStack {
        fn get_type_id() -> TypeId {
            TypeId::lookup_or_register("test::FastStack", |tid| {
                tid.set_parent_of::<Stack>().add_constructor::<FastStack>()
            })
        }
    }

    #[test]
    fn test_create_applies_defaults() {
        let stack = create_object::<Stack>();
        assert_eq!(stack.mtu(), 1500);
        assert_eq!(stack.instance_type_id(), Stack::get_type_id());
    }

    #[test]
    fn test_create_with_attributes_validates_first() {
        let stack = create_object_with_attributes(Stack::default(), &[("Mtu", 9000u32.into())]);
        assert_eq!(stack.mtu(), 9000);
        assert_eq!(stack.attribute_overrides().len(), 1);

        let err = try_create_object_with_attributes(
            Stack::default(),
            &[("Mtu".to_string(), AttributeValue::Uinteger(10))],
        )
        .unwrap_err();
        assert_eq!(err.kind(), "OutOfRange");
    }

    #[test]
    fn test_set_get_attribute() {
        let stack = create_object::<Stack>();
        stack.set_attribute("Mtu", 576u32);
        assert_eq!(stack.get_attribute("Mtu"), AttributeValue::Uinteger(576));
        assert!(!stack.set_attribute_fail_safe("Mtu", 1u32));
        assert_eq!(stack.mtu(), 576);
        assert!(!stack.set_attribute_fail_safe("Nope", 1u32));
        assert!(stack.get_attribute_fail_safe("Nope").is_none());
        assert!(stack.set_attribute_fail_safe("Mtu", "1280"));
        assert_eq!(stack.mtu(), 1280);
    }

    #[test]
    #[should_panic(expected = "OutOfRange")]
    fn test_strict_set_aborts() {
        let stack = create_object::<Stack>();
        stack.set_attribute("Mtu", 0u32);
    }

    #[test]
    fn test_derived_inherits_attributes() {
        let fast = create_object::<FastStack>();
        assert_eq!(fast.base.mtu(), 1500);
        fast.set_attribute("Mtu", 4000u32);
        assert_eq!(fast.base.mtu(), 4000);
        assert!(object_cast::<Stack>(fast.as_object()).is_some());
    }

    #[test]
    fn test_aggregate_symmetry() {
        let host = create_object::<Host>();
        let stack = create_object::<Stack>();
        host.aggregate_object(&stack);

        assert_eq!(host.get_object::<Stack>().unwrap(), stack);
        assert_eq!(stack.get_object::<Host>().unwrap(), host);
        assert_eq!(stack.get_object::<Stack>().unwrap(), stack);
        assert_eq!(host.aggregate_members().len(), 2);
        assert_eq!(stack.notified.get(), 1);
    }

    #[test]
    fn test_get_object_by_type_id_matches_subtypes() {
        let host = create_object::<Host>();
        let fast = create_object::<FastStack>();
        host.aggregate_object(&fast);
        let found = host.get_object_by_type_id(Stack::get_type_id()).unwrap();
        assert_eq!(found, fast);

        let stack = host.get_object::<Stack>().unwrap();
        assert_eq!(stack, fast);
        assert_eq!(stack.mtu(), 1500);
        assert!(stack.exact().is_none());
        assert_eq!(host.get_object::<FastStack>().unwrap().exact().unwrap(), fast);
        assert!(fast.get_object::<Host>().unwrap().exact().is_some());
    }

    #[test]
    fn test_get_object_base_does_not_match_derived() {
        let host = create_object::<Host>();
        let plain = create_object::<Stack>();
        host.aggregate_object(&plain);
        assert_eq!(host.get_object::<Stack>().unwrap(), plain);
        assert!(host.get_object::<FastStack>().is_none());
    }

    #[test]
    fn test_aggregate_type_conflict() {
        let a = create_object::<Host>();
        let b = create_object::<Host>();
        assert_eq!(
            a.try_aggregate_object(&b).unwrap_err().kind(),
            "AggregateTypeConflict"
        );
        assert!(a.get_object::<Host>().unwrap() == a);
    }

    #[test]
    fn test_initialize_once_across_aggregate() {
        let host = create_object::<Host>();
        let stack = create_object::<Stack>();
        host.aggregate_object(&stack);
        host.initialize();
        host.initialize();
        assert_eq!(stack.initialized_count.get(), 1);
        assert!(stack.is_initialized());
    }

    #[test]
    fn test_pending_initialization() {
        clear_pending_objects();
        let stack = create_object::<Stack>();
        initialize_pending_objects();
        assert_eq!(stack.initialized_count.get(), 1);
    }

    #[test]
    fn test_dispose_is_idempotent_and_final() {
        let host = create_object::<Host>();
        let stack = create_object::<Stack>();
        host.aggregate_object(&stack);
        stack.dispose();
        stack.dispose();
        assert_eq!(host.disposed_with.get(), 1);
        assert!(host.is_disposed());
        assert_eq!(host.try_initialize().unwrap_err().kind(), "AlreadyDisposed");
        assert_eq!(
            host.try_set_attribute("Nope", 1u32).unwrap_err().kind(),
            "AlreadyDisposed"
        );
        let other = create_object::<Stack>();
        assert!(other.try_aggregate_object(&host).is_err());
    }

    #[test]
    fn test_reads_after_dispose_fail() {
        let stack = create_object::<Stack>();
        stack.set_attribute("Mtu", 576u32);
        let cb = Callback::new(|_: i32| {});
        assert!(stack.trace_connect_without_context("Rx", cb.clone()));
        stack.dispose();

        assert_eq!(stack.try_get_attribute("Mtu").unwrap_err().kind(), "AlreadyDisposed");
        assert!(stack.get_attribute_fail_safe("Mtu").is_none());
        assert_eq!(
            stack.try_trace_disconnect_without_context("Rx", cb.clone()).unwrap_err().kind(),
            "AlreadyDisposed"
        );
        assert_eq!(
            stack.try_trace_disconnect("Rx", "ctx", cb).unwrap_err().kind(),
            "AlreadyDisposed"
        );
        assert_eq!(stack.try_get_object::<Stack>().unwrap_err().kind(), "AlreadyDisposed");
        assert!(stack.get_object_by_type_id(Stack::get_type_id()).is_none());
    }

    #[test]
    #[should_panic(expected = "AlreadyDisposed")]
    fn test_strict_get_object_after_dispose_aborts() {
        let host = create_object::<Host>();
        host.dispose();
        host.get_object::<Host>();
    }

    #[test]
    fn test_last_handle_disposes() {
        let host = create_object::<Host>();
        let stack = create_object::<Stack>();
        host.aggregate_object(&stack);
        let weak = Rc::downgrade(stack.as_rc());
        drop(stack);
        assert!(weak.upgrade().is_some());
        drop(host);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_trace_connect_by_name() {
        let stack = create_object::<Stack>();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let cb = Callback::new(move |v: i32| s.borrow_mut().push(v));
        assert!(stack.trace_connect_without_context("Rx", cb.clone()));
        stack.rx.fire(42);
        assert!(stack.trace_disconnect_without_context("Rx", cb));
        stack.rx.fire(43);
        assert_eq!(*seen.borrow(), vec![42]);
        assert!(!stack.trace_connect_without_context("Tx", Callback::new(|_: i32| {})));
    }

    #[test]
    fn test_trace_connect_with_context() {
        let stack = create_object::<Stack>();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let cb = ContextCallback::new(move |ctx: &str, v: i32| s.borrow_mut().push((ctx.to_string(), v)));
        assert!(stack.trace_connect("Rx", "stack", cb));
        stack.rx.fire(1);
        assert_eq!(*seen.borrow(), vec![("stack".to_string(), 1)]);
    }

    #[test]
    #[should_panic(expected = "SignatureMismatch")]
    fn test_trace_signature_mismatch_is_fatal() {
        let stack = create_object::<Stack>();
        stack.trace_connect_without_context("Rx", Callback::new(|_: String| {}));
    }
}

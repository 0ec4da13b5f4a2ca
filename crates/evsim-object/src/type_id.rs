//! Type registry
//!
//! Every object type registers a [`TypeId`] carrying its name, parent,
//! constructor, attribute descriptors and trace source descriptors. Lookups
//! by attribute or trace source name walk the parent chain; a name may
//! appear at most once along a chain.
//!
//! The registry belongs to the kernel context of the current thread.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use evsim_core::{log_function, log_logic, KernelError, KernelResult, LogComponent, OrFatal};
use parking_lot::Mutex;

use crate::accessor::{AttributeAccessor, TraceSourceAccessor};
use crate::checker::AttributeChecker;
use crate::object::{try_create_object_with_attributes, Object, ObjectType};
use crate::ptr::Ptr;
use crate::value::AttributeValue;

static LOG: LogComponent = LogComponent::new("TypeId");

/// Name of the root of every type chain
pub const ROOT_TYPE_NAME: &str = "evsim::Object";

/// Names already warned about as deprecated, process-wide
static DEPRECATION_WARNED: Mutex<BTreeSet<String>> = Mutex::new(BTreeSet::new());

/// Access flags of an attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttributeFlags(pub u8);

impl AttributeFlags {
    pub const GET: AttributeFlags = AttributeFlags(0x01);
    pub const SET: AttributeFlags = AttributeFlags(0x02);
    pub const CONSTRUCT: AttributeFlags = AttributeFlags(0x04);
    /// Readable, writable and applied at construction
    pub const SGC: AttributeFlags = AttributeFlags(0x07);

    #[inline]
    pub fn contains(self, other: AttributeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn label(self) -> String {
        let mut out = String::new();
        if self.contains(Self::SET) {
            out.push_str("write");
        }
        if self.contains(Self::GET) {
            if !out.is_empty() {
                out.push('|');
            }
            out.push_str("read");
        }
        if self.contains(Self::CONSTRUCT) {
            if !out.is_empty() {
                out.push('|');
            }
            out.push_str("construct");
        }
        out
    }
}

impl std::ops::BitOr for AttributeFlags {
    type Output = AttributeFlags;

    fn bitor(self, rhs: AttributeFlags) -> AttributeFlags {
        AttributeFlags(self.0 | rhs.0)
    }
}

/// Whether access to an attribute or trace source is allowed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SupportLevel {
    #[default]
    Supported,
    /// Allowed, with a one-time warning carrying the replacement hint
    Deprecated,
    /// Rejected with `ObsoleteAttribute`
    Obsolete,
}

/// Attribute descriptor
#[derive(Clone)]
pub struct AttributeInformation {
    pub name: String,
    pub help: String,
    pub flags: AttributeFlags,
    /// Value at registration, restored by `reset_initial_values`
    pub original_initial_value: AttributeValue,
    /// Current construction default
    pub initial_value: AttributeValue,
    pub accessor: Rc<dyn AttributeAccessor>,
    pub checker: AttributeChecker,
    pub support_level: SupportLevel,
    pub support_msg: String,
}

impl fmt::Debug for AttributeInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeInformation")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("initial_value", &self.initial_value)
            .field("support_level", &self.support_level)
            .finish()
    }
}

/// Trace source descriptor
#[derive(Clone)]
pub struct TraceSourceInformation {
    pub name: String,
    pub help: String,
    /// Signature tag of the sinks this source accepts
    pub callback: String,
    pub accessor: Rc<dyn TraceSourceAccessor>,
    pub support_level: SupportLevel,
    pub support_msg: String,
}

impl fmt::Debug for TraceSourceInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceSourceInformation")
            .field("name", &self.name)
            .field("callback", &self.callback)
            .field("support_level", &self.support_level)
            .finish()
    }
}

type Constructor = Rc<dyn Fn(&[(String, AttributeValue)]) -> KernelResult<Ptr<dyn Object>>>;

struct TypeInfo {
    name: String,
    parent: TypeId,
    group: String,
    size: usize,
    hash: u32,
    constructor: Option<Constructor>,
    attributes: Vec<AttributeInformation>,
    trace_sources: Vec<TraceSourceInformation>,
    children: Vec<TypeId>,
}

#[derive(Default)]
struct Registry {
    types: Vec<TypeInfo>,
    by_name: HashMap<String, TypeId>,
    by_hash: HashMap<u32, TypeId>,
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::default());
}

fn with_registry<R>(f: impl FnOnce(&Registry) -> R) -> R {
    REGISTRY.with(|r| f(&r.borrow()))
}

fn with_registry_mut<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
    REGISTRY.with(|r| f(&mut r.borrow_mut()))
}

/// 32-bit FNV-1a
fn name_hash(name: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in name.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Warn once per process about a deprecated attribute or trace source
pub(crate) fn warn_deprecated(full_name: &str, hint: &str) {
    let first = DEPRECATION_WARNED.lock().insert(full_name.to_string());
    if first {
        tracing::warn!(name = full_name, "{} is deprecated: {}", full_name, hint);
    }
}

/// Handle to a registered type
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TypeId(u32);

impl TypeId {
    /// No type; the parent of the root
    pub const NONE: TypeId = TypeId(0);

    #[inline]
    pub fn uid(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }

    fn with_info<R>(self, default: R, f: impl FnOnce(&TypeInfo) -> R) -> R {
        with_registry(|r| match self.index().and_then(|i| r.types.get(i)) {
            Some(info) => f(info),
            None => default,
        })
    }

    fn with_info_mut(self, f: impl FnOnce(&mut TypeInfo)) {
        with_registry_mut(|r| {
            if let Some(info) = self.index().and_then(|i| r.types.get_mut(i)) {
                f(info)
            }
        })
    }

    // Registration

    /// Register a new type name. The parent defaults to the root type.
    pub fn register(name: &str) -> KernelResult<TypeId> {
        let parent = if name == ROOT_TYPE_NAME {
            TypeId::NONE
        } else {
            object_type_id()
        };
        let hash = name_hash(name);
        let tid = with_registry_mut(|r| {
            if r.by_name.contains_key(name) || r.by_hash.contains_key(&hash) {
                return Err(KernelError::DuplicateName(name.to_string()));
            }
            let tid = TypeId(r.types.len() as u32 + 1);
            r.types.push(TypeInfo {
                name: name.to_string(),
                parent,
                group: String::new(),
                size: 0,
                hash,
                constructor: None,
                attributes: Vec::new(),
                trace_sources: Vec::new(),
                children: Vec::new(),
            });
            r.by_name.insert(name.to_string(), tid);
            r.by_hash.insert(hash, tid);
            if let Some(p) = parent.index().and_then(|i| r.types.get_mut(i)) {
                p.children.push(tid);
            }
            Ok(tid)
        })?;
        log_logic!(LOG, "registered {} as {}", name, tid.0);
        Ok(tid)
    }

    /// Strict form of [`register`](Self::register)
    pub fn new(name: &str) -> TypeId {
        Self::register(name).or_fatal()
    }

    /// Look `name` up, registering and describing it with `build` on first use
    pub fn lookup_or_register(name: &str, build: impl FnOnce(TypeId) -> TypeId) -> TypeId {
        match Self::lookup_by_name_fail_safe(name) {
            Some(tid) => tid,
            None => build(TypeId::new(name)),
        }
    }

    pub fn try_set_parent(self, parent: TypeId) -> KernelResult<TypeId> {
        if parent == self || parent.is_child_of(self) {
            return Err(KernelError::AttributeConflict {
                type_name: self.name(),
                name: format!("parent {}", parent.name()),
            });
        }
        // Own names must stay unique along the new chain
        let own: Vec<String> = self.with_info(Vec::new(), |i| {
            i.attributes
                .iter()
                .map(|a| a.name.clone())
                .chain(i.trace_sources.iter().map(|t| t.name.clone()))
                .collect()
        });
        for name in &own {
            if !parent.is_none() && parent.declares_in_chain(name) {
                return Err(KernelError::AttributeConflict {
                    type_name: self.name(),
                    name: name.clone(),
                });
            }
        }
        let old = self.parent();
        with_registry_mut(|r| {
            if let Some(p) = old.index().and_then(|i| r.types.get_mut(i)) {
                p.children.retain(|c| *c != self);
            }
            if let Some(p) = parent.index().and_then(|i| r.types.get_mut(i)) {
                p.children.push(self);
            }
            if let Some(info) = self.index().and_then(|i| r.types.get_mut(i)) {
                info.parent = parent;
            }
        });
        Ok(self)
    }

    pub fn set_parent(self, parent: TypeId) -> TypeId {
        self.try_set_parent(parent).or_fatal()
    }

    pub fn set_parent_of<P: ObjectType>(self) -> TypeId {
        self.set_parent(P::get_type_id())
    }

    pub fn set_group_name(self, group: &str) -> TypeId {
        self.with_info_mut(|i| i.group = group.to_string());
        self
    }

    pub fn set_size(self, size: usize) -> TypeId {
        self.with_info_mut(|i| i.size = size);
        self
    }

    /// Make the type constructible through `T::default()`
    pub fn add_constructor<T: ObjectType + Default>(self) -> TypeId {
        let constructor: Constructor = Rc::new(|attributes: &[(String, AttributeValue)]| {
            try_create_object_with_attributes(T::default(), attributes).map(|p| p.upcast())
        });
        self.with_info_mut(|i| {
            i.constructor = Some(constructor);
            i.size = std::mem::size_of::<T>();
        });
        self
    }

    fn declares_in_chain(self, name: &str) -> bool {
        let mut current = self;
        while !current.is_none() {
            let found = current.with_info(false, |i| {
                i.attributes.iter().any(|a| a.name == name)
                    || i.trace_sources.iter().any(|t| t.name == name)
            });
            if found {
                return true;
            }
            current = current.parent();
        }
        false
    }

    /// Add a fully described attribute
    pub fn try_add_attribute_info(self, mut info: AttributeInformation) -> KernelResult<TypeId> {
        if self.declares_in_chain(&info.name) {
            return Err(KernelError::AttributeConflict {
                type_name: self.name(),
                name: info.name,
            });
        }
        if !matches!(info.initial_value, AttributeValue::Empty) {
            let full = format!("{}::{}", self.name(), info.name);
            info.initial_value = info.checker.create_valid_value(&info.initial_value, &full)?;
        }
        info.original_initial_value = info.initial_value.clone();
        log_function!(LOG, "{}::{} added", self.name(), info.name);
        self.with_info_mut(|i| i.attributes.push(info));
        Ok(self)
    }

    /// Add a readable, writable, construct-time attribute
    pub fn add_attribute(
        self,
        name: &str,
        help: &str,
        initial: impl Into<AttributeValue>,
        accessor: Rc<dyn AttributeAccessor>,
        checker: AttributeChecker,
    ) -> TypeId {
        self.add_attribute_with_flags(name, help, AttributeFlags::SGC, initial, accessor, checker)
    }

    pub fn add_attribute_with_flags(
        self,
        name: &str,
        help: &str,
        flags: AttributeFlags,
        initial: impl Into<AttributeValue>,
        accessor: Rc<dyn AttributeAccessor>,
        checker: AttributeChecker,
    ) -> TypeId {
        self.add_attribute_full(
            name,
            help,
            flags,
            initial,
            accessor,
            checker,
            SupportLevel::Supported,
            "",
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_attribute_full(
        self,
        name: &str,
        help: &str,
        flags: AttributeFlags,
        initial: impl Into<AttributeValue>,
        accessor: Rc<dyn AttributeAccessor>,
        checker: AttributeChecker,
        support_level: SupportLevel,
        support_msg: &str,
    ) -> TypeId {
        let initial = initial.into();
        self.try_add_attribute_info(AttributeInformation {
            name: name.to_string(),
            help: help.to_string(),
            flags,
            original_initial_value: initial.clone(),
            initial_value: initial,
            accessor,
            checker,
            support_level,
            support_msg: support_msg.to_string(),
        })
        .or_fatal()
    }

    pub fn try_add_trace_source_info(self, info: TraceSourceInformation) -> KernelResult<TypeId> {
        if self.declares_in_chain(&info.name) {
            return Err(KernelError::AttributeConflict {
                type_name: self.name(),
                name: info.name,
            });
        }
        log_function!(LOG, "{}::{} trace source added", self.name(), info.name);
        self.with_info_mut(|i| i.trace_sources.push(info));
        Ok(self)
    }

    pub fn add_trace_source(
        self,
        name: &str,
        help: &str,
        accessor: Rc<dyn TraceSourceAccessor>,
        callback: &str,
    ) -> TypeId {
        self.add_trace_source_full(name, help, accessor, callback, SupportLevel::Supported, "")
    }

    pub fn add_trace_source_full(
        self,
        name: &str,
        help: &str,
        accessor: Rc<dyn TraceSourceAccessor>,
        callback: &str,
        support_level: SupportLevel,
        support_msg: &str,
    ) -> TypeId {
        self.try_add_trace_source_info(TraceSourceInformation {
            name: name.to_string(),
            help: help.to_string(),
            callback: callback.to_string(),
            accessor,
            support_level,
            support_msg: support_msg.to_string(),
        })
        .or_fatal()
    }

    // Introspection

    pub fn name(self) -> String {
        self.with_info(String::new(), |i| i.name.clone())
    }

    pub fn parent(self) -> TypeId {
        self.with_info(TypeId::NONE, |i| i.parent)
    }

    pub fn has_parent(self) -> bool {
        !self.parent().is_none()
    }

    /// Whether `self` is `ancestor` or derives from it
    pub fn is_child_of(self, ancestor: TypeId) -> bool {
        let mut current = self;
        while !current.is_none() {
            if current == ancestor {
                return true;
            }
            current = current.parent();
        }
        false
    }

    pub fn group_name(self) -> String {
        self.with_info(String::new(), |i| i.group.clone())
    }

    pub fn size(self) -> usize {
        self.with_info(0, |i| i.size)
    }

    pub fn hash(self) -> u32 {
        self.with_info(0, |i| i.hash)
    }

    pub fn has_constructor(self) -> bool {
        self.with_info(false, |i| i.constructor.is_some())
    }

    /// Direct children, in registration order
    pub fn children(self) -> Vec<TypeId> {
        self.with_info(Vec::new(), |i| i.children.clone())
    }

    /// Construct an instance, applying `attributes` over the type defaults
    pub fn try_construct(self, attributes: &[(String, AttributeValue)]) -> KernelResult<Ptr<dyn Object>> {
        let constructor = self.with_info(None, |i| i.constructor.clone());
        match constructor {
            Some(construct) => construct(attributes),
            None => Err(KernelError::NotConstructible(self.name())),
        }
    }

    pub fn construct(self) -> Ptr<dyn Object> {
        self.try_construct(&[]).or_fatal()
    }

    pub fn get_attribute_n(self) -> usize {
        self.with_info(0, |i| i.attributes.len())
    }

    /// Own attribute `index`; panics when out of bounds
    pub fn get_attribute(self, index: usize) -> AttributeInformation {
        self.attributes()
            .into_iter()
            .nth(index)
            .unwrap_or_else(|| panic!("attribute index {index} out of bounds for {}", self.name()))
    }

    /// Own attributes, in declaration order
    pub fn attributes(self) -> Vec<AttributeInformation> {
        self.with_info(Vec::new(), |i| i.attributes.clone())
    }

    pub fn get_attribute_full_name(self, index: usize) -> String {
        format!("{}::{}", self.name(), self.get_attribute(index).name)
    }

    pub fn get_trace_source_n(self) -> usize {
        self.with_info(0, |i| i.trace_sources.len())
    }

    pub fn trace_sources(self) -> Vec<TraceSourceInformation> {
        self.with_info(Vec::new(), |i| i.trace_sources.clone())
    }

    /// Index of an attribute declared by this type itself
    pub fn find_own_attribute(self, name: &str) -> Option<usize> {
        self.with_info(None, |i| i.attributes.iter().position(|a| a.name == name))
    }

    /// Find an attribute along the chain, ignoring support levels
    pub fn find_attribute(self, name: &str) -> Option<(TypeId, AttributeInformation)> {
        let mut current = self;
        while !current.is_none() {
            let found = current.with_info(None, |i| {
                i.attributes.iter().find(|a| a.name == name).cloned()
            });
            if let Some(info) = found {
                return Some((current, info));
            }
            current = current.parent();
        }
        None
    }

    /// Find an attribute along the chain, honouring its support level
    pub fn lookup_attribute_by_name(self, name: &str) -> KernelResult<AttributeInformation> {
        let Some((owner, info)) = self.find_attribute(name) else {
            return Err(KernelError::UnknownAttribute {
                type_name: self.name(),
                name: name.to_string(),
            });
        };
        match info.support_level {
            SupportLevel::Supported => Ok(info),
            SupportLevel::Deprecated => {
                warn_deprecated(&format!("{}::{}", owner.name(), name), &info.support_msg);
                Ok(info)
            }
            SupportLevel::Obsolete => Err(KernelError::ObsoleteAttribute {
                type_name: owner.name(),
                name: format!("{} ({})", name, info.support_msg),
            }),
        }
    }

    /// Find a trace source along the chain, honouring its support level
    pub fn lookup_trace_source_by_name(self, name: &str) -> KernelResult<TraceSourceInformation> {
        let mut current = self;
        while !current.is_none() {
            let found = current.with_info(None, |i| {
                i.trace_sources.iter().find(|t| t.name == name).cloned()
            });
            if let Some(info) = found {
                return match info.support_level {
                    SupportLevel::Supported => Ok(info),
                    SupportLevel::Deprecated => {
                        warn_deprecated(&format!("{}::{}", current.name(), name), &info.support_msg);
                        Ok(info)
                    }
                    SupportLevel::Obsolete => Err(KernelError::ObsoleteAttribute {
                        type_name: current.name(),
                        name: format!("{} ({})", name, info.support_msg),
                    }),
                };
            }
            current = current.parent();
        }
        Err(KernelError::UnknownAttribute {
            type_name: self.name(),
            name: name.to_string(),
        })
    }

    /// Replace the construction default of own attribute `index`
    pub fn set_attribute_initial_value(self, index: usize, value: &AttributeValue) -> KernelResult<()> {
        let Some(info) = self.attributes().into_iter().nth(index) else {
            return Err(KernelError::UnknownAttribute {
                type_name: self.name(),
                name: format!("#{index}"),
            });
        };
        let full = format!("{}::{}", self.name(), info.name);
        let valid = info.checker.create_valid_value(value, &full)?;
        self.with_info_mut(|i| i.attributes[index].initial_value = valid);
        Ok(())
    }

    /// Restore every attribute default of every type to its registered value
    pub fn reset_initial_values() {
        with_registry_mut(|r| {
            for info in r.types.iter_mut() {
                for attr in info.attributes.iter_mut() {
                    attr.initial_value = attr.original_initial_value.clone();
                }
            }
        })
    }

    // Lookup

    pub fn lookup_by_name_fail_safe(name: &str) -> Option<TypeId> {
        with_registry(|r| r.by_name.get(name).copied())
    }

    pub fn try_lookup_by_name(name: &str) -> KernelResult<TypeId> {
        Self::lookup_by_name_fail_safe(name).ok_or_else(|| KernelError::UnknownType(name.to_string()))
    }

    pub fn lookup_by_name(name: &str) -> TypeId {
        Self::try_lookup_by_name(name).or_fatal()
    }

    pub fn lookup_by_hash(hash: u32) -> Option<TypeId> {
        with_registry(|r| r.by_hash.get(&hash).copied())
    }

    pub fn get_registered_n() -> usize {
        with_registry(|r| r.types.len())
    }

    pub fn get_registered(index: usize) -> TypeId {
        TypeId(index as u32 + 1)
    }

    /// Every registered type, in registration order
    pub fn registered() -> Vec<TypeId> {
        (0..Self::get_registered_n()).map(Self::get_registered).collect()
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.name())
    }
}

/// The root type of every object chain
pub fn object_type_id() -> TypeId {
    TypeId::lookup_or_register(ROOT_TYPE_NAME, |tid| tid.set_group_name("Core"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::make_accessor;
    use crate::checker::{make_string_checker, make_uinteger_checker_range};
    use crate::object::ObjectCore;
    use std::cell::Cell;

    #[derive(Default)]
    struct Sample {
        core: ObjectCore,
        size: Cell<u32>,
    }

    impl Sample {
        fn size(&self) -> u32 {
            self.size.get()
        }

        fn set_size(&self, v: u32) {
            self.size.set(v);
        }
    }

    impl Object for Sample {
        fn core(&self) -> &ObjectCore {
            &self.core
        }
    }

    impl ObjectType for Sample {
        fn get_type_id() -> TypeId {
            TypeId::lookup_or_register("test::Sample", |tid| {
                tid.set_group_name("Test").add_constructor::<Sample>().add_attribute(
                    "Size",
                    "A bounded size",
                    10u32,
                    make_accessor(Sample::size, Sample::set_size),
                    make_uinteger_checker_range::<u32>(1, 100),
                )
            })
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let tid = Sample::get_type_id();
        assert_eq!(tid.name(), "test::Sample");
        assert_eq!(TypeId::lookup_by_name("test::Sample"), tid);
        assert_eq!(tid.parent(), object_type_id());
        assert!(tid.is_child_of(object_type_id()));
        assert_eq!(tid.group_name(), "Test");
        assert!(tid.has_constructor());
        assert_eq!(TypeId::lookup_by_hash(tid.hash()), Some(tid));
        assert!(object_type_id().children().contains(&tid));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let _ = Sample::get_type_id();
        assert_eq!(
            TypeId::register("test::Sample"),
            Err(KernelError::DuplicateName("test::Sample".into()))
        );
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(
            TypeId::try_lookup_by_name("test::Missing").unwrap_err().kind(),
            "UnknownType"
        );
    }

    #[test]
    fn test_attribute_lookup_walks_parents() {
        let base = Sample::get_type_id();
        let derived = TypeId::new("test::DerivedSample").set_parent(base);
        let info = derived.lookup_attribute_by_name("Size").unwrap();
        assert_eq!(info.name, "Size");
        assert_eq!(derived.find_own_attribute("Size"), None);
        assert!(derived.lookup_attribute_by_name("Nope").is_err());
    }

    #[test]
    fn test_attribute_conflict_in_chain() {
        let base = Sample::get_type_id();
        let derived = TypeId::new("test::Conflicting").set_parent(base);
        let err = derived
            .try_add_attribute_info(AttributeInformation {
                name: "Size".into(),
                help: String::new(),
                flags: AttributeFlags::SGC,
                original_initial_value: AttributeValue::Empty,
                initial_value: AttributeValue::Empty,
                accessor: make_accessor(Sample::size, Sample::set_size),
                checker: make_string_checker(),
                support_level: SupportLevel::Supported,
                support_msg: String::new(),
            })
            .unwrap_err();
        assert_eq!(err.kind(), "AttributeConflict");
    }

    #[test]
    fn test_initial_value_reset() {
        let tid = Sample::get_type_id();
        let index = tid.find_own_attribute("Size").unwrap();
        tid.set_attribute_initial_value(index, &AttributeValue::Uinteger(50))
            .unwrap();
        assert_eq!(tid.get_attribute(index).initial_value, AttributeValue::Uinteger(50));
        assert!(tid
            .set_attribute_initial_value(index, &AttributeValue::Uinteger(0))
            .is_err());
        TypeId::reset_initial_values();
        assert_eq!(tid.get_attribute(index).initial_value, AttributeValue::Uinteger(10));
    }

    #[test]
    fn test_obsolete_rejected_deprecated_allowed() {
        let tid = TypeId::new("test::Legacy")
            .add_attribute_full(
                "Old",
                "",
                AttributeFlags::SGC,
                AttributeValue::Empty,
                make_accessor(Sample::size, Sample::set_size),
                make_uinteger_checker_range::<u32>(0, 10),
                SupportLevel::Obsolete,
                "use New",
            )
            .add_attribute_full(
                "Aging",
                "",
                AttributeFlags::SGC,
                AttributeValue::Empty,
                make_accessor(Sample::size, Sample::set_size),
                make_uinteger_checker_range::<u32>(0, 10),
                SupportLevel::Deprecated,
                "use New",
            );
        assert_eq!(
            tid.lookup_attribute_by_name("Old").unwrap_err().kind(),
            "ObsoleteAttribute"
        );
        assert!(tid.lookup_attribute_by_name("Aging").is_ok());
    }

    #[test]
    fn test_not_constructible() {
        let tid = TypeId::new("test::Abstract");
        assert_eq!(tid.try_construct(&[]).unwrap_err().kind(), "NotConstructible");
    }

    #[test]
    fn test_flags_label() {
        assert_eq!(AttributeFlags::SGC.label(), "write|read|construct");
        assert_eq!(AttributeFlags::GET.label(), "read");
    }
}

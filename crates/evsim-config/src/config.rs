//! Path based configuration
//!
//! Lookups start from the registered root namespace objects (or from the
//! name tree for `/Names/...` paths) and narrow a set of objects segment
//! by segment. A segment descends through named children, pointer
//! attributes, indexed container attributes, or aggregate members
//! (`$TypeName`).

use std::cell::RefCell;

use evsim_core::{log_function, log_logic, log_warn, KernelError, KernelResult, LogComponent};
use evsim_object::{
    AttributeInformation, AttributeValue, GlobalValue, Names, Object, ObjectExt, Ptr, SupportLevel, TypeId,
};
use evsim_trace::CallbackBase;

use crate::match_container::MatchContainer;
use crate::path::{name_matches, split_leaf, split_path, type_cast, IndexMatcher};

static LOG: LogComponent = LogComponent::new("Config");

thread_local! {
    static ROOTS: RefCell<Vec<Ptr<dyn Object>>> = const { RefCell::new(Vec::new()) };
}

/// Attributes of `tid` and of every type it derives from
fn chain_attributes(tid: TypeId) -> Vec<AttributeInformation> {
    let mut attributes = Vec::new();
    let mut current = tid;
    while !current.is_none() {
        attributes.extend(current.attributes());
        current = current.parent();
    }
    attributes
}

#[derive(Default)]
struct Resolver {
    objects: Vec<Ptr<dyn Object>>,
    contexts: Vec<String>,
}

impl Resolver {
    fn found(&mut self, object: &Ptr<dyn Object>, context: String) {
        let seen = self
            .objects
            .iter()
            .zip(&self.contexts)
            .any(|(o, c)| o.ptr_eq(object) && *c == context);
        if !seen {
            log_logic!(LOG, "matched {}", context);
            self.objects.push(object.clone());
            self.contexts.push(context);
        }
    }

    fn descend(&mut self, object: &Ptr<dyn Object>, segments: &[String], prefix: &str) {
        let Some((segment, rest)) = segments.split_first() else {
            self.found(object, prefix.to_string());
            return;
        };

        if let Some(type_name) = type_cast(segment) {
            let member = TypeId::lookup_by_name_fail_safe(type_name).and_then(|tid| object.get_object_by_type_id(tid));
            if let Some(member) = member {
                self.descend(&member, rest, &format!("{prefix}/{segment}"));
            }
            return;
        }

        for (name, child) in Names::children(Some(object)) {
            if name_matches(segment, &name) {
                self.descend(&child, rest, &format!("{prefix}/{name}"));
            }
        }

        for info in chain_attributes(object.instance_type_id()) {
            if !name_matches(segment, &info.name)
                || !info.accessor.has_getter()
                || info.support_level == SupportLevel::Obsolete
            {
                continue;
            }
            match info.accessor.get(object.peek()) {
                Ok(AttributeValue::Pointer(Some(target))) => {
                    self.descend(&target, rest, &format!("{prefix}/{}", info.name));
                }
                Ok(AttributeValue::ObjectPtrContainer(items)) => {
                    let Some((index, rest)) = rest.split_first() else {
                        continue;
                    };
                    let Some(selector) = IndexMatcher::parse(index) else {
                        continue;
                    };
                    for (i, item) in items.iter().filter(|(i, _)| selector.matches(**i)) {
                        self.descend(item, rest, &format!("{prefix}/{}/{i}", info.name));
                    }
                }
                _ => {}
            }
        }
    }
}

/// Objects selected by `path`, each with the concrete path that reached it
fn resolve(path: &str) -> KernelResult<MatchContainer> {
    let segments = split_path(path)?;
    let mut resolver = Resolver::default();
    if segments[0] == "Names" {
        if let Some((first, rest)) = segments[1..].split_first() {
            for (name, child) in Names::children(None) {
                if name_matches(first, &name) {
                    resolver.descend(&child, rest, &format!("/Names/{name}"));
                }
            }
        }
    } else {
        for root in Config::root_namespace_objects() {
            resolver.descend(&root, &segments, "");
        }
    }
    Ok(MatchContainer::new(resolver.objects, resolver.contexts, path))
}

#[track_caller]
pub(crate) fn strict<T>(result: KernelResult<T>, path: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => e.fatal_at(path),
    }
}

#[track_caller]
pub(crate) fn fail_safe<T>(result: KernelResult<T>, path: &str) -> bool {
    match result {
        Ok(_) => true,
        Err(e) if e.is_always_fatal() => e.fatal_at(path),
        Err(e) => {
            log_function!(LOG, "{} failed: {}", path, e);
            false
        }
    }
}

/// Split `Type::Attribute` at its last `::`
fn split_default_name(name: &str) -> KernelResult<(&str, &str)> {
    name.rsplit_once("::")
        .filter(|(t, a)| !t.is_empty() && !a.is_empty())
        .ok_or_else(|| KernelError::MalformedValue {
            expected: "Type::Attribute".into(),
            value: name.into(),
        })
}

pub struct Config;

impl Config {
    // Root namespace

    pub fn register_root_namespace_object<T: ?Sized + Object>(object: &Ptr<T>) {
        let object = object.upcast();
        ROOTS.with(|r| {
            let mut roots = r.borrow_mut();
            if !roots.iter().any(|o| o.ptr_eq(&object)) {
                roots.push(object);
            }
        });
    }

    pub fn unregister_root_namespace_object<T: ?Sized + Object>(object: &Ptr<T>) {
        ROOTS.with(|r| r.borrow_mut().retain(|o| !o.ptr_eq(object)));
    }

    pub fn get_root_namespace_object_n() -> usize {
        ROOTS.with(|r| r.borrow().len())
    }

    pub fn get_root_namespace_object(index: usize) -> Option<Ptr<dyn Object>> {
        ROOTS.with(|r| r.borrow().get(index).cloned())
    }

    pub fn root_namespace_objects() -> Vec<Ptr<dyn Object>> {
        ROOTS.with(|r| r.borrow().clone())
    }

    // Lookup

    pub fn try_lookup_matches(path: &str) -> KernelResult<MatchContainer> {
        resolve(path)
    }

    /// Objects selected by `path`; empty when the path is malformed
    pub fn lookup_matches(path: &str) -> MatchContainer {
        resolve(path).unwrap_or_else(|e| {
            log_warn!(LOG, "{}", e);
            MatchContainer::new(Vec::new(), Vec::new(), path)
        })
    }

    // Attributes

    /// Set the attribute at the end of `path` on every matched object.
    /// Nothing changes unless every match accepts the value.
    pub fn try_set(path: &str, value: impl Into<AttributeValue>) -> KernelResult<()> {
        let (objects, leaf) = split_leaf(path)?;
        resolve(&objects)?.try_set(&leaf, value)
    }

    #[track_caller]
    pub fn set(path: &str, value: impl Into<AttributeValue>) {
        strict(Self::try_set(path, value), path)
    }

    #[track_caller]
    pub fn set_fail_safe(path: &str, value: impl Into<AttributeValue>) -> bool {
        fail_safe(Self::try_set(path, value), path)
    }

    /// Replace the construction default of `Type::Attribute`
    pub fn try_set_default(name: &str, value: impl Into<AttributeValue>) -> KernelResult<()> {
        let (type_name, attribute) = split_default_name(name)?;
        let tid = TypeId::try_lookup_by_name(type_name)?;
        let index = tid
            .find_own_attribute(attribute)
            .ok_or_else(|| KernelError::UnknownAttribute {
                type_name: type_name.into(),
                name: attribute.into(),
            })?;
        tid.lookup_attribute_by_name(attribute)?;
        tid.set_attribute_initial_value(index, &value.into())?;
        log_function!(LOG, "default {}", name);
        Ok(())
    }

    #[track_caller]
    pub fn set_default(name: &str, value: impl Into<AttributeValue>) {
        strict(Self::try_set_default(name, value), name)
    }

    #[track_caller]
    pub fn set_default_fail_safe(name: &str, value: impl Into<AttributeValue>) -> bool {
        fail_safe(Self::try_set_default(name, value), name)
    }

    pub fn try_set_global(name: &str, value: impl Into<AttributeValue>) -> KernelResult<()> {
        GlobalValue::try_bind(name, value)
    }

    #[track_caller]
    pub fn set_global(name: &str, value: impl Into<AttributeValue>) {
        strict(Self::try_set_global(name, value), name)
    }

    #[track_caller]
    pub fn set_global_fail_safe(name: &str, value: impl Into<AttributeValue>) -> bool {
        fail_safe(Self::try_set_global(name, value), name)
    }

    // Trace sources

    /// Connect a context sink to the trace source at the end of `path` on
    /// every matched object; returns how many were connected
    pub fn try_connect(path: &str, cb: impl Into<CallbackBase>) -> KernelResult<usize> {
        let (objects, leaf) = split_leaf(path)?;
        resolve(&objects)?.try_connect(&leaf, cb)
    }

    #[track_caller]
    pub fn connect(path: &str, cb: impl Into<CallbackBase>) {
        strict(Self::try_connect(path, cb), path);
    }

    #[track_caller]
    pub fn connect_fail_safe(path: &str, cb: impl Into<CallbackBase>) -> bool {
        fail_safe(Self::try_connect(path, cb), path)
    }

    pub fn try_connect_without_context(path: &str, cb: impl Into<CallbackBase>) -> KernelResult<usize> {
        let (objects, leaf) = split_leaf(path)?;
        resolve(&objects)?.try_connect_without_context(&leaf, cb)
    }

    #[track_caller]
    pub fn connect_without_context(path: &str, cb: impl Into<CallbackBase>) {
        strict(Self::try_connect_without_context(path, cb), path);
    }

    #[track_caller]
    pub fn connect_without_context_fail_safe(path: &str, cb: impl Into<CallbackBase>) -> bool {
        fail_safe(Self::try_connect_without_context(path, cb), path)
    }

    /// Disconnect a context sink; `true` if any source held it
    pub fn disconnect(path: &str, cb: impl Into<CallbackBase>) -> bool {
        match split_leaf(path) {
            Ok((objects, leaf)) => Self::lookup_matches(&objects).disconnect(&leaf, cb),
            Err(_) => false,
        }
    }

    pub fn disconnect_without_context(path: &str, cb: impl Into<CallbackBase>) -> bool {
        match split_leaf(path) {
            Ok((objects, leaf)) => Self::lookup_matches(&objects).disconnect_without_context(&leaf, cb),
            Err(_) => false,
        }
    }

    /// Restore registered attribute defaults and global values, and forget
    /// the root namespace objects
    pub fn reset() {
        TypeId::reset_initial_values();
        GlobalValue::reset_all();
        let released = ROOTS.with(|r| std::mem::take(&mut *r.borrow_mut()));
        drop(released);
        log_function!(LOG, "reset");
    }
}

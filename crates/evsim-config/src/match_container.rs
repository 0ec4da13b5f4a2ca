//! Result of a config path lookup

use evsim_core::{log_logic, KernelError, KernelResult, LogComponent};
use evsim_object::{AttributeFlags, AttributeValue, Object, ObjectExt, Ptr};
use evsim_trace::CallbackBase;

use crate::config::{fail_safe, strict};

static LOG: LogComponent = LogComponent::new("MatchContainer");

/// Objects matched by a path, each paired with the concrete path that
/// reached it
#[derive(Clone, Debug, Default)]
pub struct MatchContainer {
    objects: Vec<Ptr<dyn Object>>,
    contexts: Vec<String>,
    path: String,
}

impl MatchContainer {
    pub fn new(objects: Vec<Ptr<dyn Object>>, contexts: Vec<String>, path: &str) -> Self {
        Self {
            objects,
            contexts,
            path: path.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Ptr<dyn Object>> {
        self.objects.get(index)
    }

    /// Concrete path of match `index`, e.g. `/NodeList/3/$Ipv4`
    pub fn get_matched_path(&self, index: usize) -> Option<&str> {
        self.contexts.get(index).map(String::as_str)
    }

    /// The path the lookup was made with
    pub fn get_path(&self) -> &str {
        &self.path
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ptr<dyn Object>> {
        self.objects.iter()
    }

    fn leaf_path(&self, name: &str) -> String {
        format!("{}/{}", self.path, name)
    }

    /// Set attribute `name` on every match. Every match validates the value
    /// before any of them is changed.
    pub fn try_set(&self, name: &str, value: impl Into<AttributeValue>) -> KernelResult<()> {
        if self.objects.is_empty() {
            return Err(KernelError::PathNoMatch(self.leaf_path(name)));
        }
        let value = value.into();
        let mut validated = Vec::with_capacity(self.objects.len());
        for object in &self.objects {
            let tid = object.instance_type_id();
            if object.is_disposed() {
                return Err(KernelError::AlreadyDisposed(tid.name()));
            }
            let info = tid.lookup_attribute_by_name(name)?;
            if !info.flags.contains(AttributeFlags::SET) || !info.accessor.has_setter() {
                return Err(KernelError::UnknownAttribute {
                    type_name: tid.name(),
                    name: format!("{name} (not writable)"),
                });
            }
            let full = format!("{}::{}", tid.name(), name);
            validated.push(info.checker.create_valid_value(&value, &full)?);
        }
        for ((object, context), value) in self.objects.iter().zip(&self.contexts).zip(validated) {
            log_logic!(LOG, "set {}/{}", context, name);
            object.try_set_attribute(name, value)?;
        }
        Ok(())
    }

    #[track_caller]
    pub fn set(&self, name: &str, value: impl Into<AttributeValue>) {
        strict(self.try_set(name, value), &self.leaf_path(name))
    }

    #[track_caller]
    pub fn set_fail_safe(&self, name: &str, value: impl Into<AttributeValue>) -> bool {
        fail_safe(self.try_set(name, value), &self.leaf_path(name))
    }

    fn connect_each(
        &self,
        name: &str,
        connect: impl Fn(&Ptr<dyn Object>, &str) -> KernelResult<()>,
    ) -> KernelResult<usize> {
        let mut connected = 0;
        let mut first_error = None;
        for (object, context) in self.objects.iter().zip(&self.contexts) {
            let context = format!("{context}/{name}");
            match connect(object, &context) {
                Ok(()) => {
                    log_logic!(LOG, "connected {}", context);
                    connected += 1;
                }
                Err(e) if e.is_always_fatal() => return Err(e),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if connected > 0 {
            return Ok(connected);
        }
        Err(first_error.unwrap_or_else(|| KernelError::PathNoMatch(self.leaf_path(name))))
    }

    /// Connect a context sink to trace source `name` on every match; the
    /// sink receives the matched path followed by the source name
    pub fn try_connect(&self, name: &str, cb: impl Into<CallbackBase>) -> KernelResult<usize> {
        let cb = cb.into();
        self.connect_each(name, |object, context| {
            object.try_trace_connect(name, context, cb.clone())
        })
    }

    #[track_caller]
    pub fn connect(&self, name: &str, cb: impl Into<CallbackBase>) {
        strict(self.try_connect(name, cb), &self.leaf_path(name));
    }

    #[track_caller]
    pub fn connect_fail_safe(&self, name: &str, cb: impl Into<CallbackBase>) -> bool {
        fail_safe(self.try_connect(name, cb), &self.leaf_path(name))
    }

    pub fn try_connect_without_context(&self, name: &str, cb: impl Into<CallbackBase>) -> KernelResult<usize> {
        let cb = cb.into();
        self.connect_each(name, |object, _| {
            object.try_trace_connect_without_context(name, cb.clone())
        })
    }

    #[track_caller]
    pub fn connect_without_context(&self, name: &str, cb: impl Into<CallbackBase>) {
        strict(self.try_connect_without_context(name, cb), &self.leaf_path(name));
    }

    #[track_caller]
    pub fn connect_without_context_fail_safe(&self, name: &str, cb: impl Into<CallbackBase>) -> bool {
        fail_safe(self.try_connect_without_context(name, cb), &self.leaf_path(name))
    }

    /// Disconnect a context sink from every match; `true` if any held it
    pub fn disconnect(&self, name: &str, cb: impl Into<CallbackBase>) -> bool {
        let cb = cb.into();
        let mut removed = false;
        for (object, context) in self.objects.iter().zip(&self.contexts) {
            let context = format!("{context}/{name}");
            removed |= object.trace_disconnect(name, &context, cb.clone());
        }
        removed
    }

    pub fn disconnect_without_context(&self, name: &str, cb: impl Into<CallbackBase>) -> bool {
        let cb = cb.into();
        let mut removed = false;
        for object in &self.objects {
            removed |= object.trace_disconnect_without_context(name, cb.clone());
        }
        removed
    }
}

impl<'a> IntoIterator for &'a MatchContainer {
    type Item = &'a Ptr<dyn Object>;
    type IntoIter = std::slice::Iter<'a, Ptr<dyn Object>>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

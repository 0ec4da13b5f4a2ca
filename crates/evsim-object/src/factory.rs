//! Object factories
//!
//! A factory names a type and a list of attribute values; it builds any
//! number of identically configured objects. The textual form is
//! `TypeName[Attr1=v1|Attr2=v2]`, brackets omitted when the list is empty.
//! String values escape reserved characters (`\`, brackets, `|`, `,`)
//! with a backslash.

use std::fmt;
use std::str::FromStr;

use evsim_core::{KernelError, KernelResult, OrFatal};

use crate::checker::{split_top_level, trim_component, AttributeChecker};
use crate::object::{Object, ObjectExt, ObjectType};
use crate::ptr::Ptr;
use crate::type_id::TypeId;
use crate::value::AttributeValue;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectFactory {
    tid: TypeId,
    parameters: Vec<(String, AttributeValue)>,
}

impl ObjectFactory {
    pub fn new(tid: TypeId) -> Self {
        ObjectFactory {
            tid,
            parameters: Vec::new(),
        }
    }

    /// Factory for the registered type `name`
    pub fn try_for_type(name: &str) -> KernelResult<Self> {
        Ok(Self::new(TypeId::try_lookup_by_name(name)?))
    }

    pub fn for_type(name: &str) -> Self {
        Self::try_for_type(name).or_fatal()
    }

    /// Factory reproducing `object`: its instance type and explicit overrides
    pub fn describe(object: &dyn Object) -> Self {
        ObjectFactory {
            tid: object.instance_type_id(),
            parameters: object.attribute_overrides(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.tid
    }

    pub fn set_type_id(&mut self, tid: TypeId) {
        self.tid = tid;
    }

    pub fn parameters(&self) -> &[(String, AttributeValue)] {
        &self.parameters
    }

    /// Record a value for `name`, validated against the attribute's checker
    pub fn try_set(&mut self, name: &str, value: impl Into<AttributeValue>) -> KernelResult<()> {
        if self.tid.is_none() {
            return Err(KernelError::UnknownType(String::new()));
        }
        let info = self.tid.lookup_attribute_by_name(name)?;
        let full = format!("{}::{}", self.tid.name(), name);
        let value = info.checker.create_valid_value(&value.into(), &full)?;
        match self.parameters.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.parameters.push((name.to_string(), value)),
        }
        Ok(())
    }

    pub fn set(&mut self, name: &str, value: impl Into<AttributeValue>) -> &mut Self {
        self.try_set(name, value).or_fatal();
        self
    }

    pub fn is_type_id_set(&self) -> bool {
        !self.tid.is_none()
    }

    pub fn try_create(&self) -> KernelResult<Ptr<dyn Object>> {
        if self.tid.is_none() {
            return Err(KernelError::NotConstructible(String::new()));
        }
        self.tid.try_construct(&self.parameters)
    }

    pub fn create(&self) -> Ptr<dyn Object> {
        self.try_create().or_fatal()
    }

    /// Build an object whose concrete type is `T`
    pub fn try_create_as<T: ObjectType>(&self) -> KernelResult<Ptr<T>> {
        let object = self.try_create()?;
        object.downcast::<T>().ok_or_else(|| KernelError::TypeMismatch {
            name: self.tid.name(),
            expected: T::get_type_id().name(),
            actual: object.instance_type_id().name(),
        })
    }

    pub fn create_as<T: ObjectType>(&self) -> Ptr<T> {
        self.try_create_as().or_fatal()
    }
}

fn checker_for(tid: TypeId, name: &str) -> AttributeChecker {
    tid.find_attribute(name)
        .map(|(_, info)| info.checker)
        .unwrap_or_default()
}

impl fmt::Display for ObjectFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tid.name())?;
        if self.parameters.is_empty() {
            return Ok(());
        }
        let parts: Vec<String> = self
            .parameters
            .iter()
            .map(|(name, value)| {
                format!("{}={}", name, value.serialize_component(&checker_for(self.tid, name), ""))
            })
            .collect();
        write!(f, "[{}]", parts.join("|"))
    }
}

impl FromStr for ObjectFactory {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || KernelError::MalformedValue {
            expected: "ObjectFactory".into(),
            value: s.into(),
        };
        let text = s.trim();
        let (type_name, body) = match text.find('[') {
            Some(open) => {
                let body = text[open + 1..].strip_suffix(']').ok_or_else(malformed)?;
                (&text[..open], Some(body))
            }
            None => (text, None),
        };
        if type_name.is_empty() {
            return Err(malformed());
        }
        let mut factory = ObjectFactory::try_for_type(type_name)?;
        if let Some(body) = body.filter(|b| !b.trim().is_empty()) {
            for assignment in split_top_level(body, "|") {
                let (name, text) = assignment.split_once('=').ok_or_else(malformed)?;
                let name = name.trim();
                let info = factory.tid.lookup_attribute_by_name(name)?;
                let full = format!("{}::{}", factory.tid.name(), name);
                let value = info.checker.deserialize_component(trim_component(text), &full)?;
                factory.try_set(name, value)?;
            }
        }
        Ok(factory)
    }
}

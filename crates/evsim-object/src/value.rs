//! Attribute values
//!
//! [`AttributeValue`] is the tagged union of every configurable value.
//! Textual forms are produced and parsed against an [`AttributeChecker`],
//! which supplies labels, separators and target types.

use std::collections::BTreeMap;
use std::fmt;

use evsim_core::{KernelResult, Time};

use crate::checker::{escape_component, AttributeChecker};
use crate::data_rate::DataRate;
use crate::factory::ObjectFactory;
use crate::object::{Object, ObjectExt};
use crate::ptr::Ptr;
use crate::vector::{Vector2D, Vector3D};

#[derive(Clone, Default)]
pub enum AttributeValue {
    #[default]
    Empty,
    Integer(i64),
    Uinteger(u64),
    Double(f64),
    Boolean(bool),
    String(String),
    Time(Time),
    DataRate(DataRate),
    Enum(i32),
    Pointer(Option<Ptr<dyn Object>>),
    /// Objects keyed by index
    ObjectPtrContainer(BTreeMap<u32, Ptr<dyn Object>>),
    Pair(Box<AttributeValue>, Box<AttributeValue>),
    /// Homogeneous sequence
    List(Vec<AttributeValue>),
    Tuple(Vec<AttributeValue>),
    ObjectFactory(ObjectFactory),
    Vector3(Vector3D),
    Vector2(Vector2D),
}

impl AttributeValue {
    /// Variant name, used in type mismatch reports
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Empty => "Empty",
            AttributeValue::Integer(_) => "Integer",
            AttributeValue::Uinteger(_) => "Uinteger",
            AttributeValue::Double(_) => "Double",
            AttributeValue::Boolean(_) => "Boolean",
            AttributeValue::String(_) => "String",
            AttributeValue::Time(_) => "Time",
            AttributeValue::DataRate(_) => "DataRate",
            AttributeValue::Enum(_) => "Enum",
            AttributeValue::Pointer(_) => "Pointer",
            AttributeValue::ObjectPtrContainer(_) => "ObjectPtrContainer",
            AttributeValue::Pair(..) => "Pair",
            AttributeValue::List(_) => "List",
            AttributeValue::Tuple(_) => "Tuple",
            AttributeValue::ObjectFactory(_) => "ObjectFactory",
            AttributeValue::Vector3(_) => "Vector3D",
            AttributeValue::Vector2(_) => "Vector2D",
        }
    }

    /// Typed view of the value
    pub fn get<T: AttributeType>(&self) -> Option<T> {
        T::from_value(self)
    }

    /// Textual form under `checker`
    pub fn serialize_to_string(&self, checker: &AttributeChecker) -> String {
        self.render(checker, None)
    }

    /// Textual form of a value nested in a composite whose bare
    /// (unbracketed) enclosing forms split on `separators`
    pub(crate) fn serialize_component(&self, checker: &AttributeChecker, separators: &str) -> String {
        self.render(checker, Some(separators))
    }

    fn render(&self, checker: &AttributeChecker, nested: Option<&str>) -> String {
        let inner = |own: &str| format!("{}{}", nested.unwrap_or_default(), own);
        match self {
            AttributeValue::Empty => String::new(),
            AttributeValue::Integer(v) => v.to_string(),
            AttributeValue::Uinteger(v) => v.to_string(),
            AttributeValue::Double(v) => v.to_string(),
            AttributeValue::Boolean(v) => v.to_string(),
            AttributeValue::String(v) => match nested {
                Some(separators) => escape_component(v, separators),
                None => v.clone(),
            },
            AttributeValue::Time(v) => v.to_string(),
            AttributeValue::DataRate(v) => v.to_string(),
            AttributeValue::Enum(v) => match checker {
                AttributeChecker::Enum { labels } => labels
                    .iter()
                    .find(|(value, _)| value == v)
                    .map(|(_, label)| label.clone())
                    .unwrap_or_else(|| v.to_string()),
                _ => v.to_string(),
            },
            AttributeValue::Pointer(None) => "0".to_string(),
            AttributeValue::Pointer(Some(object)) => {
                ObjectFactory::describe(object.as_object()).to_string()
            }
            AttributeValue::ObjectPtrContainer(map) => map
                .keys()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            AttributeValue::Pair(first, second) => {
                let (c1, c2, separator) = match checker {
                    AttributeChecker::Pair {
                        first,
                        second,
                        separator,
                    } => (first.as_ref(), second.as_ref(), separator.as_str()),
                    _ => (&AttributeChecker::Empty, &AttributeChecker::Empty, " "),
                };
                let context = inner(separator);
                format!(
                    "{}{}{}",
                    first.render(c1, Some(&context)),
                    separator,
                    second.render(c2, Some(&context))
                )
            }
            AttributeValue::List(items) => {
                let (element, separator) = match checker {
                    AttributeChecker::List { element, separator } => {
                        (element.as_ref(), separator.as_str())
                    }
                    _ => (&AttributeChecker::Empty, ","),
                };
                let context = inner(separator);
                items
                    .iter()
                    .map(|v| v.render(element, Some(&context)))
                    .collect::<Vec<_>>()
                    .join(separator)
            }
            AttributeValue::Tuple(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let element = match checker {
                            AttributeChecker::Tuple { elements } => elements.get(i),
                            _ => None,
                        };
                        v.render(element.unwrap_or(&AttributeChecker::Empty), Some(","))
                    })
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            AttributeValue::ObjectFactory(f) => f.to_string(),
            AttributeValue::Vector3(v) => v.to_string(),
            AttributeValue::Vector2(v) => v.to_string(),
        }
    }

    /// Parse `text` under `checker`
    pub fn deserialize_from_string(text: &str, checker: &AttributeChecker) -> KernelResult<Self> {
        checker.deserialize(text, "value")
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        use AttributeValue::*;
        match (self, other) {
            (Empty, Empty) => true,
            (Integer(a), Integer(b)) => a == b,
            (Uinteger(a), Uinteger(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Time(a), Time(b)) => a == b,
            (DataRate(a), DataRate(b)) => a == b,
            (Enum(a), Enum(b)) => a == b,
            (Pointer(a), Pointer(b)) => match (a, b) {
                (None, None) => true,
                (Some(x), Some(y)) => x.ptr_eq(y),
                _ => false,
            },
            (ObjectPtrContainer(a), ObjectPtrContainer(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.ptr_eq(vb))
            }
            (Pair(a1, a2), Pair(b1, b2)) => a1 == b1 && a2 == b2,
            (List(a), List(b)) => a == b,
            (Tuple(a), Tuple(b)) => a == b,
            (ObjectFactory(a), ObjectFactory(b)) => a == b,
            (Vector3(a), Vector3(b)) => a == b,
            (Vector2(a), Vector2(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Pointer(Some(p)) => write!(f, "Pointer({:?})", p),
            AttributeValue::ObjectPtrContainer(map) => {
                write!(f, "ObjectPtrContainer({} objects)", map.len())
            }
            other => write!(
                f,
                "{}({})",
                other.type_name(),
                other.serialize_to_string(&AttributeChecker::Empty)
            ),
        }
    }
}

/// Conversion between Rust values and attribute values
pub trait AttributeType: Sized + 'static {
    fn into_value(self) -> AttributeValue;
    fn from_value(value: &AttributeValue) -> Option<Self>;
}

macro_rules! unsigned_attribute {
    ($($t:ty),*) => {$(
        impl AttributeType for $t {
            fn into_value(self) -> AttributeValue {
                AttributeValue::Uinteger(self as u64)
            }

            fn from_value(value: &AttributeValue) -> Option<Self> {
                match value {
                    AttributeValue::Uinteger(v) => <$t>::try_from(*v).ok(),
                    AttributeValue::Integer(v) => <$t>::try_from(*v).ok(),
                    _ => None,
                }
            }
        }

        impl From<$t> for AttributeValue {
            fn from(v: $t) -> Self {
                v.into_value()
            }
        }
    )*};
}

macro_rules! signed_attribute {
    ($($t:ty),*) => {$(
        impl AttributeType for $t {
            fn into_value(self) -> AttributeValue {
                AttributeValue::Integer(self as i64)
            }

            fn from_value(value: &AttributeValue) -> Option<Self> {
                match value {
                    AttributeValue::Integer(v) => <$t>::try_from(*v).ok(),
                    AttributeValue::Uinteger(v) => <$t>::try_from(*v).ok(),
                    AttributeValue::Enum(v) => <$t>::try_from(*v).ok(),
                    _ => None,
                }
            }
        }

        impl From<$t> for AttributeValue {
            fn from(v: $t) -> Self {
                v.into_value()
            }
        }
    )*};
}

unsigned_attribute!(u8, u16, u32, u64);
signed_attribute!(i8, i16, i32, i64);

impl AttributeType for f64 {
    fn into_value(self) -> AttributeValue {
        AttributeValue::Double(self)
    }

    fn from_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Double(v) => Some(*v),
            AttributeValue::Integer(v) => Some(*v as f64),
            AttributeValue::Uinteger(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Double(v)
    }
}

impl AttributeType for bool {
    fn into_value(self) -> AttributeValue {
        AttributeValue::Boolean(self)
    }

    fn from_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

impl AttributeType for String {
    fn into_value(self) -> AttributeValue {
        AttributeValue::String(self)
    }

    fn from_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

macro_rules! simple_attribute {
    ($t:ty, $variant:ident) => {
        impl AttributeType for $t {
            fn into_value(self) -> AttributeValue {
                AttributeValue::$variant(self)
            }

            fn from_value(value: &AttributeValue) -> Option<Self> {
                match value {
                    AttributeValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }

        impl From<$t> for AttributeValue {
            fn from(v: $t) -> Self {
                AttributeValue::$variant(v)
            }
        }
    };
}

simple_attribute!(Time, Time);
simple_attribute!(DataRate, DataRate);
simple_attribute!(ObjectFactory, ObjectFactory);
simple_attribute!(Vector3D, Vector3);
simple_attribute!(Vector2D, Vector2);

/// Integer value of an enumerated attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EnumValue(pub i32);

impl AttributeType for EnumValue {
    fn into_value(self) -> AttributeValue {
        AttributeValue::Enum(self.0)
    }

    fn from_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Enum(v) => Some(EnumValue(*v)),
            AttributeValue::Integer(v) => i32::try_from(*v).ok().map(EnumValue),
            _ => None,
        }
    }
}

impl From<EnumValue> for AttributeValue {
    fn from(v: EnumValue) -> Self {
        AttributeValue::Enum(v.0)
    }
}

impl AttributeType for Option<Ptr<dyn Object>> {
    fn into_value(self) -> AttributeValue {
        AttributeValue::Pointer(self)
    }

    fn from_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Pointer(p) => Some(p.clone()),
            _ => None,
        }
    }
}

impl<T: ?Sized + Object> From<Ptr<T>> for AttributeValue {
    fn from(p: Ptr<T>) -> Self {
        AttributeValue::Pointer(Some(p.upcast()))
    }
}

impl AttributeType for BTreeMap<u32, Ptr<dyn Object>> {
    fn into_value(self) -> AttributeValue {
        AttributeValue::ObjectPtrContainer(self)
    }

    fn from_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::ObjectPtrContainer(m) => Some(m.clone()),
            _ => None,
        }
    }
}

impl<A: AttributeType, B: AttributeType> AttributeType for (A, B) {
    fn into_value(self) -> AttributeValue {
        AttributeValue::Pair(Box::new(self.0.into_value()), Box::new(self.1.into_value()))
    }

    fn from_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Pair(a, b) => Some((A::from_value(a)?, B::from_value(b)?)),
            _ => None,
        }
    }
}

impl<V: AttributeType> AttributeType for Vec<V> {
    fn into_value(self) -> AttributeValue {
        AttributeValue::List(self.into_iter().map(AttributeType::into_value).collect())
    }

    fn from_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::List(items) => items.iter().map(V::from_value).collect(),
            _ => None,
        }
    }
}

impl AttributeType for AttributeValue {
    fn into_value(self) -> AttributeValue {
        self
    }

    fn from_value(value: &AttributeValue) -> Option<Self> {
        Some(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{
        make_enum_checker, make_list_checker, make_pair_checker, make_string_checker,
        make_tuple_checker, make_uinteger_checker,
    };

    #[test]
    fn test_typed_views() {
        let v: AttributeValue = 7u32.into();
        assert_eq!(v.get::<u32>(), Some(7));
        assert_eq!(v.get::<u8>(), Some(7));
        assert_eq!(v.get::<bool>(), None);
        assert_eq!(AttributeValue::Uinteger(300).get::<u8>(), None);
        assert_eq!(AttributeValue::Integer(-1).get::<u32>(), None);
    }

    #[test]
    fn test_enum_uses_labels() {
        let checker = make_enum_checker(&[(0, "Off"), (1, "On")]);
        assert_eq!(AttributeValue::Enum(1).serialize_to_string(&checker), "On");
        assert_eq!(AttributeValue::Enum(5).serialize_to_string(&checker), "5");
    }

    #[test]
    fn test_structured_forms() {
        let pair = make_pair_checker(make_string_checker(), make_uinteger_checker::<u16>());
        let v = ("eth0".to_string(), 80u16).into_value();
        assert_eq!(v.serialize_to_string(&pair), "eth0 80");

        let list = make_list_checker(make_uinteger_checker::<u32>());
        assert_eq!(vec![1u32, 2, 3].into_value().serialize_to_string(&list), "1,2,3");

        let tuple = make_tuple_checker(vec![make_uinteger_checker::<u8>(), make_string_checker()]);
        let t = AttributeValue::Tuple(vec![3u8.into(), "x".into()]);
        assert_eq!(t.serialize_to_string(&tuple), "{3, x}");
    }

    #[test]
    fn test_nested_strings_are_escaped() {
        let list = make_list_checker(make_string_checker());
        let v = AttributeValue::List(vec!["a,b".into(), "[x]".into(), " pad ".into()]);
        let text = v.serialize_to_string(&list);
        assert_eq!(text, "a\\,b,\\[x\\],\\ pad\\ ");
        assert_eq!(AttributeValue::deserialize_from_string(&text, &list).unwrap(), v);

        let pair = make_pair_checker(make_string_checker(), make_string_checker());
        let p = AttributeValue::Pair(Box::new("two words".into()), Box::new("x".into()));
        assert_eq!(p.serialize_to_string(&pair), "two\\ words x");

        // a bare string keeps its text as is
        assert_eq!(AttributeValue::from("a,b").serialize_to_string(&make_string_checker()), "a,b");
    }

    #[test]
    fn test_pointer_equality_is_identity() {
        assert_eq!(AttributeValue::Pointer(None), AttributeValue::Pointer(None));
        assert_ne!(AttributeValue::Pointer(None), AttributeValue::Empty);
    }
}

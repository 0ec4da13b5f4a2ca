//! Attribute checkers
//!
//! A checker validates values for one attribute, coerces compatible values
//! (strings, numbers of another signedness) into the attribute's own type,
//! and drives the textual form of structured values.

use evsim_core::{KernelError, KernelResult, Time};

use crate::data_rate::DataRate;
use crate::factory::ObjectFactory;
use crate::object::{ObjectExt, ObjectType};
use crate::type_id::TypeId;
use crate::value::AttributeValue;
use crate::vector::{Vector2D, Vector3D};

#[derive(Clone, Debug, Default, PartialEq)]
pub enum AttributeChecker {
    /// Accepts anything; text is kept as a string
    #[default]
    Empty,
    Integer {
        min: i64,
        max: i64,
        type_name: &'static str,
    },
    Uinteger {
        min: u64,
        max: u64,
        type_name: &'static str,
    },
    Double {
        min: f64,
        max: f64,
        type_name: &'static str,
    },
    Boolean,
    String,
    Time {
        min: Option<Time>,
        max: Option<Time>,
    },
    DataRate,
    Enum {
        labels: Vec<(i32, String)>,
    },
    /// Object handle whose instance type derives from `target`
    Pointer {
        target: TypeId,
    },
    ObjectPtrContainer {
        target: TypeId,
    },
    Pair {
        first: Box<AttributeChecker>,
        second: Box<AttributeChecker>,
        separator: String,
    },
    List {
        element: Box<AttributeChecker>,
        separator: String,
    },
    Tuple {
        elements: Vec<AttributeChecker>,
    },
    ObjectFactory,
    Vector3,
    Vector2,
}

fn type_mismatch(name: &str, expected: &str, value: &AttributeValue) -> KernelError {
    KernelError::TypeMismatch {
        name: name.to_string(),
        expected: expected.to_string(),
        actual: value.type_name().to_string(),
    }
}

fn out_of_range(name: &str, value: impl ToString, range: String) -> KernelError {
    KernelError::OutOfRange {
        name: name.to_string(),
        value: value.to_string(),
        range,
    }
}

/// Characters with structural meaning inside composite text forms
const RESERVED: &[char] = &['\\', '[', ']', '{', '}', '(', ')', '|', ','];

/// Backslash-escape a leaf string nested in a composite form.
///
/// Reserved characters, characters of the enclosing `separators` and
/// whitespace at either end are escaped so that splitting and trimming
/// leave the leaf intact.
pub(crate) fn escape_component(text: &str, separators: &str) -> String {
    let last = text.chars().count().saturating_sub(1);
    let mut out = String::with_capacity(text.len());
    for (n, c) in text.chars().enumerate() {
        let edge_space = c.is_whitespace() && (n == 0 || n == last);
        if RESERVED.contains(&c) || separators.contains(c) || edge_space {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Inverse of [`escape_component`]
pub(crate) fn unescape_component(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

/// Trim surrounding whitespace, keeping an escaped trailing space
pub(crate) fn trim_component(text: &str) -> &str {
    let text = text.trim_start();
    let mut end = text.len();
    for (i, c) in text.char_indices().rev() {
        if !c.is_whitespace() {
            break;
        }
        let escapes = text[..i].chars().rev().take_while(|&b| b == '\\').count();
        if escapes % 2 == 1 {
            break;
        }
        end = i;
    }
    &text[..end]
}

/// Byte offset of the first `separator` outside brackets and escapes
pub(crate) fn find_top_level(text: &str, separator: &str) -> Option<usize> {
    if separator.is_empty() {
        return None;
    }
    let mut depth = 0i32;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                continue;
            }
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth -= 1,
            _ => {}
        }
        if depth == 0 && text[i..].starts_with(separator) {
            return Some(i);
        }
    }
    None
}

/// Split `text` on `separator`, ignoring separators nested in brackets or escaped
pub(crate) fn split_top_level<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(at) = find_top_level(rest, separator) {
        parts.push(&rest[..at]);
        rest = &rest[at + separator.len()..];
    }
    parts.push(rest);
    parts
}

impl AttributeChecker {
    /// Name of the value variant this checker accepts
    pub fn value_type_name(&self) -> &'static str {
        match self {
            AttributeChecker::Empty => "Empty",
            AttributeChecker::Integer { .. } => "Integer",
            AttributeChecker::Uinteger { .. } => "Uinteger",
            AttributeChecker::Double { .. } => "Double",
            AttributeChecker::Boolean => "Boolean",
            AttributeChecker::String => "String",
            AttributeChecker::Time { .. } => "Time",
            AttributeChecker::DataRate => "DataRate",
            AttributeChecker::Enum { .. } => "Enum",
            AttributeChecker::Pointer { .. } => "Pointer",
            AttributeChecker::ObjectPtrContainer { .. } => "ObjectPtrContainer",
            AttributeChecker::Pair { .. } => "Pair",
            AttributeChecker::List { .. } => "List",
            AttributeChecker::Tuple { .. } => "Tuple",
            AttributeChecker::ObjectFactory => "ObjectFactory",
            AttributeChecker::Vector3 => "Vector3D",
            AttributeChecker::Vector2 => "Vector2D",
        }
    }

    /// Human-readable description of the accepted values
    pub fn underlying_type_information(&self) -> String {
        match self {
            AttributeChecker::Integer { min, max, type_name }
                if (*min, *max) != (i64::MIN, i64::MAX) =>
            {
                format!("{type_name} {min}:{max}")
            }
            AttributeChecker::Integer { type_name, .. } => type_name.to_string(),
            AttributeChecker::Uinteger { min, max, type_name } => format!("{type_name} {min}:{max}"),
            AttributeChecker::Double { min, max, type_name } => format!("{type_name} {min}:{max}"),
            AttributeChecker::Time { min, max } => match (min, max) {
                (None, None) => "Time".to_string(),
                (min, max) => format!(
                    "Time {}:{}",
                    min.map(|t| t.to_string()).unwrap_or_default(),
                    max.map(|t| t.to_string()).unwrap_or_default()
                ),
            },
            AttributeChecker::Enum { labels } => labels
                .iter()
                .map(|(_, l)| l.as_str())
                .collect::<Vec<_>>()
                .join("|"),
            AttributeChecker::Pointer { target } => format!("Ptr<{}>", target.name()),
            AttributeChecker::ObjectPtrContainer { target } => {
                format!("ObjectPtrContainer<{}>", target.name())
            }
            AttributeChecker::Pair { first, second, .. } => format!(
                "Pair<{}, {}>",
                first.underlying_type_information(),
                second.underlying_type_information()
            ),
            AttributeChecker::List { element, .. } => {
                format!("List<{}>", element.underlying_type_information())
            }
            AttributeChecker::Tuple { elements } => format!(
                "Tuple<{}>",
                elements
                    .iter()
                    .map(|c| c.underlying_type_information())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            other => other.value_type_name().to_string(),
        }
    }

    /// Validate a value of exactly the accepted variant
    pub fn check(&self, value: &AttributeValue, name: &str) -> KernelResult<()> {
        match (self, value) {
            (AttributeChecker::Empty, _) => Ok(()),
            (AttributeChecker::Integer { min, max, .. }, AttributeValue::Integer(v)) => {
                if v < min || v > max {
                    return Err(out_of_range(name, v, format!("{min}:{max}")));
                }
                Ok(())
            }
            (AttributeChecker::Uinteger { min, max, .. }, AttributeValue::Uinteger(v)) => {
                if v < min || v > max {
                    return Err(out_of_range(name, v, format!("{min}:{max}")));
                }
                Ok(())
            }
            (AttributeChecker::Double { min, max, .. }, AttributeValue::Double(v)) => {
                if v.is_nan() || v < min || v > max {
                    return Err(out_of_range(name, v, format!("{min}:{max}")));
                }
                Ok(())
            }
            (AttributeChecker::Boolean, AttributeValue::Boolean(_)) => Ok(()),
            (AttributeChecker::String, AttributeValue::String(_)) => Ok(()),
            (AttributeChecker::Time { min, max }, AttributeValue::Time(t)) => {
                let below = min.map(|m| *t < m).unwrap_or(false);
                let above = max.map(|m| *t > m).unwrap_or(false);
                if below || above {
                    return Err(out_of_range(name, t, self.underlying_type_information()));
                }
                Ok(())
            }
            (AttributeChecker::DataRate, AttributeValue::DataRate(_)) => Ok(()),
            (AttributeChecker::Enum { labels }, AttributeValue::Enum(v)) => {
                if !labels.iter().any(|(value, _)| value == v) {
                    return Err(out_of_range(name, v, self.underlying_type_information()));
                }
                Ok(())
            }
            (AttributeChecker::Pointer { .. }, AttributeValue::Pointer(None)) => Ok(()),
            (AttributeChecker::Pointer { target }, AttributeValue::Pointer(Some(p))) => {
                if !p.instance_type_id().is_child_of(*target) {
                    return Err(KernelError::TypeMismatch {
                        name: name.to_string(),
                        expected: target.name(),
                        actual: p.instance_type_id().name(),
                    });
                }
                Ok(())
            }
            (AttributeChecker::ObjectPtrContainer { target }, AttributeValue::ObjectPtrContainer(m)) => {
                for p in m.values() {
                    if !p.instance_type_id().is_child_of(*target) {
                        return Err(KernelError::TypeMismatch {
                            name: name.to_string(),
                            expected: target.name(),
                            actual: p.instance_type_id().name(),
                        });
                    }
                }
                Ok(())
            }
            (AttributeChecker::Pair { first, second, .. }, AttributeValue::Pair(a, b)) => {
                first.check(a, name)?;
                second.check(b, name)
            }
            (AttributeChecker::List { element, .. }, AttributeValue::List(items)) => {
                items.iter().try_for_each(|v| element.check(v, name))
            }
            (AttributeChecker::Tuple { elements }, AttributeValue::Tuple(items)) => {
                if elements.len() != items.len() {
                    return Err(out_of_range(
                        name,
                        format!("{} elements", items.len()),
                        format!("{} elements", elements.len()),
                    ));
                }
                elements
                    .iter()
                    .zip(items)
                    .try_for_each(|(c, v)| c.check(v, name))
            }
            (AttributeChecker::ObjectFactory, AttributeValue::ObjectFactory(_)) => Ok(()),
            (AttributeChecker::Vector3, AttributeValue::Vector3(_)) => Ok(()),
            (AttributeChecker::Vector2, AttributeValue::Vector2(_)) => Ok(()),
            (checker, value) => Err(type_mismatch(name, checker.value_type_name(), value)),
        }
    }

    /// Coerce `value` into the accepted variant and validate it
    pub fn create_valid_value(&self, value: &AttributeValue, name: &str) -> KernelResult<AttributeValue> {
        let coerced = match (self, value) {
            (AttributeChecker::Empty, v) => v.clone(),
            (AttributeChecker::String, v) => v.clone(),
            (_, AttributeValue::String(text)) => return self.deserialize(text, name),
            (AttributeChecker::Integer { .. }, AttributeValue::Uinteger(v)) => {
                let v = i64::try_from(*v).map_err(|_| out_of_range(name, v, self.underlying_type_information()))?;
                AttributeValue::Integer(v)
            }
            (AttributeChecker::Uinteger { .. }, AttributeValue::Integer(v)) => {
                let v = u64::try_from(*v).map_err(|_| out_of_range(name, v, self.underlying_type_information()))?;
                AttributeValue::Uinteger(v)
            }
            (AttributeChecker::Double { .. }, AttributeValue::Integer(v)) => AttributeValue::Double(*v as f64),
            (AttributeChecker::Double { .. }, AttributeValue::Uinteger(v)) => AttributeValue::Double(*v as f64),
            (AttributeChecker::Enum { .. }, AttributeValue::Integer(v)) => {
                let v = i32::try_from(*v).map_err(|_| out_of_range(name, v, self.underlying_type_information()))?;
                AttributeValue::Enum(v)
            }
            (AttributeChecker::Pair { first, second, .. }, AttributeValue::Pair(a, b)) => AttributeValue::Pair(
                Box::new(first.create_valid_value(a, name)?),
                Box::new(second.create_valid_value(b, name)?),
            ),
            (AttributeChecker::List { element, .. }, AttributeValue::List(items)) => AttributeValue::List(
                items
                    .iter()
                    .map(|v| element.create_valid_value(v, name))
                    .collect::<KernelResult<_>>()?,
            ),
            (AttributeChecker::Tuple { elements }, AttributeValue::Tuple(items)) if elements.len() == items.len() => {
                AttributeValue::Tuple(
                    elements
                        .iter()
                        .zip(items)
                        .map(|(c, v)| c.create_valid_value(v, name))
                        .collect::<KernelResult<_>>()?,
                )
            }
            (_, v) => v.clone(),
        };
        self.check(&coerced, name)?;
        Ok(coerced)
    }

    /// Parse the textual form of a value
    pub fn deserialize(&self, text: &str, name: &str) -> KernelResult<AttributeValue> {
        let malformed = || KernelError::MalformedValue {
            expected: format!("{} {}", name, self.value_type_name()),
            value: text.to_string(),
        };
        let trimmed = trim_component(text);
        let value = match self {
            AttributeChecker::Empty | AttributeChecker::String => AttributeValue::String(text.to_string()),
            AttributeChecker::Integer { .. } => AttributeValue::Integer(trimmed.parse().map_err(|_| malformed())?),
            AttributeChecker::Uinteger { .. } => {
                AttributeValue::Uinteger(trimmed.parse().map_err(|_| malformed())?)
            }
            AttributeChecker::Double { .. } => AttributeValue::Double(trimmed.parse().map_err(|_| malformed())?),
            AttributeChecker::Boolean => match trimmed {
                "true" | "1" | "t" => AttributeValue::Boolean(true),
                "false" | "0" | "f" => AttributeValue::Boolean(false),
                _ => return Err(malformed()),
            },
            AttributeChecker::Time { .. } => AttributeValue::Time(trimmed.parse::<Time>().map_err(|_| malformed())?),
            AttributeChecker::DataRate => {
                AttributeValue::DataRate(trimmed.parse::<DataRate>().map_err(|_| malformed())?)
            }
            AttributeChecker::Enum { labels } => {
                match labels.iter().find(|(_, label)| label == trimmed) {
                    Some((v, _)) => AttributeValue::Enum(*v),
                    None => AttributeValue::Enum(trimmed.parse().map_err(|_| malformed())?),
                }
            }
            AttributeChecker::Pointer { .. } => {
                if trimmed.is_empty() || trimmed == "0" {
                    AttributeValue::Pointer(None)
                } else {
                    let factory: ObjectFactory = trimmed.parse()?;
                    AttributeValue::Pointer(Some(factory.try_create()?))
                }
            }
            AttributeChecker::ObjectPtrContainer { .. } => return Err(malformed()),
            AttributeChecker::Pair {
                first,
                second,
                separator,
            } => {
                let at = find_top_level(trimmed, separator).ok_or_else(malformed)?;
                let (a, b) = (&trimmed[..at], &trimmed[at + separator.len()..]);
                AttributeValue::Pair(
                    Box::new(first.deserialize_component(trim_component(a), name)?),
                    Box::new(second.deserialize_component(trim_component(b), name)?),
                )
            }
            AttributeChecker::List { element, separator } => {
                if trimmed.is_empty() {
                    AttributeValue::List(Vec::new())
                } else {
                    AttributeValue::List(
                        split_top_level(trimmed, separator)
                            .into_iter()
                            .map(|part| element.deserialize_component(trim_component(part), name))
                            .collect::<KernelResult<_>>()?,
                    )
                }
            }
            AttributeChecker::Tuple { elements } => {
                let inner = trimmed
                    .strip_prefix('{')
                    .and_then(|t| t.strip_suffix('}'))
                    .ok_or_else(malformed)?;
                let parts = split_top_level(inner, ",");
                if parts.len() != elements.len() {
                    return Err(malformed());
                }
                AttributeValue::Tuple(
                    elements
                        .iter()
                        .zip(parts)
                        .map(|(c, part)| c.deserialize_component(trim_component(part), name))
                        .collect::<KernelResult<_>>()?,
                )
            }
            AttributeChecker::ObjectFactory => AttributeValue::ObjectFactory(trimmed.parse()?),
            AttributeChecker::Vector3 => {
                AttributeValue::Vector3(trimmed.parse::<Vector3D>().map_err(|_| malformed())?)
            }
            AttributeChecker::Vector2 => {
                AttributeValue::Vector2(trimmed.parse::<Vector2D>().map_err(|_| malformed())?)
            }
        };
        self.check(&value, name)?;
        Ok(value)
    }

    /// Parse one component of a composite form; leaf strings are unescaped
    pub(crate) fn deserialize_component(&self, text: &str, name: &str) -> KernelResult<AttributeValue> {
        match self {
            AttributeChecker::Empty | AttributeChecker::String => {
                let value = AttributeValue::String(unescape_component(text));
                self.check(&value, name)?;
                Ok(value)
            }
            _ => self.deserialize(text, name),
        }
    }
}

/// Unsigned integer types usable as attributes
pub trait UnsignedAttribute {
    const MIN: u64;
    const MAX: u64;
    const NAME: &'static str;
    fn widen(self) -> u64;
}

/// Signed integer types usable as attributes
pub trait SignedAttribute {
    const MIN: i64;
    const MAX: i64;
    const NAME: &'static str;
    fn widen(self) -> i64;
}

macro_rules! integer_bounds {
    ($tr:ident, $wide:ty: $($t:ty),*) => {$(
        impl $tr for $t {
            const MIN: $wide = <$t>::MIN as $wide;
            const MAX: $wide = <$t>::MAX as $wide;
            const NAME: &'static str = stringify!($t);

            fn widen(self) -> $wide {
                self as $wide
            }
        }
    )*};
}

integer_bounds!(UnsignedAttribute, u64: u8, u16, u32, u64);
integer_bounds!(SignedAttribute, i64: i8, i16, i32, i64);

pub fn make_uinteger_checker<T: UnsignedAttribute>() -> AttributeChecker {
    AttributeChecker::Uinteger {
        min: T::MIN,
        max: T::MAX,
        type_name: T::NAME,
    }
}

pub fn make_uinteger_checker_range<T: UnsignedAttribute>(min: T, max: T) -> AttributeChecker {
    AttributeChecker::Uinteger {
        min: min.widen(),
        max: max.widen(),
        type_name: T::NAME,
    }
}

pub fn make_integer_checker<T: SignedAttribute>() -> AttributeChecker {
    AttributeChecker::Integer {
        min: T::MIN,
        max: T::MAX,
        type_name: T::NAME,
    }
}

pub fn make_integer_checker_range<T: SignedAttribute>(min: T, max: T) -> AttributeChecker {
    AttributeChecker::Integer {
        min: min.widen(),
        max: max.widen(),
        type_name: T::NAME,
    }
}

pub fn make_double_checker() -> AttributeChecker {
    make_double_checker_range(f64::MIN, f64::MAX)
}

pub fn make_double_checker_range(min: f64, max: f64) -> AttributeChecker {
    AttributeChecker::Double {
        min,
        max,
        type_name: "f64",
    }
}

pub fn make_boolean_checker() -> AttributeChecker {
    AttributeChecker::Boolean
}

pub fn make_string_checker() -> AttributeChecker {
    AttributeChecker::String
}

pub fn make_time_checker() -> AttributeChecker {
    AttributeChecker::Time { min: None, max: None }
}

pub fn make_time_checker_range(min: Time, max: Time) -> AttributeChecker {
    AttributeChecker::Time {
        min: Some(min),
        max: Some(max),
    }
}

pub fn make_data_rate_checker() -> AttributeChecker {
    AttributeChecker::DataRate
}

/// Enum checker over `(value, label)` pairs
pub fn make_enum_checker(labels: &[(i32, &str)]) -> AttributeChecker {
    AttributeChecker::Enum {
        labels: labels.iter().map(|(v, l)| (*v, l.to_string())).collect(),
    }
}

pub fn make_pointer_checker<T: ObjectType>() -> AttributeChecker {
    AttributeChecker::Pointer {
        target: T::get_type_id(),
    }
}

pub fn make_object_ptr_container_checker<T: ObjectType>() -> AttributeChecker {
    AttributeChecker::ObjectPtrContainer {
        target: T::get_type_id(),
    }
}

/// Container checker for elements of any object type
pub fn make_any_object_ptr_container_checker() -> AttributeChecker {
    AttributeChecker::ObjectPtrContainer {
        target: crate::type_id::object_type_id(),
    }
}

pub fn make_pair_checker(first: AttributeChecker, second: AttributeChecker) -> AttributeChecker {
    AttributeChecker::Pair {
        first: Box::new(first),
        second: Box::new(second),
        separator: " ".to_string(),
    }
}

pub fn make_list_checker(element: AttributeChecker) -> AttributeChecker {
    AttributeChecker::List {
        element: Box::new(element),
        separator: ",".to_string(),
    }
}

pub fn make_tuple_checker(elements: Vec<AttributeChecker>) -> AttributeChecker {
    AttributeChecker::Tuple { elements }
}

pub fn make_object_factory_checker() -> AttributeChecker {
    AttributeChecker::ObjectFactory
}

pub fn make_vector_checker() -> AttributeChecker {
    AttributeChecker::Vector3
}

pub fn make_vector2_checker() -> AttributeChecker {
    AttributeChecker::Vector2
}

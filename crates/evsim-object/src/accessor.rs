//! Attribute and trace source accessors
//!
//! Accessors bridge the name-based surface to typed fields. They receive
//! `&dyn Object` and locate their concrete type along the chain of embedded
//! bases, so an accessor registered on a base type works on subtypes.

use std::any::type_name;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::rc::Rc;

use evsim_core::{KernelError, KernelResult};
use evsim_trace::{CallbackBase, TracedCallback, TracedValue};

use crate::object::{object_cast, Object, ObjectExt, ObjectType};
use crate::ptr::Ptr;
use crate::value::{AttributeType, AttributeValue};

/// Reads and writes one attribute on an object
pub trait AttributeAccessor {
    fn get(&self, object: &dyn Object) -> KernelResult<AttributeValue>;
    fn set(&self, object: &dyn Object, value: &AttributeValue) -> KernelResult<()>;
    fn has_getter(&self) -> bool;
    fn has_setter(&self) -> bool;
}

fn downcast_target<'a, T: 'static>(object: &'a dyn Object) -> KernelResult<&'a T> {
    object_cast::<T>(object).ok_or_else(|| KernelError::TypeMismatch {
        name: "accessor target".into(),
        expected: type_name::<T>().into(),
        actual: object.instance_type_id().name(),
    })
}

fn no_access(object: &dyn Object, what: &str) -> KernelError {
    KernelError::UnknownAttribute {
        type_name: object.instance_type_id().name(),
        name: format!("({what})"),
    }
}

struct FnAccessor<T, V> {
    getter: Option<fn(&T) -> V>,
    setter: Option<fn(&T, V)>,
}

impl<T: 'static, V: AttributeType> AttributeAccessor for FnAccessor<T, V> {
    fn get(&self, object: &dyn Object) -> KernelResult<AttributeValue> {
        let getter = self.getter.ok_or_else(|| no_access(object, "no getter"))?;
        Ok(getter(downcast_target::<T>(object)?).into_value())
    }

    fn set(&self, object: &dyn Object, value: &AttributeValue) -> KernelResult<()> {
        let setter = self.setter.ok_or_else(|| no_access(object, "no setter"))?;
        let target = downcast_target::<T>(object)?;
        let v = V::from_value(value).ok_or_else(|| KernelError::TypeMismatch {
            name: object.instance_type_id().name(),
            expected: type_name::<V>().into(),
            actual: value.type_name().into(),
        })?;
        setter(target, v);
        Ok(())
    }

    fn has_getter(&self) -> bool {
        self.getter.is_some()
    }

    fn has_setter(&self) -> bool {
        self.setter.is_some()
    }
}

/// Accessor over a getter and a setter method
pub fn make_accessor<T: 'static, V: AttributeType>(
    getter: fn(&T) -> V,
    setter: fn(&T, V),
) -> Rc<dyn AttributeAccessor> {
    Rc::new(FnAccessor {
        getter: Some(getter),
        setter: Some(setter),
    })
}

/// Read-only accessor
pub fn make_getter<T: 'static, V: AttributeType>(getter: fn(&T) -> V) -> Rc<dyn AttributeAccessor> {
    Rc::new(FnAccessor::<T, V> {
        getter: Some(getter),
        setter: None,
    })
}

/// Write-only accessor
pub fn make_setter<T: 'static, V: AttributeType>(setter: fn(&T, V)) -> Rc<dyn AttributeAccessor> {
    Rc::new(FnAccessor::<T, V> {
        getter: None,
        setter: Some(setter),
    })
}

struct PointerAccessor<T, U: Object> {
    getter: fn(&T) -> Option<Ptr<U>>,
    setter: Option<fn(&T, Option<Ptr<U>>)>,
}

impl<T: 'static, U: ObjectType> AttributeAccessor for PointerAccessor<T, U> {
    fn get(&self, object: &dyn Object) -> KernelResult<AttributeValue> {
        let target = downcast_target::<T>(object)?;
        Ok(AttributeValue::Pointer((self.getter)(target).map(|p| p.upcast())))
    }

    fn set(&self, object: &dyn Object, value: &AttributeValue) -> KernelResult<()> {
        let setter = self.setter.ok_or_else(|| no_access(object, "no setter"))?;
        let target = downcast_target::<T>(object)?;
        let pointer = match value {
            AttributeValue::Pointer(None) => None,
            AttributeValue::Pointer(Some(p)) => {
                Some(p.downcast::<U>().ok_or_else(|| KernelError::TypeMismatch {
                    name: object.instance_type_id().name(),
                    expected: U::get_type_id().name(),
                    actual: p.instance_type_id().name(),
                })?)
            }
            other => {
                return Err(KernelError::TypeMismatch {
                    name: object.instance_type_id().name(),
                    expected: "Pointer".into(),
                    actual: other.type_name().into(),
                })
            }
        };
        setter(target, pointer);
        Ok(())
    }

    fn has_getter(&self) -> bool {
        true
    }

    fn has_setter(&self) -> bool {
        self.setter.is_some()
    }
}

/// Accessor for an optional handle to an object of type `U`
pub fn make_pointer_accessor<T: 'static, U: ObjectType>(
    getter: fn(&T) -> Option<Ptr<U>>,
    setter: fn(&T, Option<Ptr<U>>),
) -> Rc<dyn AttributeAccessor> {
    Rc::new(PointerAccessor {
        getter,
        setter: Some(setter),
    })
}

pub fn make_pointer_getter<T: 'static, U: ObjectType>(
    getter: fn(&T) -> Option<Ptr<U>>,
) -> Rc<dyn AttributeAccessor> {
    Rc::new(PointerAccessor { getter, setter: None })
}

struct ObjectVectorAccessor<T, U: ?Sized + Object> {
    getter: fn(&T) -> Vec<Ptr<U>>,
}

impl<T: 'static, U: ?Sized + Object> AttributeAccessor for ObjectVectorAccessor<T, U> {
    fn get(&self, object: &dyn Object) -> KernelResult<AttributeValue> {
        let target = downcast_target::<T>(object)?;
        let map: BTreeMap<u32, Ptr<dyn Object>> = (self.getter)(target)
            .iter()
            .enumerate()
            .map(|(i, p)| (i as u32, p.upcast()))
            .collect();
        Ok(AttributeValue::ObjectPtrContainer(map))
    }

    fn set(&self, object: &dyn Object, _value: &AttributeValue) -> KernelResult<()> {
        Err(no_access(object, "read-only container"))
    }

    fn has_getter(&self) -> bool {
        true
    }

    fn has_setter(&self) -> bool {
        false
    }
}

/// Read-only accessor exposing a sequence of objects, indexed from zero
pub fn make_object_vector_accessor<T: 'static, U: ?Sized + Object>(
    getter: fn(&T) -> Vec<Ptr<U>>,
) -> Rc<dyn AttributeAccessor> {
    Rc::new(ObjectVectorAccessor { getter })
}

/// Connects sinks to one trace source on an object
pub trait TraceSourceAccessor {
    fn connect_without_context(&self, object: &dyn Object, cb: &CallbackBase) -> KernelResult<()>;
    fn connect(&self, object: &dyn Object, context: &str, cb: &CallbackBase) -> KernelResult<()>;
    fn disconnect_without_context(&self, object: &dyn Object, cb: &CallbackBase) -> KernelResult<bool>;
    fn disconnect(&self, object: &dyn Object, context: &str, cb: &CallbackBase) -> KernelResult<bool>;
}

fn signature_mismatch<A>(object: &dyn Object, cb: &CallbackBase) -> KernelError {
    KernelError::SignatureMismatch {
        source_name: format!("{} ({})", object.instance_type_id().name(), type_name::<A>()),
        sink: cb.signature().to_string(),
    }
}

struct CallbackSource<T, A> {
    field: fn(&T) -> &TracedCallback<A>,
}

impl<T: 'static, A: Clone + 'static> TraceSourceAccessor for CallbackSource<T, A> {
    fn connect_without_context(&self, object: &dyn Object, cb: &CallbackBase) -> KernelResult<()> {
        let source = (self.field)(downcast_target::<T>(object)?);
        let sink = cb.downcast::<A>().ok_or_else(|| signature_mismatch::<A>(object, cb))?;
        source.connect_without_context(sink);
        Ok(())
    }

    fn connect(&self, object: &dyn Object, context: &str, cb: &CallbackBase) -> KernelResult<()> {
        let source = (self.field)(downcast_target::<T>(object)?);
        let sink = cb.downcast_context::<A>().ok_or_else(|| signature_mismatch::<A>(object, cb))?;
        source.connect(&sink, context);
        Ok(())
    }

    fn disconnect_without_context(&self, object: &dyn Object, cb: &CallbackBase) -> KernelResult<bool> {
        let source = (self.field)(downcast_target::<T>(object)?);
        let sink = cb.downcast::<A>().ok_or_else(|| signature_mismatch::<A>(object, cb))?;
        Ok(source.disconnect_without_context(&sink))
    }

    fn disconnect(&self, object: &dyn Object, context: &str, cb: &CallbackBase) -> KernelResult<bool> {
        let source = (self.field)(downcast_target::<T>(object)?);
        let sink = cb.downcast_context::<A>().ok_or_else(|| signature_mismatch::<A>(object, cb))?;
        Ok(source.disconnect(&sink, context))
    }
}

/// Trace source backed by a [`TracedCallback`] field
pub fn make_trace_source_accessor<T: 'static, A: Clone + 'static>(
    field: fn(&T) -> &TracedCallback<A>,
) -> Rc<dyn TraceSourceAccessor> {
    Rc::new(CallbackSource { field })
}

struct ValueSource<T, V> {
    field: fn(&T) -> &TracedValue<V>,
}

impl<T: 'static, V: Clone + PartialEq + 'static> TraceSourceAccessor for ValueSource<T, V> {
    fn connect_without_context(&self, object: &dyn Object, cb: &CallbackBase) -> KernelResult<()> {
        let value = (self.field)(downcast_target::<T>(object)?);
        let sink = cb
            .downcast::<(V, V)>()
            .ok_or_else(|| signature_mismatch::<(V, V)>(object, cb))?;
        value.connect_without_context(sink);
        Ok(())
    }

    fn connect(&self, object: &dyn Object, context: &str, cb: &CallbackBase) -> KernelResult<()> {
        let value = (self.field)(downcast_target::<T>(object)?);
        let sink = cb
            .downcast_context::<(V, V)>()
            .ok_or_else(|| signature_mismatch::<(V, V)>(object, cb))?;
        value.connect(&sink, context);
        Ok(())
    }

    fn disconnect_without_context(&self, object: &dyn Object, cb: &CallbackBase) -> KernelResult<bool> {
        let value = (self.field)(downcast_target::<T>(object)?);
        let sink = cb
            .downcast::<(V, V)>()
            .ok_or_else(|| signature_mismatch::<(V, V)>(object, cb))?;
        Ok(value.disconnect_without_context(&sink))
    }

    fn disconnect(&self, object: &dyn Object, context: &str, cb: &CallbackBase) -> KernelResult<bool> {
        let value = (self.field)(downcast_target::<T>(object)?);
        let sink = cb
            .downcast_context::<(V, V)>()
            .ok_or_else(|| signature_mismatch::<(V, V)>(object, cb))?;
        Ok(value.disconnect(&sink, context))
    }
}

/// Trace source backed by a [`TracedValue`] field; sinks take `(old, new)`
pub fn make_traced_value_accessor<T: 'static, V: Clone + PartialEq + 'static>(
    field: fn(&T) -> &TracedValue<V>,
) -> Rc<dyn TraceSourceAccessor> {
    Rc::new(ValueSource { field })
}

/// Attribute accessor reading the current value of a [`TracedValue`] field
pub fn make_traced_value_attribute<T: 'static, V>(field: fn(&T) -> &TracedValue<V>) -> Rc<dyn AttributeAccessor>
where
    V: AttributeType + Clone + PartialEq,
{
    Rc::new(TracedValueAttribute {
        field,
        _value: PhantomData,
    })
}

struct TracedValueAttribute<T, V> {
    field: fn(&T) -> &TracedValue<V>,
    _value: PhantomData<V>,
}

impl<T: 'static, V: AttributeType + Clone + PartialEq> AttributeAccessor for TracedValueAttribute<T, V> {
    fn get(&self, object: &dyn Object) -> KernelResult<AttributeValue> {
        Ok((self.field)(downcast_target::<T>(object)?).get().into_value())
    }

    fn set(&self, object: &dyn Object, value: &AttributeValue) -> KernelResult<()> {
        let traced = (self.field)(downcast_target::<T>(object)?);
        let v = V::from_value(value).ok_or_else(|| KernelError::TypeMismatch {
            name: object.instance_type_id().name(),
            expected: type_name::<V>().into(),
            actual: value.type_name().into(),
        })?;
        traced.set(v);
        Ok(())
    }

    fn has_getter(&self) -> bool {
        true
    }

    fn has_setter(&self) -> bool {
        true
    }
}

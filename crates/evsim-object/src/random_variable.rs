//! Random variable objects
//!
//! Each variable draws from one stream of the registry. `Stream = -1`
//! defers the choice to the automatic stream counter at first draw; an
//! explicit index, usually handed out through [`StreamConsumer`], pins the
//! sequence for a given seed and run.

use std::cell::{Cell, RefCell};

use evsim_core::{next_automatic_stream, RngStream, StreamConsumer};

use crate::accessor::make_accessor;
use crate::checker::{make_boolean_checker, make_double_checker, make_integer_checker_range, make_uinteger_checker_range};
use crate::object::{Object, ObjectCore, ObjectType};
use crate::type_id::TypeId;

/// Common state of every random variable
pub struct RandomVariableStream {
    core: ObjectCore,
    stream: Cell<i64>,
    antithetic: Cell<bool>,
    rng: RefCell<Option<RngStream>>,
}

impl Default for RandomVariableStream {
    fn default() -> Self {
        RandomVariableStream {
            core: ObjectCore::new(),
            stream: Cell::new(-1),
            antithetic: Cell::new(false),
            rng: RefCell::new(None),
        }
    }
}

impl RandomVariableStream {
    pub fn stream(&self) -> i64 {
        self.stream.get()
    }

    /// Select the stream index; `-1` means automatic
    pub fn set_stream(&self, stream: i64) {
        self.stream.set(stream);
        *self.rng.borrow_mut() = None;
    }

    pub fn is_antithetic(&self) -> bool {
        self.antithetic.get()
    }

    pub fn set_antithetic(&self, antithetic: bool) {
        self.antithetic.set(antithetic);
    }

    /// Uniform draw in (0, 1), mirrored when antithetic
    pub fn next_u01(&self) -> f64 {
        let mut rng = self.rng.borrow_mut();
        let stream = rng.get_or_insert_with(|| {
            let index = match self.stream.get() {
                s if s < 0 => next_automatic_stream(),
                s => s as u64,
            };
            RngStream::new(index)
        });
        let u = stream.rand_u01();
        if self.antithetic.get() {
            1.0 - u
        } else {
            u
        }
    }
}

impl Object for RandomVariableStream {
    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl ObjectType for RandomVariableStream {
    fn get_type_id() -> TypeId {
        TypeId::lookup_or_register("evsim::RandomVariableStream", |tid| {
            tid.set_group_name("Core")
                .add_attribute(
                    "Stream",
                    "Stream index of the generator, -1 for automatic",
                    -1i64,
                    make_accessor(RandomVariableStream::stream, RandomVariableStream::set_stream),
                    make_integer_checker_range::<i64>(-1, i64::MAX),
                )
                .add_attribute(
                    "Antithetic",
                    "Return 1-u instead of u",
                    false,
                    make_accessor(RandomVariableStream::is_antithetic, RandomVariableStream::set_antithetic),
                    make_boolean_checker(),
                )
        })
    }
}

impl StreamConsumer for RandomVariableStream {
    fn assign_streams(&self, next: u64) -> u64 {
        self.set_stream(next as i64);
        1
    }
}

/// Draws of a random variable
pub trait RandomVariable: Object {
    fn base(&self) -> &RandomVariableStream;

    fn get_value(&self) -> f64;

    fn get_integer(&self) -> u32 {
        self.get_value() as u32
    }
}

macro_rules! derived_variable {
    ($ty:ident) => {
        impl Object for $ty {
            fn core(&self) -> &ObjectCore {
                self.base.core()
            }

            fn parent(&self) -> Option<&dyn Object> {
                Some(&self.base)
            }
        }

        impl StreamConsumer for $ty {
            fn assign_streams(&self, next: u64) -> u64 {
                self.base.assign_streams(next)
            }
        }
    };
}

/// Uniform in `[Min, Max)`
pub struct UniformRandomVariable {
    base: RandomVariableStream,
    min: Cell<f64>,
    max: Cell<f64>,
}

impl Default for UniformRandomVariable {
    fn default() -> Self {
        UniformRandomVariable {
            base: RandomVariableStream::default(),
            min: Cell::new(0.0),
            max: Cell::new(1.0),
        }
    }
}

impl UniformRandomVariable {
    pub fn min(&self) -> f64 {
        self.min.get()
    }

    pub fn set_min(&self, v: f64) {
        self.min.set(v);
    }

    pub fn max(&self) -> f64 {
        self.max.get()
    }

    pub fn set_max(&self, v: f64) {
        self.max.set(v);
    }

    pub fn get_value_in(&self, min: f64, max: f64) -> f64 {
        min + self.base.next_u01() * (max - min)
    }
}

derived_variable!(UniformRandomVariable);

impl ObjectType for UniformRandomVariable {
    fn get_type_id() -> TypeId {
        TypeId::lookup_or_register("evsim::UniformRandomVariable", |tid| {
            tid.set_parent_of::<RandomVariableStream>()
                .set_group_name("Core")
                .add_constructor::<UniformRandomVariable>()
                .add_attribute(
                    "Min",
                    "Lower bound, inclusive",
                    0.0,
                    make_accessor(UniformRandomVariable::min, UniformRandomVariable::set_min),
                    make_double_checker(),
                )
                .add_attribute(
                    "Max",
                    "Upper bound, exclusive",
                    1.0,
                    make_accessor(UniformRandomVariable::max, UniformRandomVariable::set_max),
                    make_double_checker(),
                )
        })
    }
}

impl RandomVariable for UniformRandomVariable {
    fn base(&self) -> &RandomVariableStream {
        &self.base
    }

    fn get_value(&self) -> f64 {
        self.get_value_in(self.min.get(), self.max.get())
    }
}

/// Always `Constant`
#[derive(Default)]
pub struct ConstantRandomVariable {
    base: RandomVariableStream,
    constant: Cell<f64>,
}

impl ConstantRandomVariable {
    pub fn constant(&self) -> f64 {
        self.constant.get()
    }

    pub fn set_constant(&self, v: f64) {
        self.constant.set(v);
    }
}

derived_variable!(ConstantRandomVariable);

impl ObjectType for ConstantRandomVariable {
    fn get_type_id() -> TypeId {
        TypeId::lookup_or_register("evsim::ConstantRandomVariable", |tid| {
            tid.set_parent_of::<RandomVariableStream>()
                .set_group_name("Core")
                .add_constructor::<ConstantRandomVariable>()
                .add_attribute(
                    "Constant",
                    "The value returned by every draw",
                    0.0,
                    make_accessor(ConstantRandomVariable::constant, ConstantRandomVariable::set_constant),
                    make_double_checker(),
                )
        })
    }
}

impl RandomVariable for ConstantRandomVariable {
    fn base(&self) -> &RandomVariableStream {
        &self.base
    }

    fn get_value(&self) -> f64 {
        self.constant.get()
    }
}

/// Exponential with mean `Mean`, redrawn above `Bound` when it is non-zero
pub struct ExponentialRandomVariable {
    base: RandomVariableStream,
    mean: Cell<f64>,
    bound: Cell<f64>,
}

impl Default for ExponentialRandomVariable {
    fn default() -> Self {
        ExponentialRandomVariable {
            base: RandomVariableStream::default(),
            mean: Cell::new(1.0),
            bound: Cell::new(0.0),
        }
    }
}

impl ExponentialRandomVariable {
    pub fn mean(&self) -> f64 {
        self.mean.get()
    }

    pub fn set_mean(&self, v: f64) {
        self.mean.set(v);
    }

    pub fn bound(&self) -> f64 {
        self.bound.get()
    }

    pub fn set_bound(&self, v: f64) {
        self.bound.set(v);
    }
}

derived_variable!(ExponentialRandomVariable);

impl ObjectType for ExponentialRandomVariable {
    fn get_type_id() -> TypeId {
        TypeId::lookup_or_register("evsim::ExponentialRandomVariable", |tid| {
            tid.set_parent_of::<RandomVariableStream>()
                .set_group_name("Core")
                .add_constructor::<ExponentialRandomVariable>()
                .add_attribute(
                    "Mean",
                    "Mean of the distribution",
                    1.0,
                    make_accessor(ExponentialRandomVariable::mean, ExponentialRandomVariable::set_mean),
                    make_double_checker(),
                )
                .add_attribute(
                    "Bound",
                    "Upper bound, 0 for none",
                    0.0,
                    make_accessor(ExponentialRandomVariable::bound, ExponentialRandomVariable::set_bound),
                    make_double_checker(),
                )
        })
    }
}

impl RandomVariable for ExponentialRandomVariable {
    fn base(&self) -> &RandomVariableStream {
        &self.base
    }

    fn get_value(&self) -> f64 {
        let (mean, bound) = (self.mean.get(), self.bound.get());
        loop {
            let v = -mean * self.base.next_u01().ln();
            if bound == 0.0 || v <= bound {
                return v;
            }
        }
    }
}

/// Walks `Min, Min+Increment, ...` wrapping before `Max`, repeating each
/// value `Consecutive` times. Draws no random numbers.
pub struct SequentialRandomVariable {
    base: RandomVariableStream,
    min: Cell<f64>,
    max: Cell<f64>,
    increment: Cell<f64>,
    consecutive: Cell<u32>,
    current: Cell<Option<f64>>,
    repeated: Cell<u32>,
}

impl Default for SequentialRandomVariable {
    fn default() -> Self {
        SequentialRandomVariable {
            base: RandomVariableStream::default(),
            min: Cell::new(0.0),
            max: Cell::new(0.0),
            increment: Cell::new(1.0),
            consecutive: Cell::new(1),
            current: Cell::new(None),
            repeated: Cell::new(0),
        }
    }
}

impl SequentialRandomVariable {
    pub fn min(&self) -> f64 {
        self.min.get()
    }

    pub fn set_min(&self, v: f64) {
        self.min.set(v);
        self.current.set(None);
    }

    pub fn max(&self) -> f64 {
        self.max.get()
    }

    pub fn set_max(&self, v: f64) {
        self.max.set(v);
    }

    pub fn increment(&self) -> f64 {
        self.increment.get()
    }

    pub fn set_increment(&self, v: f64) {
        self.increment.set(v);
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive.get()
    }

    pub fn set_consecutive(&self, v: u32) {
        self.consecutive.set(v);
    }
}

derived_variable!(SequentialRandomVariable);

impl ObjectType for SequentialRandomVariable {
    fn get_type_id() -> TypeId {
        TypeId::lookup_or_register("evsim::SequentialRandomVariable", |tid| {
            tid.set_parent_of::<RandomVariableStream>()
                .set_group_name("Core")
                .add_constructor::<SequentialRandomVariable>()
                .add_attribute(
                    "Min",
                    "First value of the sequence",
                    0.0,
                    make_accessor(SequentialRandomVariable::min, SequentialRandomVariable::set_min),
                    make_double_checker(),
                )
                .add_attribute(
                    "Max",
                    "Values wrap before reaching this bound",
                    0.0,
                    make_accessor(SequentialRandomVariable::max, SequentialRandomVariable::set_max),
                    make_double_checker(),
                )
                .add_attribute(
                    "Increment",
                    "Step between values",
                    1.0,
                    make_accessor(SequentialRandomVariable::increment, SequentialRandomVariable::set_increment),
                    make_double_checker(),
                )
                .add_attribute(
                    "Consecutive",
                    "Times each value is repeated",
                    1u32,
                    make_accessor(SequentialRandomVariable::consecutive, SequentialRandomVariable::set_consecutive),
                    make_uinteger_checker_range::<u32>(1, u32::MAX),
                )
        })
    }
}

impl RandomVariable for SequentialRandomVariable {
    fn base(&self) -> &RandomVariableStream {
        &self.base
    }

    fn get_value(&self) -> f64 {
        let value = self.current.get().unwrap_or(self.min.get());
        let repeated = self.repeated.get() + 1;
        if repeated >= self.consecutive.get() {
            self.repeated.set(0);
            let mut next = value + self.increment.get();
            let (min, max) = (self.min.get(), self.max.get());
            if max > min && next >= max {
                next = min + (next - max);
            }
            self.current.set(Some(next));
        } else {
            self.repeated.set(repeated);
            self.current.set(Some(value));
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{create_object, create_object_with_attributes, ObjectExt};
    use evsim_core::reset_streams;

    #[test]
    fn test_uniform_in_bounds() {
        let u = create_object_with_attributes(
            UniformRandomVariable::default(),
            &[("Min", 2.0.into()), ("Max", 4.0.into())],
        );
        for _ in 0..1000 {
            let v = u.get_value();
            assert!((2.0..4.0).contains(&v));
        }
    }

    #[test]
    fn test_same_stream_same_sequence() {
        reset_streams();
        let a = create_object::<UniformRandomVariable>();
        let b = create_object::<UniformRandomVariable>();
        a.set_attribute("Stream", 5i64);
        b.set_attribute("Stream", 5i64);
        let xs: Vec<f64> = (0..10).map(|_| a.get_value()).collect();
        let ys: Vec<f64> = (0..10).map(|_| b.get_value()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_antithetic_mirrors() {
        let a = create_object::<UniformRandomVariable>();
        let b = create_object::<UniformRandomVariable>();
        a.base().set_stream(9);
        b.base().set_stream(9);
        b.set_attribute("Antithetic", true);
        for _ in 0..10 {
            let (x, y) = (a.get_value(), b.get_value());
            assert!((x + y - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_assign_streams_pins_index() {
        let u = create_object::<ExponentialRandomVariable>();
        assert_eq!(u.assign_streams(42), 1);
        assert_eq!(u.get_attribute("Stream"), 42i64.into());
        assert!(u.get_value() > 0.0);
    }

    #[test]
    fn test_exponential_bound() {
        let e = create_object_with_attributes(
            ExponentialRandomVariable::default(),
            &[("Mean", 10.0.into()), ("Bound", 5.0.into())],
        );
        for _ in 0..200 {
            assert!(e.get_value() <= 5.0);
        }
    }

    #[test]
    fn test_sequential_wraps() {
        let s = create_object_with_attributes(
            SequentialRandomVariable::default(),
            &[("Min", 1.0.into()), ("Max", 4.0.into()), ("Consecutive", 2u32.into())],
        );
        let values: Vec<f64> = (0..8).map(|_| s.get_value()).collect();
        assert_eq!(values, vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 1.0, 1.0]);
    }

    #[test]
    fn test_constant() {
        let c = create_object::<ConstantRandomVariable>();
        c.set_attribute("Constant", 3.5);
        assert_eq!(c.get_value(), 3.5);
        assert_eq!(c.get_integer(), 3);
    }
}

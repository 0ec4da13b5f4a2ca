//! evsim Object - The configurable object graph
//!
//! This crate provides everything a model needs to expose itself to the
//! configuration surface:
//! - Counted handles with aggregate-wide lifetime (Ptr)
//! - The type registry with attributes and trace sources (TypeId)
//! - Attribute values, checkers and accessors
//! - Objects, aggregation and the initialize/dispose lifecycle
//! - Object factories, the name service and global values
//! - Random variable objects bound to registry streams

pub mod accessor;
pub mod checker;
pub mod data_rate;
pub mod factory;
pub mod global_value;
pub mod names;
pub mod object;
pub mod ptr;
pub mod random_variable;
pub mod type_id;
pub mod value;
pub mod vector;

pub use accessor::*;
pub use checker::*;
pub use data_rate::*;
pub use factory::*;
pub use global_value::*;
pub use names::*;
pub use object::*;
pub use ptr::*;
pub use random_variable::*;
pub use type_id::*;
pub use value::*;
pub use vector::*;

//! Common imports for simulation drivers and models
//!
//! ```ignore
//! use evsim_runtime::prelude::*;
//! ```

pub use evsim_config::{Config, ConfigStore, FileFormat, MatchContainer, Mode};
pub use evsim_core::{
    log_component_enable, log_debug, log_error, log_function, log_info, log_logic, log_warn, set_run, set_seed,
    ContextId, KernelError, KernelResult, LogComponent, LogLevel, OrFatal, Time, TimeUnit,
};
pub use evsim_object::{
    create_object, create_object_with_attributes, make_accessor, make_trace_source_accessor, AttributeValue,
    GlobalValue, Names, Object, ObjectCore, ObjectExt, ObjectFactory, ObjectType, Ptr, TypeId,
};
pub use evsim_sched::{DestroyPolicy, EventId, Simulator, Timer, Watchdog};
pub use evsim_trace::{Callback, ContextCallback, TracedCallback, TracedValue};

pub use crate::command_line::{CommandLine, ParseOutcome};
pub use crate::progress::ShowProgress;

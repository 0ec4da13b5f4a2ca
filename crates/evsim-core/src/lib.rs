//! evsim Core - Kernel primitives
//!
//! This crate defines the leaf types used throughout the simulation kernel:
//! - Virtual time with a per-context resolution (Time, TimeUnit)
//! - Event and context identifiers
//! - The random stream registry (seed, run, substream allocation)
//! - Kernel error kinds and the strict/fail-safe helpers
//! - Per-component logging with `LOG_VAR` overrides

pub mod error;
pub mod id;
pub mod log;
pub mod random;
pub mod time;

pub use error::*;
pub use id::*;
pub use log::{
    log_component_disable, log_component_disable_all, log_component_enable,
    log_component_enable_all, log_component_list, log_reload_from_env, parse_log_var,
    set_node_printer, set_time_printer, LogComponent, LogLevel, LOG_ENV_VAR,
};
pub use random::*;
pub use time::*;

#[doc(hidden)]
pub use tracing as __tracing;

//! evsim Runtime - Driver surface of the simulation kernel
//!
//! This crate provides:
//! - `CommandLine`: `--key=value` options bound to values, attribute
//!   defaults and global values, plus the `--Print*` introspection requests
//! - Subscriber setup honouring `RUST_LOG` and `LOG_VAR`
//! - A progress reporter for long runs
//! - A prelude gathering the types drivers use most

pub mod command_line;
pub mod logging;
pub mod prelude;
pub mod progress;

pub use command_line::{CommandLine, ParseOutcome};
pub use progress::{ProgressReport, ShowProgress};

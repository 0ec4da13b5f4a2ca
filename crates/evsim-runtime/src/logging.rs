//! Subscriber setup for drivers
//!
//! Component masks decide which kernel messages are produced; the
//! subscriber installed here decides which `tracing` events are printed.
//! When `LOG_VAR` is set the kernel crates are let through at every level,
//! so the masks are the only filter.

use evsim_core::LOG_ENV_VAR;
use tracing_subscriber::EnvFilter;

const KERNEL_CRATES: [&str; 6] = [
    "evsim_core",
    "evsim_trace",
    "evsim_object",
    "evsim_config",
    "evsim_sched",
    "evsim_runtime",
];

/// Filter directives used when `RUST_LOG` is not set
pub fn default_directives(log_var_set: bool) -> String {
    let mut directives = String::from("warn");
    if log_var_set {
        for krate in KERNEL_CRATES {
            directives.push(',');
            directives.push_str(krate);
            directives.push_str("=trace");
        }
    }
    directives
}

/// Install the fmt subscriber. Returns `false` if a global subscriber was
/// already installed.
pub fn init() -> bool {
    let log_var_set = std::env::var_os(LOG_ENV_VAR).is_some();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(log_var_set)));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(log_var = log_var_set, "subscriber installed");
    }
    installed
}

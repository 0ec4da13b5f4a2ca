//! Per-component logging
//!
//! Every kernel module owns a [`LogComponent`] with a severity mask. Masks
//! are set programmatically or through the `LOG_VAR` environment variable:
//!
//! ```text
//! LOG_VAR="Simulator=level_logic|prefix_time:Config=error:*=warn"
//! ```
//!
//! Enabled messages are emitted as `tracing` events carrying the component
//! name, so any subscriber can render or filter them.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Once;

use parking_lot::RwLock;

use crate::{KernelError, KernelResult};

/// Environment variable read on first component use
pub const LOG_ENV_VAR: &str = "LOG_VAR";

/// Severity and prefix bits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LogLevel(pub u32);

impl LogLevel {
    pub const NONE: LogLevel = LogLevel(0);

    pub const ERROR: LogLevel = LogLevel(0x0000_0001);
    pub const WARN: LogLevel = LogLevel(0x0000_0002);
    pub const INFO: LogLevel = LogLevel(0x0000_0004);
    pub const FUNCTION: LogLevel = LogLevel(0x0000_0008);
    pub const LOGIC: LogLevel = LogLevel(0x0000_0010);
    pub const DEBUG: LogLevel = LogLevel(0x0000_0020);

    // Cumulative masks: the named severity and everything more severe
    pub const LEVEL_ERROR: LogLevel = LogLevel(0x0000_0001);
    pub const LEVEL_WARN: LogLevel = LogLevel(0x0000_0003);
    pub const LEVEL_INFO: LogLevel = LogLevel(0x0000_0007);
    pub const LEVEL_FUNCTION: LogLevel = LogLevel(0x0000_000f);
    pub const LEVEL_LOGIC: LogLevel = LogLevel(0x0000_001f);
    pub const LEVEL_DEBUG: LogLevel = LogLevel(0x0000_003f);
    pub const ALL: LogLevel = LogLevel(0x0fff_ffff);

    pub const PREFIX_FUNC: LogLevel = LogLevel(0x8000_0000);
    pub const PREFIX_TIME: LogLevel = LogLevel(0x4000_0000);
    pub const PREFIX_NODE: LogLevel = LogLevel(0x2000_0000);
    pub const PREFIX_LEVEL: LogLevel = LogLevel(0x1000_0000);
    pub const PREFIX_ALL: LogLevel = LogLevel(0xf000_0000);

    #[inline]
    pub fn contains(self, other: LogLevel) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn intersects(self, other: LogLevel) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn union(self, other: LogLevel) -> LogLevel {
        LogLevel(self.0 | other.0)
    }

    /// Label printed by the level prefix
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::ERROR => "ERROR",
            LogLevel::WARN => "WARN",
            LogLevel::INFO => "INFO",
            LogLevel::FUNCTION => "FUNCT",
            LogLevel::LOGIC => "LOGIC",
            LogLevel::DEBUG => "DEBUG",
            _ => "",
        }
    }

    /// Parse one `LOG_VAR` level token
    pub fn from_token(token: &str) -> Option<LogLevel> {
        let level = match token {
            "error" => LogLevel::ERROR,
            "warn" => LogLevel::WARN,
            "info" => LogLevel::INFO,
            "function" => LogLevel::FUNCTION,
            "logic" => LogLevel::LOGIC,
            "debug" => LogLevel::DEBUG,
            "level_error" => LogLevel::LEVEL_ERROR,
            "level_warn" => LogLevel::LEVEL_WARN,
            "level_info" => LogLevel::LEVEL_INFO,
            "level_function" => LogLevel::LEVEL_FUNCTION,
            "level_logic" => LogLevel::LEVEL_LOGIC,
            "level_debug" => LogLevel::LEVEL_DEBUG,
            "all" | "level_all" | "*" => LogLevel::ALL,
            "prefix_func" => LogLevel::PREFIX_FUNC,
            "prefix_time" => LogLevel::PREFIX_TIME,
            "prefix_node" => LogLevel::PREFIX_NODE,
            "prefix_level" => LogLevel::PREFIX_LEVEL,
            "prefix_all" => LogLevel::PREFIX_ALL,
            "**" => LogLevel::ALL.union(LogLevel::PREFIX_ALL),
            _ => return None,
        };
        Some(level)
    }
}

impl std::ops::BitOr for LogLevel {
    type Output = LogLevel;

    #[inline]
    fn bitor(self, rhs: LogLevel) -> LogLevel {
        self.union(rhs)
    }
}

#[derive(Default)]
struct MaskRegistry {
    /// Explicit per-component masks
    masks: HashMap<String, u32>,
    /// Mask applied to components without an explicit entry
    wildcard: u32,
    /// Components seen so far
    known: BTreeSet<&'static str>,
}

static REGISTRY: RwLock<Option<MaskRegistry>> = RwLock::new(None);
static GENERATION: AtomicU64 = AtomicU64::new(1);
static ENV_INIT: Once = Once::new();

type Printer = fn() -> Option<String>;

static TIME_PRINTER: RwLock<Option<Printer>> = RwLock::new(None);
static NODE_PRINTER: RwLock<Option<Printer>> = RwLock::new(None);

fn with_registry<R>(f: impl FnOnce(&mut MaskRegistry) -> R) -> R {
    let mut guard = REGISTRY.write();
    let registry = guard.get_or_insert_with(MaskRegistry::default);
    let result = f(registry);
    GENERATION.fetch_add(1, Ordering::AcqRel);
    result
}

fn ensure_env_loaded() {
    ENV_INIT.call_once(|| {
        if let Err(e) = apply_env() {
            tracing::warn!("ignoring {}: {}", LOG_ENV_VAR, e);
        }
    });
}

fn apply_env() -> KernelResult<()> {
    let Ok(value) = std::env::var(LOG_ENV_VAR) else {
        return Ok(());
    };
    for (component, level) in parse_log_var(&value)? {
        if component == "*" {
            log_component_enable_all(level);
        } else {
            log_component_enable(&component, level);
        }
    }
    Ok(())
}

/// Parse a `LOG_VAR` string into `(component, mask)` pairs
pub fn parse_log_var(value: &str) -> KernelResult<Vec<(String, LogLevel)>> {
    let mut out = Vec::new();
    for entry in value.split(':').map(str::trim).filter(|e| !e.is_empty()) {
        let (component, levels) = match entry.split_once('=') {
            Some((c, l)) => (c.trim(), Some(l)),
            None => (entry, None),
        };
        if component.is_empty() {
            return Err(KernelError::MalformedValue {
                expected: "LOG_VAR component".into(),
                value: entry.into(),
            });
        }
        let mut mask = LogLevel::NONE;
        match levels {
            None => mask = LogLevel::ALL,
            Some(levels) => {
                for token in levels.split('|').map(str::trim).filter(|t| !t.is_empty()) {
                    let level = LogLevel::from_token(token).ok_or_else(|| {
                        KernelError::MalformedValue {
                            expected: "LOG_VAR level".into(),
                            value: token.into(),
                        }
                    })?;
                    mask = mask | level;
                }
            }
        }
        out.push((component.to_string(), mask));
    }
    Ok(out)
}

/// Enable `level` bits on a component (by name, known or not yet used)
pub fn log_component_enable(name: &str, level: LogLevel) {
    with_registry(|r| {
        let wildcard = r.wildcard;
        *r.masks.entry(name.to_string()).or_insert(wildcard) |= level.0;
    });
}

/// Clear `level` bits on a component
pub fn log_component_disable(name: &str, level: LogLevel) {
    with_registry(|r| {
        let wildcard = r.wildcard;
        *r.masks.entry(name.to_string()).or_insert(wildcard) &= !level.0;
    });
}

/// Enable `level` bits on every component, present and future
pub fn log_component_enable_all(level: LogLevel) {
    with_registry(|r| {
        r.wildcard |= level.0;
        for mask in r.masks.values_mut() {
            *mask |= level.0;
        }
    });
}

/// Clear `level` bits on every component
pub fn log_component_disable_all(level: LogLevel) {
    with_registry(|r| {
        r.wildcard &= !level.0;
        for mask in r.masks.values_mut() {
            *mask &= !level.0;
        }
    });
}

/// Forget every mask and re-read `LOG_VAR`
pub fn log_reload_from_env() -> KernelResult<()> {
    with_registry(|r| {
        r.masks.clear();
        r.wildcard = 0;
    });
    apply_env()
}

/// Known components with their effective masks
pub fn log_component_list() -> Vec<(String, LogLevel)> {
    let guard = REGISTRY.read();
    let Some(r) = guard.as_ref() else {
        return Vec::new();
    };
    r.known
        .iter()
        .map(|name| {
            let mask = r.masks.get(*name).copied().unwrap_or(r.wildcard);
            (name.to_string(), LogLevel(mask))
        })
        .collect()
}

/// Install the function producing the time prefix
pub fn set_time_printer(printer: Option<Printer>) {
    *TIME_PRINTER.write() = printer;
}

/// Install the function producing the node (context) prefix
pub fn set_node_printer(printer: Option<Printer>) {
    *NODE_PRINTER.write() = printer;
}

/// A named logging component
pub struct LogComponent {
    name: &'static str,
    generation: AtomicU64,
    mask: AtomicU32,
    registered: AtomicBool,
}

impl LogComponent {
    pub const fn new(name: &'static str) -> Self {
        LogComponent {
            name,
            generation: AtomicU64::new(0),
            mask: AtomicU32::new(0),
            registered: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Effective mask, refreshed when any mask changed since the last call
    pub fn mask(&self) -> LogLevel {
        ensure_env_loaded();
        if !self.registered.swap(true, Ordering::AcqRel) {
            with_registry(|r| {
                r.known.insert(self.name);
            });
        }
        let current = GENERATION.load(Ordering::Acquire);
        if self.generation.load(Ordering::Acquire) != current {
            let guard = REGISTRY.read();
            let mask = guard
                .as_ref()
                .map(|r| r.masks.get(self.name).copied().unwrap_or(r.wildcard))
                .unwrap_or(0);
            self.mask.store(mask, Ordering::Release);
            self.generation.store(current, Ordering::Release);
        }
        LogLevel(self.mask.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.mask().intersects(level)
    }

    /// Compose the enabled prefixes for a message at `level`
    pub fn prefix(&self, level: LogLevel, function: &str) -> String {
        let mask = self.mask();
        let mut out = String::new();
        if mask.intersects(LogLevel::PREFIX_TIME) {
            if let Some(printer) = *TIME_PRINTER.read() {
                if let Some(t) = printer() {
                    out.push_str(&t);
                    out.push(' ');
                }
            }
        }
        if mask.intersects(LogLevel::PREFIX_NODE) {
            if let Some(printer) = *NODE_PRINTER.read() {
                if let Some(n) = printer() {
                    out.push_str(&n);
                    out.push(' ');
                }
            }
        }
        if mask.intersects(LogLevel::PREFIX_FUNC) {
            out.push_str(self.name);
            out.push(':');
            out.push_str(function);
            out.push_str("(): ");
        }
        if mask.intersects(LogLevel::PREFIX_LEVEL) {
            out.push('[');
            out.push_str(level.label());
            out.push_str("] ");
        }
        out
    }
}

impl std::fmt::Debug for LogComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LogComponent({})", self.name)
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($comp:expr, $level:expr, $tlevel:ident, $($arg:tt)+) => {{
        let comp: &$crate::log::LogComponent = &$comp;
        if comp.is_enabled($level) {
            let prefix = comp.prefix($level, module_path!());
            $crate::__tracing::event!(
                $crate::__tracing::Level::$tlevel,
                component = comp.name(),
                "{}{}",
                prefix,
                format_args!($($arg)+)
            );
        }
    }};
}

#[macro_export]
macro_rules! log_error {
    ($comp:expr, $($arg:tt)+) => { $crate::__log_at!($comp, $crate::log::LogLevel::ERROR, ERROR, $($arg)+) };
}

#[macro_export]
macro_rules! log_warn {
    ($comp:expr, $($arg:tt)+) => { $crate::__log_at!($comp, $crate::log::LogLevel::WARN, WARN, $($arg)+) };
}

#[macro_export]
macro_rules! log_info {
    ($comp:expr, $($arg:tt)+) => { $crate::__log_at!($comp, $crate::log::LogLevel::INFO, INFO, $($arg)+) };
}

#[macro_export]
macro_rules! log_function {
    ($comp:expr, $($arg:tt)+) => { $crate::__log_at!($comp, $crate::log::LogLevel::FUNCTION, DEBUG, $($arg)+) };
}

#[macro_export]
macro_rules! log_logic {
    ($comp:expr, $($arg:tt)+) => { $crate::__log_at!($comp, $crate::log::LogLevel::LOGIC, DEBUG, $($arg)+) };
}

#[macro_export]
macro_rules! log_debug {
    ($comp:expr, $($arg:tt)+) => { $crate::__log_at!($comp, $crate::log::LogLevel::DEBUG, TRACE, $($arg)+) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    static TEST_COMPONENT: LogComponent = LogComponent::new("LogTestComponent");
    static OTHER_COMPONENT: LogComponent = LogComponent::new("LogOtherComponent");

    #[test]
    fn test_parse_log_var() {
        let parsed = parse_log_var("Comp1=level_info|prefix_time:Comp2=error").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].0, "Comp1");
        assert!(parsed[0].1.contains(LogLevel::LEVEL_INFO));
        assert!(parsed[0].1.contains(LogLevel::PREFIX_TIME));
        assert!(!parsed[0].1.intersects(LogLevel::DEBUG));
        assert_eq!(parsed[1].1, LogLevel::ERROR);
    }

    #[test]
    fn test_parse_bare_component_enables_all() {
        let parsed = parse_log_var("Simulator").unwrap();
        assert_eq!(parsed[0].1, LogLevel::ALL);
    }

    #[test]
    fn test_parse_rejects_unknown_level() {
        assert!(parse_log_var("Comp=loud").is_err());
        assert!(parse_log_var("=info").is_err());
    }

    #[test]
    #[serial]
    fn test_enable_disable() {
        log_component_enable("LogTestComponent", LogLevel::LEVEL_LOGIC);
        assert!(TEST_COMPONENT.is_enabled(LogLevel::LOGIC));
        assert!(TEST_COMPONENT.is_enabled(LogLevel::ERROR));
        assert!(!TEST_COMPONENT.is_enabled(LogLevel::DEBUG));

        log_component_disable("LogTestComponent", LogLevel::LOGIC);
        assert!(!TEST_COMPONENT.is_enabled(LogLevel::LOGIC));
        log_component_disable("LogTestComponent", LogLevel::ALL);
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var(LOG_ENV_VAR, "LogOtherComponent=warn|prefix_level");
        log_reload_from_env().unwrap();
        assert!(OTHER_COMPONENT.is_enabled(LogLevel::WARN));
        assert!(!OTHER_COMPONENT.is_enabled(LogLevel::INFO));
        assert_eq!(OTHER_COMPONENT.prefix(LogLevel::WARN, "f"), "[WARN] ");

        std::env::remove_var(LOG_ENV_VAR);
        log_reload_from_env().unwrap();
        assert!(!OTHER_COMPONENT.is_enabled(LogLevel::WARN));
    }

    #[test]
    #[serial]
    fn test_component_listed_after_use() {
        let _ = TEST_COMPONENT.is_enabled(LogLevel::ERROR);
        assert!(log_component_list()
            .iter()
            .any(|(name, _)| name == "LogTestComponent"));
    }

    #[test]
    #[serial]
    fn test_macro_compiles_and_gates() {
        log_component_enable("LogTestComponent", LogLevel::DEBUG | LogLevel::PREFIX_FUNC);
        crate::log_debug!(TEST_COMPONENT, "value={}", 42);
        crate::log_logic!(TEST_COMPONENT, "not printed");
        log_component_disable("LogTestComponent", LogLevel::ALL);
    }
}

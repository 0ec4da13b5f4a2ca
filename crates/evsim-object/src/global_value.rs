//! Named kernel-wide values
//!
//! A global value carries a help text, a checker, the value it was
//! registered with and its current value. Built-in values feed the random
//! stream registry and select the scheduler of new simulator contexts.

use std::cell::RefCell;

use evsim_core::{log_function, set_run, set_seed, KernelError, KernelResult, LogComponent, OrFatal};

use crate::checker::{make_string_checker, make_uinteger_checker, make_uinteger_checker_range, AttributeChecker};
use crate::value::AttributeValue;

static LOG: LogComponent = LogComponent::new("GlobalValue");

pub const SCHEDULER_TYPE: &str = "SchedulerType";
pub const RNG_SEED: &str = "RngSeed";
pub const RNG_RUN: &str = "RngRun";

/// Default scheduler type name
pub const DEFAULT_SCHEDULER: &str = "evsim::HeapScheduler";

/// Hook run after a value changed
pub type ChangeHook = fn(&AttributeValue);

#[derive(Clone)]
pub struct GlobalValue {
    pub name: String,
    pub help: String,
    pub checker: AttributeChecker,
    pub initial_value: AttributeValue,
    pub value: AttributeValue,
    on_change: Option<ChangeHook>,
}

impl std::fmt::Debug for GlobalValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalValue")
            .field("name", &self.name)
            .field("value", &self.value)
            .finish()
    }
}

thread_local! {
    static GLOBALS: RefCell<Vec<GlobalValue>> = const { RefCell::new(Vec::new()) };
}

fn apply_seed(value: &AttributeValue) {
    if let Some(seed) = value.get::<u32>() {
        set_seed(seed);
    }
}

fn apply_run(value: &AttributeValue) {
    if let Some(run) = value.get::<u64>() {
        set_run(run);
    }
}

fn ensure_builtins() {
    let missing = GLOBALS.with(|g| g.borrow().is_empty());
    if !missing {
        return;
    }
    let builtins = [
        (
            SCHEDULER_TYPE,
            "Type name of the event scheduler of new simulator contexts",
            AttributeValue::String(DEFAULT_SCHEDULER.into()),
            make_string_checker(),
            None,
        ),
        (
            RNG_SEED,
            "Global seed of the random stream registry",
            AttributeValue::Uinteger(1),
            make_uinteger_checker_range::<u32>(1, u32::MAX),
            Some(apply_seed as ChangeHook),
        ),
        (
            RNG_RUN,
            "Run number selecting the substream set",
            AttributeValue::Uinteger(1),
            make_uinteger_checker::<u64>(),
            Some(apply_run as ChangeHook),
        ),
    ];
    GLOBALS.with(|g| {
        let mut globals = g.borrow_mut();
        for (name, help, value, checker, on_change) in builtins {
            globals.push(GlobalValue {
                name: name.into(),
                help: help.into(),
                checker,
                initial_value: value.clone(),
                value,
                on_change,
            });
        }
    });
}

fn unknown(name: &str) -> KernelError {
    KernelError::UnknownAttribute {
        type_name: "GlobalValue".into(),
        name: name.into(),
    }
}

impl GlobalValue {
    /// Register a new global value
    pub fn try_register(
        name: &str,
        help: &str,
        initial: impl Into<AttributeValue>,
        checker: AttributeChecker,
        on_change: Option<ChangeHook>,
    ) -> KernelResult<()> {
        ensure_builtins();
        let initial = checker.create_valid_value(&initial.into(), name)?;
        GLOBALS.with(|g| {
            let mut globals = g.borrow_mut();
            if globals.iter().any(|v| v.name == name) {
                return Err(KernelError::DuplicateName(name.into()));
            }
            globals.push(GlobalValue {
                name: name.into(),
                help: help.into(),
                checker,
                initial_value: initial.clone(),
                value: initial,
                on_change,
            });
            Ok(())
        })?;
        log_function!(LOG, "registered {}", name);
        Ok(())
    }

    pub fn register(name: &str, help: &str, initial: impl Into<AttributeValue>, checker: AttributeChecker) {
        Self::try_register(name, help, initial, checker, None).or_fatal()
    }

    /// Set the value of `name`, validated against its checker
    pub fn try_bind(name: &str, value: impl Into<AttributeValue>) -> KernelResult<()> {
        ensure_builtins();
        let value = value.into();
        let hook = GLOBALS.with(|g| {
            let mut globals = g.borrow_mut();
            let entry = globals
                .iter_mut()
                .find(|v| v.name == name)
                .ok_or_else(|| unknown(name))?;
            entry.value = entry.checker.create_valid_value(&value, name)?;
            Ok::<_, KernelError>(entry.on_change.map(|hook| (hook, entry.value.clone())))
        })?;
        if let Some((hook, current)) = hook {
            hook(&current);
        }
        log_function!(LOG, "bind {}", name);
        Ok(())
    }

    pub fn bind(name: &str, value: impl Into<AttributeValue>) {
        Self::try_bind(name, value).or_fatal()
    }

    pub fn bind_fail_safe(name: &str, value: impl Into<AttributeValue>) -> bool {
        Self::try_bind(name, value).is_ok()
    }

    pub fn get_value_by_name_fail_safe(name: &str) -> Option<AttributeValue> {
        ensure_builtins();
        GLOBALS.with(|g| g.borrow().iter().find(|v| v.name == name).map(|v| v.value.clone()))
    }

    pub fn get_value_by_name(name: &str) -> AttributeValue {
        Self::get_value_by_name_fail_safe(name)
            .ok_or_else(|| unknown(name))
            .or_fatal()
    }

    /// Every global value, in registration order
    pub fn iter() -> Vec<GlobalValue> {
        ensure_builtins();
        GLOBALS.with(|g| g.borrow().clone())
    }

    /// Restore `name` to its registered value
    pub fn try_reset_initial_value(name: &str) -> KernelResult<()> {
        let initial = Self::iter()
            .into_iter()
            .find(|v| v.name == name)
            .map(|v| v.initial_value)
            .ok_or_else(|| unknown(name))?;
        Self::try_bind(name, initial)
    }

    /// Restore every global value to its registered value
    pub fn reset_all() {
        for global in Self::iter() {
            Self::try_bind(&global.name, global.initial_value).ok();
        }
    }

    /// Current value as text
    pub fn serialized(&self) -> String {
        self.value.serialize_to_string(&self.checker)
    }
}

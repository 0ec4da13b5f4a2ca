//! Error types for the simulation kernel

use thiserror::Error;

/// Kernel errors
///
/// Configuration errors have strict and fail-safe flavours at the public
/// surface. Lifecycle and scheduling errors are always fatal there.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    // Configuration errors
    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Unknown attribute {name} on {type_name}")]
    UnknownAttribute { type_name: String, name: String },

    #[error("Obsolete attribute {name} on {type_name}")]
    ObsoleteAttribute { type_name: String, name: String },

    #[error("Type mismatch for {name}: expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Value {value} out of range for {name} ({range})")]
    OutOfRange {
        name: String,
        value: String,
        range: String,
    },

    #[error("Malformed value \"{value}\" for {expected}")]
    MalformedValue { expected: String, value: String },

    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Attribute or trace source {name} already declared in the chain of {type_name}")]
    AttributeConflict { type_name: String, name: String },

    #[error("Aggregate already contains an object of type {0}")]
    AggregateTypeConflict(String),

    #[error("Path matched no object: {0}")]
    PathNoMatch(String),

    // Lifecycle errors
    #[error("Type {0} is not constructible")]
    NotConstructible(String),

    #[error("Object of type {0} already disposed")]
    AlreadyDisposed(String),

    #[error("Initialization loop on object of type {0}")]
    InitializationLoop(String),

    // Scheduling errors
    #[error("Event scheduled backwards: at {at} ticks, now {now} ticks")]
    ScheduleBackwards { at: i64, now: i64 },

    #[error("Callback signature mismatch on {source_name}: sink is {sink}")]
    SignatureMismatch { source_name: String, sink: String },

    #[error("Simulation kernel destroyed")]
    KernelDestroyed,

    #[error("Time resolution frozen: a time value or event already exists")]
    ResolutionFrozen,

    // Helper errors
    #[error("I/O failure: {0}")]
    IoFailure(String),
}

impl KernelError {
    /// Short name of the error kind, as printed by fatal errors
    pub fn kind(&self) -> &'static str {
        match self {
            KernelError::UnknownType(_) => "UnknownType",
            KernelError::UnknownAttribute { .. } => "UnknownAttribute",
            KernelError::ObsoleteAttribute { .. } => "ObsoleteAttribute",
            KernelError::TypeMismatch { .. } => "TypeMismatch",
            KernelError::OutOfRange { .. } => "OutOfRange",
            KernelError::MalformedValue { .. } => "MalformedValue",
            KernelError::DuplicateName(_) => "DuplicateName",
            KernelError::AttributeConflict { .. } => "AttributeConflict",
            KernelError::AggregateTypeConflict(_) => "AggregateTypeConflict",
            KernelError::PathNoMatch(_) => "PathNoMatch",
            KernelError::NotConstructible(_) => "NotConstructible",
            KernelError::AlreadyDisposed(_) => "AlreadyDisposed",
            KernelError::InitializationLoop(_) => "InitializationLoop",
            KernelError::ScheduleBackwards { .. } => "ScheduleBackwards",
            KernelError::SignatureMismatch { .. } => "SignatureMismatch",
            KernelError::KernelDestroyed => "KernelDestroyed",
            KernelError::ResolutionFrozen => "ResolutionFrozen",
            KernelError::IoFailure(_) => "IoFailure",
        }
    }

    /// Whether the strict surface must treat this error as fatal even when a
    /// fail-safe form exists.
    pub fn is_always_fatal(&self) -> bool {
        matches!(
            self,
            KernelError::NotConstructible(_)
                | KernelError::AlreadyDisposed(_)
                | KernelError::InitializationLoop(_)
                | KernelError::ScheduleBackwards { .. }
                | KernelError::SignatureMismatch { .. }
                | KernelError::KernelDestroyed
        )
    }

    /// Report the error and terminate the current kernel operation.
    ///
    /// The panic carries the kind and message; a test harness captures it
    /// per test case.
    #[track_caller]
    pub fn fatal(self) -> ! {
        tracing::error!(kind = self.kind(), "{}", self);
        panic!("{}: {}", self.kind(), self)
    }

    /// Same as [`fatal`](Self::fatal), with the active config path appended.
    #[track_caller]
    pub fn fatal_at(self, path: &str) -> ! {
        tracing::error!(kind = self.kind(), path, "{}", self);
        panic!("{}: {} (path {})", self.kind(), self, path)
    }
}

impl From<std::io::Error> for KernelError {
    fn from(e: std::io::Error) -> Self {
        KernelError::IoFailure(e.to_string())
    }
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

/// Strict-form helper: unwrap a kernel result or abort with its message.
pub trait OrFatal<T> {
    fn or_fatal(self) -> T;
}

impl<T> OrFatal<T> for KernelResult<T> {
    #[track_caller]
    fn or_fatal(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => e.fatal(),
        }
    }
}

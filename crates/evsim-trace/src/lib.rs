//! evsim Trace - Callbacks and observable signals
//!
//! Models expose signals without knowing their observers:
//! - Callback / ContextCallback: equality-comparable function handles
//! - CallbackBase: the type-erased form carried through config paths
//! - TracedCallback: a multicast point with an arbitrary signature
//! - TracedValue: a variable that reports `(old, new)` on change

pub mod callback;
pub mod traced_callback;
pub mod traced_value;

pub use callback::*;
pub use traced_callback::*;
pub use traced_value::*;

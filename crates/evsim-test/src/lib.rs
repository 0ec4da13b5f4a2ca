//! evsim Test - Fixtures and harnesses for exercising the kernel
//!
//! This crate provides:
//! - Model fixtures (`Node`, `Ipv4`, `NodeList`, the sample type `T`)
//! - A trace recorder keyed by time, context and source path
//! - A reproducible end-to-end scenario for determinism checks

pub mod fixtures;
pub mod recorder;
pub mod scenario;

pub use fixtures::*;
pub use recorder::*;
pub use scenario::*;

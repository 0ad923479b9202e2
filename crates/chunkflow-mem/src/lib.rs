#![forbid(unsafe_code)]
//! chunkflow-mem: hard memory budgeting for column buffers.
//!
//! This crate provides the concrete implementation of the *interfaces* defined
//! in `chunkflow-core::budget`. Every builder allocation in the engine goes
//! through a `MemoryBudgetImpl` so the cap is enforced with RAII guards and a
//! leak shows up as non-zero `used_bytes()` once everything is dropped.

pub mod error;
pub mod guard;
pub mod tracking;

pub use guard::{BudgetGuardImpl, MemoryBudgetImpl};
pub use tracking::PeakTracker;

//! Application layer containing the core business logic orchestration.
//!
//! `ResolutionEngine` drives pending rounds to their terminal state,
//! `TransactionalRunner` wraps a run in a single commit-or-discard unit of
//! work, and `ReminderFlow` is the read-only pre-draw announcement job.

pub mod capacity;
pub mod engine;
pub mod reminder;
pub mod runner;

//! Sequential workflow execution engine.
//!
//! Composes multi-step operations out of discrete units of work. A
//! [`Workflow`] is an ordered, fixed-at-start sequence of [`Task`]s; the
//! [`WorkflowManager`] drives it forward one task at a time, wiring task
//! outputs into later tasks' inputs via an [`InputMapping`] and applying
//! bounded-retry, fail-fast failure policy.
//!
//! # Main types
//!
//! - [`Task`] — A named unit of work with dynamic input/output bags, a
//!   status, and retry bookkeeping.
//! - [`Workflow`] — An ordered task sequence plus a cursor and overall state.
//! - [`WorkflowBuilder`] — Fluent builder for assembling workflows.
//! - [`InputMapping`] — Static name-based table wiring task outputs to
//!   downstream task inputs.
//! - [`TaskExecutor`] — The async execution contract implemented by the
//!   consuming application.
//! - [`WorkflowManager`] — The sequential driver applying mapping, retry,
//!   and stop semantics.

/// Task execution contract and closure adapter.
pub mod executor;
/// Output-to-input wiring tables.
pub mod mapping;
/// Sequential workflow driver.
pub mod manager;
/// Task record and per-task state machine.
pub mod task;
/// Workflow record, state, and builder.
pub mod workflow;

pub use executor::{FnExecutor, TaskExecutor};
pub use mapping::InputMapping;
pub use manager::WorkflowManager;
pub use task::{Task, TaskStatus};
pub use workflow::{Workflow, WorkflowBuilder, WorkflowState};

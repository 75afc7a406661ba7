#![forbid(missing_docs)]
//! # `prins`
//! Infers a guarded finite-state model of a multi-component software system
//! from structured execution logs.
//!
//! The pipeline (see [`pipeline::Pipeline`]) projects a corpus of traces onto
//! per-component sub-logs, hands each sub-log to a pluggable
//! [`CompLearner`](internal::complearner::CompLearner) to infer a
//! (possibly non-deterministic) per-component model, stitches each trace's
//! slices of those models end to end, unions the per-trace models into one
//! system-level automaton, and determinizes the result. Log ingestion,
//! template mining, and a CLI are explicitly out of scope: callers supply an
//! already-parsed [`log_entry::Trace`] corpus and a `CompLearner`
//! implementation of their choosing.

/// Pipeline-wide configuration (worker pool size, timeouts, determinization
/// strategy, partial-result policy).
pub mod config;

/// Error types for the crate.
pub mod errors;

/// The guard expression grammar, AST, and evaluator.
pub mod guard;

/// Opaque identifiers (`ComponentId`, `ExecId`, `TemplateId`, `StateAtom`).
pub mod ids;

/// The data model: log entries, traces, and timestamps.
pub mod log_entry;

/// The pipeline driver and its report type.
pub mod pipeline;

/// The module with internal automaton machinery. Not part of the public API.
mod internal;

pub use internal::complearner::{
    CompLearner, LearnerRequest, MockCompLearner, RawAutomaton, SubprocessCompLearner,
};
pub use internal::dfa::Dfa;
pub use internal::nfa::Nfa;
pub use internal::state::StateId;

//! Error types for the `prins` crate.

use thiserror::Error;

use crate::ids::{ComponentId, ExecId};

/// The result type for the `prins` crate.
pub type Result<T> = std::result::Result<T, PrinsError>;

/// The error type for the `prins` crate.
#[derive(Error, Debug)]
pub struct PrinsError {
    /// The source of the error.
    pub source: Box<PrinsErrorKind>,
}

impl PrinsError {
    /// Create a new `PrinsError`.
    pub fn new(kind: PrinsErrorKind) -> Self {
        PrinsError {
            source: Box::new(kind),
        }
    }

    /// True if this error is fatal to the whole pipeline (a [`StructuralError`]).
    pub fn is_fatal(&self) -> bool {
        matches!(*self.source, PrinsErrorKind::Structural(_))
    }
}

impl std::fmt::Display for PrinsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl From<PrinsErrorKind> for PrinsError {
    fn from(kind: PrinsErrorKind) -> Self {
        PrinsError::new(kind)
    }
}

impl From<StructuralError> for PrinsError {
    fn from(error: StructuralError) -> Self {
        PrinsError::new(PrinsErrorKind::Structural(error))
    }
}

impl From<LearnerError> for PrinsError {
    fn from(error: LearnerError) -> Self {
        PrinsError::new(PrinsErrorKind::Learner(error))
    }
}

impl From<std::io::Error> for PrinsError {
    fn from(error: std::io::Error) -> Self {
        PrinsError::new(PrinsErrorKind::Io(error))
    }
}

/// The error kind type.
#[derive(Error, Debug)]
pub enum PrinsErrorKind {
    /// An error that invalidates the automaton model itself; fatal, aborts the pipeline.
    #[error(transparent)]
    Structural(StructuralError),

    /// A recoverable per-component error from the `CompLearner` collaborator.
    #[error(transparent)]
    Learner(LearnerError),

    /// Standard determinization exceeded its wall-clock budget.
    #[error("standard determinization exceeded its {0:?} timeout")]
    DeterminizationTimeout(std::time::Duration),

    /// Slicing could not advance even with `ignore_guard=true`.
    #[error("trace {exec_id} rejected while slicing component {component}: no matching transition for template {tid}")]
    TraceRejected {
        /// The execution whose trace could not be sliced.
        exec_id: ExecId,
        /// The component automaton being sliced.
        component: ComponentId,
        /// The template id of the log entry that had no matching transition.
        tid: String,
    },

    /// A std::io error occurred.
    #[error(transparent)]
    Io(std::io::Error),
}

/// Errors that invalidate the structural invariants of an automaton (spec.md §3, §7).
#[derive(Error, Debug)]
pub enum StructuralError {
    /// A transition's destination set was empty.
    #[error("empty transition image for state {0} on symbol {1}")]
    EmptyTransitionImage(String, String),

    /// A DFA operation was invoked on a state that has more than one matching transition.
    #[error("non-deterministic state {0} found where a deterministic one was required")]
    NonDeterministicState(String),

    /// More than one guard matched the same `(state, tid)` pair for the same values.
    #[error("overlapping guards matched state {state} template {tid} simultaneously")]
    OverlappingGuards {
        /// The source state.
        state: String,
        /// The template id with ambiguous guards.
        tid: String,
    },

    /// A guard referenced a positional variable that has no bound value.
    #[error("guard references var{0} but only {1} value(s) were bound")]
    UnboundGuardVariable(usize, usize),

    /// A guard compared a variable against an operand of an incompatible shape.
    #[error("guard type mismatch: {0}")]
    GuardTypeMismatch(String),

    /// `merge_states`/`append`/etc. was called with a malformed argument.
    #[error("invalid operation argument: {0}")]
    InvalidArgument(String),
}

/// Errors raised by a [`crate::internal::complearner::CompLearner`] invocation.
#[derive(Error, Debug)]
pub enum LearnerError {
    /// The learner did not finish within its allotted wall-clock budget.
    #[error("CompLearner for component {0} exceeded its {1:?} timeout")]
    Timeout(ComponentId, std::time::Duration),

    /// The learner process exited with a non-zero status.
    #[error("CompLearner for component {0} exited with status {1}")]
    NonZeroExit(ComponentId, i32),

    /// The learner's output could not be parsed as a guarded automaton.
    #[error("CompLearner output for component {0} was malformed: {1}")]
    MalformedOutput(ComponentId, String),

    /// Spawning or communicating with the learner process failed.
    #[error("CompLearner for component {0} failed to run: {1}")]
    ProcessError(ComponentId, std::io::Error),
}

//! Pipeline configuration (spec.md §6).

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The determinization strategy applied to the unioned system model (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeterminizeStrategy {
    /// Subset construction. Always correct, can be exponential in the worst case.
    Standard,
    /// Repeated state merging until no non-determinism remains, ignoring
    /// transition order.
    Heuristic,
    /// Bounded BFS-style merging up to `k` merges per state, then falls
    /// back to `Standard` for the residue. `HybridK(0)` is exactly `Standard`.
    HybridK(u32),
}

/// What to do when one component's model inference fails (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PartialResultPolicy {
    /// Abort the whole pipeline run.
    Abort,
    /// Drop the failing component and any trace that passes through it,
    /// continuing with the rest.
    SkipComponent,
}

/// Pipeline-wide configuration (spec.md §6).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PipelineConfig {
    /// Upper bound on concurrently running `CompLearner` invocations (C8 step 2).
    pub worker_pool_size: usize,
    /// Wall-clock budget for a single component's `CompLearner` invocation.
    #[cfg_attr(feature = "serde", serde(with = "duration_secs"))]
    pub learner_timeout: Duration,
    /// Wall-clock budget for standard (subset construction) determinization.
    #[cfg_attr(feature = "serde", serde(with = "duration_secs"))]
    pub standard_determinize_timeout: Duration,
    /// The external inference tool's own history-window parameter.
    pub complearner_k: u32,
    /// When `true`, event parameter values are not encoded for inference, so
    /// the resulting model has no guards.
    pub ignore_values: bool,
    /// Which determinization strategy to apply to the unioned system model,
    /// or `None` to stop after the system NFA (spec.md §4.8 step 6:
    /// "On request, determinize with the chosen strategy"; spec.md §6
    /// Output: "The system NFA ... and, optionally, a DFA").
    pub determinize_strategy: Option<DeterminizeStrategy>,
    /// Behavior when one component's inference fails.
    pub partial_result_policy: PartialResultPolicy,
    /// Require each `CompLearner` invocation to hand back a deterministic
    /// per-component model (spec.md §4.3's determinism contract), which is
    /// also the slicer's precondition (spec.md §4.5: "`M` has no
    /// non-deterministic state"). `true` by default; set `false` only when
    /// a `CompLearner` implementation is known to already return
    /// deterministic models and the extra determinization pass is wasted
    /// work.
    pub require_deterministic_components: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            worker_pool_size: 4,
            learner_timeout: Duration::from_secs(3600),
            standard_determinize_timeout: Duration::from_secs(1800),
            complearner_k: 2,
            ignore_values: false,
            determinize_strategy: Some(DeterminizeStrategy::HybridK(1)),
            partial_result_policy: PartialResultPolicy::Abort,
            require_deterministic_components: true,
        }
    }
}

#[cfg(feature = "serde")]
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        value.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_strategy_is_hybrid_one() {
        let config = PipelineConfig::default();
        assert_eq!(config.determinize_strategy, Some(DeterminizeStrategy::HybridK(1)));
        assert_eq!(config.partial_result_policy, PartialResultPolicy::Abort);
    }

    #[test]
    fn standard_determinize_timeout_defaults_to_spec_value() {
        let config = PipelineConfig::default();
        assert_eq!(config.standard_determinize_timeout, Duration::from_secs(1800));
    }

    #[test]
    fn require_deterministic_components_defaults_to_true() {
        let config = PipelineConfig::default();
        assert!(config.require_deterministic_components);
    }
}

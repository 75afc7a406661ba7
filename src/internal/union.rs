//! The NFA union builder (spec.md §4.6).
//!
//! One per-execution stitched trace model exists per trace in the corpus;
//! `union` folds them all into a single system-level NFA by shifting each
//! operand's state space clear of the others, then merging their initial
//! states into one composite start.

use std::collections::BTreeSet;

use crate::internal::automaton::Automaton;
use crate::internal::nfa::Nfa;
use crate::internal::state::StateId;

/// Union a non-empty list of per-trace NFAs into one system-level NFA.
pub fn union(models: &[Nfa]) -> Nfa {
    if models.is_empty() {
        return Nfa::new(StateId::from(0));
    }
    if models.len() == 1 {
        return models[0].clone();
    }

    let mut offset = 0u32;
    let mut renamed = Vec::with_capacity(models.len());
    for model in models {
        renamed.push(model.rename_states(offset));
        offset += model.core().state_count() as u32;
    }

    let initials: Vec<StateId> = renamed.iter().map(|m| m.initial().clone()).collect();
    let merged_initial = StateId::merge(initials.iter());
    let initials_set: BTreeSet<&StateId> = initials.iter().collect();
    let rewrite = |s: &StateId| {
        if initials_set.contains(s) {
            merged_initial.clone()
        } else {
            s.clone()
        }
    };

    let mut core = Automaton::new(renamed[0].core().map_states(rewrite).initial().clone());
    for model in &renamed {
        core.absorb(&model.core().map_states(rewrite));
    }

    Nfa::from_core(core)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TemplateId;
    use crate::log_entry::{LogEntry, Timestamp};

    fn tid(s: &str) -> TemplateId {
        TemplateId::from(s)
    }

    #[test]
    fn union_of_single_model_accepts_same_traces() {
        let mut a = Nfa::new(StateId::from(0));
        a.add_transition(StateId::from(0), (tid("T1"), None), StateId::from(1));
        a.add_final(StateId::from(1));

        let unioned = union(std::slice::from_ref(&a));
        let trace = vec![LogEntry::new(Timestamp::new(0), "c", "T1", vec![])];
        assert!(unioned.accepts(&trace).unwrap());
    }

    #[test]
    fn union_of_two_models_accepts_either_trace() {
        let mut a = Nfa::new(StateId::from(0));
        a.add_transition(StateId::from(0), (tid("T1"), None), StateId::from(1));
        a.add_final(StateId::from(1));

        let mut b = Nfa::new(StateId::from(0));
        b.add_transition(StateId::from(0), (tid("T2"), None), StateId::from(1));
        b.add_final(StateId::from(1));

        let unioned = union(&[a, b]);
        let trace_a = vec![LogEntry::new(Timestamp::new(0), "c", "T1", vec![])];
        let trace_b = vec![LogEntry::new(Timestamp::new(0), "c", "T2", vec![])];
        assert!(unioned.accepts(&trace_a).unwrap());
        assert!(unioned.accepts(&trace_b).unwrap());
    }
}

//! The guarded NFA (spec.md §4.2).
//!
//! Per-component automata, per-trace slices, and the unioned system model
//! are all represented as an [`Nfa`]; determinization (`internal::determinize`)
//! is what eventually produces a [`crate::internal::dfa::Dfa`].

use std::collections::BTreeSet;

use itertools::Itertools;

use crate::errors::{Result, StructuralError};
use crate::guard;
use crate::ids::TemplateId;
use crate::internal::automaton::{Automaton, Symbol};
use crate::internal::state::StateId;
use crate::log_entry::Trace;

/// A non-deterministic guarded automaton.
#[derive(Debug, Clone)]
pub struct Nfa {
    core: Automaton,
}

impl Nfa {
    /// Create a new NFA with just an initial state.
    pub fn new(initial: StateId) -> Self {
        Nfa {
            core: Automaton::new(initial),
        }
    }

    /// Build an `Nfa` around an already-populated [`Automaton`].
    pub fn from_core(core: Automaton) -> Self {
        Nfa { core }
    }

    /// Borrow the shared storage (used by `determinize` and `dot`).
    pub fn core(&self) -> &Automaton {
        &self.core
    }

    /// Mutably borrow the shared storage.
    pub fn core_mut(&mut self) -> &mut Automaton {
        &mut self.core
    }

    /// The initial state.
    pub fn initial(&self) -> &StateId {
        self.core.initial()
    }

    /// Register a transition `from --(tid, guard)--> to`.
    pub fn add_transition(&mut self, from: StateId, symbol: Symbol, to: StateId) {
        self.core.add_transition(from, symbol, to);
    }

    /// Mark `state` as accepting.
    pub fn add_final(&mut self, state: StateId) {
        self.core.add_final(state);
    }

    /// The set of destination states reachable from any state in `from` by
    /// a transition whose template matches `tid` and whose guard (if any)
    /// evaluates true against `values_literal`.
    pub fn guarded_transition(
        &self,
        from: &BTreeSet<StateId>,
        tid: &TemplateId,
        values_literal: &str,
    ) -> Result<BTreeSet<StateId>> {
        let mut out = BTreeSet::new();
        for state in from {
            for ((edge_tid, guard), to) in self.core.transitions_from(state) {
                if edge_tid != tid {
                    continue;
                }
                if guard::evaluate(guard.as_ref(), values_literal)? {
                    out.insert(to.clone());
                }
            }
        }
        Ok(out)
    }

    /// Run `trace` through the automaton, following every non-deterministic
    /// branch in lockstep (the classic subset-of-states simulation).
    /// Returns `true` iff some branch ends in an accepting state.
    pub fn accepts(&self, trace: &Trace) -> Result<bool> {
        let mut current: BTreeSet<StateId> = BTreeSet::new();
        current.insert(self.core.initial().clone());
        for entry in trace {
            let values = entry.values_literal();
            let next = self.guarded_transition(&current, &entry.tid, &values)?;
            if next.is_empty() {
                return Ok(false);
            }
            current = next;
        }
        Ok(current.iter().any(|s| self.core.is_final(s)))
    }

    /// States where one exact alphabet symbol (template id and guard both)
    /// reaches more than one destination — the NFA's genuine
    /// non-determinism, distinct from legitimate guard branching on a
    /// shared template id.
    pub fn find_non_deterministic_states(&self) -> Vec<StateId> {
        self.core
            .ambiguous_states()
            .into_iter()
            .map(|(state, _)| state)
            .collect()
    }

    /// Assign fresh names `i + padding` to each state, in naturally-sorted
    /// order (spec.md §4.2). This reindexes to a dense range rather than
    /// merely shifting existing atom values, so `rename_states(padding)`
    /// always yields states `[padding, padding + |Q|)` regardless of how
    /// sparse or composite the original state ids were. Used to make two
    /// automata's state spaces disjoint before `append`/`union`.
    pub fn rename_states(&self, padding: u32) -> Nfa {
        let states: Vec<StateId> = self.core.states().cloned().sorted().collect();
        let mapping: std::collections::HashMap<StateId, StateId> = states
            .into_iter()
            .enumerate()
            .map(|(i, s)| (s, StateId::from(i as u32 + padding)))
            .collect();
        let core = self
            .core
            .map_states(|s| mapping.get(s).cloned().expect("every state was indexed"));
        Nfa { core }
    }

    /// Collapse every state (atomic or composite) to a fresh sequential
    /// atom, in the automaton's natural structural order. Purely cosmetic —
    /// used once, after the system-wide union, to keep state names small.
    pub fn shorten_states(&self) -> Nfa {
        self.rename_states(0)
    }

    /// Replace every occurrence of the states in `group` with one composite
    /// state (spec.md §4.2's `merge_states`). The caller is responsible for
    /// ensuring `group` is non-empty.
    pub fn merge_states(&self, group: &[StateId]) -> Result<Nfa> {
        if group.is_empty() {
            return Err(StructuralError::InvalidArgument(
                "merge_states requires at least one state".into(),
            )
            .into());
        }
        let merged = StateId::merge(group.iter());
        let group_set: BTreeSet<&StateId> = group.iter().collect();
        let rewrite = |s: &StateId| {
            if group_set.contains(s) {
                merged.clone()
            } else {
                s.clone()
            }
        };
        let core = self.core.map_states(rewrite);
        Ok(Nfa { core })
    }

    /// Append `other` after `self`: every final state of `self` gains an
    /// epsilon-free bridge by redirecting onto `other`'s initial state, and
    /// `self`'s finals are replaced by `other`'s (spec.md §4.5).
    ///
    /// Internally reindexes `self` to a dense `[0, |Q_self|)` range and
    /// `other` to the disjoint `[|Q_self|, |Q_self|+|Q_other|)` range above
    /// it before bridging, so callers never need to pre-rename `other`
    /// themselves — two component models that happen to reuse the same
    /// small state ids (e.g. both starting at state `0`) cannot be
    /// conflated by the bridge-state rewrite below.
    pub fn append(&self, other: &Nfa) -> Nfa {
        let self_dense = self.rename_states(0);
        let padding = self_dense.core.state_count() as u32;
        let other_dense = other.rename_states(padding);

        let bridge_target = other_dense.core.initial().clone();
        let finals: Vec<StateId> = self_dense.core.finals().iter().cloned().collect();
        let merged_bridge = if finals.is_empty() {
            bridge_target.clone()
        } else {
            let mut all = finals.clone();
            all.push(bridge_target.clone());
            StateId::merge(all.iter())
        };

        let rewrite = |s: &StateId| {
            if finals.contains(s) || s == &bridge_target {
                merged_bridge.clone()
            } else {
                s.clone()
            }
        };

        let mut core = self_dense.core.map_states(rewrite);
        // self's finals are superseded by other's finals; drop them before absorbing.
        let mut core_no_finals = Automaton::new(core.initial().clone());
        for state in core.states() {
            core_no_finals.add_state(state.clone());
        }
        for (from, symbol, to) in core.edges() {
            core_no_finals.add_transition(from.clone(), symbol.clone(), to.clone());
        }
        core = core_no_finals;

        let other_core = other_dense.core.map_states(rewrite);
        core.absorb(&other_core);
        Nfa { core }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_entry::{LogEntry, Timestamp};

    fn tid(s: &str) -> TemplateId {
        TemplateId::from(s)
    }

    #[test]
    fn accepts_simple_linear_trace() {
        let mut nfa = Nfa::new(StateId::from(0));
        nfa.add_transition(StateId::from(0), (tid("T1"), None), StateId::from(1));
        nfa.add_final(StateId::from(1));

        let trace = vec![LogEntry::new(Timestamp::new(0), "c", "T1", vec![])];
        assert!(nfa.accepts(&trace).unwrap());
    }

    #[test]
    fn rejects_when_no_transition_matches() {
        let mut nfa = Nfa::new(StateId::from(0));
        nfa.add_transition(StateId::from(0), (tid("T1"), None), StateId::from(1));
        nfa.add_final(StateId::from(1));

        let trace = vec![LogEntry::new(Timestamp::new(0), "c", "T2", vec![])];
        assert!(!nfa.accepts(&trace).unwrap());
    }

    #[test]
    fn guard_restricts_transition() {
        let mut nfa = Nfa::new(StateId::from(0));
        let guard = guard::GuardExpr::parse("var0 == \"ok\"").unwrap();
        nfa.add_transition(StateId::from(0), (tid("T1"), Some(guard)), StateId::from(1));
        nfa.add_final(StateId::from(1));

        let accepted = vec![LogEntry::new(Timestamp::new(0), "c", "T1", vec!["ok".into()])];
        assert!(nfa.accepts(&accepted).unwrap());

        let rejected = vec![LogEntry::new(Timestamp::new(0), "c", "T1", vec!["bad".into()])];
        assert!(!nfa.accepts(&rejected).unwrap());
    }

    #[test]
    fn rename_states_shifts_atoms() {
        let mut nfa = Nfa::new(StateId::from(0));
        nfa.add_transition(StateId::from(0), (tid("T1"), None), StateId::from(1));
        let renamed = nfa.rename_states(10);
        assert_eq!(renamed.initial(), &StateId::from(10));
    }

    #[test]
    fn merge_states_collapses_group() {
        let mut nfa = Nfa::new(StateId::from(0));
        nfa.add_transition(StateId::from(0), (tid("T1"), None), StateId::from(1));
        nfa.add_transition(StateId::from(0), (tid("T2"), None), StateId::from(2));
        let merged = nfa
            .merge_states(&[StateId::from(1), StateId::from(2)])
            .unwrap();
        let dest_t1 = merged
            .guarded_transition(
                &BTreeSet::from([StateId::from(0)]),
                &tid("T1"),
                "[]",
            )
            .unwrap();
        let dest_t2 = merged
            .guarded_transition(
                &BTreeSet::from([StateId::from(0)]),
                &tid("T2"),
                "[]",
            )
            .unwrap();
        assert_eq!(dest_t1, dest_t2);
    }

    #[test]
    fn append_bridges_finals_to_next_initial() {
        let mut a = Nfa::new(StateId::from(0));
        a.add_transition(StateId::from(0), (tid("T1"), None), StateId::from(1));
        a.add_final(StateId::from(1));

        let mut b = Nfa::new(StateId::from(1));
        b.add_transition(StateId::from(1), (tid("T2"), None), StateId::from(2));
        b.add_final(StateId::from(2));

        let combined = a.append(&b);
        let trace = vec![
            LogEntry::new(Timestamp::new(0), "c", "T1", vec![]),
            LogEntry::new(Timestamp::new(1), "c", "T2", vec![]),
        ];
        assert!(combined.accepts(&trace).unwrap());
    }

    #[test]
    fn append_does_not_conflate_operands_reusing_the_same_state_ids() {
        // Two independently-numbered component models that both happen to
        // use states 0,1,2 (the common case: every CompLearner invocation
        // starts its own automaton numbering from 0). Appending must not
        // let `other`'s reused ids collide with `self`'s.
        let mut a = Nfa::new(StateId::from(0));
        a.add_transition(StateId::from(0), (tid("LOGIN"), None), StateId::from(1));
        a.add_transition(StateId::from(1), (tid("AUTHORIZED"), None), StateId::from(2));
        a.add_final(StateId::from(2));

        let mut b = Nfa::new(StateId::from(0));
        b.add_transition(StateId::from(0), (tid("QUERY"), None), StateId::from(1));
        b.add_transition(StateId::from(1), (tid("RESULT"), None), StateId::from(2));
        b.add_final(StateId::from(2));

        let combined = a.append(&b);

        let in_order = vec![
            LogEntry::new(Timestamp::new(0), "c", "LOGIN", vec![]),
            LogEntry::new(Timestamp::new(1), "c", "AUTHORIZED", vec![]),
            LogEntry::new(Timestamp::new(2), "c", "QUERY", vec![]),
            LogEntry::new(Timestamp::new(3), "c", "RESULT", vec![]),
        ];
        assert!(combined.accepts(&in_order).unwrap());

        let swapped = vec![
            LogEntry::new(Timestamp::new(0), "c", "QUERY", vec![]),
            LogEntry::new(Timestamp::new(1), "c", "RESULT", vec![]),
            LogEntry::new(Timestamp::new(2), "c", "LOGIN", vec![]),
            LogEntry::new(Timestamp::new(3), "c", "AUTHORIZED", vec![]),
        ];
        assert!(!combined.accepts(&swapped).unwrap());
    }
}

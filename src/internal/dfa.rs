//! The guarded DFA (spec.md §4.2, §4.7).
//!
//! A `Dfa` is validated at construction time: every state must have at most
//! one outgoing transition per exact alphabet symbol, and an unconditional
//! transition may not share a template id with any other transition, or
//! construction fails with a [`StructuralError`]. This is the type
//! determinization (`internal::determinize`) produces.

use std::collections::{BTreeMap, HashMap, VecDeque};

use itertools::Itertools;

use crate::errors::{Result, StructuralError};
use crate::guard;
use crate::ids::TemplateId;
use crate::internal::automaton::Automaton;
use crate::internal::state::StateId;
use crate::log_entry::Trace;

/// A deterministic guarded automaton.
#[derive(Debug, Clone)]
pub struct Dfa {
    core: Automaton,
}

impl Dfa {
    /// Validate and wrap an [`Automaton`] as a `Dfa`.
    ///
    /// Two static checks, neither of which requires proving two guard
    /// expressions mutually exclusive:
    ///
    /// - the same exact symbol (template id *and* guard) reaching more than
    ///   one destination is unconditionally ambiguous
    ///   ([`StructuralError::NonDeterministicState`]);
    /// - an unconditional transition (no guard, matches any value)
    ///   coexisting with any other transition on the same template id is
    ///   guaranteed to overlap for every input the other transition accepts
    ///   ([`StructuralError::OverlappingGuards`]).
    ///
    /// Two transitions on the same template id that both carry *distinct*
    /// guards are accepted here; overlap between them (if any) is only
    /// detectable against concrete input values and is caught by
    /// [`Dfa::guarded_transition`] at evaluation time instead.
    pub fn from_core(core: Automaton) -> Result<Self> {
        if let Some((state, _symbol)) = core.ambiguous_states().into_iter().next() {
            return Err(StructuralError::NonDeterministicState(state.to_string()).into());
        }
        for (state, tid, guards) in core.same_template_guard_groups() {
            if guards.iter().any(Option::is_none) {
                return Err(StructuralError::OverlappingGuards {
                    state: state.to_string(),
                    tid: tid.to_string(),
                }
                .into());
            }
        }
        Ok(Dfa { core })
    }

    /// Borrow the shared storage (used by `dot`/tests).
    pub fn core(&self) -> &Automaton {
        &self.core
    }

    /// The initial state.
    pub fn initial(&self) -> &StateId {
        self.core.initial()
    }

    /// The unique destination reachable from `from` on `tid`, if `guard`
    /// (if any) is satisfied by `values_literal`.
    ///
    /// `from_core` only rejects *statically* guaranteed overlap; two
    /// distinctly-guarded transitions on the same template id are
    /// permitted past construction and can still both match one concrete
    /// set of values if they are not actually disjoint. When that happens
    /// here, at evaluation time, it is reported as
    /// [`StructuralError::OverlappingGuards`] rather than silently taking
    /// whichever transition happened to be stored first.
    pub fn guarded_transition(
        &self,
        from: &StateId,
        tid: &TemplateId,
        values_literal: &str,
    ) -> Result<Option<StateId>> {
        let mut dest: Option<&StateId> = None;
        for ((edge_tid, guard), to) in self.core.transitions_from(from) {
            if edge_tid != tid {
                continue;
            }
            if guard::evaluate(guard.as_ref(), values_literal)? {
                match dest {
                    None => dest = Some(to),
                    Some(existing) if existing == to => {}
                    Some(_) => {
                        return Err(StructuralError::OverlappingGuards {
                            state: from.to_string(),
                            tid: tid.to_string(),
                        }
                        .into())
                    }
                }
            }
        }
        Ok(dest.cloned())
    }

    /// Run `trace` through the automaton. Returns `true` iff it ends on an
    /// accepting state.
    pub fn accepts(&self, trace: &Trace) -> Result<bool> {
        let mut current = self.core.initial().clone();
        for entry in trace {
            let values = entry.values_literal();
            match self.guarded_transition(&current, &entry.tid, &values)? {
                Some(next) => current = next,
                None => return Ok(false),
            }
        }
        Ok(self.core.is_final(&current))
    }

    /// Renumber every state to a small sequential atom, starting at `0`.
    ///
    /// When `consider_set_names` is `true`, the new numbering follows the
    /// existing structural order of the (possibly composite) state ids —
    /// this is the variant used right after subset construction, where the
    /// composite names still carry meaning for debugging. Otherwise states
    /// are numbered in breadth-first visitation order from the initial
    /// state, which is what the heuristic/hybrid determinizers use after
    /// repeated merging has made the composite names unwieldy.
    pub fn shorten_states(&self, consider_set_names: bool) -> Dfa {
        let order: Vec<StateId> = if consider_set_names {
            self.core.states().cloned().sorted().collect()
        } else {
            self.bfs_order()
        };

        let mapping: HashMap<StateId, StateId> = order
            .into_iter()
            .enumerate()
            .map(|(i, s)| (s, StateId::from(i as u32)))
            .collect();

        let core = self.core.map_states(|s| {
            mapping
                .get(s)
                .cloned()
                .unwrap_or_else(|| StateId::from(u32::MAX))
        });
        Dfa { core }
    }

    fn bfs_order(&self) -> Vec<StateId> {
        let mut seen = BTreeMap::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(self.core.initial().clone());
        seen.insert(self.core.initial().clone(), ());
        while let Some(state) = queue.pop_front() {
            order.push(state.clone());
            for (_, to) in self.core.transitions_from(&state) {
                if seen.insert(to.clone(), ()).is_none() {
                    queue.push_back(to.clone());
                }
            }
        }
        // states unreachable from the initial state (shouldn't occur for a
        // well-formed model, but keep the mapping total).
        for state in self.core.states() {
            if !seen.contains_key(state) {
                order.push(state.clone());
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::automaton::Automaton;
    use crate::log_entry::{LogEntry, Timestamp};

    fn tid(s: &str) -> TemplateId {
        TemplateId::from(s)
    }

    #[test]
    fn rejects_ambiguous_unconditional_transitions() {
        let mut core = Automaton::new(StateId::from(0));
        core.add_transition(StateId::from(0), (tid("T1"), None), StateId::from(1));
        core.add_transition(StateId::from(0), (tid("T1"), None), StateId::from(2));
        let err = Dfa::from_core(core).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn rejects_overlapping_guards() {
        let mut core = Automaton::new(StateId::from(0));
        let g = guard::GuardExpr::parse("var0 == \"a\"").unwrap();
        core.add_transition(StateId::from(0), (tid("T1"), Some(g)), StateId::from(1));
        core.add_transition(StateId::from(0), (tid("T1"), None), StateId::from(2));
        let err = Dfa::from_core(core).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn accepts_distinct_guards_on_same_template_as_valid_dfa() {
        // spec.md §8 scenario S1: (s0,(a,var0=="1"))->s1, (s0,(a,var0!="1"))->s2
        // is a valid DFA, not an error, since the two guards are mutually
        // exclusive for any concrete input.
        let mut core = Automaton::new(StateId::from(0));
        let g_eq = guard::GuardExpr::parse("var0==\"1\"").unwrap();
        let g_ne = guard::GuardExpr::parse("var0!=\"1\"").unwrap();
        core.add_transition(StateId::from(0), (tid("a"), Some(g_eq)), StateId::from(1));
        core.add_transition(StateId::from(0), (tid("a"), Some(g_ne)), StateId::from(2));
        core.add_final(StateId::from(1));
        core.add_final(StateId::from(2));
        let dfa = Dfa::from_core(core).unwrap();

        let matches = vec![LogEntry::new(Timestamp::new(0), "c", "a", vec!["1".into()])];
        assert!(dfa.accepts(&matches).unwrap());
        let mismatches = vec![LogEntry::new(Timestamp::new(0), "c", "a", vec!["2".into()])];
        assert!(dfa.accepts(&mismatches).unwrap());
    }

    #[test]
    fn overlapping_distinct_guards_error_at_evaluation_time() {
        let mut core = Automaton::new(StateId::from(0));
        let g1 = guard::GuardExpr::parse("var0==\"1\"").unwrap();
        let g2 = guard::GuardExpr::parse("var0!=\"2\"").unwrap();
        core.add_transition(StateId::from(0), (tid("a"), Some(g1)), StateId::from(1));
        core.add_transition(StateId::from(0), (tid("a"), Some(g2)), StateId::from(2));
        core.add_final(StateId::from(1));
        core.add_final(StateId::from(2));
        let dfa = Dfa::from_core(core).unwrap();

        // "1" satisfies both var0=="1" and var0!="2" -> real overlap.
        let trace = vec![LogEntry::new(Timestamp::new(0), "c", "a", vec!["1".into()])];
        let err = dfa.accepts(&trace).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn accepts_simple_trace() {
        let mut core = Automaton::new(StateId::from(0));
        core.add_transition(StateId::from(0), (tid("T1"), None), StateId::from(1));
        core.add_final(StateId::from(1));
        let dfa = Dfa::from_core(core).unwrap();
        let trace = vec![LogEntry::new(Timestamp::new(0), "c", "T1", vec![])];
        assert!(dfa.accepts(&trace).unwrap());
    }

    #[test]
    fn shorten_states_renumbers_from_zero() {
        let mut core = Automaton::new(StateId::from(7));
        core.add_transition(StateId::from(7), (tid("T1"), None), StateId::from(42));
        core.add_final(StateId::from(42));
        let dfa = Dfa::from_core(core).unwrap();
        let shortened = dfa.shorten_states(false);
        assert_eq!(shortened.initial(), &StateId::from(0));
    }
}

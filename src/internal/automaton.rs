//! Shared storage and bookkeeping for [`crate::internal::nfa::Nfa`] and
//! [`crate::internal::dfa::Dfa`].
//!
//! Both automaton flavors are edge lists keyed by [`StateId`], over a shared
//! alphabet of `(template, guard)` pairs. Keeping the storage in one place
//! means `append`, `merge_states`, and `rename_states` are written once and
//! reused by both the NFA and the subset-construction DFA builder.

use std::collections::{BTreeMap, BTreeSet};

use crate::guard::GuardExpr;
use crate::ids::TemplateId;
use crate::internal::state::StateId;

/// One alphabet symbol: a template id, optionally narrowed by a guard.
pub type Symbol = (TemplateId, Option<GuardExpr>);

/// Shared edge-list storage for a guarded automaton.
#[derive(Debug, Clone)]
pub struct Automaton {
    states: BTreeSet<StateId>,
    initial: StateId,
    finals: BTreeSet<StateId>,
    transitions: BTreeMap<StateId, Vec<(Symbol, StateId)>>,
}

impl Automaton {
    /// Create a new automaton with just an initial state and no finals.
    pub fn new(initial: StateId) -> Self {
        let mut states = BTreeSet::new();
        states.insert(initial.clone());
        Automaton {
            states,
            initial,
            finals: BTreeSet::new(),
            transitions: BTreeMap::new(),
        }
    }

    /// The initial state.
    pub fn initial(&self) -> &StateId {
        &self.initial
    }

    /// Replace the initial state (used by `union`/`append` after renaming).
    pub fn set_initial(&mut self, state: StateId) {
        self.add_state(state.clone());
        self.initial = state;
    }

    /// Register a state, returning `true` if it was not already present.
    pub fn add_state(&mut self, state: StateId) -> bool {
        self.states.insert(state)
    }

    /// All states, in canonical order.
    pub fn states(&self) -> impl Iterator<Item = &StateId> {
        self.states.iter()
    }

    /// The number of states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Mark a state as accepting. Implicitly registers the state.
    pub fn add_final(&mut self, state: StateId) {
        self.states.insert(state.clone());
        self.finals.insert(state);
    }

    /// True if `state` is accepting.
    pub fn is_final(&self, state: &StateId) -> bool {
        self.finals.contains(state)
    }

    /// The accepting states.
    pub fn finals(&self) -> &BTreeSet<StateId> {
        &self.finals
    }

    /// Add a transition `from --symbol--> to`. Implicitly registers both
    /// endpoints.
    pub fn add_transition(&mut self, from: StateId, symbol: Symbol, to: StateId) {
        self.states.insert(from.clone());
        self.states.insert(to.clone());
        self.transitions.entry(from).or_default().push((symbol, to));
    }

    /// The outgoing transitions of `state`, or an empty slice if it has none.
    pub fn transitions_from(&self, state: &StateId) -> &[(Symbol, StateId)] {
        self.transitions
            .get(state)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All `(from, symbol, to)` edges, in canonical state order.
    pub fn edges(&self) -> impl Iterator<Item = (&StateId, &Symbol, &StateId)> {
        self.transitions
            .iter()
            .flat_map(|(from, edges)| edges.iter().map(move |(sym, to)| (from, sym, to)))
    }

    /// States with an outgoing transition whose destination set, for one
    /// *exact* alphabet symbol (template id and guard both), has more than
    /// one distinct member.
    ///
    /// This is real non-determinism in the `δ: (Q×Σ) ⇀ 𝒫(Q)` sense (spec.md
    /// §3). Two transitions that share a template id but carry different
    /// guards are *not* ambiguous by this definition — they are distinct
    /// symbols, and disambiguating among them by value is the entire point
    /// of a guarded automaton (spec.md §8 scenario S1).
    pub fn ambiguous_states(&self) -> Vec<(StateId, Symbol)> {
        let mut out = Vec::new();
        for (from, edges) in &self.transitions {
            let mut dests: BTreeMap<&Symbol, BTreeSet<&StateId>> = BTreeMap::new();
            for (symbol, to) in edges {
                dests.entry(symbol).or_default().insert(to);
            }
            for (symbol, set) in dests {
                if set.len() > 1 {
                    out.push((from.clone(), symbol.clone()));
                }
            }
        }
        out
    }

    /// Per-state groups of outgoing guards sharing one template id, for
    /// template ids with more than one outgoing symbol.
    ///
    /// Used by [`crate::internal::dfa::Dfa::from_core`] to statically flag
    /// the one combination that is *guaranteed* to overlap for some input —
    /// an unconditional transition (`guard = None`, which matches any
    /// value) coexisting with any other transition on the same template id
    /// — without attempting to prove two distinct guard expressions
    /// mutually exclusive (design notes §9 explicitly forbid that).
    pub fn same_template_guard_groups(&self) -> Vec<(StateId, TemplateId, Vec<Option<GuardExpr>>)> {
        let mut out = Vec::new();
        for (from, edges) in &self.transitions {
            let mut groups: BTreeMap<&TemplateId, Vec<Option<GuardExpr>>> = BTreeMap::new();
            for ((tid, guard), _) in edges {
                groups.entry(tid).or_default().push(guard.clone());
            }
            for (tid, guards) in groups {
                if guards.len() > 1 {
                    out.push((from.clone(), tid.clone(), guards));
                }
            }
        }
        out
    }

    /// Rebuild the automaton with every state id passed through `f`.
    ///
    /// Used by `append` (shift an operand's state space out of the way) and
    /// `union` (the same, per operand) before the edge sets are merged.
    pub fn map_states(&self, f: impl Fn(&StateId) -> StateId) -> Automaton {
        let mut out = Automaton::new(f(&self.initial));
        for state in &self.states {
            out.add_state(f(state));
        }
        for final_state in &self.finals {
            out.add_final(f(final_state));
        }
        for (from, edges) in &self.transitions {
            for (symbol, to) in edges {
                out.add_transition(f(from), symbol.clone(), f(to));
            }
        }
        out
    }

    /// Merge `other`'s states, finals, and transitions into `self` without
    /// renaming anything. Callers are responsible for ensuring the two
    /// automata's state spaces are disjoint (typically via `map_states`
    /// first).
    pub fn absorb(&mut self, other: &Automaton) {
        for state in &other.states {
            self.add_state(state.clone());
        }
        for final_state in &other.finals {
            self.add_final(final_state.clone());
        }
        for (from, edges) in &other.transitions {
            for (symbol, to) in edges {
                self.add_transition(from.clone(), symbol.clone(), to.clone());
            }
        }
    }
}

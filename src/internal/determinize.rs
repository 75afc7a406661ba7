//! Determinization strategies (spec.md §4.7): `standard` (subset
//! construction), `heuristic` (merge until deterministic, ignoring
//! transition order), and `hybrid-k` (bounded BFS merging before falling
//! back to standard).

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::errors::{PrinsErrorKind, Result};
use crate::internal::automaton::Automaton;
use crate::internal::dfa::Dfa;
use crate::internal::nfa::Nfa;
use crate::internal::state::StateId;

/// Subset construction: classic NFA -> DFA, where each DFA state is the set
/// of NFA states reachable by the same input prefix.
pub fn standard_determinize(nfa: &Nfa, timeout: Duration) -> Result<Dfa> {
    let start = Instant::now();
    info!("standard_determinize() ...");

    let core = nfa.core();

    let initial_subset: BTreeSet<StateId> = [nfa.initial().clone()].into_iter().collect();
    let mut dfa_core = Automaton::new(StateId::merge(initial_subset.iter()));

    let mut queue = VecDeque::new();
    queue.push_back(initial_subset);
    let mut visited: BTreeSet<StateId> = BTreeSet::new();
    visited.insert(dfa_core.initial().clone());

    while let Some(subset) = queue.pop_front() {
        if start.elapsed() > timeout {
            return Err(PrinsErrorKind::DeterminizationTimeout(timeout).into());
        }
        let subset_id = StateId::merge(subset.iter());

        if subset.iter().any(|s| core.is_final(s)) {
            dfa_core.add_final(subset_id.clone());
        }

        // group outgoing edges of the whole subset by (tid, guard); two
        // edges with the same template but syntactically different guards
        // stay distinct symbols, matching guard equality being structural.
        let mut by_symbol: BTreeMap<&crate::internal::automaton::Symbol, BTreeSet<StateId>> =
            BTreeMap::new();
        for state in &subset {
            for (symbol, to) in core.transitions_from(state) {
                by_symbol.entry(symbol).or_default().insert(to.clone());
            }
        }
        for (symbol, dest_subset) in by_symbol {
            let dest_id = StateId::merge(dest_subset.iter());
            dfa_core.add_transition(subset_id.clone(), symbol.clone(), dest_id.clone());
            if visited.insert(dest_id) {
                queue.push_back(dest_subset);
            }
        }
    }

    debug!(
        "standard_determinize(): states={}, time={:?}",
        dfa_core.state_count(),
        start.elapsed()
    );

    let dfa = Dfa::from_core(dfa_core)?;
    Ok(dfa.shorten_states(true))
}

/// Repeatedly merge non-deterministic destination sets until none remain,
/// without regard to reachability order.
pub fn heuristic_determinize(nfa: &Nfa) -> Result<Dfa> {
    info!("heuristic_determinize() ...");
    let start = Instant::now();

    let mut working = nfa.clone();
    let mut merged_count = 0usize;
    loop {
        let ambiguous = working.core().ambiguous_states();
        let Some((state, symbol)) = ambiguous.into_iter().next() else {
            break;
        };
        let dests: Vec<StateId> = working
            .core()
            .transitions_from(&state)
            .iter()
            .filter(|(s, _)| s == &symbol)
            .map(|(_, to)| to.clone())
            .collect();
        working = working.merge_states(&dests)?;
        merged_count += dests.len();
    }
    debug!(
        "heuristic_determinize(): merged {merged_count} states, time={:?}",
        start.elapsed()
    );

    let dfa = nfa_to_single_valued_dfa(&working)?;
    Ok(dfa.shorten_states(false))
}

/// Bounded BFS-style merging: starting from the initial state, merge
/// non-deterministic destinations unless the destination has already been
/// merged `per_state_merge_limit` or more times, then fall back to standard
/// determinization for whatever residual non-determinism remains.
///
/// `per_state_merge_limit == 0` skips straight to [`standard_determinize`].
pub fn hybrid_determinize(nfa: &Nfa, per_state_merge_limit: u32, timeout: Duration) -> Result<Dfa> {
    if per_state_merge_limit == 0 {
        return standard_determinize(nfa, timeout);
    }
    info!("hybrid_determinize(k={per_state_merge_limit}) ...");
    let start = Instant::now();

    let mut working = nfa.clone();
    let mut merge_count: BTreeMap<StateId, u32> = BTreeMap::new();
    let mut excluding: BTreeSet<StateId> = BTreeSet::new();
    let mut visited: BTreeSet<StateId> = BTreeSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(working.initial().clone());

    while let Some(current) = queue.pop_front() {
        if visited.contains(&current) {
            continue;
        }
        visited.insert(current.clone());

        let symbols: BTreeSet<crate::internal::automaton::Symbol> = working
            .core()
            .transitions_from(&current)
            .iter()
            .map(|(symbol, _)| symbol.clone())
            .collect();
        for symbol in symbols {
            let dests: Vec<StateId> = working
                .core()
                .transitions_from(&current)
                .iter()
                .filter(|(s, _)| s == &symbol)
                .map(|(_, to)| to.clone())
                .filter(|s| !excluding.contains(s))
                .collect();
            if dests.len() > 1 {
                let merged = working.merge_states(&dests)?;
                let mut max_count = 0;
                for d in &dests {
                    let c = merge_count.remove(d).unwrap_or(0) + 1;
                    max_count = max_count.max(c);
                }
                let merged_id = StateId::merge(dests.iter());
                merge_count.insert(merged_id.clone(), max_count);
                if max_count >= per_state_merge_limit {
                    excluding.insert(merged_id.clone());
                }
                working = merged;
                if !visited.contains(&merged_id) {
                    queue.push_back(merged_id);
                }
            } else if let Some(dest) = dests.into_iter().next() {
                if !visited.contains(&dest) {
                    queue.push_back(dest);
                }
            }
        }
    }

    debug!(
        "(hybrid) heuristic part done, time={:?}, falling back to standard_determinize",
        start.elapsed()
    );
    standard_determinize(&working, timeout)
}

/// Convert an already-deterministic NFA (every `(state, tid)` has at most
/// one destination) into a DFA, popping the singleton destination set.
fn nfa_to_single_valued_dfa(nfa: &Nfa) -> Result<Dfa> {
    let core = nfa.core();
    let mut out = Automaton::new(core.initial().clone());
    for state in core.states() {
        out.add_state(state.clone());
    }
    for state in core.finals() {
        out.add_final(state.clone());
    }
    for (from, symbol, to) in core.edges() {
        out.add_transition(from.clone(), symbol.clone(), to.clone());
    }
    Dfa::from_core(out)
}

//! The slicer & appender (spec.md §4.5).
//!
//! For one execution's trace, [`stitch`] walks each contiguous per-component
//! run through that component's inferred model, recording the path taken as
//! a small linear NFA, then appends the per-component slices end to end.
//! A component model's current position is remembered across non-contiguous
//! visits within the same trace via a [`SliceCursors`] map — mirroring the
//! original's `slice_starting_states` dict, keyed here by component instead
//! of by model identity.

use std::collections::HashMap;

use log::warn;

use crate::errors::{PrinsErrorKind, Result};
use crate::ids::{ComponentId, ExecId};
use crate::internal::automaton::Automaton;
use crate::internal::nfa::Nfa;
use crate::internal::state::StateId;
use crate::log_entry::LogEntry;

/// Per-component cursor into each component model, carried across the
/// non-contiguous visits to the same component within one trace.
pub type SliceCursors = HashMap<ComponentId, StateId>;

/// Build the initial cursor map: every component model starts at its own
/// initial state.
pub fn initial_cursors(models: &HashMap<ComponentId, Nfa>) -> SliceCursors {
    models
        .iter()
        .map(|(component, model)| (component.clone(), model.initial().clone()))
        .collect()
}

/// Slice `component`'s model along `run`, advancing (and persisting) its
/// cursor in `cursors`.
///
/// On the first transition failure, retries ignoring guards entirely (the
/// original's documented workaround for an inference-tool quirk where a
/// guard is occasionally too strict for its own training data). A second
/// failure is fatal to this trace: [`PrinsErrorKind::TraceRejected`].
pub fn slice(
    exec_id: ExecId,
    component: &ComponentId,
    model: &Nfa,
    run: &[LogEntry],
    cursors: &mut SliceCursors,
    ignore_guard_count: &mut u64,
) -> Result<Nfa> {
    debug_assert!(
        model.find_non_deterministic_states().is_empty(),
        "slice requires a deterministic component model, found non-deterministic states in {component}"
    );

    let start = cursors
        .get(component)
        .cloned()
        .unwrap_or_else(|| model.initial().clone());

    let mut core = Automaton::new(start.clone());
    let mut current = start;

    for entry in run {
        let values = entry.values_literal();
        let mut matches: Vec<(crate::internal::automaton::Symbol, StateId)> = Vec::new();
        for (symbol, to) in model.core().transitions_from(&current) {
            let (tid, guard) = symbol;
            if tid != &entry.tid {
                continue;
            }
            if crate::guard::evaluate(guard.as_ref(), &values)? {
                matches.push((symbol.clone(), to.clone()));
            }
        }

        if matches.is_empty() {
            // retry ignoring guards entirely.
            matches = model
                .core()
                .transitions_from(&current)
                .iter()
                .filter(|((tid, _), _)| tid == &entry.tid)
                .cloned()
                .collect();
            if !matches.is_empty() {
                *ignore_guard_count += 1;
                warn!(
                    "slicing component {component} with ignore_guard=true for template {} (exec {exec_id})",
                    entry.tid
                );
            }
        }

        if matches.is_empty() {
            return Err(PrinsErrorKind::TraceRejected {
                exec_id,
                component: component.clone(),
                tid: entry.tid.to_string(),
            }
            .into());
        }

        matches.sort_by(|a, b| a.1.cmp(&b.1));
        let (symbol, next) = matches.into_iter().next().expect("checked non-empty");

        core.add_transition(current.clone(), symbol, next.clone());
        current = next;
    }

    core.add_final(current.clone());
    cursors.insert(component.clone(), current);
    Ok(Nfa::from_core(core))
}

/// Stitch one trace's per-component slices end to end (spec.md §4.5).
///
/// `runs` must be the contiguous per-component runs produced by
/// [`crate::internal::projector::partition_by_component`].
pub fn stitch(
    exec_id: ExecId,
    runs: &[(ComponentId, Vec<LogEntry>)],
    models: &HashMap<ComponentId, Nfa>,
    cursors: &mut SliceCursors,
    ignore_guard_count: &mut u64,
) -> Result<Option<Nfa>> {
    let mut appended: Option<Nfa> = None;
    for (component, run) in runs {
        let model = models.get(component).ok_or_else(|| {
            PrinsErrorKind::TraceRejected {
                exec_id,
                component: component.clone(),
                tid: run.first().map(|e| e.tid.to_string()).unwrap_or_default(),
            }
        })?;
        let sliced = slice(exec_id, component, model, run, cursors, ignore_guard_count)?;
        appended = Some(match appended {
            None => sliced,
            Some(prev) => prev.append(&sliced),
        });
    }
    Ok(appended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TemplateId;
    use crate::log_entry::Timestamp;

    fn tid(s: &str) -> TemplateId {
        TemplateId::from(s)
    }

    fn linear_model(t: &str) -> Nfa {
        let mut nfa = Nfa::new(StateId::from(0));
        nfa.add_transition(StateId::from(0), (tid(t), None), StateId::from(1));
        nfa.add_final(StateId::from(1));
        nfa
    }

    #[test]
    fn slice_follows_matching_transition() {
        let model = linear_model("T1");
        let mut cursors = SliceCursors::new();
        let mut ignored = 0;
        let component = ComponentId::from("auth");
        let run = vec![LogEntry::new(Timestamp::new(0), "auth", "T1", vec![])];
        let sliced = slice(ExecId::new(0), &component, &model, &run, &mut cursors, &mut ignored).unwrap();
        assert!(sliced.accepts(&run).unwrap());
        assert_eq!(ignored, 0);
    }

    #[test]
    fn slice_rejects_when_no_transition_even_ignoring_guard() {
        let model = linear_model("T1");
        let mut cursors = SliceCursors::new();
        let mut ignored = 0;
        let component = ComponentId::from("auth");
        let run = vec![LogEntry::new(Timestamp::new(0), "auth", "T2", vec![])];
        let err = slice(ExecId::new(0), &component, &model, &run, &mut cursors, &mut ignored).unwrap_err();
        assert!(err.is_fatal() || matches!(*err.source, PrinsErrorKind::TraceRejected { .. }));
    }

    #[test]
    fn stitch_appends_slices_across_components() {
        let mut models = HashMap::new();
        models.insert(ComponentId::from("auth"), linear_model("T1"));
        models.insert(ComponentId::from("db"), linear_model("T2"));

        let trace = vec![
            LogEntry::new(Timestamp::new(0), "auth", "T1", vec![]),
            LogEntry::new(Timestamp::new(1), "db", "T2", vec![]),
        ];
        let runs = crate::internal::projector::partition_by_component(&trace);
        let mut cursors = crate::internal::slicer::initial_cursors(&models);
        let mut ignored = 0;
        let appended = stitch(ExecId::new(0), &runs, &models, &mut cursors, &mut ignored)
            .unwrap()
            .unwrap();
        assert!(appended.accepts(&trace).unwrap());
    }
}

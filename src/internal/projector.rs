//! The log projector (spec.md §4.4): splits a system-level trace corpus into
//! per-component sub-logs, and splits one trace into contiguous
//! same-component runs for slicing.

use std::collections::BTreeMap;

use crate::ids::{ComponentId, ExecId};
use crate::log_entry::{LogEntry, Trace};

/// Partition a corpus into per-component sub-logs.
///
/// Each execution's entries are distributed to the sub-log of the component
/// that produced them, preserving the original per-execution order.
pub fn project(
    corpus: &BTreeMap<ExecId, Trace>,
) -> BTreeMap<ComponentId, BTreeMap<ExecId, Trace>> {
    let mut component_logs: BTreeMap<ComponentId, BTreeMap<ExecId, Trace>> = BTreeMap::new();
    for (exec_id, trace) in corpus {
        for entry in trace {
            component_logs
                .entry(entry.component.clone())
                .or_default()
                .entry(*exec_id)
                .or_default()
                .push(entry.clone());
        }
    }
    component_logs
}

/// The distinct components that appear anywhere in the corpus, in sorted order.
pub fn components(corpus: &BTreeMap<ExecId, Trace>) -> Vec<ComponentId> {
    let mut seen: std::collections::BTreeSet<ComponentId> = std::collections::BTreeSet::new();
    for trace in corpus.values() {
        for entry in trace {
            seen.insert(entry.component.clone());
        }
    }
    seen.into_iter().collect()
}

/// Split `trace` into contiguous runs of entries from the same component, in
/// original order.
pub fn partition_by_component(trace: &Trace) -> Vec<(ComponentId, Vec<LogEntry>)> {
    let mut partitions: Vec<(ComponentId, Vec<LogEntry>)> = Vec::new();
    for entry in trace {
        match partitions.last_mut() {
            Some((component, run)) if *component == entry.component => run.push(entry.clone()),
            _ => partitions.push((entry.component.clone(), vec![entry.clone()])),
        }
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_entry::Timestamp;

    fn entry(ts: u64, component: &str, tid: &str) -> LogEntry {
        LogEntry::new(Timestamp::new(ts), component, tid, vec![])
    }

    #[test]
    fn project_groups_entries_by_component() {
        let mut corpus = BTreeMap::new();
        corpus.insert(
            ExecId::new(0),
            vec![entry(0, "auth", "T1"), entry(1, "db", "T2"), entry(2, "auth", "T3")],
        );
        let projected = project(&corpus);
        assert_eq!(projected.len(), 2);
        assert_eq!(projected[&ComponentId::from("auth")][&ExecId::new(0)].len(), 2);
        assert_eq!(projected[&ComponentId::from("db")][&ExecId::new(0)].len(), 1);
    }

    #[test]
    fn partition_by_component_splits_contiguous_runs() {
        let trace = vec![
            entry(0, "auth", "T1"),
            entry(1, "auth", "T2"),
            entry(2, "db", "T3"),
            entry(3, "auth", "T4"),
        ];
        let partitions = partition_by_component(&trace);
        assert_eq!(partitions.len(), 3);
        assert_eq!(partitions[0].0, ComponentId::from("auth"));
        assert_eq!(partitions[0].1.len(), 2);
        assert_eq!(partitions[1].0, ComponentId::from("db"));
        assert_eq!(partitions[2].0, ComponentId::from("auth"));
        assert_eq!(partitions[2].1.len(), 1);
    }

    #[test]
    fn components_lists_distinct_sorted() {
        let mut corpus = BTreeMap::new();
        corpus.insert(ExecId::new(0), vec![entry(0, "db", "T1"), entry(1, "auth", "T2")]);
        let comps = components(&corpus);
        assert_eq!(comps, vec![ComponentId::from("auth"), ComponentId::from("db")]);
    }
}

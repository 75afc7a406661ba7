//! The pipeline driver (spec.md §4.8, C8): projection -> inference ->
//! stitching -> determinization, end to end.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::config::{DeterminizeStrategy, PartialResultPolicy, PipelineConfig};
use crate::errors::{PrinsError, Result};
use crate::ids::{ComponentId, ExecId};
use crate::internal::complearner::{CompLearner, LearnerRequest};
use crate::internal::dfa::Dfa;
use crate::internal::nfa::Nfa;
use crate::internal::{determinize, projector, slicer, union};
use crate::log_entry::Trace;

/// Timings and diagnostics produced by one [`Pipeline::run`].
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Wall-clock time spent projecting the corpus onto per-component sub-logs.
    pub projection_time: Duration,
    /// Wall-clock time spent running `CompLearner` across all components.
    pub inference_time: Duration,
    /// Wall-clock time spent slicing, appending, and unioning per-trace models.
    pub stitching_time: Duration,
    /// Wall-clock time spent determinizing the unioned system model.
    pub determinize_time: Duration,
    /// How many transitions were taken with `ignore_guard=true` during slicing.
    pub ignore_guard_count: u64,
    /// `|distinct component sets observed| / |traces|` (spec.md §4.8).
    pub component_diversity_score: f64,
    /// Per-component learner failures tolerated under `SkipComponent`.
    pub learner_errors: Vec<(ComponentId, PrinsError)>,
    /// How many traces were dropped entirely (only possible under `SkipComponent`).
    pub dropped_traces: usize,
}

/// Drives the full PRINS pipeline for one system.
pub struct Pipeline<L: CompLearner> {
    learner: L,
    config: PipelineConfig,
}

impl<L: CompLearner> Pipeline<L> {
    /// Build a pipeline around a [`CompLearner`] and its configuration.
    pub fn new(learner: L, config: PipelineConfig) -> Self {
        Pipeline { learner, config }
    }

    /// Run the full pipeline over `corpus`: project, infer, stitch, and —
    /// when `config.determinize_strategy` requests it — determinize.
    ///
    /// Returns the system-level NFA unconditionally (spec.md §4.8 step 6,
    /// §6 Output) alongside the DFA, which is only produced when a
    /// determinization strategy was configured.
    pub fn run(
        &self,
        corpus: &BTreeMap<ExecId, Trace>,
    ) -> Result<(Nfa, Option<Dfa>, PipelineReport)> {
        info!(
            "Pipeline::run(traces={}, worker_pool_size={})",
            corpus.len(),
            self.config.worker_pool_size
        );

        // STEP 1: projection.
        let projection_start = Instant::now();
        let component_logs = projector::project(corpus);
        let projection_time = projection_start.elapsed();
        info!("projection done in {projection_time:?}");

        // STEP 2: inference, one CompLearner invocation per component, fanned
        // out over a bounded thread pool (the only parallel stage).
        let inference_start = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_pool_size.max(1))
            .build()
            .expect("thread pool construction cannot fail with a valid thread count");

        let component_entries: Vec<(ComponentId, Vec<Trace>)> = component_logs
            .into_iter()
            .map(|(component, traces_by_exec)| {
                (component, traces_by_exec.into_values().collect::<Vec<_>>())
            })
            .collect();

        let results: Vec<(ComponentId, Result<Nfa>)> = pool.install(|| {
            use rayon::prelude::*;
            component_entries
                .into_par_iter()
                .map(|(component, traces)| {
                    let request = LearnerRequest {
                        component: &component,
                        traces: &traces,
                        ignore_values: self.config.ignore_values,
                        k: self.config.complearner_k,
                        timeout: self.config.learner_timeout,
                        require_deterministic: self.config.require_deterministic_components,
                    };
                    let result = self.learner.infer(&request);
                    (component, result)
                })
                .collect()
        });

        let mut models: HashMap<ComponentId, Nfa> = HashMap::new();
        let mut learner_errors = Vec::new();
        for (component, result) in results {
            match result {
                Ok(nfa) => {
                    models.insert(component, nfa);
                }
                Err(err) => {
                    warn!("CompLearner failed for component {component}: {err}");
                    match self.config.partial_result_policy {
                        PartialResultPolicy::Abort => return Err(err),
                        PartialResultPolicy::SkipComponent => {
                            learner_errors.push((component, err));
                        }
                    }
                }
            }
        }
        let inference_time = inference_start.elapsed();
        info!("inference done in {inference_time:?}, {} components modeled", models.len());

        // STEP 3: stitching (sequential, preserving per-component cursor
        // continuity across traces, same as the slice_starting_states dict).
        let stitching_start = Instant::now();
        let mut cursors = slicer::initial_cursors(&models);
        let mut ignore_guard_count = 0u64;
        let mut appended_models: Vec<Nfa> = Vec::new();
        let mut component_sets: Vec<std::collections::BTreeSet<ComponentId>> = Vec::new();
        let mut dropped_traces = 0usize;

        for (exec_id, trace) in corpus {
            let runs = projector::partition_by_component(trace);
            let missing_model = runs.iter().any(|(c, _)| !models.contains_key(c));
            if missing_model {
                match self.config.partial_result_policy {
                    PartialResultPolicy::Abort => {
                        let component = runs
                            .iter()
                            .find(|(c, _)| !models.contains_key(c))
                            .map(|(c, _)| c.clone())
                            .expect("missing_model implies a run with no model");
                        return Err(crate::errors::PrinsErrorKind::TraceRejected {
                            exec_id: *exec_id,
                            component,
                            tid: String::new(),
                        }
                        .into());
                    }
                    PartialResultPolicy::SkipComponent => {
                        dropped_traces += 1;
                        continue;
                    }
                }
            }

            match slicer::stitch(*exec_id, &runs, &models, &mut cursors, &mut ignore_guard_count) {
                Ok(Some(model)) => {
                    component_sets.push(runs.iter().map(|(c, _)| c.clone()).collect());
                    appended_models.push(model);
                }
                Ok(None) => {}
                Err(err) => match self.config.partial_result_policy {
                    PartialResultPolicy::Abort => return Err(err),
                    PartialResultPolicy::SkipComponent => {
                        warn!("dropping trace {exec_id}: {err}");
                        dropped_traces += 1;
                    }
                },
            }
        }

        let distinct_sets: std::collections::BTreeSet<_> = component_sets.iter().cloned().collect();
        let component_diversity_score = if component_sets.is_empty() {
            0.0
        } else {
            distinct_sets.len() as f64 / component_sets.len() as f64
        };

        let m_sys = union::union(&appended_models).shorten_states();
        let stitching_time = stitching_start.elapsed();
        info!(
            "stitching done in {stitching_time:?}, states={}, diversity={component_diversity_score:.3}",
            m_sys.core().state_count()
        );

        // STEP 4: determinization, only when requested (spec.md §4.8 step 6).
        let determinize_start = Instant::now();
        let dfa = match self.config.determinize_strategy {
            Some(DeterminizeStrategy::Standard) => Some(determinize::standard_determinize(
                &m_sys,
                self.config.standard_determinize_timeout,
            )?),
            Some(DeterminizeStrategy::Heuristic) => {
                Some(determinize::heuristic_determinize(&m_sys)?)
            }
            Some(DeterminizeStrategy::HybridK(k)) => Some(determinize::hybrid_determinize(
                &m_sys,
                k,
                self.config.standard_determinize_timeout,
            )?),
            None => None,
        };
        let determinize_time = determinize_start.elapsed();
        match &dfa {
            Some(dfa) => info!(
                "determinization done in {determinize_time:?}, states={}",
                dfa.core().state_count()
            ),
            None => info!("determinization skipped, no strategy configured"),
        }

        Ok((
            m_sys,
            dfa,
            PipelineReport {
                projection_time,
                inference_time,
                stitching_time,
                determinize_time,
                ignore_guard_count,
                component_diversity_score,
                learner_errors,
                dropped_traces,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::complearner::{MockCompLearner, RawAutomaton};
    use crate::log_entry::{LogEntry, Timestamp};
    use std::collections::BTreeSet;

    #[test]
    fn pipeline_runs_end_to_end_for_one_component() {
        let raw = RawAutomaton {
            states: BTreeSet::from([0, 1]),
            initial_state: 0,
            edges: vec![(0, "T1".to_string(), 1), (1, "__END__".to_string(), 1)],
        };
        let learner = MockCompLearner::new().with_model("auth", raw);
        let pipeline = Pipeline::new(learner, PipelineConfig::default());

        let mut corpus = BTreeMap::new();
        corpus.insert(
            ExecId::new(0),
            vec![LogEntry::new(Timestamp::new(0), "auth", "T1", vec![])],
        );

        let (nfa, dfa, report) = pipeline.run(&corpus).unwrap();
        let trace = vec![LogEntry::new(Timestamp::new(0), "auth", "T1", vec![])];
        assert!(nfa.accepts(&trace).unwrap());
        assert!(dfa.unwrap().accepts(&trace).unwrap());
        assert_eq!(report.dropped_traces, 0);
        assert_eq!(report.component_diversity_score, 1.0);
    }

    #[test]
    fn pipeline_skips_component_without_learner_model_under_skip_policy() {
        let learner = MockCompLearner::new();
        let mut config = PipelineConfig::default();
        config.partial_result_policy = PartialResultPolicy::SkipComponent;
        let pipeline = Pipeline::new(learner, config);

        let mut corpus = BTreeMap::new();
        corpus.insert(
            ExecId::new(0),
            vec![LogEntry::new(Timestamp::new(0), "auth", "T1", vec![])],
        );

        let (nfa, dfa, report) = pipeline.run(&corpus).unwrap();
        assert_eq!(report.dropped_traces, 1);
        assert!(nfa.core().state_count() >= 1);
        assert!(dfa.unwrap().core().state_count() >= 1);
    }
}

//! The pluggable model-inference collaborator (spec.md §4.3, §6).
//!
//! `CompLearner` abstracts the external black-box tool that turns a
//! component's traces into a (possibly non-deterministic) guarded NFA.
//! [`SubprocessCompLearner`] shells out to the real inference jar, encoding
//! and decoding its wire format exactly as the original Python glue code
//! does; [`MockCompLearner`] returns a canned [`RawAutomaton`] so the rest of
//! the pipeline can be tested without a JVM on the test runner.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::errors::{LearnerError, Result};
use crate::guard::GuardExpr;
use crate::ids::{ComponentId, TemplateId};
use crate::internal::automaton::Automaton;
use crate::internal::nfa::Nfa;
use crate::internal::state::StateId;
use crate::log_entry::Trace;

const END_MARKER: &str = "__END__";

/// A decoded, but not yet guard-parsed, automaton as it comes back from the
/// wire: states and transitions are raw strings/integers, and a compound
/// transition label may still need to be split into `(template, guard)`
/// pairs.
#[derive(Debug, Clone, Default)]
pub struct RawAutomaton {
    /// State ids present in the model.
    pub states: BTreeSet<u32>,
    /// The initial state.
    pub initial_state: u32,
    /// `(src, compound_label, dst)` edges, compound label not yet split.
    pub edges: Vec<(u32, String, u32)>,
}

/// Inputs handed to a [`CompLearner`] for one component.
pub struct LearnerRequest<'a> {
    /// The component whose traces are being modeled.
    pub component: &'a ComponentId,
    /// The per-execution traces already projected onto this component.
    pub traces: &'a [Trace],
    /// When `true`, event values are not encoded into the wire format, so
    /// the inferred model ignores guards entirely.
    pub ignore_values: bool,
    /// The inference tool's own `k` parameter (history-window size).
    pub k: u32,
    /// Wall-clock budget for the external process.
    pub timeout: Duration,
    /// When `true`, the adapter determinizes the decoded model before
    /// returning it (spec.md §4.3's determinism contract), re-wrapping the
    /// result as an `Nfa` whose transition images all happen to be
    /// singletons rather than handing back raw non-determinism.
    pub require_deterministic: bool,
}

/// A collaborator that infers a guarded NFA model from a component's traces.
pub trait CompLearner: Send + Sync {
    /// Infer a (possibly non-deterministic) guarded NFA for one component.
    fn infer(&self, request: &LearnerRequest<'_>) -> Result<Nfa>;
}

/// Apply the determinism contract: if `request.require_deterministic`, run
/// standard determinization on `nfa` and hand back an `Nfa` wrapping the
/// resulting DFA's (already singleton-valued) transitions. Otherwise return
/// `nfa` unchanged.
fn enforce_determinism_contract(nfa: Nfa, request: &LearnerRequest<'_>) -> Result<Nfa> {
    if !request.require_deterministic {
        return Ok(nfa);
    }
    let dfa = crate::internal::determinize::standard_determinize(&nfa, request.timeout)?;
    Ok(Nfa::from_core(dfa.core().clone()))
}

/// Render the traces of one component as MINT-style inference input:
///
/// ```text
/// types
/// T1 var0:S
/// T2
/// __END__
/// trace
/// T1 ok
/// T2
/// __END__
/// ```
pub fn encode_mint_input(traces: &[Trace], ignore_values: bool) -> String {
    let mut types: BTreeSet<String> = BTreeSet::new();
    let mut blocks: Vec<Vec<String>> = Vec::with_capacity(traces.len());

    for trace in traces {
        let mut lines = Vec::with_capacity(trace.len() + 1);
        for entry in trace {
            let tid = entry.tid.as_str();
            let mut type_line = tid.to_string();
            let mut trace_line = tid.to_string();
            if !ignore_values && !entry.values.is_empty() {
                for (i, value) in entry.values.iter().enumerate() {
                    let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
                    trace_line.push(' ');
                    trace_line.push_str(&cleaned);
                    type_line.push_str(&format!(" var{i}:S"));
                }
            }
            types.insert(type_line);
            lines.push(trace_line);
        }
        lines.push(END_MARKER.to_string());
        blocks.push(lines);
    }

    let mut out = String::from("types\n");
    for t in &types {
        out.push_str(t);
        out.push('\n');
    }
    out.push_str(END_MARKER);
    out.push('\n');
    for block in &blocks {
        out.push_str("trace\n");
        for line in block {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

fn malformed(component: &ComponentId, msg: impl Into<String>) -> crate::errors::PrinsError {
    LearnerError::MalformedOutput(component.clone(), msg.into()).into()
}

/// Pull the value of `key="..."` out of a dot attribute list, unescaping
/// `\"` but leaving the literal two-character `\n` label separator alone.
fn extract_attr(attrs: &str, key: &str) -> Option<String> {
    let needle = format!("{key}=\"");
    let start = attrs.find(&needle)? + needle.len();
    let bytes = attrs.as_bytes();
    let mut i = start;
    let mut out = String::new();
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c == '\\' && i + 1 < bytes.len() && bytes[i + 1] as char == '"' {
            out.push('"');
            i += 2;
            continue;
        }
        if c == '"' {
            break;
        }
        out.push(c);
        i += 1;
    }
    Some(out)
}

/// Filter the raw stdout of the inference jar down to the `digraph
/// Automaton { ... }` block, dropping the plaintext-root decoration MINT
/// emits.
fn filter_dot_lines(stdout: &str) -> Vec<String> {
    let mut in_digraph = false;
    let mut lines = Vec::new();
    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed == "digraph Automaton {" {
            in_digraph = true;
        }
        if !in_digraph {
            continue;
        }
        if trimmed.contains("initial [shape=plaintext]") || trimmed.contains("initial -> 0") {
            if trimmed == "}" {
                in_digraph = false;
            }
            continue;
        }
        if trimmed.trim_end_matches(';') == "0 [label=\"0\",shape=doublecircle]" {
            lines.push("0 [root=true,label=\"0\",shape=doublecircle];".to_string());
        } else {
            lines.push(line.to_string());
        }
        if trimmed == "}" {
            in_digraph = false;
        }
    }
    lines
}

/// Parse the filtered dot lines into a [`RawAutomaton`].
fn parse_dot(component: &ComponentId, lines: &[String]) -> Result<RawAutomaton> {
    let mut states = BTreeSet::new();
    let mut initial = None;
    let mut edges = Vec::new();

    for raw_line in lines {
        let line = raw_line.trim().trim_end_matches(';').trim();
        if line.is_empty() || line == "digraph Automaton {" || line == "}" {
            continue;
        }
        if let Some(arrow) = line.find("->") {
            let src_part = line[..arrow].trim();
            let rest = line[arrow + 2..].trim();
            let bracket = rest
                .find('[')
                .ok_or_else(|| malformed(component, format!("edge line missing attrs: {line}")))?;
            let dst_part = rest[..bracket].trim();
            let attrs = rest[bracket + 1..].trim_end_matches(']');
            let label = extract_attr(attrs, "label")
                .ok_or_else(|| malformed(component, format!("edge line missing label: {line}")))?;
            let src: u32 = src_part
                .parse()
                .map_err(|_| malformed(component, format!("bad edge source: {src_part}")))?;
            let dst: u32 = dst_part
                .parse()
                .map_err(|_| malformed(component, format!("bad edge destination: {dst_part}")))?;
            states.insert(src);
            states.insert(dst);
            edges.push((src, label, dst));
        } else if let Some(bracket) = line.find('[') {
            let id_part = line[..bracket].trim();
            let id: u32 = id_part
                .parse()
                .map_err(|_| malformed(component, format!("bad state id: {id_part}")))?;
            states.insert(id);
            let attrs = &line[bracket + 1..];
            if attrs.contains("root=true") {
                initial = Some(id);
            }
        }
    }

    let initial_state =
        initial.ok_or_else(|| malformed(component, "no root state found in model output"))?;

    Ok(RawAutomaton {
        states,
        initial_state,
        edges,
    })
}

/// Split a compound dot label (`"T1\nvar0==\"a\"\nT2"`) into `(tid, guard)`
/// pairs, requoting bare comparison operands the way the original's glue
/// code does (`var0==1` -> `var0=="1"`).
fn split_compound_label(label: &str) -> Vec<(String, Option<String>)> {
    let tokens: Vec<&str> = label.split("\\n").collect();
    let mut pairs = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let tid = tokens[i].to_string();
        let mut guard = None;
        if i + 1 < tokens.len() && is_guard_token(tokens[i + 1]) {
            guard = Some(normalize_guard_token(tokens[i + 1]));
            i += 1;
        }
        pairs.push((tid, guard));
        i += 1;
    }
    pairs
}

fn is_guard_token(tok: &str) -> bool {
    tok.chars().any(|c| "=<>|&".contains(c))
}

fn normalize_guard_token(tok: &str) -> String {
    let replaced = tok.replace("&&", " and ").replace("||", " or ").replace('\'', "");
    let ops = ["==", "!=", "<=", ">=", "<", ">"];
    replaced
        .split_whitespace()
        .map(|word| {
            if word == "and" || word == "or" {
                return word.to_string();
            }
            for op in ops {
                if let Some(idx) = word.find(op) {
                    let (lhs, rest) = word.split_at(idx);
                    let rhs = &rest[op.len()..];
                    if rhs.starts_with('"') {
                        return word.to_string();
                    }
                    return format!("{lhs}{op}\"{rhs}\"");
                }
            }
            word.to_string()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turn a decoded [`RawAutomaton`] into a guarded [`Nfa`], dropping the
/// `__END__` bookkeeping event and promoting its source states to finals
/// (mirroring the original's `remove_end_marker`).
pub fn raw_automaton_to_nfa(component: &ComponentId, raw: &RawAutomaton) -> Result<Nfa> {
    let mut transitions: BTreeMap<(u32, String, Option<String>), BTreeSet<u32>> = BTreeMap::new();
    let mut finals: BTreeSet<u32> = BTreeSet::new();
    let mut sentinel_targets: BTreeSet<u32> = BTreeSet::new();

    for (src, label, dst) in &raw.edges {
        for (tid, guard) in split_compound_label(label) {
            if tid == END_MARKER {
                finals.insert(*src);
                sentinel_targets.insert(*dst);
                continue;
            }
            transitions
                .entry((*src, tid, guard))
                .or_default()
                .insert(*dst);
        }
    }

    // A sentinel's target becomes unreachable once the sentinel edge itself
    // is dropped below, unless it plays some other role in the automaton.
    let non_sentinel_srcs: BTreeSet<u32> = transitions.keys().map(|(src, _, _)| *src).collect();
    for target in &sentinel_targets {
        assert!(
            !non_sentinel_srcs.contains(target),
            "component {component}: sentinel-target state {target} has an outgoing non-sentinel edge"
        );
    }

    let mut used_states: BTreeSet<u32> = BTreeSet::new();
    used_states.insert(raw.initial_state);
    used_states.extend(non_sentinel_srcs.iter().cloned());
    used_states.extend(transitions.values().flatten().cloned());
    used_states.extend(finals.iter().cloned());

    let mut core = Automaton::new(StateId::from(raw.initial_state));
    for state in &raw.states {
        if sentinel_targets.contains(state) && !used_states.contains(state) {
            continue;
        }
        core.add_state(StateId::from(*state));
    }
    for state in &finals {
        core.add_final(StateId::from(*state));
    }
    for ((src, tid, guard), dsts) in transitions {
        let guard_expr = match guard {
            Some(g) => Some(GuardExpr::parse(&g)?),
            None => None,
        };
        for dst in dsts {
            core.add_transition(
                StateId::from(src),
                (TemplateId::from(tid.as_str()), guard_expr.clone()),
                StateId::from(dst),
            );
        }
    }

    Ok(Nfa::from_core(core))
}

/// Shells out to the real inference jar via `java -jar`.
pub struct SubprocessCompLearner {
    java_bin: String,
    jar_path: std::path::PathBuf,
    algorithm: String,
}

impl SubprocessCompLearner {
    /// Create a learner that invokes `java -jar <jar_path>`.
    pub fn new(jar_path: impl Into<std::path::PathBuf>) -> Self {
        SubprocessCompLearner {
            java_bin: "java".to_string(),
            jar_path: jar_path.into(),
            algorithm: "AdaBoostDiscrete".to_string(),
        }
    }

    /// Override the `java` executable to invoke (default: `"java"` on `PATH`).
    pub fn with_java_bin(mut self, bin: impl Into<String>) -> Self {
        self.java_bin = bin.into();
        self
    }
}

impl CompLearner for SubprocessCompLearner {
    fn infer(&self, request: &LearnerRequest<'_>) -> Result<Nfa> {
        let component = request.component;
        let input_text = encode_mint_input(request.traces, request.ignore_values);
        let input_path = std::env::temp_dir().join(format!(
            "prins_{}_{}_mint_in.txt",
            component.as_str(),
            std::process::id()
        ));
        std::fs::write(&input_path, &input_text)
            .map_err(|e| LearnerError::ProcessError(component.clone(), e))?;

        info!(
            "starting CompLearner for component {component} (k={}, timeout={:?})",
            request.k, request.timeout
        );

        let mut child = Command::new(&self.java_bin)
            .arg("-Xss64M")
            .arg("-Xmx4G")
            .arg("-jar")
            .arg(&self.jar_path)
            .arg("-input")
            .arg(&input_path)
            .arg("-k")
            .arg(request.k.to_string())
            .arg("-algorithm")
            .arg(&self.algorithm)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LearnerError::ProcessError(component.clone(), e))?;

        let mut stdout = child.stdout.take().expect("stdout was piped");
        let reader = std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stdout.read_to_string(&mut buf);
            buf
        });

        let start = Instant::now();
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| LearnerError::ProcessError(component.clone(), e))?
            {
                break status;
            }
            if start.elapsed() > request.timeout {
                warn!("CompLearner for component {component} timed out, killing process");
                let _ = child.kill();
                let _ = child.wait();
                let _ = std::fs::remove_file(&input_path);
                return Err(LearnerError::Timeout(component.clone(), request.timeout).into());
            }
            std::thread::sleep(Duration::from_millis(50));
        };

        let stdout_text = reader.join().unwrap_or_default();
        let _ = std::fs::remove_file(&input_path);

        if !status.success() {
            return Err(
                LearnerError::NonZeroExit(component.clone(), status.code().unwrap_or(-1)).into(),
            );
        }

        debug!("CompLearner for component {component} finished in {:?}", start.elapsed());

        let lines = filter_dot_lines(&stdout_text);
        if lines.is_empty() {
            return Err(malformed(component, "no digraph block found in learner output"));
        }
        let raw = parse_dot(component, &lines)?;
        let nfa = raw_automaton_to_nfa(component, &raw)?;
        enforce_determinism_contract(nfa, request)
    }
}

/// A test-only collaborator that returns a canned [`RawAutomaton`] instead
/// of shelling out to a real inference tool.
pub struct MockCompLearner {
    models: std::sync::Mutex<BTreeMap<String, RawAutomaton>>,
}

impl MockCompLearner {
    /// Create an empty mock with no canned models.
    pub fn new() -> Self {
        MockCompLearner {
            models: std::sync::Mutex::new(BTreeMap::new()),
        }
    }

    /// Register the model to return for `component`.
    pub fn with_model(self, component: impl Into<String>, model: RawAutomaton) -> Self {
        self.models.lock().unwrap().insert(component.into(), model);
        self
    }
}

impl Default for MockCompLearner {
    fn default() -> Self {
        Self::new()
    }
}

impl CompLearner for MockCompLearner {
    fn infer(&self, request: &LearnerRequest<'_>) -> Result<Nfa> {
        let models = self.models.lock().unwrap();
        let raw = models.get(request.component.as_str()).ok_or_else(|| {
            malformed(
                request.component,
                format!("MockCompLearner has no model registered for {}", request.component),
            )
        })?;
        let nfa = raw_automaton_to_nfa(request.component, raw)?;
        enforce_determinism_contract(nfa, request)
    }
}

//! Conversion from [`Nfa`]/[`Dfa`] to graphviz dot format, for debugging and
//! the optional `dot_writer` feature. Not used on any inference hot path.

use std::io::Write;

use dot_writer::{Attributes, DotWriter, RankDirection};

use super::dfa::Dfa;
use super::nfa::Nfa;

/// Render the NFA to graphviz dot format.
pub fn nfa_render<W: Write>(nfa: &Nfa, label: &str, output: &mut W) {
    let mut writer = DotWriter::from(output);
    writer.set_pretty_print(true);
    let mut digraph = writer.digraph();
    digraph
        .set_label(label)
        .set_rank_direction(RankDirection::LeftRight);

    for state in nfa.core().states() {
        let node_name = format!("node_{state}");
        let mut node = digraph.node_named(&node_name);
        node.set_label(&state.to_string());
        if state == nfa.initial() {
            node.set_shape(dot_writer::Shape::Circle)
                .set_color(dot_writer::Color::Blue)
                .set_pen_width(3.0);
        }
        if nfa.core().is_final(state) {
            node.set_shape(dot_writer::Shape::Circle)
                .set_color(dot_writer::Color::Red)
                .set_pen_width(3.0);
        }
    }
    for (from, (tid, guard), to) in nfa.core().edges() {
        let label = match guard {
            Some(g) => format!("{tid}\n{g}"),
            None => tid.to_string(),
        };
        digraph
            .edge(format!("node_{from}"), format!("node_{to}"))
            .attributes()
            .set_label(&label);
    }
}

/// Render the DFA to graphviz dot format.
pub fn dfa_render<W: Write>(dfa: &Dfa, label: &str, output: &mut W) {
    let mut writer = DotWriter::from(output);
    writer.set_pretty_print(true);
    let mut digraph = writer.digraph();
    digraph
        .set_label(label)
        .set_rank_direction(RankDirection::LeftRight);

    for state in dfa.core().states() {
        let node_name = format!("node_{state}");
        let mut node = digraph.node_named(&node_name);
        node.set_label(&state.to_string());
        if state == dfa.initial() {
            node.set_shape(dot_writer::Shape::Circle)
                .set_color(dot_writer::Color::Blue)
                .set_pen_width(3.0);
        }
        if dfa.core().is_final(state) {
            node.set_shape(dot_writer::Shape::Circle)
                .set_color(dot_writer::Color::Red)
                .set_pen_width(3.0);
        }
    }
    for (from, (tid, guard), to) in dfa.core().edges() {
        let label = match guard {
            Some(g) => format!("{tid}\n{g}"),
            None => tid.to_string(),
        };
        digraph
            .edge(format!("node_{from}"), format!("node_{to}"))
            .attributes()
            .set_label(&label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TemplateId;
    use crate::internal::state::StateId;

    #[test]
    fn nfa_render_does_not_panic() {
        let mut nfa = Nfa::new(StateId::from(0));
        nfa.add_transition(StateId::from(0), (TemplateId::from("T1"), None), StateId::from(1));
        nfa.add_final(StateId::from(1));
        let mut buf = Vec::new();
        nfa_render(&nfa, "test", &mut buf);
        assert!(!buf.is_empty());
    }
}

use std::fmt;

use crate::compiled::CompiledGraph;
use crate::edge::{Target, Transition};
use crate::state::State;
use crate::{END, START};

impl<S: State> CompiledGraph<S> {
    /// Outgoing transitions sorted by source for deterministic rendering.
    fn sorted_transitions(&self) -> Vec<(&str, &Transition<S>)> {
        let mut transitions: Vec<(&str, &Transition<S>)> = self
            .transitions
            .iter()
            .map(|(source, t)| (source.as_str(), t))
            .collect();
        transitions.sort_by_key(|(source, _)| *source);
        transitions
    }

    /// Nodes with no outgoing edge; they end the run implicitly.
    fn implicit_terminals(&self) -> Vec<&str> {
        self.node_names()
            .into_iter()
            .filter(|name| !self.transitions.contains_key(*name))
            .collect()
    }

    /// Render the graph as a Mermaid flowchart string.
    ///
    /// - `__start__` and `__end__` are rendered as rounded nodes `([...])`
    /// - User nodes are rendered as rectangles `[...]`
    /// - Fixed edges use solid arrows `-->`
    /// - Conditional edges use dashed arrows `-.->` labelled with the branch key
    /// - Nodes without an outgoing edge get a dotted arrow to `__end__`
    pub fn draw_mermaid(&self) -> String {
        let mut lines = vec!["graph TD".to_string()];

        lines.push(format!("    {START}([\"{START}\"])"));
        for name in self.node_names() {
            lines.push(format!("    {name}[\"{name}\"]"));
        }
        lines.push(format!("    {END}([\"{END}\"])"));

        lines.push(format!("    {START} --> {}", self.entry_point));

        for (source, transition) in self.sorted_transitions() {
            match transition {
                Transition::Fixed(target) => {
                    lines.push(format!("    {source} --> {target}"));
                }
                Transition::Conditional(ce) => {
                    for (key, target) in &ce.branches {
                        lines.push(format!("    {source} -.-> |{key}| {target}"));
                    }
                }
            }
        }

        for name in self.implicit_terminals() {
            lines.push(format!("    {name} -.-> {END}"));
        }

        lines.join("\n")
    }

    /// Render the graph as a simple ASCII text summary.
    pub fn draw_ascii(&self) -> String {
        let mut lines = vec!["Graph:".to_string()];

        lines.push(format!("  Nodes: {}", self.node_names().join(", ")));
        lines.push(format!("  Entry: {START} -> {}", self.entry_point));
        lines.push("  Edges:".to_string());

        for (source, transition) in self.sorted_transitions() {
            match transition {
                Transition::Fixed(target) => {
                    lines.push(format!("    {source} -> {target}"));
                }
                Transition::Conditional(ce) => {
                    let branches: Vec<String> = ce
                        .branches
                        .iter()
                        .map(|(key, target)| format!("{key}: {target}"))
                        .collect();
                    lines.push(format!(
                        "    {source} -> {{{}}}  [conditional]",
                        branches.join(", ")
                    ));
                }
            }
        }

        for name in self.implicit_terminals() {
            lines.push(format!("    {name} -> {}  [implicit]", Target::End));
        }

        lines.join("\n")
    }

    /// Render the graph in Graphviz DOT format.
    pub fn draw_dot(&self) -> String {
        let mut lines = vec!["digraph G {".to_string()];
        lines.push("    rankdir=TD;".to_string());

        lines.push(format!("    \"{START}\" [shape=oval];"));
        for name in self.node_names() {
            lines.push(format!("    \"{name}\" [shape=box];"));
        }
        lines.push(format!("    \"{END}\" [shape=oval];"));

        lines.push(format!(
            "    \"{START}\" -> \"{}\" [style=solid];",
            self.entry_point
        ));

        for (source, transition) in self.sorted_transitions() {
            match transition {
                Transition::Fixed(target) => {
                    lines.push(format!("    \"{source}\" -> \"{target}\" [style=solid];"));
                }
                Transition::Conditional(ce) => {
                    for (key, target) in &ce.branches {
                        lines.push(format!(
                            "    \"{source}\" -> \"{target}\" [style=dashed, label=\"{key}\"];",
                        ));
                    }
                }
            }
        }

        for name in self.implicit_terminals() {
            lines.push(format!("    \"{name}\" -> \"{END}\" [style=dotted];"));
        }

        lines.push("}".to_string());
        lines.join("\n")
    }
}

impl<S: State> fmt::Display for CompiledGraph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.draw_ascii())
    }
}

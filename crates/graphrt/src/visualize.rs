//! Graph snapshots for debugging partitioning.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::graph::{Graph, NodeId, Op, Output};

/// Receives a snapshot of a graph under a label.
pub trait GraphVisualizer: Send + Sync {
    fn render(&self, graph: &Graph, results: &[Output], label: &str) -> io::Result<()>;
}

/// Writes each snapshot to `<dir>/<label>.dot`.
#[derive(Debug, Clone)]
pub struct DotFileVisualizer {
    dir: PathBuf,
}

impl DotFileVisualizer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a snapshot with `label` is written to.
    pub fn path_for(&self, label: &str) -> PathBuf {
        let sanitized: String = label
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{sanitized}.dot"))
    }
}

impl GraphVisualizer for DotFileVisualizer {
    fn render(&self, graph: &Graph, results: &[Output], label: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(label), to_dot(graph, results))
    }
}

/// Renders the nodes reachable from `results` as Graphviz text.
///
/// Unreachable arena nodes are omitted; results are drawn as `result<i>` sinks.
pub fn to_dot(graph: &Graph, results: &[Output]) -> String {
    let live = reachable(graph, results);
    let mut out = String::from("digraph G {\n  node [shape=box];\n");
    for id in graph.node_ids().filter(|id| live.contains(id)) {
        let Ok(node) = graph.node(id) else { continue };
        let mut label = match node.op() {
            Op::FunctionCall(call) => {
                format!("FunctionCall {}\\n@{}", call.function.name(), call.backend)
            }
            op => op.name().to_string(),
        };
        if let Some(name) = node.name() {
            let _ = write!(label, "\\n{name}");
        }
        let specs = node
            .outputs()
            .iter()
            .map(|spec| spec.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "  n{} [label=\"%{} {label}\\n{specs}\"];", id.0, id.0);
        for (slot, input) in node.inputs().iter().enumerate() {
            let _ = writeln!(
                out,
                "  n{} -> n{} [label=\"{}:{slot}\"];",
                input.node.0, id.0, input.index
            );
        }
    }
    for (index, result) in results.iter().enumerate() {
        let _ = writeln!(out, "  result{index} [shape=oval];");
        let _ = writeln!(
            out,
            "  n{} -> result{index} [label=\"{}\"];",
            result.node.0, result.index
        );
    }
    out.push_str("}\n");
    out
}

fn reachable(graph: &Graph, results: &[Output]) -> HashSet<NodeId> {
    let mut live = HashSet::new();
    let mut stack: Vec<_> = results.iter().map(|result| result.node).collect();
    while let Some(id) = stack.pop() {
        if !live.insert(id) {
            continue;
        }
        if let Ok(node) = graph.node(id) {
            stack.extend(node.inputs().iter().map(|input| input.node));
        }
    }
    live
}

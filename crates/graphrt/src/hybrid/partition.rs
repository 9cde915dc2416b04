use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::backend::spec::{BackendError, BackendResult};
use crate::graph::{Function, Graph, GraphError, NodeId, Op, Output};
use crate::hybrid::edge::{Edge, EdgeRewrite};
use crate::hybrid::placement::{self, Cluster, LabeledBackend};
use crate::ops::function_call::FunctionCallSpec;
use crate::visualize::GraphVisualizer;

/// One FunctionCall produced by partitioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSummary {
    /// Call site in the partitioned outer function.
    pub call: NodeId,
    pub function: String,
    pub backend: String,
    pub depth: usize,
    pub nodes: usize,
    pub inputs: usize,
    pub outputs: usize,
}

/// Summary of how a function was split across backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionReport {
    pub function: String,
    pub calls: Vec<CallSummary>,
}

impl PartitionReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| format!("{{\"error\":\"{err}\"}}"))
    }
}

/// Outer function whose reachable nodes are only Parameters and FunctionCalls.
#[derive(Debug, Clone)]
pub struct PartitionedFunction {
    function: Arc<Function>,
    report: PartitionReport,
}

impl PartitionedFunction {
    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }

    pub fn report(&self) -> &PartitionReport {
        &self.report
    }

    pub fn into_parts(self) -> (Arc<Function>, PartitionReport) {
        (self.function, self.report)
    }
}

/// Splits `function` into per-backend inner functions joined by FunctionCall nodes.
///
/// When `visualizer` is set, a snapshot of the working graph is rendered after every
/// cluster is extracted.
pub fn partition(
    function: &Function,
    backends: &[LabeledBackend],
    visualizer: Option<&dyn GraphVisualizer>,
) -> BackendResult<PartitionedFunction> {
    let order = function
        .validate()
        .map_err(|err| BackendError::compile(format!("`{}`: {err}", function.name())))?;
    let sites = placement::place(function.graph(), &order, backends)?;
    let clusters = placement::clusters(function.graph(), &order, &sites)?;
    debug!(
        function = function.name(),
        nodes = order.len(),
        clusters = clusters.len(),
        "partitioning function"
    );

    let mut working = function.graph().clone();
    let mut results = function.results().to_vec();
    let mut calls = Vec::with_capacity(clusters.len());

    for (index, cluster) in clusters.iter().enumerate() {
        let later: Vec<NodeId> = clusters[index + 1..]
            .iter()
            .flat_map(|later| later.nodes.iter().copied())
            .chain(order.iter().copied().filter(|id| {
                matches!(working.node(*id).map(|node| node.op()), Ok(Op::FunctionCall(_)))
            }))
            .collect();
        let label = &backends[cluster.backend].label;
        let inner_name = format!("{}/{}/{}", function.name(), label, index);

        let (call, summary) =
            extract_cluster(&mut working, &mut results, cluster, &later, label, inner_name)?;
        trace!(call = call.0, backend = %label, "extracted cluster");
        calls.push(summary);

        if let Some(visualizer) = visualizer {
            let snapshot = format!("{}.partition.{index}", function.name());
            if let Err(err) = visualizer.render(&working, &results, &snapshot) {
                warn!(error = %err, snapshot, "failed to render partition snapshot");
            }
        }
    }

    let outer = Function::new(
        function.name(),
        working,
        function.parameters().to_vec(),
        results,
    )?;
    let outer = outer.compacted()?;
    let mut report = PartitionReport {
        function: function.name().to_string(),
        calls,
    };
    remap_report(&outer, &mut report);
    Ok(PartitionedFunction {
        function: Arc::new(outer),
        report,
    })
}

/// Moves `cluster` into a new inner function, appends its call site to `working` and
/// rebinds every consumer outside the cluster to the call's outputs.
fn extract_cluster(
    working: &mut Graph,
    results: &mut [Output],
    cluster: &Cluster,
    later: &[NodeId],
    label: &str,
    inner_name: String,
) -> BackendResult<(NodeId, CallSummary)> {
    let members: HashSet<NodeId> = cluster.nodes.iter().copied().collect();
    let outside: Vec<NodeId> = working.node_ids().filter(|id| !members.contains(id)).collect();

    let incoming = Edge::from(working, &outside, &cluster.nodes)?;
    let outgoing = Edge::from(working, &cluster.nodes, later)?;

    // One parameter per incoming (destination, slot).
    let mut inner = Graph::new();
    let mut parameters = Vec::with_capacity(incoming.len());
    let mut bound: HashMap<(NodeId, usize), Output> = HashMap::with_capacity(incoming.len());
    for edge in &incoming {
        let spec = working.output_spec(edge.source())?.clone();
        let param = inner.parameter(spec);
        parameters.push(param);
        bound.insert((edge.destination(), edge.input_index()), Output::from(param));
    }

    let mut copied: HashMap<NodeId, NodeId> = HashMap::with_capacity(cluster.nodes.len());
    for &id in &cluster.nodes {
        let node = working.node(id)?;
        let args = node
            .inputs()
            .iter()
            .enumerate()
            .map(|(slot, input)| {
                if let Some(&copy) = copied.get(&input.node) {
                    Ok(Output::new(copy, input.index))
                } else {
                    bound
                        .get(&(id, slot))
                        .copied()
                        .ok_or(GraphError::InvalidInputSlot { node: id, slot })
                }
            })
            .collect::<Result<Vec<_>, GraphError>>()?;
        let copy = inner.import_node(working, id, &args)?;
        copied.insert(id, copy);
    }

    // Cluster outputs read elsewhere, first use first.
    let mut exports: Vec<Output> = Vec::new();
    let used_outside = outgoing
        .iter()
        .map(Edge::source)
        .chain(results.iter().copied().filter(|r| members.contains(&r.node)));
    for output in used_outside {
        if !exports.contains(&output) {
            exports.push(output);
        }
    }
    let inner_results = exports
        .iter()
        .map(|output| Output::new(copied[&output.node], output.index))
        .collect();
    let inner = Function::new(inner_name, inner, parameters, inner_results)?;
    let inner = Arc::new(inner);

    let args: Vec<Output> = incoming.iter().map(Edge::source).collect();
    let spec = FunctionCallSpec::new(Arc::clone(&inner), label)?;
    let call = working.add_node(Op::FunctionCall(spec), args.iter().copied())?;

    let export_index = |output: Output| exports.iter().position(|e| *e == output);
    let mut rewrite = EdgeRewrite::new();
    for mut edge in outgoing {
        let index = export_index(edge.source()).ok_or(GraphError::InvalidOutput {
            node: edge.source().node,
            index: edge.source().index,
        })?;
        edge.new_source(call, index);
        rewrite.push(edge);
    }
    rewrite.apply(working)?;
    for result in results.iter_mut() {
        if let Some(index) = export_index(*result) {
            *result = Output::new(call, index);
        }
    }

    let summary = CallSummary {
        call,
        function: inner.name().to_string(),
        backend: label.to_string(),
        depth: cluster.depth,
        nodes: cluster.nodes.len(),
        inputs: args.len(),
        outputs: exports.len(),
    };
    Ok((call, summary))
}

/// Points each summary at its call site after compaction renumbered the nodes.
fn remap_report(outer: &Function, report: &mut PartitionReport) {
    let mut by_function: HashMap<&str, NodeId> = HashMap::new();
    for id in outer.graph().node_ids() {
        if let Ok(node) = outer.graph().node(id) {
            if let Op::FunctionCall(call) = node.op() {
                by_function.insert(call.function.name(), id);
            }
        }
    }
    for summary in &mut report.calls {
        if let Some(&id) = by_function.get(summary.function.as_str()) {
            summary.call = id;
        }
    }
}

use std::collections::HashSet;

use crate::graph::infer::expect_same_spec;
use crate::graph::{Graph, GraphError, NodeId, Output};

/// Data dependency crossing a partition boundary: `source` feeds input slot
/// `input_index` of `destination`.
///
/// Rebinding is two-phase. [`Edge::new_source`] stages a replacement source without
/// touching the graph; [`Edge::connect`] commits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    source: Output,
    destination: NodeId,
    input_index: usize,
    pending: Option<Output>,
}

impl Edge {
    /// Returns one edge per `(consumer, input slot)` whose source node is in `producers`.
    ///
    /// Edges come out in consumer order as given, then by slot. Duplicate consumers are
    /// visited once.
    pub fn from(
        graph: &Graph,
        producers: &[NodeId],
        consumers: &[NodeId],
    ) -> Result<Vec<Edge>, GraphError> {
        let producers: HashSet<NodeId> = producers.iter().copied().collect();
        let mut seen = HashSet::with_capacity(consumers.len());
        let mut edges = Vec::new();
        for &consumer in consumers {
            if !seen.insert(consumer) {
                continue;
            }
            for (slot, input) in graph.node(consumer)?.inputs().iter().enumerate() {
                if producers.contains(&input.node) {
                    edges.push(Edge {
                        source: *input,
                        destination: consumer,
                        input_index: slot,
                        pending: None,
                    });
                }
            }
        }
        Ok(edges)
    }

    pub fn source(&self) -> Output {
        self.source
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn input_index(&self) -> usize {
        self.input_index
    }

    /// Staged replacement source, if any.
    pub fn pending(&self) -> Option<Output> {
        self.pending
    }

    /// Stages `node`'s output `output_index` as the new source. The graph is untouched
    /// until [`Edge::connect`].
    pub fn new_source(&mut self, node: NodeId, output_index: usize) {
        self.pending = Some(Output::new(node, output_index));
    }

    /// Fails when the staged source cannot replace the current one.
    pub fn check(&self, graph: &Graph) -> Result<(), GraphError> {
        let Some(pending) = self.pending else {
            return Ok(());
        };
        let destination = graph.node(self.destination)?;
        let current = destination.inputs().get(self.input_index).ok_or(
            GraphError::InvalidInputSlot {
                node: self.destination,
                slot: self.input_index,
            },
        )?;
        let expected = graph.output_spec(*current)?;
        let found = graph.output_spec(pending)?;
        expect_same_spec(destination.op().name(), expected, found)
    }

    /// Commits the staged source into the destination's input slot.
    ///
    /// Committing the same staged source again leaves the graph as it is; without a staged
    /// source this does nothing.
    pub fn connect(&self, graph: &mut Graph) -> Result<(), GraphError> {
        let Some(pending) = self.pending else {
            return Ok(());
        };
        self.check(graph)?;
        graph.set_input(self.destination, self.input_index, pending)
    }
}

/// Batch of staged edges committed together.
///
/// Every edge is checked before any is committed, so a failing batch leaves the graph
/// unchanged.
#[derive(Debug, Default)]
pub struct EdgeRewrite {
    edges: Vec<Edge>,
}

impl EdgeRewrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn apply(self, graph: &mut Graph) -> Result<usize, GraphError> {
        for edge in &self.edges {
            edge.check(graph)?;
        }
        let mut committed = 0;
        for edge in &self.edges {
            if edge.pending.is_some() {
                edge.connect(graph)?;
                committed += 1;
            }
        }
        Ok(committed)
    }
}

impl Extend<Edge> for EdgeRewrite {
    fn extend<T: IntoIterator<Item = Edge>>(&mut self, iter: T) {
        self.edges.extend(iter);
    }
}

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::backend::spec::{TensorLiteral, TensorSpec};
use crate::graph::infer::{expect_arity, infer_outputs};
use crate::graph::topology::topological_order;
use crate::graph::{BinaryOp, GraphError, Node, NodeId, Op, Output, UnaryOp};

/// Append-only arena of nodes. Node ids index into the arena and stay valid for its lifetime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|index| NodeId(index as u32))
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(id.index()).ok_or(GraphError::MissingNode(id))
    }

    pub fn output_spec(&self, output: Output) -> Result<&TensorSpec, GraphError> {
        self.node(output.node)?
            .output_spec(output.index)
            .ok_or(GraphError::InvalidOutput {
                node: output.node,
                index: output.index,
            })
    }

    /// Appends a node applying `op` to `inputs`, deriving its output specs.
    pub fn add_node(
        &mut self,
        op: Op,
        inputs: impl IntoIterator<Item = Output>,
    ) -> Result<NodeId, GraphError> {
        let inputs: SmallVec<[Output; 4]> = inputs.into_iter().collect();
        let specs = inputs
            .iter()
            .map(|input| self.output_spec(*input))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = infer_outputs(&op, &specs)?;
        Ok(self.push_node(Node {
            op,
            inputs,
            outputs,
            name: None,
        }))
    }

    /// Appends a Parameter placeholder producing one tensor of `spec`.
    pub fn parameter(&mut self, spec: TensorSpec) -> NodeId {
        self.push_node(Node {
            op: Op::Parameter,
            inputs: SmallVec::new(),
            outputs: vec![spec],
            name: None,
        })
    }

    pub fn constant(&mut self, literal: TensorLiteral) -> Result<NodeId, GraphError> {
        self.add_node(Op::Constant(literal), [])
    }

    pub fn binary(
        &mut self,
        op: BinaryOp,
        lhs: impl Into<Output>,
        rhs: impl Into<Output>,
    ) -> Result<NodeId, GraphError> {
        self.add_node(Op::Binary(op), [lhs.into(), rhs.into()])
    }

    pub fn add(
        &mut self,
        lhs: impl Into<Output>,
        rhs: impl Into<Output>,
    ) -> Result<NodeId, GraphError> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn subtract(
        &mut self,
        lhs: impl Into<Output>,
        rhs: impl Into<Output>,
    ) -> Result<NodeId, GraphError> {
        self.binary(BinaryOp::Subtract, lhs, rhs)
    }

    pub fn multiply(
        &mut self,
        lhs: impl Into<Output>,
        rhs: impl Into<Output>,
    ) -> Result<NodeId, GraphError> {
        self.binary(BinaryOp::Multiply, lhs, rhs)
    }

    pub fn divide(
        &mut self,
        lhs: impl Into<Output>,
        rhs: impl Into<Output>,
    ) -> Result<NodeId, GraphError> {
        self.binary(BinaryOp::Divide, lhs, rhs)
    }

    pub fn unary(&mut self, op: UnaryOp, input: impl Into<Output>) -> Result<NodeId, GraphError> {
        self.add_node(Op::Unary(op), [input.into()])
    }

    /// Attaches a debug name, shown by visualizers.
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(id.index())
            .ok_or(GraphError::MissingNode(id))?;
        node.name = Some(name.into());
        Ok(())
    }

    /// Rebuilds `node` against `new_args`, keeping its op and attributes.
    ///
    /// The argument count must equal the original node's input count; this is checked
    /// before anything is appended. A Parameter is copied with zero arguments and keeps its
    /// spec. A FunctionCall keeps its declared outputs once the new arguments match the
    /// callee's parameters.
    pub fn copy_with_new_args(
        &mut self,
        node: NodeId,
        new_args: &[Output],
    ) -> Result<NodeId, GraphError> {
        let original = self.node(node)?.clone();
        self.append_copy(&original, new_args)
    }

    /// Like [`Graph::copy_with_new_args`], but copies `node` out of another arena.
    pub fn import_node(
        &mut self,
        source: &Graph,
        node: NodeId,
        new_args: &[Output],
    ) -> Result<NodeId, GraphError> {
        self.append_copy(source.node(node)?, new_args)
    }

    fn append_copy(&mut self, original: &Node, new_args: &[Output]) -> Result<NodeId, GraphError> {
        expect_arity(original.op.name(), original.inputs.len(), new_args.len())?;
        let id = match (&original.op, original.outputs.first()) {
            (Op::Parameter, Some(spec)) => self.parameter(spec.clone()),
            (op, _) => self.add_node(op.clone(), new_args.iter().copied())?,
        };
        if let Some(name) = &original.name {
            self.nodes[id.index()].name = Some(name.clone());
        }
        Ok(id)
    }

    /// Copies the nodes reachable from `results`, plus `parameters`, into a fresh arena.
    ///
    /// Parameters come first in the given order; the remaining nodes follow in dependency
    /// order. Returns the new arena with the remapped parameter ids and results.
    pub fn compact(
        &self,
        parameters: &[NodeId],
        results: &[Output],
    ) -> Result<(Graph, Vec<NodeId>, Vec<Output>), GraphError> {
        let order = topological_order(self, results)?;
        let mut remap: HashMap<NodeId, NodeId> = HashMap::with_capacity(order.len());
        let mut compacted = Graph::new();

        for &param in parameters {
            let node = self.node(param)?;
            if !node.is_parameter() {
                return Err(GraphError::NotAParameter(param));
            }
            let id = compacted.push_node(node.clone());
            remap.insert(param, id);
        }

        for id in order {
            if remap.contains_key(&id) {
                continue;
            }
            let node = self.node(id)?;
            let mut copy = node.clone();
            for input in copy.inputs.iter_mut() {
                input.node = *remap
                    .get(&input.node)
                    .ok_or(GraphError::MissingNode(input.node))?;
            }
            let new_id = compacted.push_node(copy);
            remap.insert(id, new_id);
        }

        let new_params = parameters.iter().map(|param| remap[param]).collect();
        let new_results = results
            .iter()
            .map(|result| Output::new(remap[&result.node], result.index))
            .collect();
        Ok((compacted, new_params, new_results))
    }

    pub(crate) fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Rebinds input `slot` of `node` to `source`. Callers check spec compatibility.
    pub(crate) fn set_input(
        &mut self,
        node: NodeId,
        slot: usize,
        source: Output,
    ) -> Result<(), GraphError> {
        let target = self
            .nodes
            .get_mut(node.index())
            .ok_or(GraphError::MissingNode(node))?;
        let input = target
            .inputs
            .get_mut(slot)
            .ok_or(GraphError::InvalidInputSlot { node, slot })?;
        *input = source;
        Ok(())
    }
}

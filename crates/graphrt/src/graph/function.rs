use std::collections::HashSet;

use crate::backend::spec::TensorSpec;
use crate::graph::topology::topological_order;
use crate::graph::{Graph, GraphError, NodeId, Op, Output};

/// Named computation: an arena plus the ordered parameters and results that form its
/// call signature.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    graph: Graph,
    parameters: Vec<NodeId>,
    results: Vec<Output>,
}

impl Function {
    /// Builds a function and validates it.
    ///
    /// Every parameter must be a distinct Parameter node, every result must name an
    /// existing output, and every Parameter reachable from the results must be declared.
    pub fn new(
        name: impl Into<String>,
        graph: Graph,
        parameters: Vec<NodeId>,
        results: Vec<Output>,
    ) -> Result<Self, GraphError> {
        let function = Self {
            name: name.into(),
            graph,
            parameters,
            results,
        };
        function.validate()?;
        Ok(function)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    pub fn results(&self) -> &[Output] {
        &self.results
    }

    pub fn parameter_specs(&self) -> Result<Vec<&TensorSpec>, GraphError> {
        self.parameters
            .iter()
            .map(|&param| self.graph.output_spec(Output::new(param, 0)))
            .collect()
    }

    pub fn result_specs(&self) -> Result<Vec<&TensorSpec>, GraphError> {
        self.results
            .iter()
            .map(|&result| self.graph.output_spec(result))
            .collect()
    }

    /// Checks the signature and returns the nodes reachable from the results in
    /// dependency order.
    pub fn validate(&self) -> Result<Vec<NodeId>, GraphError> {
        let mut declared = HashSet::with_capacity(self.parameters.len());
        for &param in &self.parameters {
            if !self.graph.node(param)?.is_parameter() {
                return Err(GraphError::NotAParameter(param));
            }
            if !declared.insert(param) {
                return Err(GraphError::DuplicateParameter(param));
            }
        }

        let order = topological_order(&self.graph, &self.results)?;
        for &id in &order {
            if matches!(self.graph.node(id)?.op(), Op::Parameter) && !declared.contains(&id) {
                return Err(GraphError::UndeclaredParameter(id));
            }
        }
        Ok(order)
    }

    /// Returns an equivalent function whose arena holds only the declared parameters and
    /// the nodes reachable from the results.
    pub fn compacted(&self) -> Result<Function, GraphError> {
        let (graph, parameters, results) = self.graph.compact(&self.parameters, &self.results)?;
        Ok(Function {
            name: self.name.clone(),
            graph,
            parameters,
            results,
        })
    }

    pub fn into_parts(self) -> (String, Graph, Vec<NodeId>, Vec<Output>) {
        (self.name, self.graph, self.parameters, self.results)
    }
}

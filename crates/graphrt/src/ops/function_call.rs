use std::sync::Arc;

use crate::backend::spec::TensorSpec;
use crate::graph::infer::{expect_arity, expect_same_spec};
use crate::graph::{Function, Graph, GraphError, NodeId, Op, Output};

const OP_NAME: &str = "FunctionCall";

/// Invocation of an inner [`Function`] on a named backend.
///
/// The node's inputs bind the callee's parameters in order; its outputs are the callee's
/// results. Instances are created once during partitioning and never mutated.
#[derive(Debug, Clone)]
pub struct FunctionCallSpec {
    pub function: Arc<Function>,
    /// Placement label or backend name that executes `function`.
    pub backend: String,
    pub outputs: Vec<TensorSpec>,
}

impl PartialEq for FunctionCallSpec {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.function, &other.function)
            && self.backend == other.backend
            && self.outputs == other.outputs
    }
}

impl FunctionCallSpec {
    /// Declares a call to `function` whose outputs mirror the function's results.
    pub fn new(function: Arc<Function>, backend: impl Into<String>) -> Result<Self, GraphError> {
        let outputs = function.result_specs()?.into_iter().cloned().collect();
        Ok(Self {
            function,
            backend: backend.into(),
            outputs,
        })
    }
}

/// Appends a FunctionCall node running `function` on `backend` with `args` bound to its
/// parameters.
pub fn function_call(
    graph: &mut Graph,
    function: Arc<Function>,
    backend: impl Into<String>,
    args: &[Output],
) -> Result<NodeId, GraphError> {
    let spec = FunctionCallSpec::new(function, backend)?;
    graph.add_node(Op::FunctionCall(spec), args.iter().copied())
}

/// Checks the arguments against the callee signature and returns the declared outputs.
pub(crate) fn infer_outputs(
    spec: &FunctionCallSpec,
    inputs: &[&TensorSpec],
) -> Result<Vec<TensorSpec>, GraphError> {
    let parameters = spec.function.parameter_specs()?;
    expect_arity(OP_NAME, parameters.len(), inputs.len())?;
    for (expected, found) in parameters.iter().zip(inputs) {
        expect_same_spec(OP_NAME, expected, found)?;
    }

    let results = spec.function.result_specs()?;
    if results.len() != spec.outputs.len() {
        return Err(GraphError::InvalidAttribute {
            op: OP_NAME,
            detail: format!(
                "declares {} output(s) but `{}` returns {}",
                spec.outputs.len(),
                spec.function.name(),
                results.len()
            ),
        });
    }
    for (result, declared) in results.iter().zip(&spec.outputs) {
        expect_same_spec(OP_NAME, result, declared)?;
    }
    Ok(spec.outputs.clone())
}

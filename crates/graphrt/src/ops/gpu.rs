//! Device-specific op variants.
//!
//! `CUDNNBatchNorm` behaves like the base batch norm and additionally exposes the mean and
//! inverse variance it used, so a backward pass can reuse them without recomputation.

use crate::graph::{Graph, GraphError, NodeId, Op, Output};
use crate::ops::batch_norm::BatchNormSpec;

/// Appends a `CUDNNBatchNorm` that computes batch statistics.
///
/// Outputs: `(normalized, batch_mean, batch_variance, saved_mean, saved_inv_variance)`.
pub fn cudnn_batch_norm_training(
    graph: &mut Graph,
    epsilon: f64,
    gamma: impl Into<Output>,
    beta: impl Into<Output>,
    input: impl Into<Output>,
) -> Result<NodeId, GraphError> {
    graph.add_node(
        Op::CudnnBatchNorm(BatchNormSpec::training(epsilon)),
        [gamma.into(), beta.into(), input.into()],
    )
}

/// Appends a `CUDNNBatchNorm` over supplied statistics.
///
/// Outputs: `(normalized, saved_mean, saved_inv_variance)`.
pub fn cudnn_batch_norm_inference(
    graph: &mut Graph,
    spec: BatchNormSpec,
    gamma: impl Into<Output>,
    beta: impl Into<Output>,
    input: impl Into<Output>,
    mean: impl Into<Output>,
    variance: impl Into<Output>,
) -> Result<NodeId, GraphError> {
    graph.add_node(
        Op::CudnnBatchNorm(spec),
        [
            gamma.into(),
            beta.into(),
            input.into(),
            mean.into(),
            variance.into(),
        ],
    )
}

/// Appends the device variant of the base `BatchNorm` node `node`, reading the same inputs.
///
/// The base node's outputs are a prefix of the variant's, so consumers can be rebound
/// index for index.
pub fn to_cudnn_variant(graph: &mut Graph, node: NodeId) -> Result<NodeId, GraphError> {
    let base = graph.node(node)?;
    let spec = match base.op() {
        Op::BatchNorm(spec) => *spec,
        other => {
            return Err(GraphError::InvalidAttribute {
                op: other.name(),
                detail: format!("node {node:?} is not a BatchNorm"),
            })
        }
    };
    let inputs = base.inputs().to_vec();
    graph.add_node(Op::CudnnBatchNorm(spec), inputs)
}

//! Batch normalization over the channel axis (axis 1).
//!
//! The base op has two forms:
//! - `(gamma, beta, input)` normalizes with statistics computed from the batch and returns
//!   `(normalized, batch_mean, batch_variance)`. This form is always in training mode.
//! - `(gamma, beta, input, mean, variance)` normalizes with the supplied statistics and
//!   returns `(normalized)`. The training flag is carried as given.

use serde::{Deserialize, Serialize};

use crate::backend::spec::{Shape, TensorSpec};
use crate::graph::infer::{dim_at, expect_arity};
use crate::graph::{Graph, GraphError, NodeId, Op, Output};

pub const TRAINING_ARITY: usize = 3;
pub const INFERENCE_ARITY: usize = 5;

pub const GAMMA: usize = 0;
pub const BETA: usize = 1;
pub const INPUT: usize = 2;
pub const MEAN: usize = 3;
pub const VARIANCE: usize = 4;

/// Attributes shared by the base op and its device variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchNormSpec {
    pub epsilon: f64,
    pub training: bool,
}

impl BatchNormSpec {
    pub fn training(epsilon: f64) -> Self {
        Self {
            epsilon,
            training: true,
        }
    }

    pub fn inference(epsilon: f64) -> Self {
        Self {
            epsilon,
            training: false,
        }
    }
}

/// Appends a batch norm that computes batch statistics.
pub fn batch_norm_training(
    graph: &mut Graph,
    epsilon: f64,
    gamma: impl Into<Output>,
    beta: impl Into<Output>,
    input: impl Into<Output>,
) -> Result<NodeId, GraphError> {
    graph.add_node(
        Op::BatchNorm(BatchNormSpec::training(epsilon)),
        [gamma.into(), beta.into(), input.into()],
    )
}

/// Appends a batch norm that consumes the supplied `mean` and `variance`.
pub fn batch_norm_inference(
    graph: &mut Graph,
    spec: BatchNormSpec,
    gamma: impl Into<Output>,
    beta: impl Into<Output>,
    input: impl Into<Output>,
    mean: impl Into<Output>,
    variance: impl Into<Output>,
) -> Result<NodeId, GraphError> {
    graph.add_node(
        Op::BatchNorm(spec),
        [
            gamma.into(),
            beta.into(),
            input.into(),
            mean.into(),
            variance.into(),
        ],
    )
}

/// Output specs of the base op for `inputs`.
pub(crate) fn infer_base_outputs(
    op: &'static str,
    spec: &BatchNormSpec,
    inputs: &[&TensorSpec],
) -> Result<Vec<TensorSpec>, GraphError> {
    if !spec.epsilon.is_finite() || spec.epsilon < 0.0 {
        return Err(GraphError::InvalidAttribute {
            op,
            detail: format!("epsilon must be finite and non-negative, got {}", spec.epsilon),
        });
    }
    let arity = match inputs.len() {
        TRAINING_ARITY | INFERENCE_ARITY => inputs.len(),
        found => {
            let expected = if spec.training {
                TRAINING_ARITY
            } else {
                INFERENCE_ARITY
            };
            return Err(GraphError::Arity {
                op,
                expected,
                found,
            });
        }
    };
    if arity == TRAINING_ARITY && !spec.training {
        expect_arity(op, INFERENCE_ARITY, arity)?;
    }

    let input = inputs[INPUT];
    if !input.dtype.is_float() {
        return Err(GraphError::InvalidAttribute {
            op,
            detail: format!("input must be floating point, got {:?}", input.dtype),
        });
    }
    if input.shape.rank() < 2 {
        return Err(GraphError::ShapeMismatch {
            op,
            detail: format!("input rank must be at least 2, got {}", input.shape),
        });
    }
    let channel_shape = Shape::new(vec![dim_at(op, &input.shape, 1)?]);

    for (slot, side) in inputs.iter().enumerate() {
        if slot == INPUT {
            continue;
        }
        if side.dtype != input.dtype {
            return Err(GraphError::TypeMismatch {
                op,
                expected: input.dtype,
                found: side.dtype,
            });
        }
        if side.shape != channel_shape {
            return Err(GraphError::ShapeMismatch {
                op,
                detail: format!(
                    "input #{slot} must be shaped {channel_shape}, got {}",
                    side.shape
                ),
            });
        }
    }

    let channel = TensorSpec::new(input.dtype, channel_shape);
    if arity == TRAINING_ARITY {
        Ok(vec![input.clone(), channel.clone(), channel])
    } else {
        Ok(vec![input.clone()])
    }
}

/// Base outputs followed by the saved mean and saved inverse variance, both shaped `[C]`.
pub(crate) fn infer_cudnn_outputs(
    op: &'static str,
    spec: &BatchNormSpec,
    inputs: &[&TensorSpec],
) -> Result<Vec<TensorSpec>, GraphError> {
    let mut outputs = infer_base_outputs(op, spec, inputs)?;
    let channel = TensorSpec::new(
        inputs[INPUT].dtype,
        Shape::new(vec![dim_at(op, &inputs[INPUT].shape, 1)?]),
    );
    outputs.push(channel.clone());
    outputs.push(channel);
    Ok(outputs)
}

use crate::backend::spec::{Dimension, Shape, TensorSpec};
use crate::graph::{GraphError, Op};
use crate::ops::{batch_norm, function_call};

/// Derives the output specs of `op` applied to inputs with the given specs.
pub(crate) fn infer_outputs(op: &Op, inputs: &[&TensorSpec]) -> Result<Vec<TensorSpec>, GraphError> {
    match op {
        Op::Parameter => Err(GraphError::InvalidAttribute {
            op: op.name(),
            detail: "parameters declare their spec at construction".to_string(),
        }),
        Op::Constant(literal) => {
            expect_arity(op.name(), 0, inputs.len())?;
            let expected = literal.spec.byte_len();
            if expected != Some(literal.byte_len()) {
                return Err(GraphError::InvalidAttribute {
                    op: op.name(),
                    detail: format!(
                        "literal {} carries {} bytes, expected {expected:?}",
                        literal.spec,
                        literal.byte_len()
                    ),
                });
            }
            Ok(vec![literal.spec.clone()])
        }
        Op::Binary(_) => {
            expect_arity(op.name(), 2, inputs.len())?;
            expect_same_spec(op.name(), inputs[0], inputs[1])?;
            Ok(vec![inputs[0].clone()])
        }
        Op::Unary(_) => {
            expect_arity(op.name(), 1, inputs.len())?;
            Ok(vec![inputs[0].clone()])
        }
        Op::BatchNorm(spec) => batch_norm::infer_base_outputs(op.name(), spec, inputs),
        Op::CudnnBatchNorm(spec) => batch_norm::infer_cudnn_outputs(op.name(), spec, inputs),
        Op::FunctionCall(spec) => function_call::infer_outputs(spec, inputs),
    }
}

pub(crate) fn expect_arity(op: &'static str, expected: usize, found: usize) -> Result<(), GraphError> {
    if expected != found {
        return Err(GraphError::Arity {
            op,
            expected,
            found,
        });
    }
    Ok(())
}

pub(crate) fn expect_same_spec(
    op: &'static str,
    expected: &TensorSpec,
    found: &TensorSpec,
) -> Result<(), GraphError> {
    if expected.dtype != found.dtype {
        return Err(GraphError::TypeMismatch {
            op,
            expected: expected.dtype,
            found: found.dtype,
        });
    }
    if expected.shape != found.shape {
        return Err(GraphError::ShapeMismatch {
            op,
            detail: format!("{} vs {}", expected.shape, found.shape),
        });
    }
    Ok(())
}

/// Returns the extent of `axis`, which must exist.
pub(crate) fn dim_at(op: &'static str, shape: &Shape, axis: usize) -> Result<Dimension, GraphError> {
    shape
        .dim(axis)
        .cloned()
        .ok_or_else(|| GraphError::ShapeMismatch {
            op,
            detail: format!("shape {shape} has no axis {axis}"),
        })
}

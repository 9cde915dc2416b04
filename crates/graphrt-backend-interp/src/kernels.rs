use std::sync::Arc;

use graphrt::backend::spec::{BackendError, BackendResult, DType, Shape, TensorLiteral, TensorSpec};
use graphrt::graph::{BinaryOp, Op, UnaryOp};
use graphrt::ops::batch_norm::{
    BatchNormSpec, BETA, GAMMA, INFERENCE_ARITY, INPUT, MEAN, TRAINING_ARITY, VARIANCE,
};

/// Host-side value flowing between interpreter nodes.
#[derive(Clone)]
pub struct CpuTensor {
    pub spec: TensorSpec,
    pub data: TensorData,
}

#[derive(Clone)]
pub enum TensorData {
    F32(Arc<[f32]>),
    Si32(Arc<[i32]>),
}

impl CpuTensor {
    fn f32(spec: &TensorSpec, values: Vec<f32>) -> Self {
        Self {
            spec: spec.clone(),
            data: TensorData::F32(Arc::from(values)),
        }
    }

    fn si32(spec: &TensorSpec, values: Vec<i32>) -> Self {
        Self {
            spec: spec.clone(),
            data: TensorData::Si32(Arc::from(values)),
        }
    }

    fn as_f32(&self, what: &str) -> BackendResult<&[f32]> {
        match &self.data {
            TensorData::F32(values) => Ok(values.as_ref()),
            TensorData::Si32(_) => Err(BackendError::execution(format!(
                "{what} expects f32 data, found {:?}",
                self.spec.dtype
            ))),
        }
    }
}

/// Element types the interpreter stores on the host.
pub(crate) fn is_host_dtype(dtype: DType) -> bool {
    matches!(dtype, DType::F32 | DType::Si32)
}

pub(crate) fn literal_to_tensor(literal: &TensorLiteral) -> BackendResult<CpuTensor> {
    match literal.spec.dtype {
        DType::F32 => Ok(CpuTensor::f32(&literal.spec, literal.to_f32()?)),
        DType::Si32 => Ok(CpuTensor::si32(&literal.spec, literal.to_i32()?)),
        other => Err(BackendError::unimplemented(
            "literal",
            format!("dtype {other:?} is not supported by the interpreter"),
        )),
    }
}

pub(crate) fn tensor_to_literal(tensor: &CpuTensor) -> TensorLiteral {
    let shape = tensor.spec.shape.clone();
    match &tensor.data {
        TensorData::F32(values) => TensorLiteral::from_f32(shape, values),
        TensorData::Si32(values) => TensorLiteral::from_i32(shape, values),
    }
}

/// Evaluates one node. `outputs` are the node's declared output specs.
pub(crate) fn execute_op(
    op: &Op,
    inputs: &[CpuTensor],
    outputs: &[TensorSpec],
) -> BackendResult<Vec<CpuTensor>> {
    let first_output = outputs
        .first()
        .ok_or_else(|| BackendError::execution("node declares no outputs"))?;
    let result = match op {
        Op::Constant(literal) => vec![literal_to_tensor(literal)?],
        Op::Binary(op) => vec![op_binary(inputs, first_output, *op)?],
        Op::Unary(op) => vec![op_unary(inputs, first_output, *op)?],
        Op::BatchNorm(spec) => op_batch_norm(inputs, outputs, spec, false)?,
        Op::CudnnBatchNorm(spec) => op_batch_norm(inputs, outputs, spec, true)?,
        Op::Parameter => {
            return Err(BackendError::execution(
                "parameters are bound by the caller, not executed",
            ))
        }
        Op::FunctionCall(_) => {
            return Err(BackendError::unimplemented(
                "FunctionCall",
                "nested calls are not supported by the interpreter",
            ))
        }
    };
    Ok(result)
}

fn op_binary(inputs: &[CpuTensor], output: &TensorSpec, op: BinaryOp) -> BackendResult<CpuTensor> {
    if inputs.len() != 2 {
        return Err(BackendError::execution("elementwise binary expects 2 inputs"));
    }
    match (&inputs[0].data, &inputs[1].data) {
        (TensorData::F32(a), TensorData::F32(b)) => {
            if a.len() != b.len() {
                return Err(BackendError::execution("elementwise size mismatch"));
            }
            let result: Vec<f32> = a
                .iter()
                .zip(b.iter())
                .map(|(&x, &y)| match op {
                    BinaryOp::Add => x + y,
                    BinaryOp::Subtract => x - y,
                    BinaryOp::Multiply => x * y,
                    BinaryOp::Divide => x / y,
                    BinaryOp::Maximum => x.max(y),
                    BinaryOp::Minimum => x.min(y),
                })
                .collect();
            Ok(CpuTensor::f32(output, result))
        }
        (TensorData::Si32(a), TensorData::Si32(b)) => {
            if a.len() != b.len() {
                return Err(BackendError::execution("elementwise size mismatch"));
            }
            let mut result = Vec::with_capacity(a.len());
            for (&x, &y) in a.iter().zip(b.iter()) {
                let value = match op {
                    BinaryOp::Add => x.wrapping_add(y),
                    BinaryOp::Subtract => x.wrapping_sub(y),
                    BinaryOp::Multiply => x.wrapping_mul(y),
                    BinaryOp::Divide => x
                        .checked_div(y)
                        .ok_or_else(|| BackendError::execution("integer division by zero"))?,
                    BinaryOp::Maximum => x.max(y),
                    BinaryOp::Minimum => x.min(y),
                };
                result.push(value);
            }
            Ok(CpuTensor::si32(output, result))
        }
        _ => Err(BackendError::execution(
            "elementwise binary operands must share a dtype",
        )),
    }
}

fn op_unary(inputs: &[CpuTensor], output: &TensorSpec, op: UnaryOp) -> BackendResult<CpuTensor> {
    let input = expect_single(inputs)?;
    match &input.data {
        TensorData::F32(values) => {
            let result: Vec<f32> = values
                .iter()
                .map(|&x| match op {
                    UnaryOp::Negative => -x,
                    UnaryOp::Abs => x.abs(),
                    UnaryOp::Sqrt => x.sqrt(),
                })
                .collect();
            Ok(CpuTensor::f32(output, result))
        }
        TensorData::Si32(values) => {
            let result: Vec<i32> = match op {
                UnaryOp::Negative => values.iter().map(|x| x.wrapping_neg()).collect(),
                UnaryOp::Abs => values.iter().map(|x| x.wrapping_abs()).collect(),
                UnaryOp::Sqrt => {
                    return Err(BackendError::unimplemented(
                        "Sqrt",
                        "integer square root is not supported",
                    ))
                }
            };
            Ok(CpuTensor::si32(output, result))
        }
    }
}

/// Normalizes over every axis but the channel axis (1).
///
/// With three inputs the statistics come from the batch (biased variance); with five they
/// are read from the `mean` and `variance` inputs. `saved` appends the mean used and
/// `1 / sqrt(variance + epsilon)`.
fn op_batch_norm(
    inputs: &[CpuTensor],
    outputs: &[TensorSpec],
    spec: &BatchNormSpec,
    saved: bool,
) -> BackendResult<Vec<CpuTensor>> {
    if !matches!(inputs.len(), TRAINING_ARITY | INFERENCE_ARITY) {
        return Err(BackendError::execution(format!(
            "batch norm expects 3 or 5 inputs, found {}",
            inputs.len()
        )));
    }
    let x = inputs[INPUT].as_f32("batch norm input")?;
    let gamma = inputs[GAMMA].as_f32("batch norm gamma")?;
    let beta = inputs[BETA].as_f32("batch norm beta")?;
    let dims = static_dims(&inputs[INPUT].spec.shape)?;
    if dims.len() < 2 {
        return Err(BackendError::execution("batch norm input needs rank >= 2"));
    }
    let channels = dims[1];
    let inner: usize = dims[2..].iter().product();
    let per_channel = dims[0] * inner;
    if gamma.len() != channels || beta.len() != channels || x.len() != channels * per_channel {
        return Err(BackendError::execution("batch norm operand sizes disagree"));
    }
    let channel_of = |index: usize| (index / inner.max(1)) % channels;

    let (mean, variance) = if inputs.len() == TRAINING_ARITY {
        let mut mean = vec![0.0f64; channels];
        for (index, &value) in x.iter().enumerate() {
            mean[channel_of(index)] += f64::from(value);
        }
        let count = per_channel.max(1) as f64;
        mean.iter_mut().for_each(|m| *m /= count);
        let mut variance = vec![0.0f64; channels];
        for (index, &value) in x.iter().enumerate() {
            let c = channel_of(index);
            let centered = f64::from(value) - mean[c];
            variance[c] += centered * centered;
        }
        variance.iter_mut().for_each(|v| *v /= count);
        (mean, variance)
    } else {
        let mean = inputs[MEAN].as_f32("batch norm mean")?;
        let variance = inputs[VARIANCE].as_f32("batch norm variance")?;
        if mean.len() != channels || variance.len() != channels {
            return Err(BackendError::execution("batch norm statistics sizes disagree"));
        }
        (
            mean.iter().map(|&m| f64::from(m)).collect::<Vec<_>>(),
            variance.iter().map(|&v| f64::from(v)).collect::<Vec<_>>(),
        )
    };

    let inv_std: Vec<f64> = variance
        .iter()
        .map(|&v| 1.0 / (v + spec.epsilon).sqrt())
        .collect();
    let normalized: Vec<f32> = x
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            let c = channel_of(index);
            let scaled = (f64::from(value) - mean[c]) * inv_std[c];
            (scaled * f64::from(gamma[c]) + f64::from(beta[c])) as f32
        })
        .collect();

    let to_f32 = |values: &[f64]| values.iter().map(|&v| v as f32).collect::<Vec<f32>>();
    let spec_at = |index: usize| {
        outputs.get(index).ok_or_else(|| {
            BackendError::execution(format!("batch norm output #{index} is not declared"))
        })
    };

    let mut result = vec![CpuTensor::f32(spec_at(0)?, normalized)];
    if inputs.len() == TRAINING_ARITY {
        result.push(CpuTensor::f32(spec_at(1)?, to_f32(&mean)));
        result.push(CpuTensor::f32(spec_at(2)?, to_f32(&variance)));
    }
    if saved {
        let next = result.len();
        result.push(CpuTensor::f32(spec_at(next)?, to_f32(&mean)));
        result.push(CpuTensor::f32(spec_at(next + 1)?, to_f32(&inv_std)));
    }
    Ok(result)
}

fn expect_single(inputs: &[CpuTensor]) -> BackendResult<&CpuTensor> {
    if inputs.len() != 1 {
        Err(BackendError::execution("operation expects single input"))
    } else {
        Ok(&inputs[0])
    }
}

fn static_dims(shape: &Shape) -> BackendResult<Vec<usize>> {
    shape.static_dims().ok_or_else(|| {
        BackendError::execution(format!("dynamic shape {shape} not supported at runtime"))
    })
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::backend::spec::{TensorLiteral, TensorSpec};
use crate::ops::batch_norm::BatchNormSpec;
use crate::ops::function_call::FunctionCallSpec;

/// Stable identifier of a node inside its [`super::Graph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Addresses output `index` of this node.
    pub fn output(self, index: usize) -> Output {
        Output { node: self, index }
    }
}

/// One output of a node, the unit of data flowing along graph edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Output {
    pub node: NodeId,
    pub index: usize,
}

impl Output {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

impl From<NodeId> for Output {
    fn from(node: NodeId) -> Self {
        Output { node, index: 0 }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}.{}", self.node.0, self.index)
    }
}

/// Element-wise binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Maximum,
    Minimum,
}

/// Element-wise unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Negative,
    Abs,
    Sqrt,
}

/// Operator kind, the unit backends declare support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OpKind {
    Parameter,
    Constant,
    Add,
    Subtract,
    Multiply,
    Divide,
    Maximum,
    Minimum,
    Negative,
    Abs,
    Sqrt,
    BatchNorm,
    CudnnBatchNorm,
    FunctionCall,
}

impl OpKind {
    pub const ALL: [OpKind; 14] = [
        OpKind::Parameter,
        OpKind::Constant,
        OpKind::Add,
        OpKind::Subtract,
        OpKind::Multiply,
        OpKind::Divide,
        OpKind::Maximum,
        OpKind::Minimum,
        OpKind::Negative,
        OpKind::Abs,
        OpKind::Sqrt,
        OpKind::BatchNorm,
        OpKind::CudnnBatchNorm,
        OpKind::FunctionCall,
    ];

    /// Stable textual name, as used in backend configuration strings.
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Parameter => "Parameter",
            OpKind::Constant => "Constant",
            OpKind::Add => "Add",
            OpKind::Subtract => "Subtract",
            OpKind::Multiply => "Multiply",
            OpKind::Divide => "Divide",
            OpKind::Maximum => "Maximum",
            OpKind::Minimum => "Minimum",
            OpKind::Negative => "Negative",
            OpKind::Abs => "Abs",
            OpKind::Sqrt => "Sqrt",
            OpKind::BatchNorm => "BatchNorm",
            OpKind::CudnnBatchNorm => "CUDNNBatchNorm",
            OpKind::FunctionCall => "FunctionCall",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown op kind `{0}`")]
pub struct ParseOpKindError(pub String);

impl FromStr for OpKind {
    type Err = ParseOpKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        OpKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == trimmed)
            .ok_or_else(|| ParseOpKindError(trimmed.to_string()))
    }
}

impl From<BinaryOp> for OpKind {
    fn from(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => OpKind::Add,
            BinaryOp::Subtract => OpKind::Subtract,
            BinaryOp::Multiply => OpKind::Multiply,
            BinaryOp::Divide => OpKind::Divide,
            BinaryOp::Maximum => OpKind::Maximum,
            BinaryOp::Minimum => OpKind::Minimum,
        }
    }
}

impl From<UnaryOp> for OpKind {
    fn from(op: UnaryOp) -> Self {
        match op {
            UnaryOp::Negative => OpKind::Negative,
            UnaryOp::Abs => OpKind::Abs,
            UnaryOp::Sqrt => OpKind::Sqrt,
        }
    }
}

/// Operator applied by a node, including its attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Parameter,
    Constant(TensorLiteral),
    Binary(BinaryOp),
    Unary(UnaryOp),
    BatchNorm(BatchNormSpec),
    /// Device batch norm that appends the saved mean and inverse variance it computed.
    CudnnBatchNorm(BatchNormSpec),
    FunctionCall(FunctionCallSpec),
}

impl Op {
    pub fn kind(&self) -> OpKind {
        match self {
            Op::Parameter => OpKind::Parameter,
            Op::Constant(_) => OpKind::Constant,
            Op::Binary(op) => (*op).into(),
            Op::Unary(op) => (*op).into(),
            Op::BatchNorm(_) => OpKind::BatchNorm,
            Op::CudnnBatchNorm(_) => OpKind::CudnnBatchNorm,
            Op::FunctionCall(_) => OpKind::FunctionCall,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// Operator application stored in a graph arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) op: Op,
    pub(crate) inputs: SmallVec<[Output; 4]>,
    pub(crate) outputs: Vec<TensorSpec>,
    pub(crate) name: Option<String>,
}

impl Node {
    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn kind(&self) -> OpKind {
        self.op.kind()
    }

    pub fn inputs(&self) -> &[Output] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TensorSpec] {
        &self.outputs
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn output_spec(&self, index: usize) -> Option<&TensorSpec> {
        self.outputs.get(index)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.op, Op::Parameter)
    }
}

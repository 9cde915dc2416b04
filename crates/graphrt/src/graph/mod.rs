//! Graph IR: an append-only arena of operator nodes plus named functions over it.
//!
//! Nodes are addressed by stable [`NodeId`]s and consume [`Output`]s of earlier nodes. A
//! node's output count and output specs are fixed when it is added; the only mutation the
//! arena allows afterwards is rebinding an input slot through [`crate::hybrid::Edge`].

mod arena;
mod function;
pub(crate) mod infer;
mod node;
pub mod topology;

use thiserror::Error;

use crate::backend::spec::DType;

pub use arena::Graph;
pub use function::Function;
pub use node::{BinaryOp, Node, NodeId, Op, OpKind, Output, ParseOpKindError, UnaryOp};

/// Structural error raised while building, cloning or validating graphs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node {0:?} does not exist")]
    MissingNode(NodeId),
    #[error("node {node:?} has no output #{index}")]
    InvalidOutput { node: NodeId, index: usize },
    #[error("node {node:?} has no input slot #{slot}")]
    InvalidInputSlot { node: NodeId, slot: usize },
    #[error("{op} expects {expected} input(s), found {found}")]
    Arity {
        op: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{op}: element type mismatch, expected {expected:?}, found {found:?}")]
    TypeMismatch {
        op: &'static str,
        expected: DType,
        found: DType,
    },
    #[error("{op}: shape mismatch ({detail})")]
    ShapeMismatch { op: &'static str, detail: String },
    #[error("{op}: invalid attribute ({detail})")]
    InvalidAttribute { op: &'static str, detail: String },
    #[error("node {0:?} is not a Parameter")]
    NotAParameter(NodeId),
    #[error("parameter {0:?} is listed more than once")]
    DuplicateParameter(NodeId),
    #[error("parameter {0:?} is reachable from the results but not declared")]
    UndeclaredParameter(NodeId),
    #[error("graph contains a cycle through node {0:?}")]
    Cycle(NodeId),
}

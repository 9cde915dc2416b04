pub mod backend;
mod env;
pub mod graph;
pub mod hybrid;
pub mod ops;
pub mod visualize;

pub use backend::registry::{
    create_backend, create_backend_with_config, get_typed_backend, has_backend, list_backends,
    register_backend,
};
pub use backend::spec::{
    Backend, BackendError, BackendResult, DType, Dimension, Executable, Shape, TensorLiteral,
    TensorSpec,
};
pub use backend::tensor::Tensor;
pub use graph::{Function, Graph, GraphError, NodeId, Op, OpKind, Output};
pub use hybrid::{HybridBackend, HybridExecutable};

//! Hybrid backend: placement, partitioning into FunctionCalls, and staged execution.
//!
//! A function moves through three forms. [`partition`] turns it into a
//! [`PartitionedFunction`] whose outer graph holds only Parameters and FunctionCalls;
//! [`HybridBackend::compile`](crate::backend::Backend::compile) binds each call site to a
//! backend and an inner executable; [`HybridExecutable`] runs the call sites in dependency
//! order, passing tensors across partition boundaries.

mod backend;
pub mod edge;
pub mod partition;
pub mod placement;

pub use backend::{
    register_hybrid_backend, HybridBackend, HybridExecutable, HybridStep, HYBRID_BACKEND_NAME,
};
pub use edge::{Edge, EdgeRewrite};
pub use partition::{partition, CallSummary, PartitionReport, PartitionedFunction};
pub use placement::{label_backends, Cluster, LabeledBackend, Site};

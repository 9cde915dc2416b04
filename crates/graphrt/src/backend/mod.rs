pub mod registry;
pub mod shape_helpers;
pub mod spec;
pub mod tensor;
pub mod validate;

pub use spec::{Backend, BackendError, BackendResult, Executable};
pub use tensor::Tensor;

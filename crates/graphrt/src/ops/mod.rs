//! Operator attributes and graph builders for the ops that carry more than a kind.
pub mod batch_norm;
pub mod function_call;
pub mod gpu;

pub use batch_norm::{batch_norm_inference, batch_norm_training, BatchNormSpec};
pub use function_call::{function_call, FunctionCallSpec};
pub use gpu::{cudnn_batch_norm_inference, cudnn_batch_norm_training, to_cudnn_variant};

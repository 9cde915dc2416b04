mod interpreter;
mod kernels;

use std::sync::Arc;

use graphrt::backend::registry::register_backend;
use graphrt::backend::spec::Backend;

pub use interpreter::{InterpreterBackend, InterpreterExecutable};
pub use kernels::{CpuTensor, TensorData};

pub const INTERPRETER_BACKEND_NAME: &str = "INTERPRETER";

/// Register the interpreter with the global backend registry under `"INTERPRETER"`.
///
/// The registry config string lists op kinds to refuse, so `"INTERPRETER:Add,Multiply"`
/// creates an interpreter without `Add` and `Multiply`. Call this during start-up, before
/// creating backends by name.
pub fn register_interpreter_backend() {
    register_backend(INTERPRETER_BACKEND_NAME, |config| {
        Ok(Arc::new(InterpreterBackend::from_config(config)?) as Arc<dyn Backend>)
    });
}

use std::any::Any;
use std::sync::{Arc, Mutex};

use graphrt::backend::spec::{Backend, BackendResult, Executable, TensorSpec};
use graphrt::backend::tensor::Tensor;
use graphrt::graph::{Function, OpKind};

/// Test-only backend wrapper that records every function it compiles and every call it
/// runs, delegating the work to `inner`.
pub struct RecordingBackend {
    inner: Arc<dyn Backend>,
    compiled: Mutex<Vec<Arc<Function>>>,
    calls: Mutex<usize>,
}

impl RecordingBackend {
    pub fn new(inner: Arc<dyn Backend>) -> Self {
        Self {
            inner,
            compiled: Mutex::new(Vec::new()),
            calls: Mutex::new(0),
        }
    }

    pub fn compiled_functions(&self) -> Vec<Arc<Function>> {
        self.compiled
            .lock()
            .expect("backend mutex poisoned")
            .clone()
    }

    pub fn compiled_names(&self) -> Vec<String> {
        self.compiled_functions()
            .iter()
            .map(|function| function.name().to_string())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().expect("backend mutex poisoned")
    }
}

impl Backend for RecordingBackend {
    fn backend_name(&self) -> &str {
        self.inner.backend_name()
    }

    fn is_supported(&self, kind: OpKind) -> bool {
        self.inner.is_supported(kind)
    }

    fn create_tensor(&self, spec: TensorSpec) -> BackendResult<Arc<Tensor>> {
        self.inner.create_tensor(spec)
    }

    fn compile(&self, function: Arc<Function>) -> BackendResult<Arc<dyn Executable>> {
        self.compiled
            .lock()
            .expect("backend mutex poisoned")
            .push(Arc::clone(&function));
        self.inner.compile(function)
    }

    fn call(
        &self,
        executable: &dyn Executable,
        outputs: &[Arc<Tensor>],
        inputs: &[Arc<Tensor>],
    ) -> BackendResult<()> {
        *self.calls.lock().expect("backend mutex poisoned") += 1;
        self.inner.call(executable, outputs, inputs)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::backend::registry::{create_backend, register_backend};
use crate::backend::spec::{
    downcast_executable, Backend, BackendError, BackendResult, Executable, TensorSpec,
};
use crate::backend::tensor::Tensor;
use crate::env;
use crate::graph::{Function, NodeId, Op, OpKind, Output};
use crate::hybrid::partition::{partition, PartitionReport};
use crate::hybrid::placement::{label_backends, LabeledBackend};
use crate::visualize::{DotFileVisualizer, GraphVisualizer};

pub const HYBRID_BACKEND_NAME: &str = "HYBRID";

/// Backend composing several backends.
///
/// Each node is placed on the first held backend that supports its kind. Runs of nodes
/// with the same placement become inner functions compiled by that backend, and the outer
/// function sequences their FunctionCalls.
pub struct HybridBackend {
    backends: Vec<LabeledBackend>,
    debug: AtomicBool,
    visualizer: Arc<dyn GraphVisualizer>,
}

impl HybridBackend {
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Self {
        Self {
            backends: label_backends(backends),
            debug: AtomicBool::new(env::hybrid_debug_enabled()),
            visualizer: Arc::new(DotFileVisualizer::new(env::dump_dir().clone())),
        }
    }

    /// Builds a hybrid from `;`-separated backend strings, each resolved through the
    /// registry (e.g. `"INTERPRETER:Add;INTERPRETER:Multiply"`).
    pub fn from_config(config: &str) -> BackendResult<Self> {
        let backends = config
            .split(';')
            .map(str::trim)
            .filter(|spec| !spec.is_empty())
            .map(create_backend)
            .collect::<BackendResult<Vec<_>>>()?;
        if backends.is_empty() {
            return Err(BackendError::compile(
                "hybrid backend needs at least one backend in its config",
            ));
        }
        Ok(Self::new(backends))
    }

    /// Replaces the snapshot sink used in debug mode.
    pub fn with_visualizer(mut self, visualizer: Arc<dyn GraphVisualizer>) -> Self {
        self.visualizer = visualizer;
        self
    }

    pub fn set_debug_enabled(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Placement labels in backend order.
    pub fn labels(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.label.as_str()).collect()
    }

    /// Resolves a FunctionCall target: label, then backend name, then the registry.
    fn resolve(&self, target: &str) -> BackendResult<Arc<dyn Backend>> {
        if let Some(held) = self.backends.iter().find(|b| b.label == target) {
            return Ok(Arc::clone(&held.backend));
        }
        if let Some(held) = self
            .backends
            .iter()
            .find(|b| b.backend.backend_name() == target)
        {
            return Ok(Arc::clone(&held.backend));
        }
        debug!(target, "resolving call target through the registry");
        create_backend(target)
    }
}

impl Backend for HybridBackend {
    fn backend_name(&self) -> &str {
        HYBRID_BACKEND_NAME
    }

    fn is_supported(&self, kind: OpKind) -> bool {
        matches!(kind, OpKind::Parameter | OpKind::FunctionCall)
            || self.backends.iter().any(|b| b.backend.is_supported(kind))
    }

    fn create_tensor(&self, spec: TensorSpec) -> BackendResult<Arc<Tensor>> {
        match self.backends.first() {
            Some(first) => first.backend.create_tensor(spec),
            None => Ok(Arc::new(Tensor::allocate(HYBRID_BACKEND_NAME, spec)?)),
        }
    }

    fn compile(&self, function: Arc<Function>) -> BackendResult<Arc<dyn Executable>> {
        let order = function
            .validate()
            .map_err(|err| BackendError::compile(format!("`{}`: {err}", function.name())))?;
        let already_partitioned = order.iter().all(|&id| {
            matches!(
                function.graph().node(id).map(|node| node.kind()),
                Ok(OpKind::Parameter | OpKind::FunctionCall)
            )
        });

        let (outer, report) = if already_partitioned {
            trace!(function = function.name(), "graph is already partitioned");
            (Arc::clone(&function), None)
        } else {
            let debug = self.debug_enabled();
            let visualizer = debug.then_some(self.visualizer.as_ref());
            let partitioned = partition(&function, &self.backends, visualizer)?;
            if debug {
                info!(report = %partitioned.report().to_json(), "hybrid partition");
            }
            let (outer, report) = partitioned.into_parts();
            (outer, Some(report))
        };

        let mut steps = Vec::new();
        for id in outer.validate()? {
            let node = outer.graph().node(id)?;
            let Op::FunctionCall(call) = node.op() else {
                continue;
            };
            let backend = self.resolve(&call.backend)?;
            let executable = backend.compile(Arc::clone(&call.function))?;
            debug!(
                call = id.0,
                function = call.function.name(),
                backend = backend.backend_name(),
                "compiled hybrid step"
            );
            steps.push(HybridStep {
                node: id,
                target: call.backend.clone(),
                backend,
                executable,
            });
        }

        Ok(Arc::new(HybridExecutable {
            function,
            outer,
            steps,
            report,
        }))
    }

    fn call(
        &self,
        executable: &dyn Executable,
        outputs: &[Arc<Tensor>],
        inputs: &[Arc<Tensor>],
    ) -> BackendResult<()> {
        let executable = downcast_executable::<HybridExecutable>(executable, self.backend_name())?;
        executable.run(outputs, inputs)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Call site of an inner function together with the backend and executable bound to it.
pub struct HybridStep {
    node: NodeId,
    target: String,
    backend: Arc<dyn Backend>,
    executable: Arc<dyn Executable>,
}

impl HybridStep {
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Label or backend name recorded on the call site.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn executable(&self) -> &Arc<dyn Executable> {
        &self.executable
    }
}

/// Compiled hybrid function: the partitioned outer function plus one step per call site,
/// in dependency order.
pub struct HybridExecutable {
    function: Arc<Function>,
    outer: Arc<Function>,
    steps: Vec<HybridStep>,
    report: Option<PartitionReport>,
}

impl HybridExecutable {
    /// Outer function made only of Parameters and FunctionCalls.
    pub fn partitioned(&self) -> &Arc<Function> {
        &self.outer
    }

    pub fn steps(&self) -> &[HybridStep] {
        &self.steps
    }

    /// Present when compile partitioned the function.
    pub fn report(&self) -> Option<&PartitionReport> {
        self.report.as_ref()
    }

    fn run(&self, outputs: &[Arc<Tensor>], inputs: &[Arc<Tensor>]) -> BackendResult<()> {
        let parameters = self.outer.parameters();
        let results = self.outer.results();
        if parameters.len() != inputs.len() {
            return Err(BackendError::Arity {
                what: format!("inputs of `{}`", self.outer.name()),
                expected: parameters.len(),
                found: inputs.len(),
            });
        }
        if results.len() != outputs.len() {
            return Err(BackendError::Arity {
                what: format!("outputs of `{}`", self.outer.name()),
                expected: results.len(),
                found: outputs.len(),
            });
        }

        let mut values: HashMap<Output, Arc<Tensor>> = HashMap::new();
        for (&param, tensor) in parameters.iter().zip(inputs) {
            values.insert(Output::from(param), Arc::clone(tensor));
        }

        for step in &self.steps {
            let node = self.outer.graph().node(step.node)?;
            let args = node
                .inputs()
                .iter()
                .map(|input| {
                    values.get(input).cloned().ok_or_else(|| {
                        BackendError::execution(format!(
                            "no tensor bound to {input} before call {}",
                            step.node.0
                        ))
                    })
                })
                .collect::<BackendResult<Vec<_>>>()?;
            let outs = node
                .outputs()
                .iter()
                .map(|spec| step.backend.create_tensor(spec.clone()))
                .collect::<BackendResult<Vec<_>>>()?;
            trace!(
                call = step.node.0,
                backend = step.backend.backend_name(),
                "running hybrid step"
            );
            step.backend
                .call_with_validate(step.executable.as_ref(), &outs, &args)?;
            for (index, tensor) in outs.into_iter().enumerate() {
                values.insert(Output::new(step.node, index), tensor);
            }
        }

        for (result, output) in results.iter().zip(outputs) {
            let value = values.get(result).ok_or_else(|| {
                BackendError::execution(format!("result {result} was never produced"))
            })?;
            output.copy_from(value)?;
        }
        Ok(())
    }
}

impl Executable for HybridExecutable {
    fn function(&self) -> &Arc<Function> {
        &self.function
    }

    fn backend_name(&self) -> &str {
        HYBRID_BACKEND_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Registers the hybrid under `"HYBRID"`; its config lists the backends to compose.
pub fn register_hybrid_backend() {
    register_backend(HYBRID_BACKEND_NAME, |config| {
        Ok(Arc::new(HybridBackend::from_config(config)?) as Arc<dyn Backend>)
    });
}

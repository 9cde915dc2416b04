use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use graphrt::backend::spec::{
    downcast_executable, Backend, BackendError, BackendResult, Executable, TensorSpec,
};
use graphrt::backend::tensor::Tensor;
use graphrt::graph::{Function, Node, NodeId, OpKind, Output};
use tracing::{debug, trace};

use crate::kernels::{execute_op, is_host_dtype, literal_to_tensor, tensor_to_literal, CpuTensor};
use crate::INTERPRETER_BACKEND_NAME;

/// Reference backend that walks the graph node by node on the host.
///
/// Op kinds listed as unsupported are refused by [`Backend::is_supported`] and by
/// `compile`, which lets tests force the hybrid backend to split a graph.
#[derive(Debug, Clone, Default)]
pub struct InterpreterBackend {
    unsupported: BTreeSet<OpKind>,
}

impl InterpreterBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unsupported_ops(ops: impl IntoIterator<Item = OpKind>) -> Self {
        Self {
            unsupported: ops.into_iter().collect(),
        }
    }

    /// Parses a comma-separated list of refused op kinds, e.g. `"Add,Multiply"`.
    pub fn from_config(config: &str) -> BackendResult<Self> {
        let ops = config
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                name.parse::<OpKind>().map_err(|err| {
                    BackendError::compile(format!("invalid {INTERPRETER_BACKEND_NAME} config: {err}"))
                })
            })
            .collect::<BackendResult<Vec<_>>>()?;
        Ok(Self::with_unsupported_ops(ops))
    }

    pub fn unsupported_ops(&self) -> impl Iterator<Item = OpKind> + '_ {
        self.unsupported.iter().copied()
    }
}

impl Backend for InterpreterBackend {
    fn backend_name(&self) -> &str {
        INTERPRETER_BACKEND_NAME
    }

    fn is_supported(&self, kind: OpKind) -> bool {
        kind != OpKind::FunctionCall && !self.unsupported.contains(&kind)
    }

    fn create_tensor(&self, spec: TensorSpec) -> BackendResult<Arc<Tensor>> {
        Ok(Arc::new(Tensor::allocate(INTERPRETER_BACKEND_NAME, spec)?))
    }

    fn compile(&self, function: Arc<Function>) -> BackendResult<Arc<dyn Executable>> {
        let order = function
            .validate()
            .map_err(|err| BackendError::compile(format!("`{}`: {err}", function.name())))?;
        let mut schedule = Vec::with_capacity(order.len());
        for id in order {
            let node = function.graph().node(id)?;
            if let Some(spec) = node.outputs().iter().find(|spec| !is_host_dtype(spec.dtype)) {
                return Err(BackendError::compile(format!(
                    "{INTERPRETER_BACKEND_NAME} cannot hold {spec} produced by node {} in `{}`",
                    id.0,
                    function.name()
                )));
            }
            let kind = node.kind();
            if kind == OpKind::Parameter {
                continue;
            }
            if !self.is_supported(kind) {
                return Err(BackendError::compile(format!(
                    "{INTERPRETER_BACKEND_NAME} does not support op `{kind}` in `{}`",
                    function.name()
                )));
            }
            schedule.push(id);
        }
        debug!(
            function = function.name(),
            nodes = schedule.len(),
            "compiled interpreter function"
        );
        Ok(Arc::new(InterpreterExecutable { function, schedule }))
    }

    fn call(
        &self,
        executable: &dyn Executable,
        outputs: &[Arc<Tensor>],
        inputs: &[Arc<Tensor>],
    ) -> BackendResult<()> {
        let executable =
            downcast_executable::<InterpreterExecutable>(executable, INTERPRETER_BACKEND_NAME)?;
        executable.run(outputs, inputs)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Function plus the non-parameter nodes to evaluate, in dependency order.
pub struct InterpreterExecutable {
    function: Arc<Function>,
    schedule: Vec<NodeId>,
}

impl InterpreterExecutable {
    pub fn schedule(&self) -> &[NodeId] {
        &self.schedule
    }

    fn run(&self, outputs: &[Arc<Tensor>], inputs: &[Arc<Tensor>]) -> BackendResult<()> {
        let function = self.function.as_ref();
        let graph = function.graph();
        if function.parameters().len() != inputs.len() {
            return Err(BackendError::execution("entry input arity mismatch"));
        }
        if function.results().len() != outputs.len() {
            return Err(BackendError::execution("entry output arity mismatch"));
        }

        let mut values: HashMap<Output, CpuTensor> = HashMap::new();
        for (&param, tensor) in function.parameters().iter().zip(inputs) {
            values.insert(Output::from(param), literal_to_tensor(&tensor.to_literal())?);
        }

        for (step, &id) in self.schedule.iter().enumerate() {
            let node = graph.node(id)?;
            let args = node
                .inputs()
                .iter()
                .map(|input| {
                    values
                        .get(input)
                        .cloned()
                        .ok_or_else(|| BackendError::execution("operand value missing"))
                })
                .collect::<BackendResult<Vec<_>>>()?;
            let results = execute_op(node.op(), &args, node.outputs())
                .map_err(|err| augment_backend_error(err, function.name(), step, id, node, &args))?;
            if results.len() != node.output_count() {
                return Err(BackendError::execution(format!(
                    "node {} produced {} value(s), declares {}",
                    id.0,
                    results.len(),
                    node.output_count()
                )));
            }
            trace!(node = id.0, op = node.op().name(), "evaluated node");
            for (index, value) in results.into_iter().enumerate() {
                values.insert(Output::new(id, index), value);
            }
        }

        for (result, output) in function.results().iter().zip(outputs) {
            let value = values
                .get(result)
                .ok_or_else(|| BackendError::execution("missing function result value"))?;
            output.write_literal(&tensor_to_literal(value))?;
        }
        Ok(())
    }
}

impl Executable for InterpreterExecutable {
    fn function(&self) -> &Arc<Function> {
        &self.function
    }

    fn backend_name(&self) -> &str {
        INTERPRETER_BACKEND_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn augment_backend_error(
    error: BackendError,
    function_name: &str,
    step: usize,
    id: NodeId,
    node: &Node,
    inputs: &[CpuTensor],
) -> BackendError {
    match error {
        BackendError::Execution { message } => BackendError::Execution {
            message: format!(
                "{message} (at function `{}` step #{}, {} node {} operands [{}])",
                function_name,
                step,
                node.op().name(),
                id.0,
                format_operands(inputs)
            ),
        },
        BackendError::Unimplemented { op, reason } => BackendError::Unimplemented {
            op,
            reason: format!(
                "{} (while executing function `{}` step #{}, {} node {} operands [{}])",
                reason,
                function_name,
                step,
                node.op().name(),
                id.0,
                format_operands(inputs)
            ),
        },
        other => other,
    }
}

fn format_operands(inputs: &[CpuTensor]) -> String {
    if inputs.is_empty() {
        return String::from("<none>");
    }
    inputs
        .iter()
        .map(|tensor| tensor.spec.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

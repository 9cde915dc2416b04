use std::sync::Arc;

use graphrt::backend::shape_helpers::tensor_spec_static;
use graphrt::backend::spec::{Backend, BackendError, DType};
use graphrt::graph::{BinaryOp, Function, Graph, OpKind, UnaryOp};
use graphrt::ops::function_call;
use graphrt_backend_interp::{InterpreterBackend, InterpreterExecutable, INTERPRETER_BACKEND_NAME};
use graphrt_backend_tests::graphs::{abc_function, add_function, f32_2x2};

#[test]
fn refused_ops_fail_compilation() {
    let backend = InterpreterBackend::with_unsupported_ops([OpKind::Add]);
    let err = backend.compile(abc_function()).err().expect("Add is refused");
    assert!(matches!(err, BackendError::Compile(_)), "{err}");
    assert!(err.to_string().contains("`Add`"), "{err}");
}

#[test]
fn nested_calls_fail_compilation() {
    let mut graph = Graph::new();
    let a = graph.parameter(f32_2x2());
    let b = graph.parameter(f32_2x2());
    let call = function_call(
        &mut graph,
        add_function(f32_2x2()),
        INTERPRETER_BACKEND_NAME,
        &[a.into(), b.into()],
    )
    .unwrap();
    let function = Function::new("outer", graph, vec![a, b], vec![call.output(0)]).unwrap();

    let backend = InterpreterBackend::new();
    assert!(!backend.is_supported(OpKind::FunctionCall));
    let err = backend.compile(Arc::new(function)).err().expect("FunctionCall is refused");
    assert!(matches!(err, BackendError::Compile(_)), "{err}");
}

#[test]
fn dtypes_without_host_storage_fail_compilation() {
    let backend = InterpreterBackend::new();
    for dtype in [DType::F64, DType::Bf16, DType::Si64] {
        let function = add_function(tensor_spec_static(dtype, &[2]));
        let err = backend.compile(function).err().expect("dtype is not executable");
        assert!(matches!(err, BackendError::Compile(_)), "{dtype:?}: {err}");
    }
}

#[test]
fn config_lists_refused_ops() {
    let backend = InterpreterBackend::from_config(" Multiply, Add ,").unwrap();
    let refused: Vec<OpKind> = backend.unsupported_ops().collect();
    assert_eq!(refused, vec![OpKind::Add, OpKind::Multiply]);
    assert_eq!(InterpreterBackend::from_config("").unwrap().unsupported_ops().count(), 0);
}

#[test]
fn schedule_skips_parameters_and_dead_nodes() {
    let mut graph = Graph::new();
    let a = graph.parameter(f32_2x2());
    let b = graph.parameter(f32_2x2());
    let _dead = graph.subtract(a, b).unwrap();
    let sum = graph.add(a, b).unwrap();
    let neg = graph.unary(UnaryOp::Negative, sum).unwrap();
    let function = Arc::new(Function::new("live", graph, vec![a, b], vec![neg.into()]).unwrap());

    let executable = InterpreterBackend::new().compile(function).unwrap();
    let compiled = executable
        .as_any()
        .downcast_ref::<InterpreterExecutable>()
        .expect("interpreter executable");
    assert_eq!(compiled.schedule(), &[sum, neg]);
}

#[test]
fn integer_tensors_round_trip_through_kernels() {
    let spec = tensor_spec_static(DType::Si32, &[3]);
    let mut graph = Graph::new();
    let x = graph.parameter(spec.clone());
    let y = graph.parameter(spec.clone());
    let quotient = graph.binary(BinaryOp::Divide, x, y).unwrap();
    let abs = graph.unary(UnaryOp::Abs, quotient).unwrap();
    let function = Arc::new(
        Function::new("int_div", graph, vec![x, y], vec![quotient.into(), abs.into()]).unwrap(),
    );

    let backend = InterpreterBackend::new();
    let executable = backend.compile(function).unwrap();
    let lhs = backend.create_tensor(spec.clone()).unwrap();
    let rhs = backend.create_tensor(spec.clone()).unwrap();
    let outputs = [
        backend.create_tensor(spec.clone()).unwrap(),
        backend.create_tensor(spec).unwrap(),
    ];
    assert_eq!(lhs.owner(), INTERPRETER_BACKEND_NAME);

    lhs.write_i32(&[7, -9, 4]).unwrap();
    rhs.write_i32(&[2, 3, -4]).unwrap();
    backend
        .call_with_validate(executable.as_ref(), &outputs, &[Arc::clone(&lhs), Arc::clone(&rhs)])
        .unwrap();
    assert_eq!(outputs[0].read_i32().unwrap(), vec![3, -3, -1]);
    assert_eq!(outputs[1].read_i32().unwrap(), vec![3, 3, 1]);

    rhs.write_i32(&[1, 0, 1]).unwrap();
    let err = backend
        .call_with_validate(executable.as_ref(), &outputs, &[lhs, rhs])
        .unwrap_err();
    assert!(matches!(err, BackendError::Execution { .. }), "{err}");
    assert!(err.to_string().contains("division by zero"), "{err}");
}

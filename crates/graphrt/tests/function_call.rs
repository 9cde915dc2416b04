use std::sync::Arc;

use graphrt::backend::shape_helpers::tensor_spec_static;
use graphrt::backend::spec::DType;
use graphrt::graph::{Graph, GraphError, Op, OpKind, Output};
use graphrt::ops::{function_call, FunctionCallSpec};
use graphrt_backend_tests::graphs::{add_function, f32_2x2};

#[test]
fn call_outputs_mirror_callee_results() {
    let callee = add_function(f32_2x2());
    let mut graph = Graph::new();
    let a = graph.parameter(f32_2x2());
    let b = graph.parameter(f32_2x2());
    let call = function_call(&mut graph, Arc::clone(&callee), "INTERPRETER", &[a.into(), b.into()])
        .unwrap();

    let node = graph.node(call).unwrap();
    assert_eq!(node.kind(), OpKind::FunctionCall);
    assert_eq!(node.outputs(), &[f32_2x2()]);
    let Op::FunctionCall(spec) = node.op() else {
        panic!("expected a FunctionCall, got {:?}", node.kind());
    };
    assert!(Arc::ptr_eq(&spec.function, &callee));
    assert_eq!(spec.backend, "INTERPRETER");
}

#[test]
fn arguments_must_match_callee_parameters() {
    let callee = add_function(f32_2x2());
    let mut graph = Graph::new();
    let a = graph.parameter(f32_2x2());
    let wide = graph.parameter(tensor_spec_static(DType::F32, &[4]));
    let ints = graph.parameter(tensor_spec_static(DType::Si32, &[2, 2]));

    let err = function_call(&mut graph, Arc::clone(&callee), "X", &[a.into()]).unwrap_err();
    assert_eq!(
        err,
        GraphError::Arity {
            op: "FunctionCall",
            expected: 2,
            found: 1,
        }
    );
    let err =
        function_call(&mut graph, Arc::clone(&callee), "X", &[a.into(), wide.into()]).unwrap_err();
    assert!(matches!(err, GraphError::ShapeMismatch { op: "FunctionCall", .. }), "{err}");
    let err = function_call(&mut graph, callee, "X", &[ints.into(), a.into()]).unwrap_err();
    assert!(matches!(err, GraphError::TypeMismatch { op: "FunctionCall", .. }), "{err}");
    assert_eq!(graph.len(), 3);
}

#[test]
fn declared_outputs_must_agree_with_callee() {
    let callee = add_function(f32_2x2());
    let mut graph = Graph::new();
    let a = graph.parameter(f32_2x2());
    let spec = FunctionCallSpec {
        function: callee,
        backend: "X".to_string(),
        outputs: Vec::new(),
    };
    let err = graph
        .add_node(Op::FunctionCall(spec), [Output::from(a), Output::from(a)])
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidAttribute { op: "FunctionCall", .. }), "{err}");
}

#[test]
fn copying_a_call_keeps_callee_and_outputs() {
    let callee = add_function(f32_2x2());
    let mut graph = Graph::new();
    let a = graph.parameter(f32_2x2());
    let b = graph.parameter(f32_2x2());
    let call = function_call(&mut graph, callee, "X", &[a.into(), b.into()]).unwrap();
    let before = graph.len();

    let err = graph
        .copy_with_new_args(call, &[a.into(), b.into(), a.into()])
        .unwrap_err();
    assert!(matches!(err, GraphError::Arity { expected: 2, found: 3, .. }), "{err}");
    assert_eq!(graph.len(), before);

    let copy = graph.copy_with_new_args(call, &[b.into(), a.into()]).unwrap();
    let original = graph.node(call).unwrap();
    let copied = graph.node(copy).unwrap();
    assert_eq!(copied.op(), original.op());
    assert_eq!(copied.outputs(), original.outputs());
    assert_eq!(copied.inputs(), &[Output::from(b), Output::from(a)]);
}

#[test]
fn calls_may_feed_each_other() {
    let callee = add_function(f32_2x2());
    let mut graph = Graph::new();
    let a = graph.parameter(f32_2x2());
    let b = graph.parameter(f32_2x2());
    let first = function_call(&mut graph, Arc::clone(&callee), "X", &[a.into(), b.into()]).unwrap();
    let second =
        function_call(&mut graph, callee, "Y", &[first.output(0), a.into()]).unwrap();
    assert_eq!(graph.node(second).unwrap().inputs()[0], Output::new(first, 0));
}

use graphrt::backend::shape_helpers::tensor_spec_static;
use graphrt::backend::spec::{DType, TensorLiteral};
use graphrt::graph::topology::topological_order;
use graphrt::graph::{BinaryOp, Function, Graph, GraphError, NodeId, OpKind, Output};

fn f32_spec(dims: &[usize]) -> graphrt::TensorSpec {
    tensor_spec_static(DType::F32, dims)
}

#[test]
fn op_kind_names_round_trip() {
    for kind in OpKind::ALL {
        assert_eq!(kind.as_str().parse::<OpKind>().unwrap(), kind);
    }
    assert_eq!("CUDNNBatchNorm".parse::<OpKind>().unwrap(), OpKind::CudnnBatchNorm);
    assert_eq!(" Add ".parse::<OpKind>().unwrap(), OpKind::Add);
    assert!("Conv".parse::<OpKind>().is_err());
}

#[test]
fn binary_ops_require_matching_specs() {
    let mut graph = Graph::new();
    let a = graph.parameter(f32_spec(&[2, 2]));
    let b = graph.parameter(f32_spec(&[4]));
    let c = graph.parameter(tensor_spec_static(DType::Si32, &[2, 2]));

    let err = graph.add(a, b).unwrap_err();
    assert!(matches!(err, GraphError::ShapeMismatch { op: "Add", .. }), "{err}");
    let err = graph.multiply(a, c).unwrap_err();
    assert_eq!(
        err,
        GraphError::TypeMismatch {
            op: "Multiply",
            expected: DType::F32,
            found: DType::Si32,
        }
    );
    assert_eq!(graph.len(), 3, "failed builds must not append nodes");
}

#[test]
fn inputs_must_exist() {
    let mut graph = Graph::new();
    let a = graph.parameter(f32_spec(&[2]));
    let err = graph.add(a, NodeId(7)).unwrap_err();
    assert_eq!(err, GraphError::MissingNode(NodeId(7)));
    let err = graph.add(a, Output::new(a, 1)).unwrap_err();
    assert_eq!(err, GraphError::InvalidOutput { node: a, index: 1 });
}

#[test]
fn constants_check_literal_size() {
    let mut graph = Graph::new();
    let literal = TensorLiteral::from_f32(f32_spec(&[3]).shape, &[1.0, 2.0]);
    let err = graph.constant(literal).unwrap_err();
    assert!(matches!(err, GraphError::InvalidAttribute { op: "Constant", .. }));

    let literal = TensorLiteral::from_f32(f32_spec(&[2]).shape, &[1.0, 2.0]);
    let id = graph.constant(literal).unwrap();
    assert_eq!(graph.node(id).unwrap().outputs(), &[f32_spec(&[2])]);
}

#[test]
fn copy_with_new_args_checks_arity_before_mutating() {
    let mut graph = Graph::new();
    let a = graph.parameter(f32_spec(&[2]));
    let b = graph.parameter(f32_spec(&[2]));
    let sum = graph.add(a, b).unwrap();
    graph.set_name(sum, "sum").unwrap();
    let before = graph.len();

    let err = graph.copy_with_new_args(sum, &[a.into()]).unwrap_err();
    assert_eq!(
        err,
        GraphError::Arity {
            op: "Add",
            expected: 2,
            found: 1,
        }
    );
    assert_eq!(graph.len(), before);

    let copy = graph.copy_with_new_args(sum, &[b.into(), a.into()]).unwrap();
    let node = graph.node(copy).unwrap();
    assert_eq!(node.kind(), OpKind::Add);
    assert_eq!(node.inputs(), &[Output::from(b), Output::from(a)]);
    assert_eq!(node.outputs(), graph.node(sum).unwrap().outputs());
    assert_eq!(node.name(), Some("sum"));
}

#[test]
fn copying_a_parameter_keeps_its_spec() {
    let mut graph = Graph::new();
    let a = graph.parameter(f32_spec(&[3, 1]));
    let copy = graph.copy_with_new_args(a, &[]).unwrap();
    assert_ne!(copy, a);
    assert!(graph.node(copy).unwrap().is_parameter());
    assert_eq!(graph.node(copy).unwrap().outputs(), &[f32_spec(&[3, 1])]);
}

#[test]
fn function_validation_rejects_bad_signatures() {
    let mut graph = Graph::new();
    let a = graph.parameter(f32_spec(&[2]));
    let b = graph.parameter(f32_spec(&[2]));
    let sum = graph.add(a, b).unwrap();

    let err = Function::new("f", graph.clone(), vec![a], vec![sum.into()]).unwrap_err();
    assert_eq!(err, GraphError::UndeclaredParameter(b));

    let err = Function::new("f", graph.clone(), vec![a, a, b], vec![sum.into()]).unwrap_err();
    assert_eq!(err, GraphError::DuplicateParameter(a));

    let err = Function::new("f", graph.clone(), vec![a, sum], vec![sum.into()]).unwrap_err();
    assert_eq!(err, GraphError::NotAParameter(sum));

    let err = Function::new("f", graph.clone(), vec![a, b], vec![Output::new(sum, 3)]).unwrap_err();
    assert_eq!(err, GraphError::InvalidOutput { node: sum, index: 3 });

    let function = Function::new("f", graph, vec![b, a], vec![sum.into()]).unwrap();
    assert_eq!(function.parameter_specs().unwrap().len(), 2);
    assert_eq!(function.result_specs().unwrap(), vec![&f32_spec(&[2])]);
}

#[test]
fn unused_declared_parameters_are_allowed() {
    let mut graph = Graph::new();
    let a = graph.parameter(f32_spec(&[2]));
    let unused = graph.parameter(f32_spec(&[2]));
    let neg = graph.unary(graphrt::graph::UnaryOp::Negative, a).unwrap();
    let function = Function::new("f", graph, vec![a, unused], vec![neg.into()]).unwrap();
    assert_eq!(function.validate().unwrap(), vec![a, neg]);
}

#[test]
fn topological_order_lists_producers_first() {
    let mut graph = Graph::new();
    let a = graph.parameter(f32_spec(&[2]));
    let b = graph.parameter(f32_spec(&[2]));
    let ab = graph.binary(BinaryOp::Maximum, a, b).unwrap();
    let dead = graph.subtract(a, b).unwrap();
    let out = graph.multiply(ab, a).unwrap();

    let order = topological_order(&graph, &[out.into()]).unwrap();
    assert_eq!(order, vec![a, b, ab, out]);
    assert!(!order.contains(&dead));
}

#[test]
fn compaction_drops_unreachable_nodes_and_keeps_parameter_order() {
    let mut graph = Graph::new();
    let a = graph.parameter(f32_spec(&[2]));
    let _dead = graph.add(a, a).unwrap();
    let b = graph.parameter(f32_spec(&[2]));
    let out = graph.subtract(b, a).unwrap();
    let function = Function::new("f", graph, vec![b, a], vec![out.into()]).unwrap();

    let compacted = function.compacted().unwrap();
    assert_eq!(compacted.graph().len(), 3);
    assert_eq!(compacted.parameters(), &[NodeId(0), NodeId(1)]);
    let result = compacted.results()[0];
    let node = compacted.graph().node(result.node).unwrap();
    assert_eq!(node.kind(), OpKind::Subtract);
    // b was declared first, so it now lives at id 0.
    assert_eq!(node.inputs(), &[Output::from(NodeId(0)), Output::from(NodeId(1))]);
}

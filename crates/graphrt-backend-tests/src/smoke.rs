use std::sync::Arc;

use graphrt::backend::shape_helpers::{tensor_spec_mixed, tensor_spec_static};
use graphrt::backend::spec::{Backend, BackendError, DType, TensorLiteral};
use graphrt::graph::{BinaryOp, Function, Graph, UnaryOp};
use graphrt::ops::{batch_norm_training, cudnn_batch_norm_training};

use crate::graphs::{
    abc_function, abc_inputs, add_function, f32_2x2, run_f32, ABC_T3, ABC_T4,
};

fn assert_close(actual: &[f32], expected: &[f32], tolerance: f32) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (index, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "element {index}: got {a}, expected {e}"
        );
    }
}

pub fn abc_matches_expected(backend: &dyn Backend) {
    let results = run_f32(backend, abc_function(), &abc_inputs()).unwrap();
    assert_eq!(results, vec![ABC_T3.to_vec(), ABC_T4.to_vec()]);
}

pub fn executable_is_reusable(backend: &dyn Backend) {
    let function = add_function(f32_2x2());
    let executable = backend.compile(Arc::clone(&function)).unwrap();
    let out = backend.create_tensor(f32_2x2()).unwrap();
    let lhs = backend.create_tensor(f32_2x2()).unwrap();
    let rhs = backend.create_tensor(f32_2x2()).unwrap();

    for round in 0..3 {
        let offset = round as f32;
        lhs.write_f32(&[1.0 + offset, 2.0, 3.0, 4.0]).unwrap();
        rhs.write_f32(&[10.0, 20.0, 30.0, 40.0 + offset]).unwrap();
        backend
            .call_with_validate(
                executable.as_ref(),
                &[Arc::clone(&out)],
                &[Arc::clone(&lhs), Arc::clone(&rhs)],
            )
            .unwrap();
        assert_eq!(
            out.read_f32().unwrap(),
            vec![11.0 + offset, 22.0, 33.0, 44.0 + offset]
        );
    }
}

pub fn compile_twice_yields_independent_executables(backend: &dyn Backend) {
    let function = abc_function();
    let first = backend.compile(Arc::clone(&function)).unwrap();
    let second = backend.compile(Arc::clone(&function)).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(first.function(), &function));
    drop(first);

    let results = run_f32(backend, function, &abc_inputs()).unwrap();
    assert_eq!(results[0], ABC_T3.to_vec());
    drop(second);
}

pub fn validate_rejects_wrong_arity(backend: &dyn Backend) {
    let function = add_function(f32_2x2());
    let executable = backend.compile(function).unwrap();
    let out = backend.create_tensor(f32_2x2()).unwrap();
    let lhs = backend.create_tensor(f32_2x2()).unwrap();

    let err = backend
        .call_with_validate(executable.as_ref(), &[out], &[lhs])
        .unwrap_err();
    assert!(
        matches!(err, BackendError::Arity { expected: 2, found: 1, .. }),
        "unexpected error: {err}"
    );
}

pub fn validate_rejects_type_mismatch(backend: &dyn Backend) {
    let function = add_function(f32_2x2());
    let executable = backend.compile(function).unwrap();
    let out = backend.create_tensor(f32_2x2()).unwrap();
    let lhs = backend.create_tensor(f32_2x2()).unwrap();
    let rhs = backend
        .create_tensor(tensor_spec_static(DType::Si32, &[2, 2]))
        .unwrap();

    let err = backend
        .call_with_validate(executable.as_ref(), &[out], &[lhs, rhs])
        .unwrap_err();
    assert!(
        matches!(
            err,
            BackendError::TypeMismatch {
                expected: DType::F32,
                found: DType::Si32,
                ..
            }
        ),
        "unexpected error: {err}"
    );
}

pub fn validate_rejects_shape_mismatch(backend: &dyn Backend) {
    let function = add_function(f32_2x2());
    let executable = backend.compile(function).unwrap();
    let out = backend
        .create_tensor(tensor_spec_static(DType::F32, &[4]))
        .unwrap();
    let lhs = backend.create_tensor(f32_2x2()).unwrap();
    let rhs = backend.create_tensor(f32_2x2()).unwrap();

    let err = backend
        .call_with_validate(executable.as_ref(), &[out], &[lhs, rhs])
        .unwrap_err();
    assert!(
        matches!(err, BackendError::ShapeMismatch { .. }),
        "unexpected error: {err}"
    );
}

pub fn create_tensor_is_zero_filled(backend: &dyn Backend) {
    let tensor = backend
        .create_tensor(tensor_spec_static(DType::F32, &[3, 2]))
        .unwrap();
    assert_eq!(tensor.byte_len(), 24);
    assert_eq!(tensor.read_f32().unwrap(), vec![0.0; 6]);
}

pub fn create_tensor_rejects_dynamic_shape(backend: &dyn Backend) {
    let err = backend
        .create_tensor(tensor_spec_mixed(DType::F32, &[None, Some(4)]))
        .unwrap_err();
    assert!(
        matches!(err, BackendError::Allocation(_)),
        "unexpected error: {err}"
    );
}

pub fn elementwise_ops_match_reference(backend: &dyn Backend) {
    let mut graph = Graph::new();
    let x = graph.parameter(f32_2x2());
    let y = graph.parameter(f32_2x2());
    let mut results = Vec::new();
    for op in [
        BinaryOp::Subtract,
        BinaryOp::Divide,
        BinaryOp::Maximum,
        BinaryOp::Minimum,
    ] {
        results.push(graph.binary(op, x, y).unwrap().into());
    }
    for op in [UnaryOp::Negative, UnaryOp::Abs, UnaryOp::Sqrt] {
        results.push(graph.unary(op, y).unwrap().into());
    }
    let function = Arc::new(Function::new("elementwise", graph, vec![x, y], results).unwrap());

    let outputs = run_f32(
        backend,
        function,
        &[vec![1.0, -8.0, 9.0, 2.0], vec![4.0, 2.0, 9.0, 16.0]],
    )
    .unwrap();
    assert_eq!(outputs[0], vec![-3.0, -10.0, 0.0, -14.0]);
    assert_eq!(outputs[1], vec![0.25, -4.0, 1.0, 0.125]);
    assert_eq!(outputs[2], vec![4.0, 2.0, 9.0, 16.0]);
    assert_eq!(outputs[3], vec![1.0, -8.0, 9.0, 2.0]);
    assert_eq!(outputs[4], vec![-4.0, -2.0, -9.0, -16.0]);
    assert_eq!(outputs[5], vec![4.0, 2.0, 9.0, 16.0]);
    assert_eq!(outputs[6], vec![2.0, 1.4142135, 3.0, 4.0]);
}

pub fn constants_are_materialized(backend: &dyn Backend) {
    let mut graph = Graph::new();
    let x = graph.parameter(f32_2x2());
    let bias = graph
        .constant(TensorLiteral::from_f32(
            f32_2x2().shape,
            &[0.5, 0.5, -0.5, -0.5],
        ))
        .unwrap();
    let sum = graph.add(x, bias).unwrap();
    let function = Arc::new(Function::new("bias", graph, vec![x], vec![sum.into()]).unwrap());

    let outputs = run_f32(backend, function, &[vec![1.0, 2.0, 3.0, 4.0]]).unwrap();
    assert_eq!(outputs[0], vec![1.5, 2.5, 2.5, 3.5]);
}

/// Input `[N=2, C=2]`: channel 0 holds `{1, 3}`, channel 1 holds `{2, 6}`.
fn batch_norm_inputs() -> Vec<Vec<f32>> {
    vec![vec![1.0, 2.0], vec![0.0, 1.0], vec![1.0, 2.0, 3.0, 6.0]]
}

pub fn batch_norm_training_matches_reference(backend: &dyn Backend) {
    let mut graph = Graph::new();
    let channel = tensor_spec_static(DType::F32, &[2]);
    let gamma = graph.parameter(channel.clone());
    let beta = graph.parameter(channel);
    let input = graph.parameter(f32_2x2());
    let bn = batch_norm_training(&mut graph, 0.0, gamma, beta, input).unwrap();
    let function = Arc::new(
        Function::new(
            "batch_norm",
            graph,
            vec![gamma, beta, input],
            vec![bn.output(0), bn.output(1), bn.output(2)],
        )
        .unwrap(),
    );

    let outputs = run_f32(backend, function, &batch_norm_inputs()).unwrap();
    // mean {2, 4}, variance {1, 4}; gamma {1, 2}, beta {0, 1}.
    assert_close(&outputs[0], &[-1.0, -1.0, 1.0, 3.0], 1e-5);
    assert_close(&outputs[1], &[2.0, 4.0], 1e-6);
    assert_close(&outputs[2], &[1.0, 4.0], 1e-6);
}

pub fn cudnn_batch_norm_exposes_saved_statistics(backend: &dyn Backend) {
    let mut graph = Graph::new();
    let channel = tensor_spec_static(DType::F32, &[2]);
    let gamma = graph.parameter(channel.clone());
    let beta = graph.parameter(channel);
    let input = graph.parameter(f32_2x2());
    let bn = cudnn_batch_norm_training(&mut graph, 0.0, gamma, beta, input).unwrap();
    assert_eq!(graph.node(bn).unwrap().output_count(), 5);
    let function = Arc::new(
        Function::new(
            "cudnn_batch_norm",
            graph,
            vec![gamma, beta, input],
            (0..5).map(|index| bn.output(index)).collect(),
        )
        .unwrap(),
    );

    let outputs = run_f32(backend, function, &batch_norm_inputs()).unwrap();
    assert_close(&outputs[0], &[-1.0, -1.0, 1.0, 3.0], 1e-5);
    assert_close(&outputs[3], &[2.0, 4.0], 1e-6);
    assert_close(&outputs[4], &[1.0, 0.5], 1e-6);
}

//! Graph builders and a host-side runner shared by the conformance suite and the core tests.

use std::sync::Arc;

use graphrt::backend::shape_helpers::tensor_spec_static;
use graphrt::backend::spec::{Backend, BackendResult, DType, TensorSpec};
use graphrt::graph::{BinaryOp, Function, Graph, NodeId, Output, UnaryOp};
use rand::rngs::StdRng;
use rand::Rng;

pub const ABC_A: [f32; 4] = [1.0, 2.0, 3.0, 4.0];
pub const ABC_B: [f32; 4] = [5.0, 6.0, 7.0, 8.0];
pub const ABC_C: [f32; 4] = [9.0, 10.0, 11.0, 12.0];
pub const ABC_D: [f32; 4] = [4.0, 3.0, 2.0, 1.0];
pub const ABC_T3: [f32; 4] = [29.0, 46.0, 53.0, 44.0];
pub const ABC_T4: [f32; 4] = [150.0, 576.0, 1176.0, 1536.0];

pub fn f32_2x2() -> TensorSpec {
    tensor_spec_static(DType::F32, &[2, 2])
}

/// `t3 = A*B*D + C`, `t4 = (t3 + A) * (A*B)` over four 2x2 f32 parameters.
pub fn abc_function() -> Arc<Function> {
    let mut graph = Graph::new();
    let a = graph.parameter(f32_2x2());
    let b = graph.parameter(f32_2x2());
    let c = graph.parameter(f32_2x2());
    let d = graph.parameter(f32_2x2());
    let ab = graph.multiply(a, b).expect("A*B");
    let abd = graph.multiply(ab, d).expect("A*B*D");
    let t3 = graph.add(abd, c).expect("t3");
    let t3a = graph.add(t3, a).expect("t3+A");
    let t4 = graph.multiply(t3a, ab).expect("t4");
    for (id, name) in [(a, "A"), (b, "B"), (c, "C"), (d, "D"), (t3, "t3"), (t4, "t4")] {
        graph.set_name(id, name).expect("name");
    }
    Arc::new(
        Function::new("abc", graph, vec![a, b, c, d], vec![t3.into(), t4.into()])
            .expect("abc function is valid"),
    )
}

pub fn abc_inputs() -> Vec<Vec<f32>> {
    vec![ABC_A.to_vec(), ABC_B.to_vec(), ABC_C.to_vec(), ABC_D.to_vec()]
}

/// Single Add over two parameters of `spec`.
pub fn add_function(spec: TensorSpec) -> Arc<Function> {
    let mut graph = Graph::new();
    let lhs = graph.parameter(spec.clone());
    let rhs = graph.parameter(spec);
    let sum = graph.add(lhs, rhs).expect("add");
    Arc::new(Function::new("add", graph, vec![lhs, rhs], vec![sum.into()]).expect("add function"))
}

const RANDOM_BINARY: [BinaryOp; 4] = [
    BinaryOp::Add,
    BinaryOp::Subtract,
    BinaryOp::Multiply,
    BinaryOp::Maximum,
];

/// Random element-wise DAG over `params` 2x2 f32 parameters with `ops` operator nodes.
///
/// Only ops that are exact and total on finite inputs are used, so two backends computing
/// the same graph must agree bit for bit. The last two values are the results.
pub fn random_elementwise_function(rng: &mut StdRng, params: usize, ops: usize) -> Arc<Function> {
    let mut graph = Graph::new();
    let parameters: Vec<NodeId> = (0..params).map(|_| graph.parameter(f32_2x2())).collect();
    let mut values: Vec<Output> = parameters.iter().map(|&p| Output::from(p)).collect();

    for _ in 0..ops {
        let lhs = values[rng.gen_range(0..values.len())];
        let node = if rng.gen_bool(0.25) {
            let op = if rng.gen_bool(0.5) {
                UnaryOp::Negative
            } else {
                UnaryOp::Abs
            };
            graph.unary(op, lhs)
        } else {
            let rhs = values[rng.gen_range(0..values.len())];
            let op = RANDOM_BINARY[rng.gen_range(0..RANDOM_BINARY.len())];
            graph.binary(op, lhs, rhs)
        }
        .expect("element-wise op over matching specs");
        values.push(node.into());
    }

    let results = values[values.len().saturating_sub(2)..].to_vec();
    Arc::new(Function::new("random", graph, parameters, results).expect("random function"))
}

/// Small integers keep products exact in f32.
pub fn random_inputs(rng: &mut StdRng, count: usize) -> Vec<Vec<f32>> {
    (0..count)
        .map(|_| (0..4).map(|_| rng.gen_range(-4i32..=4) as f32).collect())
        .collect()
}

/// Allocates inputs and outputs on `backend`, compiles `function`, calls it with validation
/// and reads the results back.
pub fn run_f32(
    backend: &dyn Backend,
    function: Arc<Function>,
    inputs: &[Vec<f32>],
) -> BackendResult<Vec<Vec<f32>>> {
    let parameter_specs: Vec<TensorSpec> =
        function.parameter_specs()?.into_iter().cloned().collect();
    let result_specs: Vec<TensorSpec> = function.result_specs()?.into_iter().cloned().collect();

    let mut input_tensors = Vec::with_capacity(inputs.len());
    for (spec, values) in parameter_specs.into_iter().zip(inputs) {
        let tensor = backend.create_tensor(spec)?;
        tensor.write_f32(values)?;
        input_tensors.push(tensor);
    }
    let output_tensors = result_specs
        .into_iter()
        .map(|spec| backend.create_tensor(spec))
        .collect::<BackendResult<Vec<_>>>()?;

    let executable = backend.compile(function)?;
    backend.call_with_validate(executable.as_ref(), &output_tensors, &input_tensors)?;
    output_tensors.iter().map(|tensor| tensor.read_f32()).collect()
}

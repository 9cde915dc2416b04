use std::io;
use std::sync::{Arc, Mutex};

use graphrt::backend::spec::{Backend, BackendError};
use graphrt::graph::{BinaryOp, Function, Graph, OpKind, Output, UnaryOp};
use graphrt::hybrid::{HybridBackend, HybridExecutable};
use graphrt::ops::function_call;
use graphrt::visualize::GraphVisualizer;
use graphrt_backend_interp::{register_interpreter_backend, InterpreterBackend};
use graphrt_backend_tests::graphs::{
    abc_function, abc_inputs, add_function, f32_2x2, random_elementwise_function, random_inputs,
    run_f32, ABC_T3, ABC_T4,
};
use graphrt_backend_tests::recording_backend::RecordingBackend;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn interpreter(refused: &[OpKind]) -> Arc<dyn Backend> {
    Arc::new(InterpreterBackend::with_unsupported_ops(refused.iter().copied()))
}

/// Interpreters refusing Add and Multiply respectively, so `abc` needs both.
fn split_hybrid() -> HybridBackend {
    HybridBackend::new(vec![
        interpreter(&[OpKind::Add]),
        interpreter(&[OpKind::Multiply]),
    ])
}

#[derive(Default)]
struct RecordingVisualizer {
    snapshots: Mutex<Vec<(String, String)>>,
}

impl RecordingVisualizer {
    fn labels(&self) -> Vec<String> {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .map(|(label, _)| label.clone())
            .collect()
    }
}

impl GraphVisualizer for RecordingVisualizer {
    fn render(&self, graph: &Graph, results: &[Output], label: &str) -> io::Result<()> {
        let dot = graphrt::visualize::to_dot(graph, results);
        self.snapshots.lock().unwrap().push((label.to_string(), dot));
        Ok(())
    }
}

#[test]
fn duplicate_backend_names_get_indexed_labels() {
    assert_eq!(split_hybrid().labels(), vec!["INTERPRETER#0", "INTERPRETER#1"]);
    let single = HybridBackend::new(vec![interpreter(&[])]);
    assert_eq!(single.labels(), vec!["INTERPRETER"]);
}

#[test]
fn supports_what_any_member_supports() {
    let hybrid = split_hybrid();
    assert!(hybrid.is_supported(OpKind::Add));
    assert!(hybrid.is_supported(OpKind::Multiply));
    assert!(hybrid.is_supported(OpKind::FunctionCall));

    let no_add = HybridBackend::new(vec![interpreter(&[OpKind::Add]), interpreter(&[OpKind::Add])]);
    assert!(!no_add.is_supported(OpKind::Add));
    assert!(no_add.is_supported(OpKind::Parameter));
}

#[test]
fn abc_is_split_into_three_calls() {
    let hybrid = split_hybrid();
    let function = abc_function();
    let executable = hybrid.compile(Arc::clone(&function)).unwrap();
    let compiled = executable
        .as_any()
        .downcast_ref::<HybridExecutable>()
        .expect("hybrid executable");

    assert!(Arc::ptr_eq(executable.function(), &function));
    let outer = compiled.partitioned();
    for id in outer.graph().node_ids() {
        let kind = outer.graph().node(id).unwrap().kind();
        assert!(
            matches!(kind, OpKind::Parameter | OpKind::FunctionCall),
            "outer graph still holds {kind}"
        );
    }
    assert_eq!(outer.parameters().len(), 4);

    let report = compiled.report().expect("compile partitioned the function");
    let placed: Vec<(&str, &str, usize)> = report
        .calls
        .iter()
        .map(|call| (call.function.as_str(), call.backend.as_str(), call.nodes))
        .collect();
    assert_eq!(
        placed,
        vec![
            ("abc/INTERPRETER#0/0", "INTERPRETER#0", 2),
            ("abc/INTERPRETER#1/1", "INTERPRETER#1", 2),
            ("abc/INTERPRETER#0/2", "INTERPRETER#0", 1),
        ]
    );
    let depths: Vec<usize> = report.calls.iter().map(|call| call.depth).collect();
    assert_eq!(depths, vec![0, 1, 2]);
    assert!(report.to_json().contains("\"function\":\"abc\""));

    let targets: Vec<&str> = compiled.steps().iter().map(|step| step.target()).collect();
    assert_eq!(targets, vec!["INTERPRETER#0", "INTERPRETER#1", "INTERPRETER#0"]);
    for (step, call) in compiled.steps().iter().zip(&report.calls) {
        assert_eq!(step.node(), call.call);
    }

    let outputs = run_f32(&hybrid, function, &abc_inputs()).unwrap();
    assert_eq!(outputs, vec![ABC_T3.to_vec(), ABC_T4.to_vec()]);
}

#[test]
fn inner_functions_are_compiled_by_their_placed_backend() {
    let first = Arc::new(RecordingBackend::new(interpreter(&[OpKind::Add])));
    let second = Arc::new(RecordingBackend::new(interpreter(&[OpKind::Multiply])));
    let hybrid = HybridBackend::new(vec![
        Arc::clone(&first) as Arc<dyn Backend>,
        Arc::clone(&second) as Arc<dyn Backend>,
    ]);

    let outputs = run_f32(&hybrid, abc_function(), &abc_inputs()).unwrap();
    assert_eq!(outputs, vec![ABC_T3.to_vec(), ABC_T4.to_vec()]);

    assert_eq!(
        first.compiled_names(),
        vec!["abc/INTERPRETER#0/0", "abc/INTERPRETER#0/2"]
    );
    assert_eq!(second.compiled_names(), vec!["abc/INTERPRETER#1/1"]);
    assert_eq!(first.call_count(), 2);
    assert_eq!(second.call_count(), 1);
    for inner in first.compiled_functions() {
        for id in inner.graph().node_ids() {
            assert_ne!(inner.graph().node(id).unwrap().kind(), OpKind::Add);
        }
    }
}

#[test]
fn unplaceable_ops_fail_compilation() {
    let hybrid = HybridBackend::new(vec![interpreter(&[OpKind::Add]), interpreter(&[OpKind::Add])]);
    let err = hybrid.compile(abc_function()).err().expect("Add has no host");
    assert!(matches!(&err, BackendError::UnplaceableOp { op } if op == "Add"), "{err}");
}

/// `(a + b)` through an explicit call on `target`, then multiplied by `a` when `scale` is set.
fn call_function(target: &str, scale: bool) -> Arc<Function> {
    let mut graph = Graph::new();
    let a = graph.parameter(f32_2x2());
    let b = graph.parameter(f32_2x2());
    let call = function_call(
        &mut graph,
        add_function(f32_2x2()),
        target,
        &[a.into(), b.into()],
    )
    .unwrap();
    let result = if scale {
        graph.multiply(call.output(0), a).unwrap().into()
    } else {
        call.output(0)
    };
    Arc::new(Function::new("with_call", graph, vec![a, b], vec![result]).unwrap())
}

#[test]
fn partitioned_input_is_compiled_as_is() {
    let hybrid = split_hybrid();
    let function = call_function("INTERPRETER#1", false);
    let executable = hybrid.compile(Arc::clone(&function)).unwrap();
    let compiled = executable.as_any().downcast_ref::<HybridExecutable>().unwrap();
    assert!(compiled.report().is_none());
    assert!(Arc::ptr_eq(compiled.partitioned(), &function));
    assert_eq!(compiled.steps().len(), 1);

    let inputs = vec![vec![1.0, 2.0, 3.0, 4.0], vec![0.5, 0.5, 0.5, 0.5]];
    let outputs = run_f32(&hybrid, function, &inputs).unwrap();
    assert_eq!(outputs, vec![vec![1.5, 2.5, 3.5, 4.5]]);
}

#[test]
fn call_targets_resolve_by_name_then_registry() {
    register_interpreter_backend();
    let inputs = vec![vec![1.0, 2.0, 3.0, 4.0], vec![1.0, 1.0, 1.0, 1.0]];
    let hybrid = HybridBackend::new(vec![interpreter(&[OpKind::Multiply])]);

    let by_name = run_f32(&hybrid, call_function("INTERPRETER", false), &inputs).unwrap();
    assert_eq!(by_name, vec![vec![2.0, 3.0, 4.0, 5.0]]);

    let from_registry =
        run_f32(&hybrid, call_function("INTERPRETER:Multiply", false), &inputs).unwrap();
    assert_eq!(from_registry, by_name);

    let err = hybrid
        .compile(call_function("NOPE", false))
        .err()
        .expect("unknown call target");
    assert!(matches!(&err, BackendError::UnknownBackend { name } if name == "NOPE"), "{err}");
}

#[test]
fn existing_calls_stay_in_the_outer_function() {
    let hybrid = split_hybrid();
    let function = call_function("INTERPRETER#1", true);
    let executable = hybrid.compile(Arc::clone(&function)).unwrap();
    let compiled = executable.as_any().downcast_ref::<HybridExecutable>().unwrap();
    let report = compiled.report().expect("Multiply needed partitioning");
    assert_eq!(report.calls.len(), 1);
    assert_eq!(report.calls[0].backend, "INTERPRETER#0");
    assert_eq!(report.calls[0].inputs, 2);
    assert_eq!(compiled.steps().len(), 2);

    let inputs = vec![vec![1.0, 2.0, 3.0, 4.0], vec![1.0, 1.0, 1.0, 1.0]];
    let outputs = run_f32(&hybrid, function, &inputs).unwrap();
    assert_eq!(outputs, vec![vec![2.0, 6.0, 12.0, 20.0]]);
}

#[test]
fn debug_mode_snapshots_every_extraction() {
    let visualizer = Arc::new(RecordingVisualizer::default());
    let hybrid = split_hybrid().with_visualizer(Arc::clone(&visualizer) as Arc<dyn GraphVisualizer>);

    hybrid.set_debug_enabled(false);
    let quiet = run_f32(&hybrid, abc_function(), &abc_inputs()).unwrap();
    assert!(visualizer.labels().is_empty());

    hybrid.set_debug_enabled(true);
    assert!(hybrid.debug_enabled());
    let traced = run_f32(&hybrid, abc_function(), &abc_inputs()).unwrap();
    assert_eq!(traced, quiet);
    assert_eq!(
        visualizer.labels(),
        vec!["abc.partition.0", "abc.partition.1", "abc.partition.2"]
    );
    let snapshots = visualizer.snapshots.lock().unwrap();
    assert!(snapshots[0].1.contains("FunctionCall abc/INTERPRETER#0/0"));
    assert!(!snapshots[2].1.contains("Add"));
}

#[test]
fn foreign_executables_are_rejected() {
    let hybrid = split_hybrid();
    let interpreter = InterpreterBackend::new();
    let executable = interpreter.compile(add_function(f32_2x2())).unwrap();
    let tensor = || interpreter.create_tensor(f32_2x2()).unwrap();
    let err = hybrid
        .call(executable.as_ref(), &[tensor()], &[tensor(), tensor()])
        .unwrap_err();
    assert!(matches!(err, BackendError::Execution { .. }), "{err}");
}

/// Compares bit patterns so NaNs from overflowing products still match.
fn bits(values: &[Vec<f32>]) -> Vec<Vec<u32>> {
    values
        .iter()
        .map(|tensor| tensor.iter().map(|v| v.to_bits()).collect())
        .collect()
}

#[test]
fn random_graphs_match_a_single_interpreter() {
    let reference = InterpreterBackend::new();
    let hybrid = HybridBackend::new(vec![
        interpreter(&[OpKind::Add, OpKind::Maximum]),
        interpreter(&[OpKind::Multiply, OpKind::Negative]),
        interpreter(&[OpKind::Subtract]),
    ]);

    for seed in 0..24u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let function = random_elementwise_function(&mut rng, 3, 12);
        let inputs = random_inputs(&mut rng, 3);
        let expected = run_f32(&reference, Arc::clone(&function), &inputs).unwrap();
        let actual = run_f32(&hybrid, function, &inputs)
            .unwrap_or_else(|err| panic!("seed {seed}: {err}"));
        assert_eq!(bits(&actual), bits(&expected), "seed {seed}");
    }
}

#[test]
fn binary_and_unary_builders_compose_across_backends() {
    let mut graph = Graph::new();
    let a = graph.parameter(f32_2x2());
    let b = graph.parameter(f32_2x2());
    let diff = graph.binary(BinaryOp::Subtract, a, b).unwrap();
    let abs = graph.unary(UnaryOp::Abs, diff).unwrap();
    let max = graph.binary(BinaryOp::Maximum, abs, a).unwrap();
    let function = Arc::new(Function::new("mixed", graph, vec![a, b], vec![max.into()]).unwrap());

    let hybrid = HybridBackend::new(vec![
        interpreter(&[OpKind::Abs]),
        interpreter(&[OpKind::Subtract, OpKind::Maximum]),
    ]);
    let inputs = vec![vec![1.0, -2.0, 3.0, 0.0], vec![4.0, 2.0, 3.0, -5.0]];
    let outputs = run_f32(&hybrid, function, &inputs).unwrap();
    assert_eq!(outputs, vec![vec![3.0, 4.0, 3.0, 5.0]]);
}

#[test]
fn tensors_are_allocated_by_the_first_member() {
    let hybrid = split_hybrid();
    let tensor = hybrid.create_tensor(f32_2x2()).unwrap();
    assert_eq!(tensor.owner(), "INTERPRETER");

    let empty = HybridBackend::new(Vec::new());
    let tensor = empty.create_tensor(f32_2x2()).unwrap();
    assert_eq!(tensor.owner(), "HYBRID");
    assert_eq!(tensor.read_f32().unwrap(), vec![0.0; 4]);
}

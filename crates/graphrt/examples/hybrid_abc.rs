//! Splits `t3 = A*B*D + C`, `t4 = (t3 + A) * (A*B)` across two interpreters that each
//! refuse one op, then prints the partition and the results.
//!
//! ```text
//! RUST_LOG=graphrt=debug GRAPHRT_HYBRID_DEBUG=1 cargo run -p graphrt --example hybrid_abc
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use graphrt::backend::shape_helpers::tensor_spec_static;
use graphrt::hybrid::register_hybrid_backend;
use graphrt::{create_backend, get_typed_backend, DType, Function, Graph, HybridBackend};
use graphrt::{HybridExecutable, Tensor};
use graphrt_backend_interp::register_interpreter_backend;
use tracing_subscriber::EnvFilter;

fn abc() -> Result<Arc<Function>> {
    let spec = tensor_spec_static(DType::F32, &[2, 2]);
    let mut graph = Graph::new();
    let [a, b, c, d] = [(); 4].map(|_| graph.parameter(spec.clone()));
    let ab = graph.multiply(a, b)?;
    let abd = graph.multiply(ab, d)?;
    let t3 = graph.add(abd, c)?;
    let t3a = graph.add(t3, a)?;
    let t4 = graph.multiply(t3a, ab)?;
    Ok(Arc::new(Function::new(
        "abc",
        graph,
        vec![a, b, c, d],
        vec![t3.into(), t4.into()],
    )?))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    register_interpreter_backend();
    register_hybrid_backend();

    let backend = create_backend("HYBRID:INTERPRETER:Add;INTERPRETER:Multiply")?;
    if let Some(hybrid) = get_typed_backend::<HybridBackend>(backend.as_ref()) {
        println!("placement labels: {:?}", hybrid.labels());
    }

    let function = abc()?;
    let executable = backend.compile(Arc::clone(&function))?;
    let compiled = executable
        .as_any()
        .downcast_ref::<HybridExecutable>()
        .context("HYBRID returned a foreign executable")?;
    if let Some(report) = compiled.report() {
        for call in &report.calls {
            println!(
                "%{} {} on {} ({} node(s), depth {})",
                call.call.0, call.function, call.backend, call.nodes, call.depth
            );
        }
    }

    let inputs: Vec<Arc<Tensor>> = [
        [1.0, 2.0, 3.0, 4.0],
        [5.0, 6.0, 7.0, 8.0],
        [9.0, 10.0, 11.0, 12.0],
        [4.0, 3.0, 2.0, 1.0],
    ]
    .iter()
    .map(|values| -> Result<Arc<Tensor>> {
        let tensor = backend.create_tensor(tensor_spec_static(DType::F32, &[2, 2]))?;
        tensor.write_f32(values)?;
        Ok(tensor)
    })
    .collect::<Result<_>>()?;
    let outputs = function
        .result_specs()?
        .into_iter()
        .map(|spec| backend.create_tensor(spec.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    backend.call_with_validate(executable.as_ref(), &outputs, &inputs)?;
    for (name, tensor) in ["t3", "t4"].iter().zip(&outputs) {
        println!("{name} = {:?}", tensor.read_f32()?);
    }
    Ok(())
}

use std::sync::Arc;

use crate::backend::spec::{BackendError, BackendResult};
use crate::backend::tensor::{check_same_spec, Tensor};
use crate::graph::Function;

/// Checks `outputs`/`inputs` against the result and parameter declarations of `function`.
pub fn validate_call(
    function: &Function,
    outputs: &[Arc<Tensor>],
    inputs: &[Arc<Tensor>],
) -> BackendResult<()> {
    let parameters = function.parameter_specs()?;
    if parameters.len() != inputs.len() {
        return Err(BackendError::Arity {
            what: format!("inputs of `{}`", function.name()),
            expected: parameters.len(),
            found: inputs.len(),
        });
    }
    let results = function.result_specs()?;
    if results.len() != outputs.len() {
        return Err(BackendError::Arity {
            what: format!("outputs of `{}`", function.name()),
            expected: results.len(),
            found: outputs.len(),
        });
    }

    for (index, (spec, tensor)) in parameters.iter().zip(inputs).enumerate() {
        check_same_spec(
            &format!("input #{index} of `{}`", function.name()),
            spec,
            tensor.spec(),
        )?;
    }
    for (index, (spec, tensor)) in results.iter().zip(outputs).enumerate() {
        check_same_spec(
            &format!("output #{index} of `{}`", function.name()),
            spec,
            tensor.spec(),
        )?;
    }
    Ok(())
}

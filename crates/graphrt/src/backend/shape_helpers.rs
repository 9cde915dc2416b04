//! Shared shape helpers used by graph builders, backends and tests.

use crate::backend::spec::{DType, DimSymbol, Dimension, Shape, TensorSpec};

/// Builds a static shape descriptor from explicit dimensions.
pub fn shape_static(dims: &[usize]) -> Shape {
    Shape::new(
        dims.iter()
            .copied()
            .map(Dimension::Static)
            .collect::<Vec<_>>(),
    )
}

/// Builds a mixed static/dynamic shape descriptor.
pub fn shape_mixed(dims: &[Option<usize>]) -> Shape {
    Shape::new(
        dims.iter()
            .enumerate()
            .map(|(idx, dim)| match dim {
                Some(value) => Dimension::Static(*value),
                None => Dimension::Dynamic(DimSymbol::new(format!("d{idx}"))),
            })
            .collect::<Vec<_>>(),
    )
}

/// Builds a tensor spec with fully static dimensions.
pub fn tensor_spec_static(dtype: DType, dims: &[usize]) -> TensorSpec {
    TensorSpec::new(dtype, shape_static(dims))
}

/// Builds a tensor spec with mixed static/dynamic dimensions.
pub fn tensor_spec_mixed(dtype: DType, dims: &[Option<usize>]) -> TensorSpec {
    TensorSpec::new(dtype, shape_mixed(dims))
}

/// Returns static dimensions or maps the first dynamic dimension to caller-defined error type.
pub fn static_dims_or_error<E, F>(shape: &Shape, mut on_dynamic: F) -> Result<Vec<usize>, E>
where
    F: FnMut(&DimSymbol) -> E,
{
    let mut dims = Vec::with_capacity(shape.rank());
    for dim in shape.dims() {
        match dim {
            Dimension::Static(value) => dims.push(*value),
            Dimension::Dynamic(symbol) => return Err(on_dynamic(symbol)),
        }
    }
    Ok(dims)
}

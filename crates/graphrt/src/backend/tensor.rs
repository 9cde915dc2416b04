use std::fmt;
use std::sync::{Arc, Mutex};

use crate::backend::spec::{BackendError, BackendResult, DType, TensorLiteral, TensorSpec};

/// Typed, shaped buffer allocated by exactly one backend.
///
/// The owning backend is recorded for diagnostics only: any backend may read a tensor passed
/// to it as an input or write one passed as an output, but allocation ownership never moves.
pub struct Tensor {
    spec: TensorSpec,
    owner: String,
    bytes: Mutex<Vec<u8>>,
}

impl Tensor {
    /// Allocates zero-filled storage for `spec` on behalf of `owner`.
    pub fn allocate(owner: impl Into<String>, spec: TensorSpec) -> BackendResult<Self> {
        if let Some(dim) = spec.shape.dims().iter().find(|dim| dim.as_static().is_none()) {
            return Err(BackendError::allocation(format!(
                "shape {} has unresolved dimension {dim:?}",
                spec.shape
            )));
        }
        let byte_len = spec.byte_len().ok_or_else(|| {
            BackendError::allocation(format!("byte length of {spec} overflows usize"))
        })?;
        Ok(Self {
            spec,
            owner: owner.into(),
            bytes: Mutex::new(vec![0u8; byte_len]),
        })
    }

    pub fn spec(&self) -> &TensorSpec {
        &self.spec
    }

    pub fn dtype(&self) -> DType {
        self.spec.dtype
    }

    /// Name of the backend that allocated this tensor.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn byte_len(&self) -> usize {
        self.lock().len()
    }

    pub fn read_bytes(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn write_bytes(&self, bytes: &[u8]) -> BackendResult<()> {
        let mut guard = self.lock();
        if guard.len() != bytes.len() {
            return Err(BackendError::execution(format!(
                "tensor {} holds {} bytes, write supplied {}",
                self.spec,
                guard.len(),
                bytes.len()
            )));
        }
        guard.copy_from_slice(bytes);
        Ok(())
    }

    pub fn to_literal(&self) -> TensorLiteral {
        TensorLiteral::new(self.spec.clone(), Arc::from(self.read_bytes()))
    }

    /// Overwrites the contents with `literal`, which must carry exactly this tensor's spec.
    pub fn write_literal(&self, literal: &TensorLiteral) -> BackendResult<()> {
        check_same_spec("tensor write", &self.spec, &literal.spec)?;
        self.write_bytes(&literal.bytes)
    }

    pub fn read_f32(&self) -> BackendResult<Vec<f32>> {
        self.to_literal().to_f32()
    }

    pub fn write_f32(&self, values: &[f32]) -> BackendResult<()> {
        let literal = TensorLiteral::from_f32(self.spec.shape.clone(), values);
        self.write_literal(&literal)
    }

    pub fn read_i32(&self) -> BackendResult<Vec<i32>> {
        self.to_literal().to_i32()
    }

    pub fn write_i32(&self, values: &[i32]) -> BackendResult<()> {
        let literal = TensorLiteral::from_i32(self.spec.shape.clone(), values);
        self.write_literal(&literal)
    }

    /// Copies the contents of `source`, which may be owned by a different backend.
    pub fn copy_from(&self, source: &Tensor) -> BackendResult<()> {
        if std::ptr::eq(self, source) {
            return Ok(());
        }
        check_same_spec("tensor copy", &self.spec, &source.spec)?;
        let bytes = source.read_bytes();
        self.write_bytes(&bytes)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().expect("tensor storage poisoned")
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("spec", &self.spec)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

pub(crate) fn check_same_spec(
    what: &str,
    expected: &TensorSpec,
    found: &TensorSpec,
) -> BackendResult<()> {
    if expected.dtype != found.dtype {
        return Err(BackendError::TypeMismatch {
            what: what.to_string(),
            expected: expected.dtype,
            found: found.dtype,
        });
    }
    if expected.shape != found.shape {
        return Err(BackendError::ShapeMismatch {
            what: what.to_string(),
            expected: expected.shape.clone(),
            found: found.shape.clone(),
        });
    }
    Ok(())
}

use std::{any::Any, fmt, sync::Arc};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use thiserror::Error;

use crate::backend::tensor::Tensor;
use crate::backend::validate;
use crate::graph::{Function, GraphError, OpKind};

/// Enumerates scalar element types a backend may be asked to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum DType {
    I1,
    Si8,
    Ui8,
    Si32,
    Si64,
    Bf16,
    F16,
    F32,
    F64,
}

impl DType {
    /// Returns `true` when the dtype is a floating-point representation.
    pub fn is_float(self) -> bool {
        matches!(self, DType::Bf16 | DType::F16 | DType::F32 | DType::F64)
    }

    /// Returns the storage size of a single element.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::I1 | DType::Si8 | DType::Ui8 => 1,
            DType::Bf16 | DType::F16 => 2,
            DType::Si32 | DType::F32 => 4,
            DType::Si64 | DType::F64 => 8,
        }
    }
}

/// Names a symbolic dynamic dimension (e.g. `?B`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimSymbol(Arc<str>);

impl DimSymbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::<str>::from(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for DimSymbol {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DimSymbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(DimSymbol::new(name))
    }
}

/// Represents a single axis extent in a tensor shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Static(usize),
    Dynamic(DimSymbol),
}

impl Dimension {
    pub fn as_static(&self) -> Option<usize> {
        match self {
            Dimension::Static(value) => Some(*value),
            Dimension::Dynamic(_) => None,
        }
    }
}

/// Logical tensor shape as an ordered list of dimensions. The empty shape is a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<Dimension>,
}

impl Shape {
    pub fn new(dims: impl Into<Vec<Dimension>>) -> Self {
        Self { dims: dims.into() }
    }

    pub fn scalar() -> Self {
        Self { dims: Vec::new() }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn dim(&self, axis: usize) -> Option<&Dimension> {
        self.dims.get(axis)
    }

    /// Returns static dimensions when all dims are static.
    pub fn static_dims(&self) -> Option<Vec<usize>> {
        self.dims.iter().map(Dimension::as_static).collect()
    }

    /// Returns element count when all dims are static and the product does not overflow.
    pub fn element_count(&self) -> Option<usize> {
        let dims = self.static_dims()?;
        let mut count = 1usize;
        for dim in dims {
            count = count.checked_mul(dim)?;
        }
        Some(count)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dims.is_empty() {
            return f.write_str("[]");
        }
        let parts = self
            .dims
            .iter()
            .map(|dim| match dim {
                Dimension::Static(value) => value.to_string(),
                Dimension::Dynamic(sym) => format!("?{}", sym.as_str()),
            })
            .collect::<Vec<_>>();
        write!(f, "[{}]", parts.join("x"))
    }
}

/// Tensor metadata coupling dtype and shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorSpec {
    pub dtype: DType,
    pub shape: Shape,
}

impl TensorSpec {
    pub fn new(dtype: DType, shape: Shape) -> Self {
        Self { dtype, shape }
    }

    /// Returns total element count when shape is fully static.
    pub fn element_count(&self) -> Option<usize> {
        self.shape.element_count()
    }

    /// Returns total byte length when the shape is static.
    pub fn byte_len(&self) -> Option<usize> {
        self.element_count()?
            .checked_mul(self.dtype.size_in_bytes())
    }
}

impl fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{}", self.dtype, self.shape)
    }
}

/// Dense literal tensor payload stored as little-endian bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorLiteral {
    pub spec: TensorSpec,
    pub bytes: Arc<[u8]>,
}

impl TensorLiteral {
    pub fn new(spec: TensorSpec, bytes: Arc<[u8]>) -> Self {
        Self { spec, bytes }
    }

    pub fn from_f32(shape: Shape, values: &[f32]) -> Self {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for &value in values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        Self::new(TensorSpec::new(DType::F32, shape), Arc::from(bytes))
    }

    pub fn from_i32(shape: Shape, values: &[i32]) -> Self {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for &value in values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        Self::new(TensorSpec::new(DType::Si32, shape), Arc::from(bytes))
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn to_f32(&self) -> BackendResult<Vec<f32>> {
        if self.spec.dtype != DType::F32 {
            return Err(BackendError::TypeMismatch {
                what: "literal read".to_string(),
                expected: DType::F32,
                found: self.spec.dtype,
            });
        }
        if !self.bytes.len().is_multiple_of(4) {
            return Err(BackendError::execution(
                "literal byte length mismatches f32",
            ));
        }
        Ok(self
            .bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    pub fn to_i32(&self) -> BackendResult<Vec<i32>> {
        if self.spec.dtype != DType::Si32 {
            return Err(BackendError::TypeMismatch {
                what: "literal read".to_string(),
                expected: DType::Si32,
                found: self.spec.dtype,
            });
        }
        if !self.bytes.len().is_multiple_of(4) {
            return Err(BackendError::execution(
                "literal byte length mismatches i32",
            ));
        }
        Ok(self
            .bytes
            .chunks_exact(4)
            .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}

impl Serialize for TensorLiteral {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("TensorLiteral", 2)?;
        state.serialize_field("spec", &self.spec)?;
        state.serialize_field("bytes", &self.bytes.as_ref())?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for TensorLiteral {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct TensorLiteralHelper {
            spec: TensorSpec,
            bytes: Vec<u8>,
        }

        let helper = TensorLiteralHelper::deserialize(deserializer)?;
        Ok(TensorLiteral {
            spec: helper.spec,
            bytes: Arc::<[u8]>::from(helper.bytes),
        })
    }
}

/// Backend error surfaced to higher layers.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("tensor allocation failed: {0}")]
    Allocation(String),
    #[error("compilation failed: {0}")]
    Compile(String),
    #[error("no backend can host op `{op}`")]
    UnplaceableOp { op: String },
    #[error("unknown backend `{name}`")]
    UnknownBackend { name: String },
    #[error("{what}: expected {expected} tensor(s), found {found}")]
    Arity {
        what: String,
        expected: usize,
        found: usize,
    },
    #[error("type mismatch for {what}: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        what: String,
        expected: DType,
        found: DType,
    },
    #[error("shape mismatch for {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: Shape,
        found: Shape,
    },
    #[error("{op} is not implemented: {reason}")]
    Unimplemented { op: &'static str, reason: String },
    #[error("backend execution failure: {message}")]
    Execution { message: String },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl BackendError {
    pub fn allocation(message: impl Into<String>) -> Self {
        BackendError::Allocation(message.into())
    }

    pub fn compile(message: impl Into<String>) -> Self {
        BackendError::Compile(message.into())
    }

    pub fn unimplemented(op: &'static str, reason: impl Into<String>) -> Self {
        BackendError::Unimplemented {
            op,
            reason: reason.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        BackendError::Execution {
            message: message.into(),
        }
    }

    pub fn unknown_backend(name: impl Into<String>) -> Self {
        BackendError::UnknownBackend { name: name.into() }
    }
}

/// Convenience alias for results returned by backend routines.
pub type BackendResult<T> = Result<T, BackendError>;

/// Compiled, immutable form of a [`Function`] produced by one backend.
///
/// Executables are opaque to callers. The producing backend recovers its concrete type
/// through [`Executable::as_any`] when the executable is handed back to [`Backend::call`].
pub trait Executable: Any + Send + Sync {
    /// Function this executable was compiled from; its parameters and results define the
    /// call signature.
    fn function(&self) -> &Arc<Function>;

    /// Name of the backend that produced the executable.
    fn backend_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// Recovers a backend's concrete executable type, failing when another backend produced it.
pub fn downcast_executable<'a, E: Executable>(
    executable: &'a dyn Executable,
    backend_name: &str,
) -> BackendResult<&'a E> {
    executable.as_any().downcast_ref::<E>().ok_or_else(|| {
        BackendError::execution(format!(
            "executable type mismatch for backend {backend_name} (compiled by {})",
            executable.backend_name()
        ))
    })
}

/// Execution backend: allocates tensors, compiles functions and runs the result.
pub trait Backend: Send + Sync {
    /// Returns a human-readable backend identifier (e.g., `"INTERPRETER"`, `"HYBRID"`).
    fn backend_name(&self) -> &str;

    /// Returns `true` when the backend can host nodes of the given kind.
    ///
    /// Placement heuristics consult this before assigning a node to the backend.
    fn is_supported(&self, _kind: OpKind) -> bool {
        true
    }

    /// Allocates zero-initialised, backend-owned storage for `spec`.
    fn create_tensor(&self, spec: TensorSpec) -> BackendResult<Arc<Tensor>>;

    /// Lowers `function` into an invocable executable.
    ///
    /// Compiling the same function twice yields two independent executables.
    fn compile(&self, function: Arc<Function>) -> BackendResult<Arc<dyn Executable>>;

    /// Runs `executable`, writing into `outputs`.
    ///
    /// This path does not check the tensors against the function signature. Mismatched
    /// bindings produce an error or meaningless output values; use
    /// [`Backend::call_with_validate`] when the bindings are not already known to match.
    fn call(
        &self,
        executable: &dyn Executable,
        outputs: &[Arc<Tensor>],
        inputs: &[Arc<Tensor>],
    ) -> BackendResult<()>;

    /// Checks tensor counts, dtypes and shapes against the executable's signature, then calls.
    fn call_with_validate(
        &self,
        executable: &dyn Executable,
        outputs: &[Arc<Tensor>],
        inputs: &[Arc<Tensor>],
    ) -> BackendResult<()> {
        validate::validate_call(executable.function(), outputs, inputs)?;
        self.call(executable, outputs, inputs)
    }

    /// Downcast hook used to recover concrete backend types from registry handles.
    fn as_any(&self) -> &dyn Any;
}

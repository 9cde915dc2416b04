//! Runtime backend registry for selecting backends by name.
//!
//! Backends are registered under a name together with a factory that receives a
//! backend-defined configuration string. The hybrid backend resolves FunctionCall targets
//! through the global registry when the target is not one of the backends it holds.
//!
//! # Initialization order
//!
//! Registration is explicit: call each backend crate's `register_*` function during process
//! start-up, before the first [`create_backend`]. Entries are never removed; registering a
//! name again replaces the previous factory.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::debug;

use super::spec::{Backend, BackendError, BackendResult};

/// Factory producing a backend instance from a configuration string.
pub type BackendConstructor = Arc<dyn Fn(&str) -> BackendResult<Arc<dyn Backend>> + Send + Sync>;

/// Process-wide mapping from backend names to constructors.
pub struct BackendRegistry {
    backends: RwLock<HashMap<String, BackendConstructor>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendRegistry {
    /// Creates an empty, standalone registry. Most callers want [`BackendRegistry::global`].
    pub fn new() -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the process-wide registry instance.
    pub fn global() -> &'static BackendRegistry {
        static GLOBAL_REGISTRY: OnceLock<BackendRegistry> = OnceLock::new();
        GLOBAL_REGISTRY.get_or_init(BackendRegistry::new)
    }

    /// Registers `constructor` under `name`, replacing any previous entry.
    pub fn register(&self, name: impl Into<String>, constructor: BackendConstructor) {
        let name = name.into();
        let replaced = self
            .backends
            .write()
            .expect("backend registry poisoned")
            .insert(name.clone(), constructor)
            .is_some();
        debug!(backend = %name, replaced, "registered backend");
    }

    /// Instantiates the backend registered under `name`, passing `config` to its factory.
    ///
    /// The registry lock is released before the factory runs, so factories may themselves
    /// create other registered backends.
    pub fn create(&self, name: &str, config: &str) -> BackendResult<Arc<dyn Backend>> {
        let constructor = self
            .backends
            .read()
            .expect("backend registry poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::unknown_backend(name))?;
        constructor(config)
    }

    /// Lists registered backend names in sorted order.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .backends
            .read()
            .expect("backend registry poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends
            .read()
            .expect("backend registry poisoned")
            .contains_key(name)
    }
}

/// Splits a `"name:config"` backend string into its name and configuration parts.
pub fn split_backend_spec(spec: &str) -> (&str, &str) {
    match spec.split_once(':') {
        Some((name, config)) => (name, config),
        None => (spec, ""),
    }
}

/// Register a backend factory by name in the global registry.
///
/// # Example
/// ```ignore
/// use graphrt::backend::registry::register_backend;
///
/// pub fn register() {
///     register_backend("my_backend", |config| {
///         Ok(std::sync::Arc::new(MyBackend::from_config(config)?) as _)
///     });
/// }
/// ```
pub fn register_backend<F>(name: impl Into<String>, constructor: F)
where
    F: Fn(&str) -> BackendResult<Arc<dyn Backend>> + Send + Sync + 'static,
{
    BackendRegistry::global().register(name, Arc::new(constructor));
}

/// Create a backend from a `"name"` or `"name:config"` string.
///
/// Fails with [`BackendError::UnknownBackend`] when no backend with that name is registered.
pub fn create_backend(spec: &str) -> BackendResult<Arc<dyn Backend>> {
    let (name, config) = split_backend_spec(spec);
    create_backend_with_config(name, config)
}

/// Create a backend by name with an explicit configuration string.
pub fn create_backend_with_config(name: &str, config: &str) -> BackendResult<Arc<dyn Backend>> {
    BackendRegistry::global().create(name, config)
}

/// List all registered backend names.
pub fn list_backends() -> Vec<String> {
    BackendRegistry::global().list()
}

/// Check if a backend with the given name is registered.
pub fn has_backend(name: &str) -> bool {
    BackendRegistry::global().contains(name)
}

/// Recovers the concrete backend type behind a registry handle.
///
/// ```ignore
/// let backend = create_backend("H1")?;
/// if let Some(hybrid) = get_typed_backend::<HybridBackend>(backend.as_ref()) {
///     hybrid.set_debug_enabled(true);
/// }
/// ```
pub fn get_typed_backend<B: Backend + Any>(backend: &dyn Backend) -> Option<&B> {
    backend.as_any().downcast_ref::<B>()
}

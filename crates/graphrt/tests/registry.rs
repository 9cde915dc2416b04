use std::sync::Arc;

use graphrt::backend::registry::{split_backend_spec, BackendRegistry};
use graphrt::backend::spec::{Backend, BackendError, BackendResult};
use graphrt::graph::OpKind;
use graphrt::hybrid::{register_hybrid_backend, HybridBackend, HYBRID_BACKEND_NAME};
use graphrt::{create_backend, get_typed_backend, has_backend, list_backends, register_backend};
use graphrt_backend_interp::{
    register_interpreter_backend, InterpreterBackend, INTERPRETER_BACKEND_NAME,
};
use graphrt_backend_tests::graphs::{abc_function, abc_inputs, run_f32, ABC_T3, ABC_T4};

#[test]
fn registered_backends_are_listed_and_created_by_name() {
    register_interpreter_backend();

    assert!(has_backend(INTERPRETER_BACKEND_NAME));
    assert!(list_backends().contains(&INTERPRETER_BACKEND_NAME.to_string()));

    let backend = create_backend(INTERPRETER_BACKEND_NAME).expect("create interpreter");
    assert_eq!(backend.backend_name(), INTERPRETER_BACKEND_NAME);
    assert!(get_typed_backend::<InterpreterBackend>(backend.as_ref()).is_some());
    assert!(get_typed_backend::<HybridBackend>(backend.as_ref()).is_none());
}

#[test]
fn unknown_backends_are_reported() {
    assert!(!has_backend("nonexistent"));
    let err = create_backend("nonexistent:whatever").err().expect("unknown backend");
    assert!(
        matches!(&err, BackendError::UnknownBackend { name } if name == "nonexistent"),
        "{err}"
    );
}

#[test]
fn config_string_reaches_the_factory() {
    register_interpreter_backend();
    let backend = create_backend("INTERPRETER:Add, Multiply").expect("configured interpreter");
    assert!(!backend.is_supported(OpKind::Add));
    assert!(!backend.is_supported(OpKind::Multiply));
    assert!(backend.is_supported(OpKind::Subtract));

    let err = create_backend("INTERPRETER:Conv").err().expect("bad config");
    assert!(matches!(err, BackendError::Compile(_)), "{err}");
}

#[test]
fn split_backend_spec_separates_name_and_config() {
    assert_eq!(split_backend_spec("INTERPRETER"), ("INTERPRETER", ""));
    assert_eq!(split_backend_spec("INTERPRETER:Add"), ("INTERPRETER", "Add"));
    assert_eq!(
        split_backend_spec("HYBRID:INTERPRETER:Add;INTERPRETER"),
        ("HYBRID", "INTERPRETER:Add;INTERPRETER")
    );
}

#[test]
fn registering_again_replaces_the_factory() {
    let registry = BackendRegistry::new();
    registry.register(
        "local",
        Arc::new(|_config: &str| -> BackendResult<Arc<dyn Backend>> {
            Ok(Arc::new(InterpreterBackend::new()))
        }),
    );
    registry.register(
        "local",
        Arc::new(|_config: &str| -> BackendResult<Arc<dyn Backend>> {
            Ok(Arc::new(InterpreterBackend::with_unsupported_ops([OpKind::Add])))
        }),
    );
    assert_eq!(registry.list(), vec!["local".to_string()]);
    let backend = registry.create("local", "").expect("local backend");
    assert!(!backend.is_supported(OpKind::Add));
    assert!(!BackendRegistry::global().contains("local"));
}

#[test]
fn factories_may_compose_registered_backends() {
    register_interpreter_backend();
    register_backend("H1", |_config| {
        let backends = vec![
            create_backend("INTERPRETER:Add")?,
            create_backend("INTERPRETER:Multiply")?,
        ];
        Ok(Arc::new(HybridBackend::new(backends)) as Arc<dyn Backend>)
    });

    let backend = create_backend("H1").expect("H1");
    let hybrid = get_typed_backend::<HybridBackend>(backend.as_ref()).expect("H1 is a hybrid");
    assert_eq!(hybrid.labels(), vec!["INTERPRETER#0", "INTERPRETER#1"]);

    let outputs = run_f32(backend.as_ref(), abc_function(), &abc_inputs()).expect("run abc");
    assert_eq!(outputs, vec![ABC_T3.to_vec(), ABC_T4.to_vec()]);
}

#[test]
fn hybrid_backend_is_configured_from_a_backend_list() {
    register_interpreter_backend();
    register_hybrid_backend();

    let backend =
        create_backend("HYBRID:INTERPRETER:Add;INTERPRETER:Multiply").expect("configured hybrid");
    assert_eq!(backend.backend_name(), HYBRID_BACKEND_NAME);
    let hybrid = get_typed_backend::<HybridBackend>(backend.as_ref()).expect("hybrid");
    assert_eq!(hybrid.labels().len(), 2);

    let outputs = run_f32(backend.as_ref(), abc_function(), &abc_inputs()).expect("run abc");
    assert_eq!(outputs, vec![ABC_T3.to_vec(), ABC_T4.to_vec()]);

    assert!(create_backend("HYBRID").is_err(), "an empty backend list is rejected");
    let err = create_backend("HYBRID:NOPE").err().expect("unknown member");
    assert!(matches!(err, BackendError::UnknownBackend { .. }), "{err}");
}

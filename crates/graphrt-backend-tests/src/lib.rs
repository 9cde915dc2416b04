pub mod graphs;
pub mod recording_backend;
pub mod smoke;

/// Expands to a test module running the shared conformance suite against the backend
/// returned by `$backend_ctor` (any `Arc` of a [`graphrt::backend::spec::Backend`]).
#[macro_export]
macro_rules! define_backend_tests {
    ($module:ident, $backend_ctor:expr) => {
        #[cfg(test)]
        mod $module {
            #[allow(unused_imports)]
            use super::*;
            use $crate::smoke;

            macro_rules! smoke_test {
                ($name:ident) => {
                    #[test]
                    fn $name() {
                        let backend = ($backend_ctor)();
                        smoke::$name(backend.as_ref());
                    }
                };
            }

            smoke_test!(abc_matches_expected);
            smoke_test!(executable_is_reusable);
            smoke_test!(compile_twice_yields_independent_executables);
            smoke_test!(validate_rejects_wrong_arity);
            smoke_test!(validate_rejects_type_mismatch);
            smoke_test!(validate_rejects_shape_mismatch);
            smoke_test!(create_tensor_is_zero_filled);
            smoke_test!(create_tensor_rejects_dynamic_shape);
            smoke_test!(elementwise_ops_match_reference);
            smoke_test!(constants_are_materialized);
            smoke_test!(batch_norm_training_matches_reference);
            smoke_test!(cudnn_batch_norm_exposes_saved_statistics);
        }
    };
}

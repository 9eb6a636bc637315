//! Shared conformance tests for [`densemat::DeviceBackend`] implementations.
//!
//! A backend crate runs the whole suite with one line in its `tests/` directory:
//!
//! ```ignore
//! densemat_backend_tests::define_backend_tests!(cpu, || {
//!     std::sync::Arc::new(densemat_backend_ref_cpu::CpuBackend::new())
//! });
//! ```

pub mod fixtures;
pub mod harness;
pub mod oracle;
pub mod recording_backend;
pub mod suite;

#[doc(hidden)]
pub use anyhow;
#[doc(hidden)]
pub use densemat;

#[macro_export]
macro_rules! define_backend_tests {
    ($module:ident, $backend_ctor:expr) => {
        #[cfg(test)]
        mod $module {
            #[allow(unused_imports)]
            use super::*;

            $crate::__operation_tests!(f64_row_major, F64, RowMajor, $backend_ctor);
            $crate::__operation_tests!(f32_row_major, F32, RowMajor, $backend_ctor);
            $crate::__operation_tests!(f64_col_major, F64, ColMajor, $backend_ctor);
            $crate::__operation_tests!(f32_col_major, F32, ColMajor, $backend_ctor);

            mod mixed_storage_orders {
                #[allow(unused_imports)]
                use super::*;

                use $crate::densemat::DType::F64;
                use $crate::densemat::MatrixKind::{Dense, Range, Slice};
                use $crate::densemat::StorageOrder::{ColMajor, RowMajor};
                use $crate::suite::{self, SuiteConfig};

                #[test]
                fn a_row_major_range_b_col_major_slice_c_col_major_dense(
                ) -> $crate::anyhow::Result<()> {
                    let backend = ($backend_ctor)();
                    let config = SuiteConfig::new(F64, 131, 33)
                        .with_orders([RowMajor, ColMajor, ColMajor]);
                    suite::run_operations(&backend, &config, [Range, Slice, Dense])
                }

                #[test]
                fn square_a_col_major_slice_b_row_major_dense_c_col_major_range(
                ) -> $crate::anyhow::Result<()> {
                    let backend = ($backend_ctor)();
                    let config =
                        SuiteConfig::square(F64, 19).with_orders([ColMajor, RowMajor, ColMajor]);
                    suite::run_operations(&backend, &config, [Slice, Dense, Range])
                }
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __operation_tests {
    ($module:ident, $dtype:ident, $order:ident, $backend_ctor:expr) => {
        mod $module {
            #[allow(unused_imports)]
            use super::*;

            use $crate::densemat::MatrixKind::{Dense, Range, Slice};
            use $crate::suite::{self, SuiteConfig};

            const DTYPE: $crate::densemat::DType = $crate::densemat::DType::$dtype;
            const ORDER: $crate::densemat::StorageOrder = $crate::densemat::StorageOrder::$order;

            fn config(rows: usize, cols: usize) -> SuiteConfig {
                SuiteConfig::new(DTYPE, rows, cols).with_order(ORDER)
            }

            const ROWS: usize = 131;
            const COLS: usize = 33;
            const SQUARE: usize = 19;

            $crate::__operation_tests!(@combinations $backend_ctor, ROWS, COLS;
                a_dense_b_dense_c_dense => [Dense, Dense, Dense],
                a_dense_b_dense_c_range => [Dense, Dense, Range],
                a_dense_b_dense_c_slice => [Dense, Dense, Slice],
                a_dense_b_range_c_dense => [Dense, Range, Dense],
                a_dense_b_range_c_range => [Dense, Range, Range],
                a_dense_b_range_c_slice => [Dense, Range, Slice],
                a_dense_b_slice_c_dense => [Dense, Slice, Dense],
                a_dense_b_slice_c_range => [Dense, Slice, Range],
                a_dense_b_slice_c_slice => [Dense, Slice, Slice],
                a_range_b_dense_c_dense => [Range, Dense, Dense],
                a_range_b_dense_c_range => [Range, Dense, Range],
                a_range_b_dense_c_slice => [Range, Dense, Slice],
                a_range_b_range_c_dense => [Range, Range, Dense],
                a_range_b_range_c_range => [Range, Range, Range],
                a_range_b_range_c_slice => [Range, Range, Slice],
                a_range_b_slice_c_dense => [Range, Slice, Dense],
                a_range_b_slice_c_range => [Range, Slice, Range],
                a_range_b_slice_c_slice => [Range, Slice, Slice],
                a_slice_b_dense_c_dense => [Slice, Dense, Dense],
                a_slice_b_dense_c_range => [Slice, Dense, Range],
                a_slice_b_dense_c_slice => [Slice, Dense, Slice],
                a_slice_b_range_c_dense => [Slice, Range, Dense],
                a_slice_b_range_c_range => [Slice, Range, Range],
                a_slice_b_range_c_slice => [Slice, Range, Slice],
                a_slice_b_slice_c_dense => [Slice, Slice, Dense],
                a_slice_b_slice_c_range => [Slice, Slice, Range],
                a_slice_b_slice_c_slice => [Slice, Slice, Slice],
            );

            $crate::__operation_tests!(@combinations $backend_ctor, SQUARE, SQUARE;
                square_all_dense => [Dense, Dense, Dense],
                square_all_range => [Range, Range, Range],
                square_all_slice => [Slice, Slice, Slice],
                square_a_range_b_slice_c_dense => [Range, Slice, Dense],
                square_a_slice_b_dense_c_range => [Slice, Dense, Range],
            );

            #[test]
            fn copy_constructors_from_views() -> $crate::anyhow::Result<()> {
                let backend = ($backend_ctor)();
                suite::copy_constructors(&backend, &config(ROWS, COLS))
            }

            #[test]
            fn initializer_constructors_and_assignment() -> $crate::anyhow::Result<()> {
                let backend = ($backend_ctor)();
                suite::initializer_constructors(&backend, &config(ROWS, ROWS))
            }

            #[test]
            fn norms_of_dense_range_and_slice() -> $crate::anyhow::Result<()> {
                let backend = ($backend_ctor)();
                suite::norms(&backend, &config(ROWS, COLS))
            }
        }
    };
    (@combinations $backend_ctor:expr, $rows:expr, $cols:expr;
        $($name:ident => [$a:ident, $b:ident, $c:ident]),* $(,)?) => {
        $(
            #[test]
            fn $name() -> $crate::anyhow::Result<()> {
                let backend = ($backend_ctor)();
                suite::run_operations(&backend, &config($rows, $cols), [$a, $b, $c])
            }
        )*
    };
}

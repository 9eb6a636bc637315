//! Dense matrices on a pluggable device backend.
//!
//! Arithmetic on [`Matrix`] handles builds [`Expr`] trees lazily. Assigning an expression into
//! a handle lowers the whole tree to one fused elementwise kernel, stages through a temporary
//! when the target is read at locations other elements write, and writes through the handle's
//! range or slice view into the shared buffer.

pub mod backend;
mod env;
pub mod error;
pub mod eval;
pub mod expr;
pub mod linalg;
pub mod matrix;

pub use backend::spec::{DType, DeviceBackend, StorageOrder};
pub use error::{MatrixError, Result};
pub use eval::{EvalConfig, Evaluator, StagingPolicy};
pub use expr::Expr;
pub use matrix::{
    copy_to_device, copy_to_host, DeviceScalar, Matrix, MatrixKind, Range, ScalarOperand, Slice,
};

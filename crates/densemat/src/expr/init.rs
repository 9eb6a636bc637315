//! Initializer pseudo-matrices: shape plus a fill rule, realised only when assigned.

use super::node::Expr;
use crate::backend::spec::DeviceBackend;
use crate::matrix::ScalarOperand;

/// `rows x cols` of zeros.
pub fn zero<B: DeviceBackend + 'static>(rows: usize, cols: usize) -> Expr<B> {
    Expr::fill(rows, cols, ScalarOperand::Host(0.0))
}

/// `rows x cols` filled with `value`, which may live on the device.
pub fn scalar_fill<B: DeviceBackend + 'static>(
    rows: usize,
    cols: usize,
    value: impl Into<ScalarOperand<B>>,
) -> Expr<B> {
    Expr::fill(rows, cols, value.into())
}

/// `n x n` identity.
pub fn identity<B: DeviceBackend + 'static>(n: usize) -> Expr<B> {
    Expr::identity(n)
}

//! Matrix norms reduced on the device.

use std::sync::Arc;

use crate::backend::spec::{DType, DeviceBackend, Kernel, ReduceKind};
use crate::error::Result;
use crate::expr::Expr;
use crate::matrix::{DeviceScalar, Matrix};

/// Reduces the elements addressed by `matrix` into a fresh device scalar.
pub fn reduce<B: DeviceBackend + 'static>(
    matrix: &Matrix<B>,
    kind: ReduceKind,
) -> Result<DeviceScalar<B>> {
    let output = DeviceScalar::zeroed(Arc::clone(matrix.backend()), matrix.dtype())?;
    let kernel = Kernel::Reduce {
        kind,
        source: matrix.region(),
        output: output.buffer_id(),
    };
    tracing::debug!(kind = ?kind, shape = ?matrix.shape(), matrix_kind = ?matrix.kind(), "reducing");
    matrix.backend().execute(&kernel)?;
    Ok(output)
}

/// `sqrt(sum(x_ij^2))`
pub fn norm_frobenius<B: DeviceBackend + 'static>(matrix: &Matrix<B>) -> Result<DeviceScalar<B>> {
    reduce(matrix, ReduceKind::Frobenius)
}

/// Largest absolute column sum.
pub fn norm_1<B: DeviceBackend + 'static>(matrix: &Matrix<B>) -> Result<DeviceScalar<B>> {
    reduce(matrix, ReduceKind::MaxColumnAbsSum)
}

/// Largest absolute row sum.
pub fn norm_inf<B: DeviceBackend + 'static>(matrix: &Matrix<B>) -> Result<DeviceScalar<B>> {
    reduce(matrix, ReduceKind::MaxRowAbsSum)
}

/// Norm of an expression, evaluated into a temporary first.
pub fn norm_of_expr<B: DeviceBackend + 'static>(
    backend: &Arc<B>,
    dtype: DType,
    expr: impl Into<Expr<B>>,
    kind: ReduceKind,
) -> Result<DeviceScalar<B>> {
    let temporary = Matrix::from_expr(Arc::clone(backend), dtype, expr)?;
    reduce(&temporary, kind)
}

impl<B: DeviceBackend + 'static> Matrix<B> {
    /// Host value of [`norm_frobenius`].
    pub fn norm_frobenius(&self) -> Result<f64> {
        norm_frobenius(self)?.to_host()
    }

    /// Host value of [`norm_1`].
    pub fn norm_1(&self) -> Result<f64> {
        norm_1(self)?.to_host()
    }

    /// Host value of [`norm_inf`].
    pub fn norm_inf(&self) -> Result<f64> {
        norm_inf(self)?.to_host()
    }
}

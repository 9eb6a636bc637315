//! Host transfer between nested row vectors and matrix handles.

use std::sync::Arc;

use super::element::Element;
use super::handle::Matrix;
use crate::backend::spec::DeviceBackend;
use crate::error::{MatrixError, Result};

/// Shape of a nested host matrix, rejecting ragged rows.
pub fn host_shape<T>(rows: &[Vec<T>]) -> Result<(usize, usize)> {
    let cols = rows.first().map_or(0, Vec::len);
    for (row, values) in rows.iter().enumerate() {
        if values.len() != cols {
            return Err(MatrixError::RaggedHostRows {
                row,
                expected: cols,
                found: values.len(),
            });
        }
    }
    Ok((rows.len(), cols))
}

/// Writes `host` into the elements addressed by `target`.
///
/// Only the addressed elements change; for a range or slice the rest of the underlying
/// buffer is untouched.
pub fn copy_to_device<B, T>(host: &[Vec<T>], target: &mut Matrix<B>) -> Result<()>
where
    B: DeviceBackend + 'static,
    T: Element,
{
    let shape = host_shape(host)?;
    if shape != target.shape() {
        return Err(MatrixError::ShapeMismatch {
            op: "copy_to_device",
            lhs: target.shape(),
            rhs: shape,
        });
    }
    let values: Vec<f64> = host
        .iter()
        .flat_map(|row| row.iter().map(|v| v.to_f64()))
        .collect();
    target.backend().write_region(&target.region(), &values)?;
    Ok(())
}

/// Reads the elements addressed by `source` in row-major logical order.
pub fn copy_to_host<B, T>(source: &Matrix<B>) -> Result<Vec<Vec<T>>>
where
    B: DeviceBackend + 'static,
    T: Element,
{
    let (rows, cols) = source.shape();
    let values = source.backend().read_region(&source.region())?;
    if values.len() != rows * cols {
        return Err(MatrixError::ShapeMismatch {
            op: "copy_to_host",
            lhs: (rows, cols),
            rhs: (values.len(), 1),
        });
    }
    if cols == 0 {
        return Ok(vec![Vec::new(); rows]);
    }
    Ok(values
        .chunks(cols)
        .map(|row| row.iter().map(|v| T::from_f64(*v)).collect())
        .collect())
}

impl<B: DeviceBackend + 'static> Matrix<B> {
    /// Allocates a dense matrix shaped like `host` and uploads it.
    pub fn from_host<T: Element>(backend: Arc<B>, host: &[Vec<T>]) -> Result<Self> {
        let (rows, cols) = host_shape(host)?;
        let mut matrix = Matrix::zeros(backend, T::DTYPE, rows, cols)?;
        copy_to_device(host, &mut matrix)?;
        Ok(matrix)
    }

    pub fn to_host<T: Element>(&self) -> Result<Vec<Vec<T>>> {
        copy_to_host(self)
    }
}

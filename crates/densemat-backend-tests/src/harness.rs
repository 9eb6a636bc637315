//! Epsilon comparison between reference values and device results.

use anyhow::{bail, ensure, Result};
use densemat::backend::spec::{DType, DeviceBackend};
use densemat::Matrix;

use crate::oracle::{self, HostMatrix};

/// Default tolerance for a dtype.
pub fn epsilon_for(dtype: DType) -> f64 {
    match dtype {
        DType::F32 => 1e-3,
        DType::F64 => 1e-11,
    }
}

/// `|reference - actual| / max(|reference|, |actual|)`, zero for exact matches and for two
/// NaNs.
pub fn relative_error(reference: f64, actual: f64) -> f64 {
    if reference == actual || (reference.is_nan() && actual.is_nan()) {
        return 0.0;
    }
    (reference - actual).abs() / reference.abs().max(actual.abs())
}

/// Reads `actual` back and fails on the first element whose relative error exceeds
/// `epsilon`, reporting its position and both values.
pub fn check_for_equality<B: DeviceBackend + 'static>(
    reference: &HostMatrix,
    actual: &Matrix<B>,
    epsilon: f64,
) -> Result<()> {
    let host: HostMatrix = actual.to_host()?;
    ensure!(
        oracle::shape(reference) == actual.shape(),
        "shape mismatch: reference {:?} vs device {:?}",
        oracle::shape(reference),
        actual.shape()
    );
    for (i, (expected_row, actual_row)) in reference.iter().zip(&host).enumerate() {
        for (j, (&expected, &value)) in expected_row.iter().zip(actual_row).enumerate() {
            let error = relative_error(expected, value);
            if error.is_nan() || error > epsilon {
                bail!(
                    "mismatch at ({i}, {j}): reference {expected} vs device {value} (relative error {error:e})"
                );
            }
        }
    }
    Ok(())
}

pub fn check_scalar(what: &str, reference: f64, actual: f64, epsilon: f64) -> Result<()> {
    let error = relative_error(reference, actual);
    ensure!(
        !error.is_nan() && error <= epsilon,
        "{what}: reference {reference} vs device {actual} (relative error {error:e})"
    );
    Ok(())
}

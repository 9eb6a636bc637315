use std::sync::Arc;

use anyhow::Result;
use densemat::backend::spec::{
    BackendError, BackendResult, BufferId, BufferSpec, DeviceBackend, Kernel, Region,
};
use densemat::{
    copy_to_device, copy_to_host, DType, DeviceScalar, Matrix, MatrixError, Range, Slice,
};
use densemat_backend_ref_cpu::CpuBackend;

#[test]
fn round_trip_through_views_preserves_the_parent() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let parent = Matrix::zeros(Arc::clone(&backend), DType::F64, 6, 7)?;
    let mut window = parent.range(Range::new(1, 4), Range::new(2, 6))?;
    let mut strided = parent.slice(Slice::new(0, 5, 2), Slice::new(0, 3, 3))?;

    let block: Vec<Vec<f64>> = (0..3)
        .map(|i| (0..4).map(|j| (i * 4 + j) as f64 + 1.0).collect())
        .collect();
    copy_to_device(&block, &mut window)?;
    let corners = vec![vec![-1.0, -2.0, -3.0], vec![-4.0, -5.0, -6.0]];
    copy_to_device(&corners, &mut strided)?;

    assert_eq!(copy_to_host::<_, f64>(&window)?, block);
    assert_eq!(copy_to_host::<_, f64>(&strided)?, corners);

    let full: Vec<Vec<f64>> = parent.to_host()?;
    let mut expected = vec![vec![0.0; 7]; 6];
    for (i, row) in block.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            expected[1 + i][2 + j] = value;
        }
    }
    for (i, row) in corners.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            expected[5 * i][3 * j] = value;
        }
    }
    assert_eq!(full, expected);
    Ok(())
}

#[test]
fn ragged_and_misshaped_hosts_are_rejected() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let ragged = vec![vec![1.0, 2.0], vec![3.0]];
    assert!(matches!(
        Matrix::from_host(Arc::clone(&backend), &ragged),
        Err(MatrixError::RaggedHostRows {
            row: 1,
            expected: 2,
            found: 1
        })
    ));

    let mut target = Matrix::zeros(Arc::clone(&backend), DType::F64, 2, 2)?;
    let wide = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
    assert!(matches!(
        copy_to_device(&wide, &mut target),
        Err(MatrixError::ShapeMismatch {
            op: "copy_to_device",
            lhs: (2, 2),
            rhs: (2, 3)
        })
    ));
    assert_eq!(target.to_host::<f64>()?, vec![vec![0.0; 2]; 2]);
    Ok(())
}

#[test]
fn single_precision_host_data_creates_f32_buffers() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let host = vec![vec![0.1f32, 0.2], vec![0.3, 0.4]];
    let matrix = Matrix::from_host(Arc::clone(&backend), &host)?;
    assert_eq!(matrix.dtype(), DType::F32);
    assert_eq!(matrix.to_host::<f32>()?, host);

    // Widening on the way out keeps the stored single-precision value.
    assert_eq!(matrix.to_host::<f64>()?[0][0], 0.1f32 as f64);
    Ok(())
}

#[test]
fn empty_matrices_transfer_cleanly() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let matrix = Matrix::zeros(Arc::clone(&backend), DType::F64, 3, 0)?;
    assert_eq!(matrix.to_host::<f64>()?, vec![Vec::<f64>::new(); 3]);
    Ok(())
}

/// Answers every read with no values.
struct EmptyReads(CpuBackend);

impl DeviceBackend for EmptyReads {
    fn backend_name(&self) -> &str {
        "empty-reads"
    }

    fn allocate(&self, spec: &BufferSpec) -> BackendResult<BufferId> {
        self.0.allocate(spec)
    }

    fn release(&self, buffer: BufferId) -> BackendResult<()> {
        self.0.release(buffer)
    }

    fn write_region(&self, region: &Region, values: &[f64]) -> BackendResult<()> {
        self.0.write_region(region, values)
    }

    fn read_region(&self, _region: &Region) -> BackendResult<Vec<f64>> {
        Ok(Vec::new())
    }

    fn execute(&self, kernel: &Kernel) -> BackendResult<()> {
        self.0.execute(kernel)
    }
}

#[test]
fn short_backend_reads_are_errors() -> Result<()> {
    let backend = Arc::new(EmptyReads(CpuBackend::new()));
    let matrix = Matrix::zeros(Arc::clone(&backend), DType::F64, 2, 2)?;
    assert!(matches!(
        matrix.get(1, 1),
        Err(MatrixError::DeviceExecutionFailed(BackendError::Execution { .. }))
    ));

    let scalar = DeviceScalar::new(Arc::clone(&backend), DType::F64, 1.5)?;
    assert!(matches!(
        scalar.to_host(),
        Err(MatrixError::DeviceExecutionFailed(BackendError::Execution { .. }))
    ));

    assert!(matches!(
        matrix.to_host::<f64>(),
        Err(MatrixError::ShapeMismatch {
            op: "copy_to_host",
            ..
        })
    ));
    Ok(())
}

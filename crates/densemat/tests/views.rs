use std::sync::Arc;

use anyhow::Result;
use densemat::error::{Axis, BoundsViolation};
use densemat::matrix::AxisView;
use densemat::{DType, Matrix, MatrixError, MatrixKind, Slice, StorageOrder};
use densemat_backend_ref_cpu::CpuBackend;
use proptest::prelude::*;

fn numbered(backend: &Arc<CpuBackend>, rows: usize, cols: usize) -> Result<Matrix<CpuBackend>> {
    let host: Vec<Vec<f64>> = (0..rows)
        .map(|i| (0..cols).map(|j| (i * cols + j) as f64).collect())
        .collect();
    Ok(Matrix::from_host(Arc::clone(backend), &host)?)
}

#[test]
fn nested_views_compose_onto_the_root() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let root = numbered(&backend, 8, 10)?;
    let range = root.range(2..6, 1..9)?;
    assert_eq!(range.kind(), MatrixKind::Range);
    assert_eq!(range.shape(), (4, 8));

    let slice = range.slice(Slice::new(1, 2, 2), Slice::new(0, 3, 3))?;
    assert_eq!(slice.kind(), MatrixKind::Slice);
    assert_eq!(
        slice.view().rows,
        AxisView {
            start: 3,
            stride: 2,
            count: 2
        }
    );
    assert_eq!(
        slice.view().cols,
        AxisView {
            start: 1,
            stride: 3,
            count: 3
        }
    );
    for i in 0..2 {
        for j in 0..3 {
            assert_eq!(slice.get(i, j)?, ((3 + 2 * i) * 10 + 1 + 3 * j) as f64);
        }
    }

    let range_of_slice = slice.range(0..1, 1..3)?;
    assert_eq!(range_of_slice.kind(), MatrixKind::Slice);
    assert_eq!(range_of_slice.get(0, 1)?, (3 * 10 + 7) as f64);
    assert!(range_of_slice.shares_buffer(&root));
    assert!(!range_of_slice.owns_storage());
    Ok(())
}

#[test]
fn views_past_the_parent_are_rejected() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let root = Matrix::zeros(Arc::clone(&backend), DType::F64, 4, 4)?;

    let err = root.range(0..5, 0..4).expect_err("rows past the end");
    assert!(matches!(
        err,
        MatrixError::OutOfBounds {
            axis: Axis::Row,
            violation: BoundsViolation::ExceedsExtent,
            ..
        }
    ));

    let err = root
        .range(0..4, densemat::Range::new(3, 2))
        .expect_err("reversed range");
    assert!(matches!(
        err,
        MatrixError::OutOfBounds {
            axis: Axis::Col,
            violation: BoundsViolation::NegativeCount,
            ..
        }
    ));

    let err = root
        .slice(Slice::new(0, 0, 2), Slice::new(0, 1, 4))
        .expect_err("zero stride");
    assert!(matches!(
        err,
        MatrixError::OutOfBounds {
            violation: BoundsViolation::ZeroStride,
            ..
        }
    ));

    root.slice(Slice::new(1, 2, 2), Slice::new(0, 1, 4))?;
    let err = root
        .slice(Slice::new(1, 2, 3), Slice::new(0, 1, 4))
        .expect_err("last strided index is 5");
    assert!(matches!(
        err,
        MatrixError::OutOfBounds {
            start: 1,
            stride: 2,
            count: 3,
            extent: 4,
            ..
        }
    ));

    // Bounds are checked against the immediate parent, not the root.
    let inner = root.range(1..3, 1..3)?;
    assert!(inner.range(0..3, 0..2).is_err());

    let empty = root.range(4..4, 0..4)?;
    assert_eq!(empty.shape(), (0, 4));
    Ok(())
}

#[test]
fn element_access_is_bounds_checked() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let mut root = Matrix::zeros(Arc::clone(&backend), DType::F32, 3, 2)?;
    root.set(2, 1, 0.5)?;
    assert_eq!(root.get(2, 1)?, 0.5);
    assert!(matches!(
        root.get(3, 0),
        Err(MatrixError::IndexOutOfBounds {
            row: 3,
            col: 0,
            rows: 3,
            cols: 2
        })
    ));
    assert!(root.set(0, 2, 1.0).is_err());
    Ok(())
}

#[test]
fn writes_through_a_view_touch_only_addressed_elements() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let root = numbered(&backend, 6, 6)?;
    let mut view = root.slice(Slice::new(1, 2, 3), Slice::new(0, 5, 2))?;
    view.assign(densemat::expr::scalar_fill(3, 2, -1.0))?;

    let host: Vec<Vec<f64>> = root.to_host()?;
    for (i, row) in host.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            let addressed = i % 2 == 1 && (j == 0 || j == 5);
            let expected = if addressed { -1.0 } else { (i * 6 + j) as f64 };
            assert_eq!(value, expected, "({i}, {j})");
        }
    }
    Ok(())
}

#[test]
fn column_major_storage_addresses_the_same_elements() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let mut root = Matrix::with_order(Arc::clone(&backend), DType::F64, 5, 4, StorageOrder::ColMajor)?;
    let host: Vec<Vec<f64>> = (0..5)
        .map(|i| (0..4).map(|j| (10 * i + j) as f64).collect())
        .collect();
    densemat::copy_to_device(&host, &mut root)?;
    assert_eq!(root.offset(2, 3), 3 * 5 + 2);

    let view = root.slice(Slice::new(0, 2, 3), Slice::new(1, 2, 2))?;
    let copied: Vec<Vec<f64>> = view.to_host()?;
    assert_eq!(copied, vec![vec![1.0, 3.0], vec![21.0, 23.0], vec![41.0, 43.0]]);
    Ok(())
}

proptest! {
    #[test]
    fn slice_elements_follow_the_affine_map(
        rows in 1usize..12,
        cols in 1usize..12,
        row_start in 0usize..12,
        row_stride in 1usize..4,
        row_count in 0usize..6,
        col_start in 0usize..12,
        col_stride in 1usize..4,
        col_count in 0usize..6,
    ) {
        let backend = Arc::new(CpuBackend::new());
        let root = numbered(&backend, rows, cols).expect("root");
        let fits = |start: usize, stride: usize, count: usize, extent: usize| {
            if count == 0 { start <= extent } else { start + (count - 1) * stride < extent }
        };
        let result = root.slice(
            Slice::new(row_start, row_stride, row_count),
            Slice::new(col_start, col_stride, col_count),
        );
        let expected_ok = fits(row_start, row_stride, row_count, rows)
            && fits(col_start, col_stride, col_count, cols);
        prop_assert_eq!(result.is_ok(), expected_ok);
        if let Ok(view) = result {
            prop_assert_eq!(view.shape(), (row_count, col_count));
            let host: Vec<Vec<f64>> = view.to_host().expect("read back");
            for (i, row) in host.iter().enumerate() {
                for (j, &value) in row.iter().enumerate() {
                    let root_i = row_start + i * row_stride;
                    let root_j = col_start + j * col_stride;
                    prop_assert_eq!(value, (root_i * cols + root_j) as f64);
                }
            }
        }
    }
}

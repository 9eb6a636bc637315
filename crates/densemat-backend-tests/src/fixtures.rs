//! Operand construction for the dense, range and slice variants of the suite.

use std::sync::Arc;

use anyhow::{ensure, Result};
use densemat::backend::spec::{DType, DeviceBackend, StorageOrder};
use densemat::matrix::AxisView;
use densemat::{copy_to_device, Matrix, MatrixKind, Range, Slice};
use rand::Rng;

use crate::oracle::{self, HostMatrix};

/// Which of the three suite operands a matrix plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    A,
    B,
    C,
}

/// Starting contents of each operand.
pub fn initial_values(role: Role, rows: usize, cols: usize) -> HostMatrix {
    oracle::from_fn(rows, cols, |i, j| {
        let (i, j) = (i as f64, j as f64);
        match role {
            Role::A => (i + 2.0) + (j + 1.0) * (i + 2.0),
            Role::B => (j + 2.0) + (j + 1.0) * (j + 2.0),
            Role::C => (i + 1.0) + (i + 1.0) * (i + 2.0),
        }
    })
}

/// Contents of the large parent buffers views are carved from: `i * cols + j`.
pub fn background(rows: usize, cols: usize) -> HostMatrix {
    oracle::from_fn(rows, cols, |i, j| (i * cols + j) as f64)
}

pub fn random_host(rng: &mut impl Rng, rows: usize, cols: usize) -> HostMatrix {
    oracle::from_fn(rows, cols, |_, _| rng.gen_range(-1.0..1.0))
}

fn ranges(role: Role, rows: usize, cols: usize) -> (Range, Range) {
    match role {
        Role::A => (Range::new(2 * rows, 3 * rows), Range::new(cols, 2 * cols)),
        Role::B => (Range::new(rows, 2 * rows), Range::new(2 * cols, 3 * cols)),
        Role::C => (Range::new(2 * rows, 3 * rows), Range::new(3 * cols, 4 * cols)),
    }
}

fn slices(role: Role, rows: usize, cols: usize) -> (Slice, Slice) {
    match role {
        Role::A => (Slice::new(2, 3, rows), Slice::new(2 * cols, 2, cols)),
        Role::B => (Slice::new(2 * rows, 2, rows), Slice::new(cols, 3, cols)),
        Role::C => (Slice::new(rows, 2, rows), Slice::new(0, 3, cols)),
    }
}

/// A suite operand plus, for views, the `4*rows x 4*cols` parent it addresses.
pub struct Placed<B: DeviceBackend + 'static> {
    pub matrix: Matrix<B>,
    pub parent: Option<Matrix<B>>,
}

impl<B: DeviceBackend + 'static> Placed<B> {
    /// Builds the operand for `role` as a `kind` handle holding [`initial_values`]. Views
    /// share the storage order of their parent.
    pub fn new(
        backend: &Arc<B>,
        dtype: DType,
        order: StorageOrder,
        role: Role,
        kind: MatrixKind,
        (rows, cols): (usize, usize),
    ) -> Result<Self> {
        let allocate =
            |rows, cols| Matrix::with_order(Arc::clone(backend), dtype, rows, cols, order);
        let (mut matrix, parent) = match kind {
            MatrixKind::Dense => (allocate(rows, cols)?, None),
            MatrixKind::Range | MatrixKind::Slice => {
                let mut parent = allocate(4 * rows, 4 * cols)?;
                copy_to_device(&background(4 * rows, 4 * cols), &mut parent)?;
                let view = if kind == MatrixKind::Range {
                    let (r, c) = ranges(role, rows, cols);
                    parent.range(r, c)?
                } else {
                    let (r, c) = slices(role, rows, cols);
                    parent.slice(r, c)?
                };
                (view, Some(parent))
            }
        };
        copy_to_device(&initial_values(role, rows, cols), &mut matrix)?;
        Ok(Placed { matrix, parent })
    }

    /// Verifies that parent elements outside the view still hold [`background`].
    pub fn check_surroundings(&self) -> Result<()> {
        let Some(parent) = &self.parent else {
            return Ok(());
        };
        let (rows, cols) = parent.shape();
        let expected = background(rows, cols);
        let host: HostMatrix = parent.to_host()?;
        let view = self.matrix.view();
        for i in 0..rows {
            for j in 0..cols {
                if addressed(&view.rows, i) && addressed(&view.cols, j) {
                    continue;
                }
                ensure!(
                    host[i][j] == expected[i][j],
                    "write leaked outside the {} view at parent ({i}, {j}): {} instead of {}",
                    self.matrix.kind().name(),
                    host[i][j],
                    expected[i][j]
                );
            }
        }
        Ok(())
    }
}

fn addressed(axis: &AxisView, index: usize) -> bool {
    index >= axis.start
        && (index - axis.start) % axis.stride == 0
        && (index - axis.start) / axis.stride < axis.count
}

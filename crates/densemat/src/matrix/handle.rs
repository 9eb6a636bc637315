//! Matrix handles: dense owners and range/slice views over shared storage.

use std::fmt;
use std::sync::Arc;

use super::buffer::{read_single, Buffer};
use super::scalar::ScalarOperand;
use super::view::{Range, Slice, View};
use crate::backend::spec::{
    Access, AssignMode, BufferSpec, DType, DeviceBackend, FusedProgram, Kernel, Operand, Region,
    StorageOrder,
};
use crate::error::{MatrixError, Result};
use crate::eval::Evaluator;
use crate::expr::Expr;

/// How a handle addresses its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixKind {
    Dense,
    Range,
    Slice,
}

impl MatrixKind {
    pub fn name(self) -> &'static str {
        match self {
            MatrixKind::Dense => "dense",
            MatrixKind::Range => "range",
            MatrixKind::Slice => "slice",
        }
    }
}

/// A logical matrix over a device buffer.
///
/// Dense handles own a whole buffer; range and slice handles address a window of another
/// handle's buffer and keep it alive. Writes through any handle are visible through every
/// other handle over the same buffer. Handles are not `Clone`: sharing goes through `range`
/// and `slice`, copying through `to_dense`.
pub struct Matrix<B: DeviceBackend + 'static> {
    buffer: Arc<Buffer<B>>,
    view: View,
    kind: MatrixKind,
}

impl<B: DeviceBackend + 'static> Matrix<B> {
    /// Allocates a zero-filled row-major matrix.
    pub fn zeros(backend: Arc<B>, dtype: DType, rows: usize, cols: usize) -> Result<Self> {
        Self::with_order(backend, dtype, rows, cols, StorageOrder::RowMajor)
    }

    pub fn with_order(
        backend: Arc<B>,
        dtype: DType,
        rows: usize,
        cols: usize,
        order: StorageOrder,
    ) -> Result<Self> {
        let spec = BufferSpec::new(dtype, rows, cols, order);
        Ok(Matrix {
            buffer: Buffer::allocate(backend, spec)?,
            view: View::full(rows, cols),
            kind: MatrixKind::Dense,
        })
    }

    /// Creates a dense matrix and evaluates `expr` into it.
    pub fn from_expr(backend: Arc<B>, dtype: DType, expr: impl Into<Expr<B>>) -> Result<Self> {
        let expr = expr.into();
        let (rows, cols) = expr.shape();
        let mut matrix = Self::zeros(backend, dtype, rows, cols)?;
        matrix.assign(expr)?;
        Ok(matrix)
    }

    /// Deep copy of the addressed elements into a fresh dense buffer.
    pub fn to_dense(&self) -> Result<Self> {
        let mut copy = Self::with_order(
            Arc::clone(self.backend()),
            self.dtype(),
            self.size1(),
            self.size2(),
            self.storage_order(),
        )?;
        copy.assign(self)?;
        Ok(copy)
    }

    /// Unit-stride window sharing this handle's buffer.
    pub fn range(&self, rows: impl Into<Range>, cols: impl Into<Range>) -> Result<Self> {
        let view = self.view.range(rows.into(), cols.into())?;
        let kind = match self.kind {
            MatrixKind::Slice => MatrixKind::Slice,
            _ => MatrixKind::Range,
        };
        Ok(self.with_view(view, kind))
    }

    /// Strided window sharing this handle's buffer.
    pub fn slice(&self, rows: Slice, cols: Slice) -> Result<Self> {
        let view = self.view.slice(rows, cols)?;
        Ok(self.with_view(view, MatrixKind::Slice))
    }

    fn with_view(&self, view: View, kind: MatrixKind) -> Self {
        Matrix {
            buffer: Arc::clone(&self.buffer),
            view,
            kind,
        }
    }

    /// Another handle with identical addressing, used for expression leaves.
    pub(crate) fn share(&self) -> Self {
        self.with_view(self.view, self.kind)
    }

    pub fn size1(&self) -> usize {
        self.view.rows.count
    }

    pub fn size2(&self) -> usize {
        self.view.cols.count
    }

    pub fn shape(&self) -> (usize, usize) {
        self.view.shape()
    }

    pub fn dtype(&self) -> DType {
        self.buffer.spec().dtype
    }

    pub fn storage_order(&self) -> StorageOrder {
        self.buffer.spec().order
    }

    pub fn kind(&self) -> MatrixKind {
        self.kind
    }

    /// `true` only for dense handles, which own the whole buffer.
    pub fn owns_storage(&self) -> bool {
        self.kind == MatrixKind::Dense && self.view.is_full(self.buffer.spec())
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn backend(&self) -> &Arc<B> {
        self.buffer.backend()
    }

    pub fn buffer_spec(&self) -> &BufferSpec {
        self.buffer.spec()
    }

    pub fn shares_buffer(&self, other: &Matrix<B>) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    /// Physical addressing: `offset(i, j) = base + i * row_step + j * col_step`.
    pub fn access(&self) -> Access {
        self.view.access(self.buffer.id(), self.buffer.spec())
    }

    pub fn region(&self) -> Region {
        Region {
            access: self.access(),
            rows: self.size1(),
            cols: self.size2(),
        }
    }

    pub fn offset(&self, row: usize, col: usize) -> usize {
        self.access().offset(row, col)
    }

    fn element_region(&self, row: usize, col: usize) -> Result<Region> {
        if row >= self.size1() || col >= self.size2() {
            return Err(MatrixError::IndexOutOfBounds {
                row,
                col,
                rows: self.size1(),
                cols: self.size2(),
            });
        }
        Ok(Region {
            access: Access {
                base: self.offset(row, col),
                ..self.access()
            },
            rows: 1,
            cols: 1,
        })
    }

    /// Blocking read of element `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        let region = self.element_region(row, col)?;
        read_single(self.backend().as_ref(), &region)
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let region = self.element_region(row, col)?;
        self.backend().write_region(&region, &[value])?;
        Ok(())
    }

    /// Lazy leaf referring to this handle's current contents.
    pub fn expr(&self) -> Expr<B> {
        Expr::leaf(self)
    }

    /// `self = expr`
    pub fn assign(&mut self, expr: impl Into<Expr<B>>) -> Result<()> {
        let expr = expr.into();
        Evaluator::new().assign(self, &expr, AssignMode::Assign)?;
        Ok(())
    }

    /// `self += expr`
    pub fn try_add_assign(&mut self, expr: impl Into<Expr<B>>) -> Result<()> {
        let expr = expr.into();
        Evaluator::new().assign(self, &expr, AssignMode::AddAssign)?;
        Ok(())
    }

    /// `self -= expr`
    pub fn try_sub_assign(&mut self, expr: impl Into<Expr<B>>) -> Result<()> {
        let expr = expr.into();
        Evaluator::new().assign(self, &expr, AssignMode::SubAssign)?;
        Ok(())
    }

    /// `self *= scalar`, evaluated in place as `self = self * scalar`.
    pub fn try_mul_assign(&mut self, scalar: impl Into<ScalarOperand<B>>) -> Result<()> {
        let expr = self.expr().try_scale(scalar.into())?;
        self.assign(expr)
    }

    /// `self /= scalar`, evaluated in place as `self = self / scalar`.
    pub fn try_div_assign(&mut self, scalar: impl Into<ScalarOperand<B>>) -> Result<()> {
        let expr = self.expr().try_div_scalar(scalar.into())?;
        self.assign(expr)
    }

    /// Reallocates a dense matrix to `rows x cols`.
    ///
    /// With `preserve`, the overlapping top-left block is copied and the rest is zero.
    /// Views taken before the resize keep addressing the old buffer.
    pub fn resize(&mut self, rows: usize, cols: usize, preserve: bool) -> Result<()> {
        if !self.owns_storage() {
            return Err(MatrixError::ViewNotResizable {
                kind: self.kind.name(),
            });
        }
        if self.shape() == (rows, cols) {
            return Ok(());
        }
        let resized = Self::with_order(
            Arc::clone(self.backend()),
            self.dtype(),
            rows,
            cols,
            self.storage_order(),
        )?;
        let keep_rows = rows.min(self.size1());
        let keep_cols = cols.min(self.size2());
        if preserve && keep_rows > 0 && keep_cols > 0 {
            let kernel = Kernel::FusedElementwise {
                target: Region {
                    rows: keep_rows,
                    cols: keep_cols,
                    ..resized.region()
                },
                mode: AssignMode::Assign,
                program: FusedProgram::load(Operand::Region(self.access())),
            };
            self.backend().execute(&kernel)?;
        }
        tracing::debug!(
            from = ?self.shape(),
            to = ?(rows, cols),
            preserve,
            "resized dense matrix"
        );
        *self = resized;
        Ok(())
    }
}

impl<B: DeviceBackend + 'static> fmt::Debug for Matrix<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("kind", &self.kind)
            .field("shape", &self.shape())
            .field("dtype", &self.dtype())
            .field("buffer", &self.buffer.id())
            .field("view", &self.view)
            .finish()
    }
}

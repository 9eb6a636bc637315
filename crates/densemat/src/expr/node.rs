use std::fmt;
use std::sync::Arc;

use crate::backend::spec::{BinaryOp, DType, DeviceBackend, UnaryOp};
use crate::error::{MatrixError, Result};
use crate::matrix::{Matrix, ScalarOperand};

/// Whether a `Scaled` node multiplies or divides its operand by the scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScaleOp {
    Mul,
    Div,
}

pub(crate) enum Node<B: DeviceBackend + 'static> {
    Leaf(Matrix<B>),
    Fill(ScalarOperand<B>),
    Identity,
    Transpose(Expr<B>),
    Unary(UnaryOp, Expr<B>),
    Binary(BinaryOp, Expr<B>, Expr<B>),
    Scaled {
        scalar: ScalarOperand<B>,
        op: ScaleOp,
        operand: Expr<B>,
    },
}

/// Deferred matrix computation.
///
/// Building an expression never touches the device. The tree is immutable and cloning it
/// only bumps a reference count. Leaves hold their buffers alive, so an expression stays
/// valid after the handles it was built from are dropped.
pub struct Expr<B: DeviceBackend + 'static> {
    node: Arc<Node<B>>,
    rows: usize,
    cols: usize,
    dtype: Option<DType>,
    backend: Option<Arc<B>>,
}

impl<B: DeviceBackend + 'static> Clone for Expr<B> {
    fn clone(&self) -> Self {
        Expr {
            node: Arc::clone(&self.node),
            rows: self.rows,
            cols: self.cols,
            dtype: self.dtype,
            backend: self.backend.clone(),
        }
    }
}

fn merge_backend<B: DeviceBackend + 'static>(
    op: &'static str,
    lhs: Option<&Arc<B>>,
    rhs: Option<&Arc<B>>,
) -> Result<Option<Arc<B>>> {
    match (lhs, rhs) {
        (Some(a), Some(b)) if !Arc::ptr_eq(a, b) => Err(MatrixError::BackendMismatch { op }),
        (Some(a), _) | (None, Some(a)) => Ok(Some(Arc::clone(a))),
        (None, None) => Ok(None),
    }
}

fn merge_dtype(op: &'static str, lhs: Option<DType>, rhs: Option<DType>) -> Result<Option<DType>> {
    match (lhs, rhs) {
        (Some(a), Some(b)) if a != b => Err(MatrixError::DTypeMismatch { op, lhs: a, rhs: b }),
        (Some(a), _) | (None, Some(a)) => Ok(Some(a)),
        (None, None) => Ok(None),
    }
}

impl<B: DeviceBackend + 'static> Expr<B> {
    pub(crate) fn leaf(matrix: &Matrix<B>) -> Self {
        Expr {
            rows: matrix.size1(),
            cols: matrix.size2(),
            dtype: Some(matrix.dtype()),
            backend: Some(Arc::clone(matrix.backend())),
            node: Arc::new(Node::Leaf(matrix.share())),
        }
    }

    pub(crate) fn fill(rows: usize, cols: usize, scalar: ScalarOperand<B>) -> Self {
        Expr {
            rows,
            cols,
            dtype: None,
            backend: scalar.backend().cloned(),
            node: Arc::new(Node::Fill(scalar)),
        }
    }

    pub(crate) fn identity(n: usize) -> Self {
        Expr {
            rows: n,
            cols: n,
            dtype: None,
            backend: None,
            node: Arc::new(Node::Identity),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Element type of the matrix leaves, `None` for initializer-only expressions.
    pub fn dtype(&self) -> Option<DType> {
        self.dtype
    }

    /// Backend shared by every device operand, `None` when there is none.
    pub fn backend(&self) -> Option<&Arc<B>> {
        self.backend.as_ref()
    }

    pub(crate) fn node(&self) -> &Node<B> {
        &self.node
    }

    /// Lazy transpose.
    pub fn transpose(&self) -> Self {
        Expr {
            node: Arc::new(Node::Transpose(self.clone())),
            rows: self.cols,
            cols: self.rows,
            dtype: self.dtype,
            backend: self.backend.clone(),
        }
    }

    /// Lazy elementwise unary operation.
    pub fn unary(&self, op: UnaryOp) -> Self {
        Expr {
            node: Arc::new(Node::Unary(op, self.clone())),
            rows: self.rows,
            cols: self.cols,
            dtype: self.dtype,
            backend: self.backend.clone(),
        }
    }

    /// Lazy elementwise binary operation; shapes must agree.
    pub fn try_binary(&self, op: BinaryOp, rhs: &Expr<B>) -> Result<Self> {
        if self.shape() != rhs.shape() {
            return Err(MatrixError::ShapeMismatch {
                op: op.name(),
                lhs: self.shape(),
                rhs: rhs.shape(),
            });
        }
        let dtype = merge_dtype(op.name(), self.dtype, rhs.dtype)?;
        let backend = merge_backend(op.name(), self.backend.as_ref(), rhs.backend.as_ref())?;
        Ok(Expr {
            node: Arc::new(Node::Binary(op, self.clone(), rhs.clone())),
            rows: self.rows,
            cols: self.cols,
            dtype,
            backend,
        })
    }

    fn try_scaled(&self, scalar: ScalarOperand<B>, op: ScaleOp) -> Result<Self> {
        let name = match op {
            ScaleOp::Mul => "scale",
            ScaleOp::Div => "divide",
        };
        let backend = merge_backend(name, self.backend.as_ref(), scalar.backend())?;
        Ok(Expr {
            node: Arc::new(Node::Scaled {
                scalar,
                op,
                operand: self.clone(),
            }),
            rows: self.rows,
            cols: self.cols,
            dtype: self.dtype,
            backend,
        })
    }

    /// `self * scalar`
    pub fn try_scale(&self, scalar: impl Into<ScalarOperand<B>>) -> Result<Self> {
        self.try_scaled(scalar.into(), ScaleOp::Mul)
    }

    /// `self / scalar`
    pub fn try_div_scalar(&self, scalar: impl Into<ScalarOperand<B>>) -> Result<Self> {
        self.try_scaled(scalar.into(), ScaleOp::Div)
    }
}

impl<B: DeviceBackend + 'static> fmt::Debug for Expr<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Node::Leaf(matrix) => write!(
                f,
                "{}({}, {}x{})",
                matrix.kind().name(),
                matrix.access().buffer,
                self.rows,
                self.cols
            ),
            Node::Fill(scalar) => write!(f, "fill({scalar:?}, {}x{})", self.rows, self.cols),
            Node::Identity => write!(f, "identity({})", self.rows),
            Node::Transpose(inner) => write!(f, "trans({inner:?})"),
            Node::Unary(op, inner) => write!(f, "{}({inner:?})", op.name()),
            Node::Binary(op, lhs, rhs) => write!(f, "{}({lhs:?}, {rhs:?})", op.name()),
            Node::Scaled {
                scalar,
                op: ScaleOp::Mul,
                operand,
            } => write!(f, "mul({operand:?}, {scalar:?})"),
            Node::Scaled {
                scalar,
                op: ScaleOp::Div,
                operand,
            } => write!(f, "div({operand:?}, {scalar:?})"),
        }
    }
}

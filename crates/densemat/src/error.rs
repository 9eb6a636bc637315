use std::fmt;

use thiserror::Error;

use crate::backend::spec::{BackendError, DType};

/// Matrix dimension named in addressing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Col,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Row => f.write_str("row"),
            Axis::Col => f.write_str("column"),
        }
    }
}

/// Why a view or element index does not fit its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsViolation {
    /// The last addressed index is past the parent extent.
    ExceedsExtent,
    /// A range whose end precedes its start.
    NegativeCount,
    ZeroStride,
}

impl fmt::Display for BoundsViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundsViolation::ExceedsExtent => f.write_str("exceeds the parent extent"),
            BoundsViolation::NegativeCount => f.write_str("ends before it starts"),
            BoundsViolation::ZeroStride => f.write_str("has a zero stride"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("shape mismatch in `{op}`: {lhs:?} vs {rhs:?}")]
    ShapeMismatch {
        op: &'static str,
        lhs: (usize, usize),
        rhs: (usize, usize),
    },
    #[error(
        "{axis} view (start {start}, stride {stride}, count {count}) {violation} of {extent}"
    )]
    OutOfBounds {
        axis: Axis,
        start: usize,
        stride: usize,
        count: usize,
        extent: usize,
        violation: BoundsViolation,
    },
    #[error("element ({row}, {col}) is outside a {rows}x{cols} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("host row {row} has {found} elements, expected {expected}")]
    RaggedHostRows {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("statement into {rows}x{cols} target needs a staging temporary: {reason}")]
    UnsafeAliasing {
        rows: usize,
        cols: usize,
        reason: String,
    },
    #[error("device execution failed: {0}")]
    DeviceExecutionFailed(#[from] BackendError),
    #[error("allocating a {rows}x{cols} {dtype} buffer failed: {source}")]
    AllocationFailed {
        rows: usize,
        cols: usize,
        dtype: DType,
        #[source]
        source: BackendError,
    },
    #[error("dtype mismatch in `{op}`: {lhs} vs {rhs}")]
    DTypeMismatch {
        op: &'static str,
        lhs: DType,
        rhs: DType,
    },
    #[error("operands of `{op}` live on different backend instances")]
    BackendMismatch { op: &'static str },
    #[error("a {kind} view cannot be resized")]
    ViewNotResizable { kind: &'static str },
}

pub type Result<T, E = MatrixError> = std::result::Result<T, E>;

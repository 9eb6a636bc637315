//! Range and slice addressing over a root buffer.

use crate::backend::spec::{Access, BufferId, BufferSpec, StorageOrder};
use crate::error::{Axis, BoundsViolation, MatrixError, Result};

/// Half-open index range `[start, end)` with unit stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        Range { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<std::ops::Range<usize>> for Range {
    fn from(range: std::ops::Range<usize>) -> Self {
        Range::new(range.start, range.end)
    }
}

/// `count` indices starting at `start`, `stride` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slice {
    pub start: usize,
    pub stride: usize,
    pub count: usize,
}

impl Slice {
    pub fn new(start: usize, stride: usize, count: usize) -> Self {
        Slice {
            start,
            stride,
            count,
        }
    }
}

/// Addressing along one dimension, relative to the root buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisView {
    pub start: usize,
    pub stride: usize,
    pub count: usize,
}

impl AxisView {
    pub fn full(extent: usize) -> Self {
        AxisView {
            start: 0,
            stride: 1,
            count: extent,
        }
    }

    fn checked(axis: Axis, start: usize, stride: usize, count: usize, extent: usize) -> Result<Self> {
        let violation = if stride == 0 {
            Some(BoundsViolation::ZeroStride)
        } else if count == 0 {
            (start > extent).then_some(BoundsViolation::ExceedsExtent)
        } else {
            let last = (count - 1)
                .checked_mul(stride)
                .and_then(|span| span.checked_add(start));
            match last {
                Some(last) if last < extent => None,
                _ => Some(BoundsViolation::ExceedsExtent),
            }
        };
        match violation {
            None => Ok(AxisView {
                start,
                stride,
                count,
            }),
            Some(violation) => Err(MatrixError::OutOfBounds {
                axis,
                start,
                stride,
                count,
                extent,
                violation,
            }),
        }
    }

    pub(crate) fn from_range(axis: Axis, range: Range, extent: usize) -> Result<Self> {
        if range.end < range.start {
            return Err(MatrixError::OutOfBounds {
                axis,
                start: range.start,
                stride: 1,
                count: 0,
                extent,
                violation: BoundsViolation::NegativeCount,
            });
        }
        Self::checked(axis, range.start, 1, range.len(), extent)
    }

    pub(crate) fn from_slice(axis: Axis, slice: Slice, extent: usize) -> Result<Self> {
        Self::checked(axis, slice.start, slice.stride, slice.count, extent)
    }

    /// Maps `inner`, expressed relative to `self`, back onto the root.
    pub fn compose(self, inner: AxisView) -> AxisView {
        AxisView {
            start: self.start + inner.start * self.stride,
            stride: self.stride * inner.stride,
            count: inner.count,
        }
    }
}

/// Rectangular window over a root buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct View {
    pub rows: AxisView,
    pub cols: AxisView,
}

impl View {
    pub fn full(rows: usize, cols: usize) -> Self {
        View {
            rows: AxisView::full(rows),
            cols: AxisView::full(cols),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.count, self.cols.count)
    }

    pub fn is_full(&self, spec: &BufferSpec) -> bool {
        *self == View::full(spec.rows, spec.cols)
    }

    pub(crate) fn range(&self, rows: Range, cols: Range) -> Result<View> {
        let inner_rows = AxisView::from_range(Axis::Row, rows, self.rows.count)?;
        let inner_cols = AxisView::from_range(Axis::Col, cols, self.cols.count)?;
        Ok(self.compose(inner_rows, inner_cols))
    }

    pub(crate) fn slice(&self, rows: Slice, cols: Slice) -> Result<View> {
        let inner_rows = AxisView::from_slice(Axis::Row, rows, self.rows.count)?;
        let inner_cols = AxisView::from_slice(Axis::Col, cols, self.cols.count)?;
        Ok(self.compose(inner_rows, inner_cols))
    }

    fn compose(&self, rows: AxisView, cols: AxisView) -> View {
        View {
            rows: self.rows.compose(rows),
            cols: self.cols.compose(cols),
        }
    }

    /// Folds the view and the buffer's storage order into one affine access map.
    pub fn access(&self, buffer: BufferId, spec: &BufferSpec) -> Access {
        let (row_pitch, col_pitch) = match spec.order {
            StorageOrder::RowMajor => (spec.cols, 1),
            StorageOrder::ColMajor => (1, spec.rows),
        };
        Access {
            buffer,
            base: self.rows.start * row_pitch + self.cols.start * col_pitch,
            row_step: self.rows.stride * row_pitch,
            col_step: self.cols.stride * col_pitch,
        }
    }
}

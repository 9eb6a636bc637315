//! Classification of source regions against the statement target.

use crate::backend::spec::{Access, Region};

/// How a source region relates to the locations a statement writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AliasKind {
    /// No location is both read and written.
    Disjoint,
    /// Every shared location is read only by the element that writes it.
    Identical,
    /// Some element reads a location written by a different element.
    Overlapping,
}

fn same_map(target: &Access, source: &Access, rows: usize, cols: usize) -> bool {
    target.base == source.base
        && (rows <= 1 || target.row_step == source.row_step)
        && (cols <= 1 || target.col_step == source.col_step)
}

/// One axis of the target's addressing map.
#[derive(Debug, Clone, Copy)]
struct Axis {
    step: usize,
    count: usize,
}

impl Axis {
    fn new(step: usize, count: usize) -> Self {
        // A single-entry axis never advances, so it must not be mistaken for the minor axis.
        let step = if count <= 1 { usize::MAX } else { step };
        Axis { step, count }
    }
}

/// Inverse of a target's addressing map, computed arithmetically.
///
/// Handle targets never interleave their axes: the minor axis spans less than one step of
/// the major axis, so an offset decomposes into at most one `(row, col)`.
#[derive(Debug, Clone, Copy)]
struct Writers {
    base: usize,
    major: Axis,
    minor: Axis,
    rows_major: bool,
}

impl Writers {
    /// `None` when the map interleaves its axes and cannot be inverted this way.
    fn new(target: &Region) -> Option<Self> {
        let rows = Axis::new(target.access.row_step, target.rows);
        let cols = Axis::new(target.access.col_step, target.cols);
        let rows_major = rows.step >= cols.step;
        let (major, minor) = if rows_major { (rows, cols) } else { (cols, rows) };
        let minor_span = minor.step.checked_mul(minor.count.saturating_sub(1))?;
        (minor.step > 0 && minor_span < major.step).then_some(Writers {
            base: target.access.base,
            major,
            minor,
            rows_major,
        })
    }

    /// The target element writing `offset`, if any.
    fn locate(&self, offset: usize) -> Option<(usize, usize)> {
        let delta = offset.checked_sub(self.base)?;
        let (outer, rest) = (delta / self.major.step, delta % self.major.step);
        if outer >= self.major.count || rest % self.minor.step != 0 {
            return None;
        }
        let inner = rest / self.minor.step;
        if inner >= self.minor.count {
            return None;
        }
        Some(if self.rows_major {
            (outer, inner)
        } else {
            (inner, outer)
        })
    }
}

/// Classifies `source`, walked over the target's `rows x cols`, against `target`.
pub fn classify(target: &Region, source: &Access) -> AliasKind {
    if source.buffer != target.access.buffer {
        return AliasKind::Disjoint;
    }
    let (rows, cols) = (target.rows, target.cols);
    let (Some((t_lo, t_hi)), Some((s_lo, s_hi))) = (target.span(), source.span(rows, cols)) else {
        return AliasKind::Disjoint;
    };
    if same_map(&target.access, source, rows, cols) {
        return AliasKind::Identical;
    }
    if s_hi < t_lo || t_hi < s_lo {
        return AliasKind::Disjoint;
    }
    let Some(writers) = Writers::new(target) else {
        return AliasKind::Overlapping;
    };

    let mut shared = false;
    for i in 0..rows {
        for j in 0..cols {
            match writers.locate(source.offset(i, j)) {
                Some(writer) if writer != (i, j) => return AliasKind::Overlapping,
                Some(_) => shared = true,
                None => {}
            }
        }
    }
    if shared {
        AliasKind::Identical
    } else {
        AliasKind::Disjoint
    }
}

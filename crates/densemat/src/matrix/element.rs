//! Host element types that can be transferred into device buffers.

use crate::backend::spec::DType;

/// Numeric element accepted by the host transfer layer.
///
/// Device kernels compute in `f64`; implementations only describe how host values widen into
/// and narrow out of that representation together with the buffer dtype they map to.
pub trait Element: Copy + Default + Send + Sync + PartialEq + std::fmt::Debug + 'static {
    /// Buffer dtype used when a matrix is created from this element type.
    const DTYPE: DType;

    fn to_f64(self) -> f64;

    fn from_f64(value: f64) -> Self;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    fn to_f64(self) -> f64 {
        self
    }

    fn from_f64(value: f64) -> Self {
        value
    }
}

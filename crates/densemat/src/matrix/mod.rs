mod buffer;
pub mod element;
pub mod handle;
pub mod host;
pub mod scalar;
pub mod view;

pub use buffer::Buffer;
pub use element::Element;
pub use handle::{Matrix, MatrixKind};
pub use host::{copy_to_device, copy_to_host, host_shape};
pub use scalar::{DeviceScalar, ScalarOperand};
pub use view::{AxisView, Range, Slice, View};

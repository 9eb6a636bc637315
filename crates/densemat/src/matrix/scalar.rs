use std::fmt;
use std::sync::Arc;

use super::buffer::{read_single, Buffer};
use crate::backend::spec::{
    Access, BufferId, BufferSpec, DType, DeviceBackend, Operand, Region, StorageOrder,
};
use crate::error::Result;

/// A single value resident in device memory.
///
/// Norm reductions produce one of these, and it can be used anywhere a host scalar is
/// accepted without reading it back first.
pub struct DeviceScalar<B: DeviceBackend + 'static> {
    buffer: Arc<Buffer<B>>,
}

impl<B: DeviceBackend + 'static> Clone for DeviceScalar<B> {
    fn clone(&self) -> Self {
        DeviceScalar {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl<B: DeviceBackend + 'static> DeviceScalar<B> {
    pub fn new(backend: Arc<B>, dtype: DType, value: f64) -> Result<Self> {
        let scalar = Self::zeroed(backend, dtype)?;
        scalar.set(value)?;
        Ok(scalar)
    }

    pub(crate) fn zeroed(backend: Arc<B>, dtype: DType) -> Result<Self> {
        let spec = BufferSpec::new(dtype, 1, 1, StorageOrder::RowMajor);
        Ok(DeviceScalar {
            buffer: Buffer::allocate(backend, spec)?,
        })
    }

    /// Blocking read of the value.
    pub fn to_host(&self) -> Result<f64> {
        read_single(self.buffer.backend().as_ref(), &self.region())
    }

    pub fn set(&self, value: f64) -> Result<()> {
        self.buffer
            .backend()
            .write_region(&self.region(), &[value])?;
        Ok(())
    }

    pub fn dtype(&self) -> DType {
        self.buffer.spec().dtype
    }

    pub fn backend(&self) -> &Arc<B> {
        self.buffer.backend()
    }

    pub fn buffer_id(&self) -> BufferId {
        self.buffer.id()
    }

    fn region(&self) -> Region {
        Region {
            access: Access {
                buffer: self.buffer.id(),
                base: 0,
                row_step: 1,
                col_step: 1,
            },
            rows: 1,
            cols: 1,
        }
    }
}

impl<B: DeviceBackend + 'static> fmt::Debug for DeviceScalar<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceScalar").field(&self.buffer).finish()
    }
}

/// Scalar factor of an expression: a host constant or a device-resident value.
pub enum ScalarOperand<B: DeviceBackend + 'static> {
    Host(f64),
    Device(DeviceScalar<B>),
}

impl<B: DeviceBackend + 'static> Clone for ScalarOperand<B> {
    fn clone(&self) -> Self {
        match self {
            ScalarOperand::Host(value) => ScalarOperand::Host(*value),
            ScalarOperand::Device(scalar) => ScalarOperand::Device(scalar.clone()),
        }
    }
}

impl<B: DeviceBackend + 'static> fmt::Debug for ScalarOperand<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarOperand::Host(value) => f.debug_tuple("Host").field(value).finish(),
            ScalarOperand::Device(scalar) => f.debug_tuple("Device").field(scalar).finish(),
        }
    }
}

impl<B: DeviceBackend + 'static> ScalarOperand<B> {
    pub(crate) fn operand(&self) -> Operand {
        match self {
            ScalarOperand::Host(value) => Operand::Scalar(*value),
            ScalarOperand::Device(scalar) => Operand::DeviceScalar(scalar.buffer_id()),
        }
    }

    pub(crate) fn backend(&self) -> Option<&Arc<B>> {
        match self {
            ScalarOperand::Host(_) => None,
            ScalarOperand::Device(scalar) => Some(scalar.backend()),
        }
    }

    /// Reads the value, blocking on the device for device scalars.
    pub fn value(&self) -> Result<f64> {
        match self {
            ScalarOperand::Host(value) => Ok(*value),
            ScalarOperand::Device(scalar) => scalar.to_host(),
        }
    }
}

impl<B: DeviceBackend + 'static> From<f64> for ScalarOperand<B> {
    fn from(value: f64) -> Self {
        ScalarOperand::Host(value)
    }
}

impl<B: DeviceBackend + 'static> From<f32> for ScalarOperand<B> {
    fn from(value: f32) -> Self {
        ScalarOperand::Host(value as f64)
    }
}

impl<B: DeviceBackend + 'static> From<i64> for ScalarOperand<B> {
    fn from(value: i64) -> Self {
        ScalarOperand::Host(value as f64)
    }
}

impl<B: DeviceBackend + 'static> From<i32> for ScalarOperand<B> {
    fn from(value: i32) -> Self {
        ScalarOperand::Host(value as f64)
    }
}

impl<B: DeviceBackend + 'static> From<DeviceScalar<B>> for ScalarOperand<B> {
    fn from(scalar: DeviceScalar<B>) -> Self {
        ScalarOperand::Device(scalar)
    }
}

impl<B: DeviceBackend + 'static> From<&DeviceScalar<B>> for ScalarOperand<B> {
    fn from(scalar: &DeviceScalar<B>) -> Self {
        ScalarOperand::Device(scalar.clone())
    }
}

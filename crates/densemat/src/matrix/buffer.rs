use std::fmt;
use std::sync::Arc;

use crate::backend::spec::{BackendError, BufferId, BufferSpec, DeviceBackend, Region};
use crate::error::{MatrixError, Result};

/// Device storage owned by exactly one `Buffer`, released when the last `Arc` drops.
pub struct Buffer<B: DeviceBackend + 'static> {
    backend: Arc<B>,
    id: BufferId,
    spec: BufferSpec,
}

impl<B: DeviceBackend + 'static> Buffer<B> {
    pub(crate) fn allocate(backend: Arc<B>, spec: BufferSpec) -> Result<Arc<Self>> {
        let failed = |source| MatrixError::AllocationFailed {
            rows: spec.rows,
            cols: spec.cols,
            dtype: spec.dtype,
            source,
        };
        if spec.checked_byte_len().is_none() {
            return Err(failed(BackendError::allocation(
                usize::MAX,
                "buffer size overflows usize",
            )));
        }
        let id = backend.allocate(&spec).map_err(failed)?;
        tracing::trace!(buffer = %id, rows = spec.rows, cols = spec.cols, "allocated buffer");
        Ok(Arc::new(Buffer { backend, id, spec }))
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn spec(&self) -> &BufferSpec {
        &self.spec
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

impl<B: DeviceBackend + 'static> Drop for Buffer<B> {
    fn drop(&mut self) {
        if let Err(err) = self.backend.release(self.id) {
            tracing::warn!(buffer = %self.id, error = %err, "failed to release device buffer");
        }
    }
}

impl<B: DeviceBackend + 'static> fmt::Debug for Buffer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("backend", &self.backend.backend_name())
            .field("id", &self.id)
            .field("spec", &self.spec)
            .finish()
    }
}

/// Blocking read of a single-element region.
pub(crate) fn read_single<B: DeviceBackend + ?Sized>(backend: &B, region: &Region) -> Result<f64> {
    match backend.read_region(region)?.as_slice() {
        [value] => Ok(*value),
        values => Err(BackendError::execution(format!(
            "single-element read returned {} values",
            values.len()
        ))
        .into()),
    }
}

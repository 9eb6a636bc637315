use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use densemat::backend::spec::{BackendResult, BufferId, BufferSpec, DeviceBackend, Kernel, Region};

/// Test-only backend that forwards to `inner` and records every kernel it executes.
pub struct RecordingBackend<B: DeviceBackend> {
    inner: Arc<B>,
    kernels: Mutex<Vec<Kernel>>,
    allocations: AtomicUsize,
    reads: AtomicUsize,
}

impl<B: DeviceBackend> RecordingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self::wrap(Arc::new(inner))
    }

    pub fn wrap(inner: Arc<B>) -> Self {
        RecordingBackend {
            inner,
            kernels: Mutex::new(Vec::new()),
            allocations: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<B> {
        &self.inner
    }

    pub fn kernel_count(&self) -> usize {
        self.kernels.lock().expect("backend mutex poisoned").len()
    }

    pub fn recorded_kernels(&self) -> Vec<Kernel> {
        self.kernels.lock().expect("backend mutex poisoned").clone()
    }

    pub fn last_kernel_or_panic(&self) -> Kernel {
        self.kernels
            .lock()
            .expect("backend mutex poisoned")
            .last()
            .cloned()
            .expect("backend should have recorded a kernel")
    }

    pub fn allocation_count(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.kernels.lock().expect("backend mutex poisoned").clear();
        self.allocations.store(0, Ordering::SeqCst);
        self.reads.store(0, Ordering::SeqCst);
    }
}

impl<B: DeviceBackend> DeviceBackend for RecordingBackend<B> {
    fn backend_name(&self) -> &str {
        "recording"
    }

    fn allocate(&self, spec: &BufferSpec) -> BackendResult<BufferId> {
        self.allocations.fetch_add(1, Ordering::SeqCst);
        self.inner.allocate(spec)
    }

    fn release(&self, buffer: BufferId) -> BackendResult<()> {
        self.inner.release(buffer)
    }

    fn write_region(&self, region: &Region, values: &[f64]) -> BackendResult<()> {
        self.inner.write_region(region, values)
    }

    fn read_region(&self, region: &Region) -> BackendResult<Vec<f64>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_region(region)
    }

    fn execute(&self, kernel: &Kernel) -> BackendResult<()> {
        self.kernels
            .lock()
            .expect("backend mutex poisoned")
            .push(kernel.clone());
        self.inner.execute(kernel)
    }

    fn synchronize(&self) -> BackendResult<()> {
        self.inner.synchronize()
    }
}

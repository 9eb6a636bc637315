use std::collections::{HashMap, TryReserveError};
use std::sync::{Arc, Mutex, MutexGuard};

use densemat::backend::spec::{
    Access, AssignMode, BackendError, BackendResult, BufferId, BufferSpec, DType, DeviceBackend,
    FusedProgram, Kernel, Operand, ReduceKind, Region,
};

/// Host storage of one buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferData {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl BufferData {
    fn zeroed(dtype: DType, len: usize) -> Result<Self, TryReserveError> {
        fn zeros<T: Copy + Default>(len: usize) -> Result<Vec<T>, TryReserveError> {
            let mut values = Vec::new();
            values.try_reserve_exact(len)?;
            values.resize(len, T::default());
            Ok(values)
        }
        Ok(match dtype {
            DType::F32 => BufferData::F32(zeros(len)?),
            DType::F64 => BufferData::F64(zeros(len)?),
        })
    }

    pub fn len(&self) -> usize {
        match self {
            BufferData::F32(values) => values.len(),
            BufferData::F64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, offset: usize) -> f64 {
        match self {
            BufferData::F32(values) => values[offset] as f64,
            BufferData::F64(values) => values[offset],
        }
    }

    fn set(&mut self, offset: usize, value: f64) {
        match self {
            BufferData::F32(values) => values[offset] = value as f32,
            BufferData::F64(values) => values[offset] = value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CpuBuffer {
    pub spec: BufferSpec,
    pub data: BufferData,
}

/// Hook consulted before every kernel. Returning `Some` replaces the built-in execution.
pub trait CpuKernelInterceptor: Send + Sync {
    fn try_execute(&self, kernel: &Kernel) -> Option<BackendResult<()>>;
}

#[derive(Default)]
pub struct NoopInterceptor;

impl CpuKernelInterceptor for NoopInterceptor {
    fn try_execute(&self, _kernel: &Kernel) -> Option<BackendResult<()>> {
        None
    }
}

#[derive(Default)]
struct CpuState {
    next_id: u64,
    buffers: HashMap<BufferId, CpuBuffer>,
    live_bytes: usize,
}

/// Reference backend executing kernels element by element on host memory.
///
/// All work serialises on one lock, so kernels run in submission order and
/// [`DeviceBackend::synchronize`] has nothing to wait for.
pub struct GenericCpuBackend<I: CpuKernelInterceptor> {
    interceptor: Arc<I>,
    state: Mutex<CpuState>,
    memory_limit: Option<usize>,
}

impl<I: CpuKernelInterceptor> GenericCpuBackend<I> {
    pub fn with_interceptor(interceptor: I) -> Self {
        Self::with_arc(Arc::new(interceptor))
    }

    pub fn with_arc(interceptor: Arc<I>) -> Self {
        Self {
            interceptor,
            state: Mutex::new(CpuState::default()),
            memory_limit: None,
        }
    }

    /// Caps the bytes held by live buffers; allocations past the cap fail.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    pub fn interceptor(&self) -> &Arc<I> {
        &self.interceptor
    }

    pub fn live_buffers(&self) -> usize {
        self.lock().map_or(0, |state| state.buffers.len())
    }

    pub fn live_bytes(&self) -> usize {
        self.lock().map_or(0, |state| state.live_bytes)
    }

    /// Copy of a buffer's raw contents in physical order.
    pub fn snapshot(&self, buffer: BufferId) -> BackendResult<CpuBuffer> {
        let state = self.lock()?;
        state
            .buffers
            .get(&buffer)
            .cloned()
            .ok_or(BackendError::UnknownBuffer(buffer))
    }

    fn lock(&self) -> BackendResult<MutexGuard<'_, CpuState>> {
        self.state
            .lock()
            .map_err(|_| BackendError::execution("cpu backend state lock poisoned"))
    }
}

impl GenericCpuBackend<NoopInterceptor> {
    pub fn new() -> Self {
        Self::with_interceptor(NoopInterceptor)
    }
}

impl Default for GenericCpuBackend<NoopInterceptor> {
    fn default() -> Self {
        Self::new()
    }
}

pub type CpuBackend = GenericCpuBackend<NoopInterceptor>;

impl<I: CpuKernelInterceptor> DeviceBackend for GenericCpuBackend<I> {
    fn backend_name(&self) -> &str {
        "cpu"
    }

    fn allocate(&self, spec: &BufferSpec) -> BackendResult<BufferId> {
        let bytes = spec.checked_byte_len().ok_or_else(|| {
            BackendError::allocation(
                usize::MAX,
                format!("{}x{} {} buffer overflows usize", spec.rows, spec.cols, spec.dtype),
            )
        })?;
        let mut state = self.lock()?;
        if let Some(limit) = self.memory_limit {
            if state.live_bytes.checked_add(bytes).map_or(true, |total| total > limit) {
                return Err(BackendError::allocation(
                    bytes,
                    format!(
                        "{} of {limit} bytes already in use",
                        state.live_bytes
                    ),
                ));
            }
        }
        let data = BufferData::zeroed(spec.dtype, spec.element_count())
            .map_err(|err| BackendError::allocation(bytes, err.to_string()))?;
        state.next_id += 1;
        let id = BufferId(state.next_id);
        state.buffers.insert(id, CpuBuffer { spec: *spec, data });
        state.live_bytes += bytes;
        Ok(id)
    }

    fn release(&self, buffer: BufferId) -> BackendResult<()> {
        let mut state = self.lock()?;
        let removed = state
            .buffers
            .remove(&buffer)
            .ok_or(BackendError::UnknownBuffer(buffer))?;
        state.live_bytes -= removed.spec.byte_len();
        Ok(())
    }

    fn write_region(&self, region: &Region, values: &[f64]) -> BackendResult<()> {
        if values.len() != region.element_count() {
            return Err(BackendError::execution(format!(
                "write of {} values into a {}x{} region",
                values.len(),
                region.rows,
                region.cols
            )));
        }
        let mut state = self.lock()?;
        check_region(&state.buffers, region)?;
        let buffer = state
            .buffers
            .get_mut(&region.buffer())
            .ok_or(BackendError::UnknownBuffer(region.buffer()))?;
        for i in 0..region.rows {
            for j in 0..region.cols {
                buffer
                    .data
                    .set(region.access.offset(i, j), values[i * region.cols + j]);
            }
        }
        Ok(())
    }

    fn read_region(&self, region: &Region) -> BackendResult<Vec<f64>> {
        let state = self.lock()?;
        check_region(&state.buffers, region)?;
        let buffer = lookup(&state.buffers, region.buffer())?;
        Ok(read(buffer, region))
    }

    fn execute(&self, kernel: &Kernel) -> BackendResult<()> {
        if let Some(result) = self.interceptor.try_execute(kernel) {
            return result;
        }
        tracing::trace!(kernel = kernel.label(), "cpu execute");
        let mut state = self.lock()?;
        match kernel {
            Kernel::FusedElementwise {
                target,
                mode,
                program,
            } => fused_elementwise(&mut state.buffers, target, *mode, program),
            Kernel::Reduce {
                kind,
                source,
                output,
            } => reduce(&mut state.buffers, *kind, source, *output),
        }
    }
}

fn lookup(buffers: &HashMap<BufferId, CpuBuffer>, id: BufferId) -> BackendResult<&CpuBuffer> {
    buffers.get(&id).ok_or(BackendError::UnknownBuffer(id))
}

fn check_region(buffers: &HashMap<BufferId, CpuBuffer>, region: &Region) -> BackendResult<()> {
    let buffer = lookup(buffers, region.buffer())?;
    if let Some((_, max_offset)) = region.span() {
        if max_offset >= buffer.data.len() {
            return Err(BackendError::RegionOutOfBounds {
                buffer: region.buffer(),
                max_offset,
                len: buffer.data.len(),
            });
        }
    }
    Ok(())
}

fn read(buffer: &CpuBuffer, region: &Region) -> Vec<f64> {
    let mut values = Vec::with_capacity(region.element_count());
    for i in 0..region.rows {
        for j in 0..region.cols {
            values.push(buffer.data.get(region.access.offset(i, j)));
        }
    }
    values
}

enum Resolved<'a> {
    Buffer(&'a CpuBuffer, Access),
    Target(Access),
    Value(f64),
    Identity,
}

fn fused_elementwise(
    buffers: &mut HashMap<BufferId, CpuBuffer>,
    target: &Region,
    mode: AssignMode,
    program: &FusedProgram,
) -> BackendResult<()> {
    let depth = program.validate()?;
    check_region(buffers, target)?;
    let mut values = Vec::with_capacity(program.operands.len());
    for operand in &program.operands {
        values.push(match operand {
            Operand::Region(access) => {
                check_region(
                    buffers,
                    &Region {
                        access: *access,
                        rows: target.rows,
                        cols: target.cols,
                    },
                )?;
                None
            }
            Operand::Scalar(value) => Some(*value),
            Operand::DeviceScalar(id) => {
                let buffer = lookup(buffers, *id)?;
                if buffer.data.is_empty() {
                    return Err(BackendError::execution(format!("device scalar {id} is empty")));
                }
                Some(buffer.data.get(0))
            }
            Operand::Identity => None,
        });
    }

    // The target is taken out of the map so sources can be borrowed while it is written.
    // Reads of the target go through the same storage and observe earlier writes.
    let target_id = target.buffer();
    let mut output = buffers
        .remove(&target_id)
        .ok_or(BackendError::UnknownBuffer(target_id))?;
    let result = run_fused(buffers, &mut output, target, mode, program, &values, depth);
    buffers.insert(target_id, output);
    result
}

fn run_fused(
    sources: &HashMap<BufferId, CpuBuffer>,
    output: &mut CpuBuffer,
    target: &Region,
    mode: AssignMode,
    program: &FusedProgram,
    values: &[Option<f64>],
    depth: usize,
) -> BackendResult<()> {
    let target_id = target.buffer();
    let mut resolved = Vec::with_capacity(program.operands.len());
    for (operand, value) in program.operands.iter().zip(values) {
        resolved.push(match (operand, value) {
            (_, Some(value)) => Resolved::Value(*value),
            (Operand::Region(access), None) if access.buffer == target_id => {
                Resolved::Target(*access)
            }
            (Operand::Region(access), None) => {
                Resolved::Buffer(lookup(sources, access.buffer)?, *access)
            }
            (_, None) => Resolved::Identity,
        });
    }

    let mut stack = Vec::with_capacity(depth);
    for i in 0..target.rows {
        for j in 0..target.cols {
            let value = program.evaluate(&mut stack, |slot| match &resolved[slot] {
                Resolved::Buffer(buffer, access) => buffer.data.get(access.offset(i, j)),
                Resolved::Target(access) => output.data.get(access.offset(i, j)),
                Resolved::Value(value) => *value,
                Resolved::Identity => {
                    if i == j {
                        1.0
                    } else {
                        0.0
                    }
                }
            });
            let offset = target.access.offset(i, j);
            let current = output.data.get(offset);
            output.data.set(offset, mode.combine(current, value));
        }
    }
    Ok(())
}

fn reduce(
    buffers: &mut HashMap<BufferId, CpuBuffer>,
    kind: ReduceKind,
    source: &Region,
    output: BufferId,
) -> BackendResult<()> {
    check_region(buffers, source)?;
    let values = read(lookup(buffers, source.buffer())?, source);
    let result = kind.reduce(&values, source.rows, source.cols);
    let output = buffers
        .get_mut(&output)
        .ok_or(BackendError::UnknownBuffer(output))?;
    if output.data.is_empty() {
        return Err(BackendError::execution("reduce output buffer is empty"));
    }
    output.data.set(0, result);
    Ok(())
}

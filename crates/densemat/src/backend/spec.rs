use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar element types a device buffer can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F64 => 8,
        }
    }

    /// Rounds an `f64` value the way a store into this dtype would.
    pub fn round_trip(self, value: f64) -> f64 {
        match self {
            DType::F32 => value as f32 as f64,
            DType::F64 => value,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => f.write_str("f32"),
            DType::F64 => f.write_str("f64"),
        }
    }
}

/// Physical layout of a buffer's rows and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StorageOrder {
    #[default]
    RowMajor,
    ColMajor,
}

/// Opaque identifier for a backend-owned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BufferId(pub u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf#{}", self.0)
    }
}

/// Allocation request for a dense two-dimensional buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferSpec {
    pub dtype: DType,
    pub rows: usize,
    pub cols: usize,
    pub order: StorageOrder,
}

impl BufferSpec {
    pub fn new(dtype: DType, rows: usize, cols: usize, order: StorageOrder) -> Self {
        BufferSpec {
            dtype,
            rows,
            cols,
            order,
        }
    }

    /// Element count of an allocated buffer. Use [`BufferSpec::checked_byte_len`] before
    /// allocating.
    pub fn element_count(&self) -> usize {
        self.rows * self.cols
    }

    pub fn byte_len(&self) -> usize {
        self.element_count() * self.dtype.size_in_bytes()
    }

    /// Storage size in bytes, `None` when it does not fit in `usize`.
    pub fn checked_byte_len(&self) -> Option<usize> {
        self.rows
            .checked_mul(self.cols)?
            .checked_mul(self.dtype.size_in_bytes())
    }
}

/// Affine addressing of a logical matrix inside one buffer.
///
/// Element `(i, j)` lives at `base + i * row_step + j * col_step`. Views and storage order are
/// folded into the steps, and a transpose is expressed by swapping them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Access {
    pub buffer: BufferId,
    pub base: usize,
    pub row_step: usize,
    pub col_step: usize,
}

impl Access {
    pub fn offset(&self, row: usize, col: usize) -> usize {
        self.base + row * self.row_step + col * self.col_step
    }

    pub fn transposed(self) -> Self {
        Access {
            row_step: self.col_step,
            col_step: self.row_step,
            ..self
        }
    }

    /// Inclusive `(min, max)` offsets touched over a `rows x cols` walk, `None` when empty.
    pub fn span(&self, rows: usize, cols: usize) -> Option<(usize, usize)> {
        if rows == 0 || cols == 0 {
            return None;
        }
        Some((self.base, self.offset(rows - 1, cols - 1)))
    }
}

/// A `rows x cols` window addressed through an [`Access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub access: Access,
    pub rows: usize,
    pub cols: usize,
}

impl Region {
    pub fn buffer(&self) -> BufferId {
        self.access.buffer
    }

    pub fn element_count(&self) -> usize {
        self.rows * self.cols
    }

    pub fn span(&self) -> Option<(usize, usize)> {
        self.access.span(self.rows, self.cols)
    }
}

/// Elementwise unary operations understood by fused kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Abs,
    Acos,
    Asin,
    Atan,
    Cos,
    Cosh,
    Exp,
    Exp2,
    Exp10,
    Floor,
    Ceil,
    Log,
    Log2,
    Log10,
    Sin,
    Sinh,
    Sqrt,
    Rsqrt,
    Tan,
    Tanh,
    Acosh,
    Asinh,
    Atanh,
    Erf,
    Erfc,
    Round,
    Sign,
    Trunc,
}

impl UnaryOp {
    /// Every math function of the elementwise family. `Neg` is excluded since it is an operator.
    pub const FUNCTIONS: [UnaryOp; 28] = [
        UnaryOp::Abs,
        UnaryOp::Acos,
        UnaryOp::Asin,
        UnaryOp::Atan,
        UnaryOp::Cos,
        UnaryOp::Cosh,
        UnaryOp::Exp,
        UnaryOp::Exp2,
        UnaryOp::Exp10,
        UnaryOp::Floor,
        UnaryOp::Ceil,
        UnaryOp::Log,
        UnaryOp::Log2,
        UnaryOp::Log10,
        UnaryOp::Sin,
        UnaryOp::Sinh,
        UnaryOp::Sqrt,
        UnaryOp::Rsqrt,
        UnaryOp::Tan,
        UnaryOp::Tanh,
        UnaryOp::Acosh,
        UnaryOp::Asinh,
        UnaryOp::Atanh,
        UnaryOp::Erf,
        UnaryOp::Erfc,
        UnaryOp::Round,
        UnaryOp::Sign,
        UnaryOp::Trunc,
    ];

    /// Host reference semantics of the operation.
    pub fn apply(self, x: f64) -> f64 {
        match self {
            UnaryOp::Neg => -x,
            UnaryOp::Abs => x.abs(),
            UnaryOp::Acos => x.acos(),
            UnaryOp::Asin => x.asin(),
            UnaryOp::Atan => x.atan(),
            UnaryOp::Cos => x.cos(),
            UnaryOp::Cosh => x.cosh(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Exp2 => x.exp2(),
            UnaryOp::Exp10 => libm::exp10(x),
            UnaryOp::Floor => x.floor(),
            UnaryOp::Ceil => x.ceil(),
            UnaryOp::Log => x.ln(),
            UnaryOp::Log2 => x.log2(),
            UnaryOp::Log10 => x.log10(),
            UnaryOp::Sin => x.sin(),
            UnaryOp::Sinh => x.sinh(),
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Rsqrt => 1.0 / x.sqrt(),
            UnaryOp::Tan => x.tan(),
            UnaryOp::Tanh => x.tanh(),
            UnaryOp::Acosh => x.acosh(),
            UnaryOp::Asinh => x.asinh(),
            UnaryOp::Atanh => x.atanh(),
            UnaryOp::Erf => libm::erf(x),
            UnaryOp::Erfc => libm::erfc(x),
            UnaryOp::Round => x.round(),
            UnaryOp::Sign => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            UnaryOp::Trunc => x.trunc(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Abs => "abs",
            UnaryOp::Acos => "acos",
            UnaryOp::Asin => "asin",
            UnaryOp::Atan => "atan",
            UnaryOp::Cos => "cos",
            UnaryOp::Cosh => "cosh",
            UnaryOp::Exp => "exp",
            UnaryOp::Exp2 => "exp2",
            UnaryOp::Exp10 => "exp10",
            UnaryOp::Floor => "floor",
            UnaryOp::Ceil => "ceil",
            UnaryOp::Log => "log",
            UnaryOp::Log2 => "log2",
            UnaryOp::Log10 => "log10",
            UnaryOp::Sin => "sin",
            UnaryOp::Sinh => "sinh",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Rsqrt => "rsqrt",
            UnaryOp::Tan => "tan",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Acosh => "acosh",
            UnaryOp::Asinh => "asinh",
            UnaryOp::Atanh => "atanh",
            UnaryOp::Erf => "erf",
            UnaryOp::Erfc => "erfc",
            UnaryOp::Round => "round",
            UnaryOp::Sign => "sign",
            UnaryOp::Trunc => "trunc",
        }
    }
}

/// Elementwise binary operations understood by fused kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
            BinaryOp::Pow => lhs.powf(rhs),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Pow => "pow",
        }
    }
}

/// How a kernel result combines with the value already stored in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignMode {
    Assign,
    AddAssign,
    SubAssign,
}

impl AssignMode {
    pub fn combine(self, current: f64, value: f64) -> f64 {
        match self {
            AssignMode::Assign => value,
            AssignMode::AddAssign => current + value,
            AssignMode::SubAssign => current - value,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            AssignMode::Assign => "=",
            AssignMode::AddAssign => "+=",
            AssignMode::SubAssign => "-=",
        }
    }
}

/// Input slot of a fused program.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Reads element `(i, j)` through the access map. Spans the kernel's full `rows x cols`.
    Region(Access),
    /// Host constant broadcast to every element.
    Scalar(f64),
    /// First element of a device buffer, broadcast to every element.
    DeviceScalar(BufferId),
    /// `1` on the diagonal, `0` elsewhere.
    Identity,
}

/// One instruction of a postfix fused program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FusedStep {
    Load(usize),
    Unary(UnaryOp),
    Binary(BinaryOp),
}

/// Postfix stack program evaluated once per target element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusedProgram {
    pub operands: Vec<Operand>,
    pub steps: Vec<FusedStep>,
}

impl FusedProgram {
    /// Program that copies a single operand.
    pub fn load(operand: Operand) -> Self {
        FusedProgram {
            operands: vec![operand],
            steps: vec![FusedStep::Load(0)],
        }
    }

    /// Checks stack discipline and operand indices, returning the maximum stack depth.
    pub fn validate(&self) -> BackendResult<usize> {
        let mut depth = 0usize;
        let mut max_depth = 0usize;
        for (pos, step) in self.steps.iter().enumerate() {
            match step {
                FusedStep::Load(idx) => {
                    if *idx >= self.operands.len() {
                        return Err(BackendError::invalid_kernel(format!(
                            "step {pos} loads operand {idx} but only {} exist",
                            self.operands.len()
                        )));
                    }
                    depth += 1;
                }
                FusedStep::Unary(op) => {
                    if depth < 1 {
                        return Err(BackendError::invalid_kernel(format!(
                            "step {pos} applies {} to an empty stack",
                            op.name()
                        )));
                    }
                }
                FusedStep::Binary(op) => {
                    if depth < 2 {
                        return Err(BackendError::invalid_kernel(format!(
                            "step {pos} applies {} with {depth} value(s) on the stack",
                            op.name()
                        )));
                    }
                    depth -= 1;
                }
            }
            max_depth = max_depth.max(depth);
        }
        if depth != 1 {
            return Err(BackendError::invalid_kernel(format!(
                "program leaves {depth} value(s) on the stack"
            )));
        }
        Ok(max_depth)
    }

    /// Runs the program for one element. `load` resolves operand slots to values.
    ///
    /// `stack` is scratch space reused across elements. The program must have passed
    /// [`FusedProgram::validate`].
    pub fn evaluate(&self, stack: &mut Vec<f64>, mut load: impl FnMut(usize) -> f64) -> f64 {
        stack.clear();
        for step in &self.steps {
            match *step {
                FusedStep::Load(idx) => stack.push(load(idx)),
                FusedStep::Unary(op) => {
                    let value = stack.pop().unwrap_or(f64::NAN);
                    stack.push(op.apply(value));
                }
                FusedStep::Binary(op) => {
                    let rhs = stack.pop().unwrap_or(f64::NAN);
                    let lhs = stack.pop().unwrap_or(f64::NAN);
                    stack.push(op.apply(lhs, rhs));
                }
            }
        }
        stack.pop().unwrap_or(f64::NAN)
    }

    /// Region operands, in slot order.
    pub fn regions(&self) -> impl Iterator<Item = &Access> + '_ {
        self.operands.iter().filter_map(|operand| match operand {
            Operand::Region(access) => Some(access),
            _ => None,
        })
    }
}

/// Reductions from a region to a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReduceKind {
    /// Square root of the sum of squares.
    Frobenius,
    /// Largest column sum of absolute values.
    MaxColumnAbsSum,
    /// Largest row sum of absolute values.
    MaxRowAbsSum,
}

impl ReduceKind {
    /// Host reference semantics over a row-major `rows x cols` slice.
    pub fn reduce(self, values: &[f64], rows: usize, cols: usize) -> f64 {
        match self {
            ReduceKind::Frobenius => values.iter().map(|v| v * v).sum::<f64>().sqrt(),
            ReduceKind::MaxColumnAbsSum => (0..cols)
                .map(|j| (0..rows).map(|i| values[i * cols + j].abs()).sum::<f64>())
                .fold(0.0, f64::max),
            ReduceKind::MaxRowAbsSum => (0..rows)
                .map(|i| values[i * cols..(i + 1) * cols].iter().map(|v| v.abs()).sum::<f64>())
                .fold(0.0, f64::max),
        }
    }
}

/// The fixed vocabulary of device work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Kernel {
    /// Evaluates `program` for every element of `target` and combines per `mode`.
    FusedElementwise {
        target: Region,
        mode: AssignMode,
        program: FusedProgram,
    },
    /// Reduces `source` and stores the result in element 0 of `output`.
    Reduce {
        kind: ReduceKind,
        source: Region,
        output: BufferId,
    },
}

impl Kernel {
    pub fn label(&self) -> &'static str {
        match self {
            Kernel::FusedElementwise { .. } => "fused_elementwise",
            Kernel::Reduce { .. } => "reduce",
        }
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    Execution {
        message: String,
    },
    Allocation {
        requested_bytes: usize,
        message: String,
    },
    Unimplemented {
        op: &'static str,
        reason: String,
    },
    UnknownBuffer(BufferId),
    RegionOutOfBounds {
        buffer: BufferId,
        max_offset: usize,
        len: usize,
    },
    InvalidKernel {
        message: String,
    },
}

impl BackendError {
    pub fn execution(message: impl Into<String>) -> Self {
        BackendError::Execution {
            message: message.into(),
        }
    }

    pub fn allocation(requested_bytes: usize, message: impl Into<String>) -> Self {
        BackendError::Allocation {
            requested_bytes,
            message: message.into(),
        }
    }

    pub fn unimplemented(op: &'static str, reason: impl Into<String>) -> Self {
        BackendError::Unimplemented {
            op,
            reason: reason.into(),
        }
    }

    pub fn invalid_kernel(message: impl Into<String>) -> Self {
        BackendError::InvalidKernel {
            message: message.into(),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Execution { message } => {
                write!(f, "backend execution failure: {message}")
            }
            BackendError::Allocation {
                requested_bytes,
                message,
            } => write!(
                f,
                "backend allocation of {requested_bytes} bytes failed: {message}"
            ),
            BackendError::Unimplemented { op, reason } => {
                write!(f, "{op} is not implemented: {reason}")
            }
            BackendError::UnknownBuffer(id) => write!(f, "unknown buffer {id}"),
            BackendError::RegionOutOfBounds {
                buffer,
                max_offset,
                len,
            } => write!(
                f,
                "region reaches offset {max_offset} of {buffer} which holds {len} elements"
            ),
            BackendError::InvalidKernel { message } => write!(f, "invalid kernel: {message}"),
        }
    }
}

impl std::error::Error for BackendError {}

/// Convenience alias for results returned by backend routines.
pub type BackendResult<T> = Result<T, BackendError>;

/// Device contract: owns buffers and evaluates kernel descriptors against them.
///
/// Work submitted to one backend instance executes in submission order. Host transfers
/// (`write_region`/`read_region`) exchange values as `f64` in row-major logical order and
/// are converted to the buffer dtype by the backend.
pub trait DeviceBackend: Send + Sync {
    /// Returns a human-readable backend identifier (e.g., `"cpu"`).
    fn backend_name(&self) -> &str;

    /// Allocates a zero-filled buffer.
    fn allocate(&self, spec: &BufferSpec) -> BackendResult<BufferId>;

    fn release(&self, buffer: BufferId) -> BackendResult<()>;

    fn write_region(&self, region: &Region, values: &[f64]) -> BackendResult<()>;

    fn read_region(&self, region: &Region) -> BackendResult<Vec<f64>>;

    fn execute(&self, kernel: &Kernel) -> BackendResult<()>;

    /// Blocks until all submitted work has completed.
    fn synchronize(&self) -> BackendResult<()> {
        Ok(())
    }
}

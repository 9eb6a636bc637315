pub mod spec;

pub use spec::{
    Access, AssignMode, BackendError, BackendResult, BinaryOp, BufferId, BufferSpec, DType,
    DeviceBackend, FusedProgram, FusedStep, Kernel, Operand, ReduceKind, Region, StorageOrder,
    UnaryOp,
};

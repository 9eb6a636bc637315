pub mod cpu;

pub use cpu::{
    BufferData, CpuBackend, CpuBuffer, CpuKernelInterceptor, GenericCpuBackend, NoopInterceptor,
};

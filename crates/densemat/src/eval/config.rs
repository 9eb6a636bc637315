/// When the evaluator may route a statement through a temporary buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StagingPolicy {
    /// Stage only statements whose sources overlap the target.
    #[default]
    Auto,
    /// Stage every statement.
    Always,
    /// Never allocate a temporary; overlapping statements fail with `UnsafeAliasing`.
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvalConfig {
    pub staging: StagingPolicy,
    /// Check every kernel descriptor before dispatch.
    pub validate_kernels: bool,
}

impl EvalConfig {
    /// Reads `DENSEMAT_STAGING` and `DENSEMAT_VALIDATE_KERNELS`.
    pub fn from_env() -> Self {
        EvalConfig {
            staging: crate::env::staging_policy(),
            validate_kernels: crate::env::validate_kernels(),
        }
    }

    pub fn with_staging(mut self, staging: StagingPolicy) -> Self {
        self.staging = staging;
        self
    }

    pub fn with_validation(mut self, validate_kernels: bool) -> Self {
        self.validate_kernels = validate_kernels;
        self
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

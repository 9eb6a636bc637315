//! Statement evaluation: lowering, aliasing analysis and kernel dispatch.

pub mod alias;
mod config;
pub(crate) mod lower;

use std::sync::Arc;

pub use alias::{classify, AliasKind};
pub use config::{EvalConfig, StagingPolicy};

use crate::backend::spec::{AssignMode, DeviceBackend, FusedProgram, Kernel, Operand, Region};
use crate::error::{MatrixError, Result};
use crate::expr::Expr;
use crate::matrix::Matrix;

/// Whether a statement writes the target directly or through a temporary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    InPlace,
    Staged,
}

/// Evaluation decision for one statement, computed without touching the device.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalPlan {
    pub target: Region,
    pub mode: AssignMode,
    pub program: FusedProgram,
    pub strategy: Strategy,
    /// Classification of each region operand of `program`, in slot order.
    pub aliasing: Vec<AliasKind>,
}

impl EvalPlan {
    /// Number of kernels the plan dispatches.
    pub fn kernel_count(&self) -> usize {
        match (self.strategy, self.target.element_count()) {
            (_, 0) => 0,
            (Strategy::InPlace, _) => 1,
            (Strategy::Staged, _) => 2,
        }
    }
}

/// Outcome of an executed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalReport {
    pub strategy: Strategy,
    pub kernels: usize,
}

fn statement_name(mode: AssignMode) -> &'static str {
    match mode {
        AssignMode::Assign => "assign",
        AssignMode::AddAssign => "add_assign",
        AssignMode::SubAssign => "sub_assign",
    }
}

/// Evaluates expression trees into matrix handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluator {
    config: EvalConfig,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Evaluator configured from the environment.
    pub fn new() -> Self {
        Self::with_config(EvalConfig::from_env())
    }

    pub fn with_config(config: EvalConfig) -> Self {
        Evaluator { config }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Checks the statement and decides how it would run. Nothing is dispatched.
    pub fn plan<B: DeviceBackend + 'static>(
        &self,
        target: &Matrix<B>,
        expr: &Expr<B>,
        mode: AssignMode,
    ) -> Result<EvalPlan> {
        let op = statement_name(mode);
        if target.shape() != expr.shape() {
            return Err(MatrixError::ShapeMismatch {
                op,
                lhs: target.shape(),
                rhs: expr.shape(),
            });
        }
        if let Some(dtype) = expr.dtype() {
            if dtype != target.dtype() {
                return Err(MatrixError::DTypeMismatch {
                    op,
                    lhs: target.dtype(),
                    rhs: dtype,
                });
            }
        }
        if let Some(backend) = expr.backend() {
            if !Arc::ptr_eq(backend, target.backend()) {
                return Err(MatrixError::BackendMismatch { op });
            }
        }

        let region = target.region();
        let lowered = lower::lower(expr);
        if self.config.validate_kernels {
            lowered.program.validate()?;
            lower::check_bounds(&lowered.bounds, &region)?;
        }

        let aliasing: Vec<AliasKind> = lowered
            .program
            .regions()
            .map(|access| classify(&region, access))
            .collect();
        let overlapping = aliasing.contains(&AliasKind::Overlapping);
        let strategy = match self.config.staging {
            StagingPolicy::Always => Strategy::Staged,
            StagingPolicy::Auto if overlapping => Strategy::Staged,
            StagingPolicy::Auto => Strategy::InPlace,
            StagingPolicy::Never if overlapping => {
                return Err(MatrixError::UnsafeAliasing {
                    rows: region.rows,
                    cols: region.cols,
                    reason: format!(
                        "`{}` reads target elements it overwrites and staging is disabled",
                        mode.symbol()
                    ),
                })
            }
            StagingPolicy::Never => Strategy::InPlace,
        };

        Ok(EvalPlan {
            target: region,
            mode,
            program: lowered.program,
            strategy,
            aliasing,
        })
    }

    /// Runs `target <mode> expr`.
    ///
    /// Shape, dtype, backend, aliasing and staging-allocation failures are reported before
    /// the target is written.
    pub fn assign<B: DeviceBackend + 'static>(
        &self,
        target: &mut Matrix<B>,
        expr: &Expr<B>,
        mode: AssignMode,
    ) -> Result<EvalReport> {
        let plan = self.plan(target, expr, mode)?;
        let kernels = plan.kernel_count();
        tracing::debug!(
            statement = statement_name(mode),
            expr = ?expr,
            strategy = ?plan.strategy,
            operands = plan.program.operands.len(),
            steps = plan.program.steps.len(),
            "evaluating statement"
        );
        if kernels == 0 {
            return Ok(EvalReport {
                strategy: plan.strategy,
                kernels,
            });
        }

        let backend = target.backend();
        match plan.strategy {
            Strategy::InPlace => {
                dispatch(
                    backend.as_ref(),
                    Kernel::FusedElementwise {
                        target: plan.target,
                        mode,
                        program: plan.program,
                    },
                )?;
            }
            Strategy::Staged => {
                let staging = Matrix::zeros(
                    Arc::clone(backend),
                    target.dtype(),
                    target.size1(),
                    target.size2(),
                )?;
                dispatch(
                    backend.as_ref(),
                    Kernel::FusedElementwise {
                        target: staging.region(),
                        mode: AssignMode::Assign,
                        program: plan.program,
                    },
                )?;
                dispatch(
                    backend.as_ref(),
                    Kernel::FusedElementwise {
                        target: plan.target,
                        mode,
                        program: FusedProgram::load(Operand::Region(staging.access())),
                    },
                )?;
            }
        }
        Ok(EvalReport {
            strategy: plan.strategy,
            kernels,
        })
    }
}

fn dispatch<B: DeviceBackend + ?Sized>(backend: &B, kernel: Kernel) -> Result<()> {
    if tracing::enabled!(tracing::Level::TRACE) {
        match kernel.to_json_string() {
            Ok(json) => tracing::trace!(kernel = %json, "dispatching kernel"),
            Err(err) => tracing::trace!(error = %err, "kernel descriptor is not serializable"),
        }
    }
    backend.execute(&kernel)?;
    Ok(())
}

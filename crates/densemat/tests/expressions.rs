use std::sync::Arc;

use anyhow::Result;
use densemat::backend::spec::{BinaryOp, FusedStep, Kernel, Operand};
use densemat::expr::{element_exp, element_exp10, element_prod, scalar_fill, trans, zero};
use densemat::{DType, DeviceScalar, Expr, Matrix, MatrixError};
use densemat_backend_ref_cpu::CpuBackend;
use densemat_backend_tests::recording_backend::RecordingBackend;

type Recording = RecordingBackend<CpuBackend>;

fn recording() -> Arc<Recording> {
    Arc::new(RecordingBackend::new(CpuBackend::new()))
}

fn filled(backend: &Arc<Recording>, rows: usize, cols: usize, value: f64) -> Result<Matrix<Recording>> {
    Ok(Matrix::from_expr(
        Arc::clone(backend),
        DType::F64,
        scalar_fill(rows, cols, value),
    )?)
}

#[test]
fn building_expressions_dispatches_nothing() -> Result<()> {
    let backend = recording();
    let a = filled(&backend, 3, 3, 1.0)?;
    let b = filled(&backend, 3, 3, 2.0)?;
    let mut c = Matrix::zeros(Arc::clone(&backend), DType::F64, 3, 3)?;
    backend.clear();

    let expr: Expr<Recording> = 2.0 * &a + trans(&b) - element_prod(&a, element_exp(&b)) / 4i64;
    assert_eq!(expr.shape(), (3, 3));
    assert_eq!(expr.dtype(), Some(DType::F64));
    assert_eq!(backend.kernel_count(), 0);
    assert_eq!(backend.allocation_count(), 0);

    c.assign(&expr)?;
    assert_eq!(backend.kernel_count(), 1, "whole tree fuses into one kernel");
    let expected = 2.0 + 2.0 - 2f64.exp() / 4.0;
    assert_eq!(c.get(1, 2)?, expected);
    Ok(())
}

#[test]
fn repeated_leaves_share_one_operand_slot() -> Result<()> {
    let backend = recording();
    let a = filled(&backend, 2, 2, 1.5)?;
    let mut c = Matrix::zeros(Arc::clone(&backend), DType::F64, 2, 2)?;
    c.assign(&a + &a)?;

    let Kernel::FusedElementwise { program, .. } = backend.last_kernel_or_panic() else {
        panic!("expected a fused kernel");
    };
    assert_eq!(program.operands, vec![Operand::Region(a.access())]);
    assert_eq!(
        program.steps,
        vec![
            FusedStep::Load(0),
            FusedStep::Load(0),
            FusedStep::Binary(BinaryOp::Add)
        ]
    );
    Ok(())
}

#[test]
fn leaves_are_read_when_the_statement_runs() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let mut a = Matrix::zeros(Arc::clone(&backend), DType::F64, 2, 2)?;
    let sum = &a + &a;
    a.set(0, 0, 5.0)?;

    let c = Matrix::from_expr(Arc::clone(&backend), DType::F64, &sum)?;
    assert_eq!(c.get(0, 0)?, 10.0);
    assert_eq!(c.get(1, 1)?, 0.0);
    Ok(())
}

#[test]
fn initializers_carry_no_dtype_or_backend() {
    let expr = zero::<CpuBackend>(2, 3);
    assert_eq!(expr.shape(), (2, 3));
    assert_eq!(expr.dtype(), None);
    assert!(expr.backend().is_none());
}

#[test]
fn mismatched_shapes_are_rejected() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let a = Matrix::zeros(Arc::clone(&backend), DType::F64, 3, 3)?;
    let b = Matrix::zeros(Arc::clone(&backend), DType::F64, 3, 4)?;

    let err = a.expr().try_add(&b).expect_err("3x3 + 3x4");
    assert!(matches!(
        err,
        MatrixError::ShapeMismatch {
            op: "add",
            lhs: (3, 3),
            rhs: (3, 4)
        }
    ));

    let mut c = Matrix::zeros(Arc::clone(&backend), DType::F64, 3, 3)?;
    let err = c.assign(&b).expect_err("assign 3x4 into 3x3");
    assert!(matches!(err, MatrixError::ShapeMismatch { op: "assign", .. }));
    let err = c.try_sub_assign(trans(&b)).expect_err("4x3 into 3x3");
    assert!(matches!(
        err,
        MatrixError::ShapeMismatch {
            op: "sub_assign",
            rhs: (4, 3),
            ..
        }
    ));

    // The transposed shape fits a 4x3 target.
    let mut d = Matrix::zeros(Arc::clone(&backend), DType::F64, 4, 3)?;
    d.assign(trans(&b))?;
    Ok(())
}

#[test]
#[should_panic(expected = "matrix add failed")]
fn operator_panics_on_shape_mismatch() {
    let backend = Arc::new(CpuBackend::new());
    let a = Matrix::zeros(Arc::clone(&backend), DType::F64, 2, 2).expect("alloc");
    let b = Matrix::zeros(Arc::clone(&backend), DType::F64, 2, 3).expect("alloc");
    let _ = &a + &b;
}

#[test]
fn mixed_dtypes_are_rejected() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let a = Matrix::zeros(Arc::clone(&backend), DType::F32, 2, 2)?;
    let b = Matrix::zeros(Arc::clone(&backend), DType::F64, 2, 2)?;
    let err = a.expr().try_sub(&b).expect_err("f32 - f64");
    assert!(matches!(
        err,
        MatrixError::DTypeMismatch {
            lhs: DType::F32,
            rhs: DType::F64,
            ..
        }
    ));

    let mut c = Matrix::zeros(Arc::clone(&backend), DType::F32, 2, 2)?;
    let err = c.assign(&b).expect_err("f64 into f32");
    assert!(matches!(err, MatrixError::DTypeMismatch { op: "assign", .. }));
    Ok(())
}

#[test]
fn operands_from_different_backends_are_rejected() -> Result<()> {
    let first = Arc::new(CpuBackend::new());
    let second = Arc::new(CpuBackend::new());
    let a = Matrix::zeros(Arc::clone(&first), DType::F64, 2, 2)?;
    let b = Matrix::zeros(Arc::clone(&second), DType::F64, 2, 2)?;
    assert!(matches!(
        a.expr().try_add(&b),
        Err(MatrixError::BackendMismatch { .. })
    ));

    let foreign = DeviceScalar::new(Arc::clone(&second), DType::F64, 2.0)?;
    assert!(matches!(
        a.expr().try_scale(&foreign),
        Err(MatrixError::BackendMismatch { .. })
    ));

    let mut c = Matrix::zeros(Arc::clone(&first), DType::F64, 2, 2)?;
    assert!(matches!(
        c.assign(&b),
        Err(MatrixError::BackendMismatch { op: "assign" })
    ));
    Ok(())
}

#[test]
fn device_scalars_are_read_at_evaluation() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let a = Matrix::from_expr(Arc::clone(&backend), DType::F64, scalar_fill(2, 2, 3.0))?;
    let alpha = DeviceScalar::new(Arc::clone(&backend), DType::F64, 2.0)?;
    let scaled = &alpha * &a;
    alpha.set(4.0)?;

    let c = Matrix::from_expr(Arc::clone(&backend), DType::F64, scaled)?;
    assert_eq!(c.get(0, 1)?, 12.0);
    Ok(())
}

#[test]
fn dispatched_kernels_dump_as_json() -> Result<()> {
    let backend = recording();
    let a = filled(&backend, 2, 3, 1.0)?;
    let mut c = Matrix::zeros(Arc::clone(&backend), DType::F64, 2, 3)?;
    c.try_sub_assign(3.0 * &a)?;

    let kernel = backend.last_kernel_or_panic();
    let json = kernel.to_json_string()?;
    assert!(json.contains("FusedElementwise"), "{json}");
    assert!(json.contains("SubAssign"), "{json}");
    let parsed: Kernel = serde_json::from_str(&json)?;
    assert_eq!(parsed, kernel);
    Ok(())
}

#[test]
fn exp10_is_exact_on_integer_exponents() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let exponents = Matrix::from_host(Arc::clone(&backend), &[vec![0.0, 1.0, 2.0, -1.0, 15.0]])?;
    let powers = Matrix::from_expr(Arc::clone(&backend), DType::F64, element_exp10(&exponents))?;
    assert_eq!(
        powers.to_host::<f64>()?,
        vec![vec![1.0, 10.0, 100.0, 0.1, 1e15]]
    );
    Ok(())
}

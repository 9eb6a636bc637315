use std::sync::Arc;

use anyhow::Result;
use densemat::backend::spec::{Access, AssignMode, BufferId, Region};
use densemat::eval::{classify, AliasKind, Strategy};
use densemat::expr::{element_exp, trans};
use densemat::{
    DType, EvalConfig, Evaluator, Matrix, MatrixError, Slice, StagingPolicy, StorageOrder,
};
use densemat_backend_ref_cpu::CpuBackend;
use densemat_backend_tests::recording_backend::RecordingBackend;

type Recording = RecordingBackend<CpuBackend>;

fn host(rows: usize, cols: usize) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|i| (0..cols).map(|j| (i * cols + j) as f64 + 0.5).collect())
        .collect()
}

fn transpose(m: &[Vec<f64>]) -> Vec<Vec<f64>> {
    (0..m[0].len())
        .map(|j| m.iter().map(|row| row[j]).collect())
        .collect()
}

fn evaluator(staging: StagingPolicy) -> Evaluator {
    Evaluator::with_config(
        EvalConfig::from_env()
            .with_staging(staging)
            .with_validation(true),
    )
}

#[test]
fn classification_of_common_layouts() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let root = Matrix::zeros(Arc::clone(&backend), DType::F64, 6, 6)?;
    let other = Matrix::zeros(Arc::clone(&backend), DType::F64, 6, 6)?;
    let target = root.range(0..4, 0..4)?;

    assert_eq!(classify(&target.region(), &target.access()), AliasKind::Identical);
    assert_eq!(
        classify(&target.region(), &target.access().transposed()),
        AliasKind::Overlapping
    );
    assert_eq!(
        classify(&target.region(), &other.range(0..4, 0..4)?.access()),
        AliasKind::Disjoint
    );
    assert_eq!(
        classify(&target.region(), &root.range(1..5, 0..4)?.access()),
        AliasKind::Overlapping
    );

    // Interleaved rows share a span but no element.
    let even = root.slice(Slice::new(0, 2, 3), Slice::new(0, 1, 6))?;
    let odd = root.slice(Slice::new(1, 2, 3), Slice::new(0, 1, 6))?;
    assert_eq!(classify(&even.region(), &odd.access()), AliasKind::Disjoint);

    // A single element is its own transpose.
    let corner = root.range(2..3, 2..3)?;
    assert_eq!(
        classify(&corner.region(), &corner.access().transposed()),
        AliasKind::Identical
    );
    Ok(())
}

#[test]
fn classification_of_column_major_layouts() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let root = Matrix::with_order(Arc::clone(&backend), DType::F64, 8, 8, StorageOrder::ColMajor)?;
    let target = root.range(0..5, 0..5)?;

    assert_eq!(
        classify(&target.region(), &root.range(0..5, 1..6)?.access()),
        AliasKind::Overlapping
    );
    assert_eq!(
        classify(&target.region(), &target.access().transposed()),
        AliasKind::Overlapping
    );

    // Interleaved columns share a span but no element.
    let even = root.slice(Slice::new(0, 1, 8), Slice::new(0, 2, 4))?;
    let odd = root.slice(Slice::new(0, 1, 8), Slice::new(1, 2, 4))?;
    assert_eq!(classify(&even.region(), &odd.access()), AliasKind::Disjoint);

    // Packing the start of a row into its even columns.
    let even_columns = root.slice(Slice::new(3, 1, 1), Slice::new(0, 2, 4))?;
    let packed = root.range(3..4, 0..4)?;
    assert_eq!(
        classify(&even_columns.region(), &packed.access()),
        AliasKind::Overlapping
    );
    Ok(())
}

#[test]
fn interleaved_target_maps_are_treated_as_overlapping() {
    let buffer = BufferId(7);
    let target = Region {
        access: Access {
            buffer,
            base: 0,
            row_step: 2,
            col_step: 3,
        },
        rows: 4,
        cols: 4,
    };
    let shifted = Access {
        base: 1,
        ..target.access
    };
    assert_eq!(classify(&target, &shifted), AliasKind::Overlapping);
    assert_eq!(classify(&target, &target.access), AliasKind::Identical);
}

#[test]
fn plan_stages_only_overlapping_statements() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let a = Matrix::zeros(Arc::clone(&backend), DType::F64, 3, 3)?;
    let auto = evaluator(StagingPolicy::Auto);

    let plan = auto.plan(&a, &(&a + &a), AssignMode::AddAssign)?;
    assert_eq!(plan.strategy, Strategy::InPlace);
    assert_eq!(plan.aliasing, vec![AliasKind::Identical]);
    assert_eq!(plan.kernel_count(), 1);

    let plan = auto.plan(&a, &(&a + trans(&a)), AssignMode::Assign)?;
    assert_eq!(plan.strategy, Strategy::Staged);
    assert_eq!(
        plan.aliasing,
        vec![AliasKind::Identical, AliasKind::Overlapping]
    );
    assert_eq!(plan.kernel_count(), 2);

    let plan = evaluator(StagingPolicy::Always).plan(&a, &element_exp(&a), AssignMode::Assign)?;
    assert_eq!(plan.strategy, Strategy::Staged);
    Ok(())
}

#[test]
fn transposed_self_assignment_reads_a_snapshot() -> Result<()> {
    let backend = Arc::new(RecordingBackend::new(CpuBackend::new()));
    let start = host(4, 4);
    let mut a: Matrix<Recording> = Matrix::from_host(Arc::clone(&backend), &start)?;
    backend.clear();

    let statement = trans(&a);
    let report = evaluator(StagingPolicy::Auto).assign(&mut a, &statement, AssignMode::Assign)?;
    assert_eq!(report.strategy, Strategy::Staged);
    assert_eq!(report.kernels, 2);
    assert_eq!(backend.kernel_count(), 2);
    assert_eq!(backend.allocation_count(), 1, "one staging buffer");
    assert_eq!(a.to_host::<f64>()?, transpose(&start));

    // The staging buffer is released once the statement completes.
    assert_eq!(backend.inner().live_buffers(), 1);
    Ok(())
}

#[test]
fn compound_transposed_statements_match_the_host() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let start = host(5, 5);
    let mut a = Matrix::from_host(Arc::clone(&backend), &start)?;

    a += trans(&a + &a);
    let expected: Vec<Vec<f64>> = (0..5)
        .map(|i| (0..5).map(|j| start[i][j] + 2.0 * start[j][i]).collect())
        .collect();
    assert_eq!(a.to_host::<f64>()?, expected);

    a.try_sub_assign(2.0 * trans(&a))?;
    let expected: Vec<Vec<f64>> = (0..5)
        .map(|i| (0..5).map(|j| expected[i][j] - 2.0 * expected[j][i]).collect())
        .collect();
    assert_eq!(a.to_host::<f64>()?, expected);
    Ok(())
}

#[test]
fn overlapping_views_of_one_parent_are_staged() -> Result<()> {
    let backend = Arc::new(CpuBackend::new());
    let start = host(6, 6);
    let parent = Matrix::from_host(Arc::clone(&backend), &start)?;
    let mut target = parent.range(0..4, 0..4)?;
    let source = parent.range(1..5, 1..5)?;

    target.assign(&source)?;
    let copied: Vec<Vec<f64>> = target.to_host()?;
    for (i, row) in copied.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            assert_eq!(value, start[i + 1][j + 1], "({i}, {j})");
        }
    }
    Ok(())
}

#[test]
fn disabled_staging_rejects_overlap_without_writing() -> Result<()> {
    let backend = Arc::new(RecordingBackend::new(CpuBackend::new()));
    let start = host(3, 3);
    let mut a: Matrix<Recording> = Matrix::from_host(Arc::clone(&backend), &start)?;
    backend.clear();

    let statement = trans(&a);
    let err = evaluator(StagingPolicy::Never)
        .assign(&mut a, &statement, AssignMode::Assign)
        .expect_err("overlap with staging disabled");
    assert!(matches!(
        err,
        MatrixError::UnsafeAliasing {
            rows: 3,
            cols: 3,
            ..
        }
    ));
    assert_eq!(backend.kernel_count(), 0);
    assert_eq!(a.to_host::<f64>()?, start);

    // Identical aliasing is still allowed.
    let doubled = &a + &a;
    evaluator(StagingPolicy::Never).assign(&mut a, &doubled, AssignMode::Assign)?;
    assert_eq!(backend.kernel_count(), 1);
    Ok(())
}

#[test]
fn staging_allocation_failure_leaves_the_target_untouched() -> Result<()> {
    // Room for the 4x4 f64 target only.
    let backend = Arc::new(CpuBackend::new().with_memory_limit(128));
    let start = host(4, 4);
    let mut a = Matrix::from_host(Arc::clone(&backend), &start)?;

    let err = a.assign(trans(&a)).expect_err("no room for the staging buffer");
    assert!(matches!(
        err,
        MatrixError::AllocationFailed {
            rows: 4,
            cols: 4,
            ..
        }
    ));
    assert_eq!(a.to_host::<f64>()?, start);

    // Non-overlapping statements need no temporary.
    a.assign(2.0 * &a)?;
    assert_eq!(a.get(1, 1)?, 2.0 * start[1][1]);
    Ok(())
}

#[test]
fn always_staging_gives_the_same_result() -> Result<()> {
    let backend = Arc::new(RecordingBackend::new(CpuBackend::new()));
    let a: Matrix<Recording> = Matrix::from_host(Arc::clone(&backend), &host(3, 4))?;
    let b: Matrix<Recording> = Matrix::from_host(Arc::clone(&backend), &host(3, 4))?;
    let mut direct = Matrix::zeros(Arc::clone(&backend), DType::F64, 3, 4)?;
    let mut staged = Matrix::zeros(Arc::clone(&backend), DType::F64, 3, 4)?;
    let statement = 3.0 * &a - element_exp(&b) / 7.0;

    backend.clear();
    evaluator(StagingPolicy::Auto).assign(&mut direct, &statement, AssignMode::SubAssign)?;
    assert_eq!(backend.kernel_count(), 1);
    evaluator(StagingPolicy::Always).assign(&mut staged, &statement, AssignMode::SubAssign)?;
    assert_eq!(backend.kernel_count(), 3);

    assert_eq!(direct.to_host::<f64>()?, staged.to_host::<f64>()?);
    Ok(())
}

#[test]
fn empty_targets_dispatch_nothing() -> Result<()> {
    let backend = Arc::new(RecordingBackend::new(CpuBackend::new()));
    let root: Matrix<Recording> = Matrix::zeros(Arc::clone(&backend), DType::F64, 4, 4)?;
    let mut empty = root.range(4..4, 0..4)?;
    backend.clear();

    let statement = trans(&root.range(0..4, 4..4)?);
    let report =
        evaluator(StagingPolicy::Auto).assign(&mut empty, &statement, AssignMode::Assign)?;
    assert_eq!(report.kernels, 0);
    assert_eq!(backend.kernel_count(), 0);
    Ok(())
}

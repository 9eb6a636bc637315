use std::sync::Arc;

use densemat::expr::{element_prod, element_sqrt, trans};
use densemat::{DType, Matrix};
use densemat_backend_ref_cpu::CpuBackend;
use proptest::prelude::*;

fn host_matrix(rows: usize, cols: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(prop::collection::vec(-100.0f64..100.0, cols), rows)
}

fn operands() -> impl Strategy<Value = (Vec<Vec<f64>>, Vec<Vec<f64>>, Vec<Vec<f64>>)> {
    (1usize..6, 1usize..6).prop_flat_map(|(rows, cols)| {
        (
            host_matrix(rows, cols),
            host_matrix(rows, cols),
            host_matrix(rows, cols),
        )
    })
}

proptest! {
    /// `C += expr` and `C -= expr` match evaluating `expr` into a temporary first.
    #[test]
    fn compound_assignment_matches_a_temporary((a, b, c) in operands(), subtract in any::<bool>()) {
        let backend = Arc::new(CpuBackend::new());
        let a = Matrix::from_host(Arc::clone(&backend), &a).expect("upload a");
        let b = Matrix::from_host(Arc::clone(&backend), &b).expect("upload b");
        let mut fused = Matrix::from_host(Arc::clone(&backend), &c).expect("upload c");
        let mut two_step = fused.to_dense().expect("copy c");

        let expr = 0.5 * &a - element_prod(&b, &a) / 3.0 + element_sqrt(element_prod(&b, &b));
        let temporary = Matrix::from_expr(Arc::clone(&backend), DType::F64, &expr).expect("temporary");
        if subtract {
            fused.try_sub_assign(&expr).expect("fused -=");
            two_step.assign(&two_step - &temporary).expect("two-step -");
        } else {
            fused.try_add_assign(&expr).expect("fused +=");
            two_step.assign(&two_step + &temporary).expect("two-step +");
        }
        prop_assert_eq!(
            fused.to_host::<f64>().expect("read fused"),
            two_step.to_host::<f64>().expect("read two-step")
        );
    }

    /// Self-referencing transposed updates match the host computation on square matrices.
    #[test]
    fn transposed_self_update_matches_host(c in (1usize..7).prop_flat_map(|n| host_matrix(n, n))) {
        let backend = Arc::new(CpuBackend::new());
        let mut m = Matrix::from_host(Arc::clone(&backend), &c).expect("upload");
        m.try_add_assign(trans(&m) * 2.0).expect("m += 2 * trans(m)");

        let n = c.len();
        let expected: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| c[i][j] + c[j][i] * 2.0).collect())
            .collect();
        prop_assert_eq!(m.to_host::<f64>().expect("read back"), expected);
    }
}

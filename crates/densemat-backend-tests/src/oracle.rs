//! Nested-`Vec` reference arithmetic the device results are checked against.

use densemat::backend::spec::{AssignMode, DType, UnaryOp};

pub type HostMatrix = Vec<Vec<f64>>;

pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> HostMatrix {
    (0..rows)
        .map(|i| (0..cols).map(|j| f(i, j)).collect())
        .collect()
}

pub fn filled(rows: usize, cols: usize, value: f64) -> HostMatrix {
    vec![vec![value; cols]; rows]
}

pub fn zeros(rows: usize, cols: usize) -> HostMatrix {
    filled(rows, cols, 0.0)
}

pub fn identity(n: usize) -> HostMatrix {
    from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.0 })
}

pub fn shape(m: &HostMatrix) -> (usize, usize) {
    (m.len(), m.first().map_or(0, Vec::len))
}

pub fn transpose(m: &HostMatrix) -> HostMatrix {
    let (rows, cols) = shape(m);
    from_fn(cols, rows, |i, j| m[j][i])
}

pub fn map(m: &HostMatrix, f: impl Fn(f64) -> f64) -> HostMatrix {
    m.iter()
        .map(|row| row.iter().map(|&x| f(x)).collect())
        .collect()
}

pub fn zip(a: &HostMatrix, b: &HostMatrix, f: impl Fn(f64, f64) -> f64) -> HostMatrix {
    a.iter()
        .zip(b)
        .map(|(ra, rb)| ra.iter().zip(rb).map(|(&x, &y)| f(x, y)).collect())
        .collect()
}

/// Applies `target <mode> value` and rounds the stored result to `dtype`.
pub fn update(target: &mut HostMatrix, mode: AssignMode, value: &HostMatrix, dtype: DType) {
    for (row, values) in target.iter_mut().zip(value) {
        for (slot, &v) in row.iter_mut().zip(values) {
            let combined = match mode {
                AssignMode::Assign => v,
                AssignMode::AddAssign => *slot + v,
                AssignMode::SubAssign => *slot - v,
            };
            *slot = dtype.round_trip(combined);
        }
    }
}

pub fn round_to(m: &HostMatrix, dtype: DType) -> HostMatrix {
    map(m, |x| dtype.round_trip(x))
}

/// Reference for each unary function, written against `std` and `libm` directly.
pub fn unary(op: UnaryOp, x: f64) -> f64 {
    match op {
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
        UnaryOp::Rsqrt => x.sqrt().recip(),
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

pub fn frobenius(m: &HostMatrix) -> f64 {
    m.iter().flatten().map(|x| x * x).sum::<f64>().sqrt()
}

pub fn norm_1(m: &HostMatrix) -> f64 {
    let (rows, cols) = shape(m);
    (0..cols)
        .map(|j| (0..rows).map(|i| m[i][j].abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

pub fn norm_inf(m: &HostMatrix) -> f64 {
    m.iter()
        .map(|row| row.iter().map(|x| x.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

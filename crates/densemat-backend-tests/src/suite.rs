//! The operation suite: every statement form run against three operands and checked
//! element by element against the host reference after each step.

use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use densemat::backend::spec::{AssignMode as Mode, DType, DeviceBackend, StorageOrder, UnaryOp};
use densemat::expr::{
    element_div, element_op, element_pow, element_pow_scalar, element_prod, identity,
    scalar_fill, scalar_pow, trans, zero,
};
use densemat::linalg;
use densemat::{copy_to_host, DeviceScalar, Expr, Matrix, MatrixKind};

use crate::fixtures::{initial_values, Placed, Role};
use crate::harness::{check_for_equality, check_scalar, epsilon_for};
use crate::oracle::{self, HostMatrix};

/// Shape, element type, storage orders and tolerance of one suite run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuiteConfig {
    pub dtype: DType,
    pub rows: usize,
    pub cols: usize,
    /// Storage order of the buffers holding A, B and C.
    pub orders: [StorageOrder; 3],
    pub epsilon: f64,
}

impl SuiteConfig {
    pub fn new(dtype: DType, rows: usize, cols: usize) -> Self {
        SuiteConfig {
            dtype,
            rows,
            cols,
            orders: [StorageOrder::RowMajor; 3],
            epsilon: epsilon_for(dtype),
        }
    }

    pub fn with_order(self, order: StorageOrder) -> Self {
        self.with_orders([order; 3])
    }

    pub fn with_orders(self, orders: [StorageOrder; 3]) -> Self {
        SuiteConfig { orders, ..self }
    }

    pub fn order_of(&self, role: Role) -> StorageOrder {
        match role {
            Role::A => self.orders[0],
            Role::B => self.orders[1],
            Role::C => self.orders[2],
        }
    }

    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Square runs additionally exercise the transposed in-place statements.
    pub fn square(dtype: DType, n: usize) -> Self {
        Self::new(dtype, n, n)
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }
}

/// One suite operand together with its host reference.
struct Operand<B: DeviceBackend + 'static> {
    role: Role,
    placed: Placed<B>,
    host: HostMatrix,
}

impl<B: DeviceBackend + 'static> Operand<B> {
    fn new(backend: &Arc<B>, config: &SuiteConfig, role: Role, kind: MatrixKind) -> Result<Self> {
        let order = config.order_of(role);
        let placed = Placed::new(backend, config.dtype, order, role, kind, config.shape())
            .with_context(|| format!("placing {role:?} as a {order:?} {}", kind.name()))?;
        let host = oracle::round_to(&initial_values(role, config.rows, config.cols), config.dtype);
        Ok(Operand { role, placed, host })
    }

    fn m(&self) -> &Matrix<B> {
        &self.placed.matrix
    }

    /// Replaces both the device contents and the reference.
    fn reset(&mut self, host: HostMatrix, dtype: DType) -> Result<()> {
        self.host = oracle::round_to(&host, dtype);
        densemat::copy_to_device(&self.host, &mut self.placed.matrix)
            .with_context(|| format!("copying {:?} to the device", self.role))
    }

    fn describe(&self) -> String {
        format!("{:?} ({})", self.role, self.m().kind().name())
    }
}

fn plus(a: &HostMatrix, b: &HostMatrix) -> HostMatrix {
    oracle::zip(a, b, |x, y| x + y)
}

fn minus(a: &HostMatrix, b: &HostMatrix) -> HostMatrix {
    oracle::zip(a, b, |x, y| x - y)
}

fn times(a: &HostMatrix, s: f64) -> HostMatrix {
    oracle::map(a, |x| x * s)
}

fn over(a: &HostMatrix, s: f64) -> HostMatrix {
    oracle::map(a, |x| x / s)
}

fn negated(a: &HostMatrix) -> HostMatrix {
    oracle::map(a, |x| -x)
}

struct Session<B: DeviceBackend + 'static> {
    config: SuiteConfig,
    alpha: f64,
    beta: f64,
    gpu_alpha: DeviceScalar<B>,
    gpu_beta: DeviceScalar<B>,
}

impl<B: DeviceBackend + 'static> Session<B> {
    fn new(backend: &Arc<B>, config: &SuiteConfig) -> Result<Self> {
        let alpha = config.dtype.round_trip(3.1415);
        let beta = config.dtype.round_trip(2.7182);
        Ok(Session {
            config: *config,
            alpha,
            beta,
            gpu_alpha: DeviceScalar::new(Arc::clone(backend), config.dtype, alpha)?,
            gpu_beta: DeviceScalar::new(Arc::clone(backend), config.dtype, beta)?,
        })
    }

    fn dtype(&self) -> DType {
        self.config.dtype
    }

    /// `alpha` as the integer the host scalar overloads see.
    fn long_alpha(&self) -> i64 {
        self.alpha as i64
    }

    fn long_beta(&self) -> i64 {
        self.beta as i64
    }

    fn float_alpha(&self) -> f32 {
        self.alpha as f32
    }

    fn float_beta(&self) -> f32 {
        self.beta as f32
    }

    /// Executes `target <mode> expr`, applies the same update to the reference and compares.
    fn run(
        &self,
        label: &str,
        mode: Mode,
        expr: Expr<B>,
        value: HostMatrix,
        target: &mut Operand<B>,
    ) -> Result<()> {
        let matrix = &mut target.placed.matrix;
        match mode {
            Mode::Assign => matrix.assign(expr),
            Mode::AddAssign => matrix.try_add_assign(expr),
            Mode::SubAssign => matrix.try_sub_assign(expr),
        }
        .with_context(|| format!("evaluating `{label}`"))?;
        oracle::update(&mut target.host, mode, &value, self.dtype());
        self.check(label, target)
    }

    fn check(&self, label: &str, target: &Operand<B>) -> Result<()> {
        check_for_equality(&target.host, target.m(), self.config.epsilon)
            .with_context(|| format!("after `{label}` on {}", target.describe()))
    }
}

/// Runs every statement form with A, B and C placed as `kinds`, then verifies no write
/// escaped a view into its parent buffer.
pub fn run_operations<B: DeviceBackend + 'static>(
    backend: &Arc<B>,
    config: &SuiteConfig,
    kinds: [MatrixKind; 3],
) -> Result<()> {
    tracing::debug!(?kinds, dtype = %config.dtype, rows = config.rows, cols = config.cols, "operation suite");
    let session = Session::new(backend, config)?;
    let mut a = Operand::new(backend, config, Role::A, kinds[0])?;
    let mut b = Operand::new(backend, config, Role::B, kinds[1])?;
    let mut c = Operand::new(backend, config, Role::C, kinds[2])?;

    initializers(&session, &mut a)?;
    assignments(&session, &mut a, &b)?;
    transfers(&session, &mut a, &mut c)?;
    addition(&session, &a, &b, &mut c)?;
    subtraction(&session, &a, &mut b, &mut c)?;
    scaling(&session, &mut a)?;
    element_products(&session, &mut a, &mut b)?;
    element_powers(&session, &mut a, &mut b, &mut c)?;
    unary_functions(&session, &mut a, &mut b, &mut c)?;
    complicated(&session, &a, &mut b, &c)?;

    for operand in [&a, &b, &c] {
        operand
            .placed
            .check_surroundings()
            .with_context(|| format!("surroundings of {}", operand.describe()))?;
    }
    Ok(())
}

fn initializers<B: DeviceBackend + 'static>(s: &Session<B>, a: &mut Operand<B>) -> Result<()> {
    let (rows, cols) = (s.config.rows, s.config.cols);
    s.run(
        "A = zero",
        Mode::Assign,
        zero::<B>(rows, cols),
        oracle::zeros(rows, cols),
        a,
    )?;
    s.run(
        "A = scalar_fill(alpha)",
        Mode::Assign,
        scalar_fill::<B>(rows, cols, s.alpha),
        oracle::filled(rows, cols, s.alpha),
        a,
    )?;
    s.run(
        "A = scalar_fill(gpu_beta)",
        Mode::Assign,
        scalar_fill::<B>(rows, cols, &s.gpu_beta),
        oracle::filled(rows, cols, s.beta),
        a,
    )?;
    if s.config.is_square() {
        s.run(
            "A = identity",
            Mode::Assign,
            identity::<B>(rows),
            oracle::identity(rows),
            a,
        )?;
    }
    Ok(())
}

fn assignments<B: DeviceBackend + 'static>(
    s: &Session<B>,
    a: &mut Operand<B>,
    b: &Operand<B>,
) -> Result<()> {
    s.check("initial B", b)?;
    s.run("A = B", Mode::Assign, b.m().expr(), b.host.clone(), a)?;
    if s.config.is_square() {
        s.run(
            "A = trans(B)",
            Mode::Assign,
            trans(b.m()),
            oracle::transpose(&b.host),
            a,
        )?;
    }
    Ok(())
}

fn transfers<B: DeviceBackend + 'static>(
    s: &Session<B>,
    a: &mut Operand<B>,
    c: &mut Operand<B>,
) -> Result<()> {
    let (rows, cols) = (s.config.rows, s.config.cols);
    a.reset(initial_values(Role::A, rows, cols), s.dtype())?;
    s.check("copy A to device", a)?;
    c.reset(initial_values(Role::C, rows, cols), s.dtype())?;
    s.check("copy C to device", c)?;

    let back: HostMatrix = copy_to_host(c.m())?;
    ensure!(back == c.host, "copy of C back to the host differs from what was written");
    Ok(())
}

fn addition<B: DeviceBackend + 'static>(
    s: &Session<B>,
    a: &Operand<B>,
    b: &Operand<B>,
    c: &mut Operand<B>,
) -> Result<()> {
    s.run("C += C", Mode::AddAssign, c.m().expr(), c.host.clone(), c)?;
    if s.config.is_square() {
        s.run(
            "C += trans(C)",
            Mode::AddAssign,
            trans(c.m()),
            oracle::transpose(&c.host),
            c,
        )?;
        s.run(
            "C += trans(C + C)",
            Mode::AddAssign,
            trans(c.m() + c.m()),
            oracle::transpose(&plus(&c.host, &c.host)),
            c,
        )?;
    }
    s.run(
        "C += gpu_beta * A",
        Mode::AddAssign,
        &s.gpu_beta * a.m(),
        times(&a.host, s.beta),
        c,
    )?;
    s.run(
        "C = A + B",
        Mode::Assign,
        a.m() + b.m(),
        plus(&a.host, &b.host),
        c,
    )?;
    s.run(
        "C = -A + B",
        Mode::Assign,
        -a.m() + b.m(),
        plus(&negated(&a.host), &b.host),
        c,
    )?;

    // Scaled on the left.
    let long_alpha = s.long_alpha();
    s.run(
        "C = long(alpha) * A + B",
        Mode::Assign,
        long_alpha * a.m() + b.m(),
        plus(&times(&a.host, long_alpha as f64), &b.host),
        c,
    )?;
    let float_alpha = s.float_alpha();
    s.run(
        "C = float(alpha) * A + B",
        Mode::Assign,
        float_alpha * a.m() + b.m(),
        plus(&times(&a.host, float_alpha as f64), &b.host),
        c,
    )?;
    s.run(
        "C = alpha * A + B",
        Mode::Assign,
        s.alpha * a.m() + b.m(),
        plus(&times(&a.host, s.alpha), &b.host),
        c,
    )?;
    s.run(
        "C = gpu_alpha * A + B",
        Mode::Assign,
        &s.gpu_alpha * a.m() + b.m(),
        plus(&times(&a.host, s.alpha), &b.host),
        c,
    )?;

    // Scaled on the right.
    let long_beta = s.long_beta();
    s.run(
        "C = A + B * long(beta)",
        Mode::Assign,
        a.m() + b.m() * long_beta,
        plus(&a.host, &times(&b.host, long_beta as f64)),
        c,
    )?;
    let float_beta = s.float_beta();
    s.run(
        "C = A + B * float(beta)",
        Mode::Assign,
        a.m() + b.m() * float_beta,
        plus(&a.host, &times(&b.host, float_beta as f64)),
        c,
    )?;
    s.run(
        "C = A + B * beta",
        Mode::Assign,
        a.m() + b.m() * s.beta,
        plus(&a.host, &times(&b.host, s.beta)),
        c,
    )?;
    s.run(
        "C = A + gpu_beta * B",
        Mode::Assign,
        a.m() + &s.gpu_beta * b.m(),
        plus(&a.host, &times(&b.host, s.beta)),
        c,
    )?;

    // Divided on the right.
    s.run(
        "C = A + B / long(beta)",
        Mode::Assign,
        a.m() + b.m() / long_beta,
        plus(&a.host, &over(&b.host, long_beta as f64)),
        c,
    )?;
    s.run(
        "C = A + B / float(beta)",
        Mode::Assign,
        a.m() + b.m() / float_beta,
        plus(&a.host, &over(&b.host, float_beta as f64)),
        c,
    )?;
    s.run(
        "C = A + B / beta",
        Mode::Assign,
        a.m() + b.m() / s.beta,
        plus(&a.host, &over(&b.host, s.beta)),
        c,
    )?;

    // Scaled on both sides.
    s.run(
        "C = alpha * A + beta * B",
        Mode::Assign,
        s.alpha * a.m() + s.beta * b.m(),
        plus(&times(&a.host, s.alpha), &times(&b.host, s.beta)),
        c,
    )?;
    s.run(
        "C = gpu_alpha * A + gpu_beta * B",
        Mode::Assign,
        &s.gpu_alpha * a.m() + &s.gpu_beta * b.m(),
        plus(&times(&a.host, s.alpha), &times(&b.host, s.beta)),
        c,
    )
}

fn subtraction<B: DeviceBackend + 'static>(
    s: &Session<B>,
    a: &Operand<B>,
    b: &mut Operand<B>,
    c: &mut Operand<B>,
) -> Result<()> {
    let host = c.host.clone();
    c.reset(host, s.dtype())?;
    s.run("C -= B", Mode::SubAssign, b.m().expr(), b.host.clone(), c)?;
    if s.config.is_square() {
        s.run(
            "C -= 2 * trans(C)",
            Mode::SubAssign,
            2.0 * trans(c.m()),
            times(&oracle::transpose(&c.host), 2.0),
            c,
        )?;
        s.run(
            "C -= trans(C + C)",
            Mode::SubAssign,
            trans(c.m() + c.m()),
            oracle::transpose(&plus(&c.host, &c.host)),
            c,
        )?;
    }
    s.run(
        "C -= alpha * B",
        Mode::SubAssign,
        s.alpha * b.m(),
        times(&b.host, s.alpha),
        c,
    )?;
    s.run(
        "C = A - B",
        Mode::Assign,
        a.m() - b.m(),
        minus(&a.host, &b.host),
        c,
    )?;

    s.run(
        "B = alpha * A - C",
        Mode::Assign,
        s.alpha * a.m() - c.m(),
        minus(&times(&a.host, s.alpha), &c.host),
        b,
    )?;
    s.run(
        "B = gpu_alpha * A - C",
        Mode::Assign,
        &s.gpu_alpha * a.m() - c.m(),
        minus(&times(&a.host, s.alpha), &c.host),
        b,
    )?;
    s.run(
        "B = A - C * beta",
        Mode::Assign,
        a.m() - c.m() * s.beta,
        minus(&a.host, &times(&c.host, s.beta)),
        b,
    )?;
    s.run(
        "B = A - C * gpu_beta",
        Mode::Assign,
        a.m() - c.m() * &s.gpu_beta,
        minus(&a.host, &times(&c.host, s.beta)),
        b,
    )?;
    s.run(
        "B = alpha * A - C * beta",
        Mode::Assign,
        s.alpha * a.m() - c.m() * s.beta,
        minus(&times(&a.host, s.alpha), &times(&c.host, s.beta)),
        b,
    )?;
    s.run(
        "B = gpu_alpha * A - C * gpu_beta",
        Mode::Assign,
        &s.gpu_alpha * a.m() - c.m() * &s.gpu_beta,
        minus(&times(&a.host, s.alpha), &times(&c.host, s.beta)),
        b,
    )?;

    s.run("C = -A", Mode::Assign, -a.m(), negated(&a.host), c)
}

fn scaling<B: DeviceBackend + 'static>(s: &Session<B>, a: &mut Operand<B>) -> Result<()> {
    let host = a.host.clone();
    a.reset(host, s.dtype())?;

    let statements: [(&str, densemat::ScalarOperand<B>, f64, bool); 8] = [
        ("A *= long(alpha)", s.long_alpha().into(), s.long_alpha() as f64, false),
        ("A *= float(alpha)", s.float_alpha().into(), s.float_alpha() as f64, false),
        ("A *= alpha", s.alpha.into(), s.alpha, false),
        ("A *= gpu_beta", (&s.gpu_beta).into(), s.beta, false),
        ("A /= long(alpha)", s.long_alpha().into(), s.long_alpha() as f64, true),
        ("A /= float(alpha)", s.float_alpha().into(), s.float_alpha() as f64, true),
        ("A /= alpha", s.alpha.into(), s.alpha, true),
        ("A /= gpu_beta", (&s.gpu_beta).into(), s.beta, true),
    ];
    for (label, scalar, value, divide) in statements {
        let statement = if divide {
            a.placed.matrix.try_div_assign(scalar)
        } else {
            a.placed.matrix.try_mul_assign(scalar)
        };
        statement.with_context(|| format!("evaluating `{label}`"))?;
        let scaled = if divide {
            over(&a.host, value)
        } else {
            times(&a.host, value)
        };
        a.host = oracle::round_to(&scaled, s.dtype());
        s.check(label, a)?;
    }
    Ok(())
}

/// Resets B to `b_value` everywhere and A to `3.1415 * B`.
fn reset_pair<B: DeviceBackend + 'static>(
    s: &Session<B>,
    a: &mut Operand<B>,
    b: &mut Operand<B>,
    b_value: f64,
) -> Result<()> {
    let (rows, cols) = (s.config.rows, s.config.cols);
    b.reset(oracle::filled(rows, cols, b_value), s.dtype())?;
    let factor = s.dtype().round_trip(3.1415);
    a.reset(times(&b.host, factor), s.dtype())
}

const MODES: [Mode; 3] = [Mode::Assign, Mode::AddAssign, Mode::SubAssign];

/// `(label, left operand is A + B, right operand is B + A)`
const FORMS: [(&str, bool, bool); 4] = [
    ("A, B", false, false),
    ("A + B, B", true, false),
    ("A, B + A", false, true),
    ("A + B, B + A", true, true),
];

fn element_products<B: DeviceBackend + 'static>(
    s: &Session<B>,
    a: &mut Operand<B>,
    b: &mut Operand<B>,
) -> Result<()> {
    element_binary(s, a, b, "element_prod", |l, r| element_prod(l, r), |x, y| x * y)?;
    element_binary(s, a, b, "element_div", |l, r| element_div(l, r), |x, y| x / y)
}

/// The four operand forms of an elementwise binary function, each with `=`, `+=` and `-=`
/// into A.
fn element_binary<B: DeviceBackend + 'static>(
    s: &Session<B>,
    a: &mut Operand<B>,
    b: &mut Operand<B>,
    name: &str,
    build: impl Fn(Expr<B>, Expr<B>) -> Expr<B>,
    reference: impl Fn(f64, f64) -> f64,
) -> Result<()> {
    reset_pair(s, a, b, 1.4142)?;
    for (form, lhs_sum, rhs_sum) in FORMS {
        for mode in MODES {
            let lhs = if lhs_sum { a.m() + b.m() } else { a.m().expr() };
            let rhs = if rhs_sum { b.m() + a.m() } else { b.m().expr() };
            let host_lhs = if lhs_sum { plus(&a.host, &b.host) } else { a.host.clone() };
            let host_rhs = if rhs_sum { plus(&b.host, &a.host) } else { b.host.clone() };
            s.run(
                &format!("A {} {name}({form})", mode.symbol()),
                mode,
                build(lhs, rhs),
                oracle::zip(&host_lhs, &host_rhs, &reference),
                a,
            )?;
        }
    }
    Ok(())
}

fn element_powers<B: DeviceBackend + 'static>(
    s: &Session<B>,
    a: &mut Operand<B>,
    b: &mut Operand<B>,
    c: &mut Operand<B>,
) -> Result<()> {
    reset_pair(s, a, b, 1.4142)?;
    for (form, lhs_sum, rhs_sum) in FORMS {
        for mode in MODES {
            let base = if lhs_sum { a.m() + b.m() } else { a.m().expr() };
            let exponent = if rhs_sum { b.m() + a.m() } else { b.m().expr() };
            let host_base = if lhs_sum { plus(&a.host, &b.host) } else { a.host.clone() };
            let host_exponent = if rhs_sum { plus(&b.host, &a.host) } else { b.host.clone() };
            s.run(
                &format!("C {} element_pow({form})", mode.symbol()),
                mode,
                element_pow(base, exponent),
                oracle::zip(&host_base, &host_exponent, f64::powf),
                c,
            )?;
        }
    }

    // Scalar exponent.
    reset_pair(s, a, b, 1.4142)?;
    for (form, sum) in [("A", false), ("A + B", true)] {
        for mode in MODES {
            let base = if sum { a.m() + b.m() } else { a.m().expr() };
            let host_base = if sum { plus(&a.host, &b.host) } else { a.host.clone() };
            s.run(
                &format!("C {} element_pow({form}, alpha)", mode.symbol()),
                mode,
                element_pow_scalar(base, s.alpha),
                oracle::map(&host_base, |x| x.powf(s.alpha)),
                c,
            )?;
        }
    }

    // Scalar base.
    reset_pair(s, a, b, 0.14142)?;
    for (form, sum) in [("A", false), ("B + A", true)] {
        for mode in MODES {
            let exponent = if sum { b.m() + a.m() } else { a.m().expr() };
            let host_exponent = if sum { plus(&b.host, &a.host) } else { a.host.clone() };
            s.run(
                &format!("C {} alpha ^ ({form})", mode.symbol()),
                mode,
                scalar_pow(s.alpha, exponent),
                oracle::map(&host_exponent, |x| s.alpha.powf(x)),
                c,
            )?;
        }
    }
    Ok(())
}

fn unary_functions<B: DeviceBackend + 'static>(
    s: &Session<B>,
    a: &mut Operand<B>,
    b: &mut Operand<B>,
    c: &mut Operand<B>,
) -> Result<()> {
    for op in UnaryOp::FUNCTIONS {
        reset_pair(s, a, b, 0.04142)?;
        let factor = s.dtype().round_trip(2.7172);
        c.reset(times(&a.host, factor), s.dtype())?;
        let name = op.name();
        for mode in MODES {
            s.run(
                &format!("C {} {name}(A)", mode.symbol()),
                mode,
                element_op(op, a.m()),
                oracle::map(&a.host, |x| oracle::unary(op, x)),
                c,
            )?;
            s.run(
                &format!("C {} {name}(A + B)", mode.symbol()),
                mode,
                element_op(op, a.m() + b.m()),
                oracle::map(&plus(&a.host, &b.host), |x| oracle::unary(op, x)),
                c,
            )?;
        }
    }
    Ok(())
}

fn complicated<B: DeviceBackend + 'static>(
    s: &Session<B>,
    a: &Operand<B>,
    b: &mut Operand<B>,
    c: &Operand<B>,
) -> Result<()> {
    let neg_a_minus_c_beta = minus(&negated(&a.host), &times(&c.host, s.beta));

    s.run(
        "B += gpu_alpha * (-A - C * beta + A)",
        Mode::AddAssign,
        &s.gpu_alpha * (-a.m() - c.m() * s.beta + a.m()),
        times(&plus(&neg_a_minus_c_beta, &a.host), s.alpha),
        b,
    )?;
    s.run(
        "B += (-A - C * beta + gpu_beta * A) / gpu_alpha",
        Mode::AddAssign,
        (-a.m() - c.m() * s.beta + &s.gpu_beta * a.m()) / &s.gpu_alpha,
        over(&plus(&neg_a_minus_c_beta, &times(&a.host, s.beta)), s.alpha),
        b,
    )?;
    s.run(
        "B -= gpu_alpha * (-A - C * beta - A)",
        Mode::SubAssign,
        &s.gpu_alpha * (-a.m() - c.m() * s.beta - a.m()),
        times(&minus(&neg_a_minus_c_beta, &a.host), s.alpha),
        b,
    )?;
    s.run(
        "B -= (-A - C * beta - gpu_beta * A) / gpu_alpha",
        Mode::SubAssign,
        (-a.m() - c.m() * s.beta - &s.gpu_beta * a.m()) / &s.gpu_alpha,
        over(&minus(&neg_a_minus_c_beta, &times(&a.host, s.beta)), s.alpha),
        b,
    )
}

/// Building dense matrices from range and slice views copies exactly the viewed elements.
pub fn copy_constructors<B: DeviceBackend + 'static>(
    backend: &Arc<B>,
    config: &SuiteConfig,
) -> Result<()> {
    for (role, kind) in [(Role::A, MatrixKind::Range), (Role::B, MatrixKind::Slice)] {
        let order = config.order_of(role);
        let placed = Placed::new(backend, config.dtype, order, role, kind, config.shape())?;
        let expected = oracle::round_to(
            &initial_values(role, config.rows, config.cols),
            config.dtype,
        );

        let copy = placed.matrix.to_dense()?;
        ensure!(copy.kind() == MatrixKind::Dense, "copy of a {} is not dense", kind.name());
        ensure!(!copy.shares_buffer(&placed.matrix), "copy shares storage with its source");
        check_for_equality(&expected, &copy, config.epsilon)
            .with_context(|| format!("dense copy of a {}", kind.name()))?;

        let from_expr = Matrix::from_expr(Arc::clone(backend), config.dtype, &placed.matrix)?;
        check_for_equality(&expected, &from_expr, config.epsilon)
            .with_context(|| format!("matrix built from a {} expression", kind.name()))?;
    }
    Ok(())
}

/// Matrices built from and assigned from the initializer pseudo-matrices. Uses a square
/// `rows x rows` shape so the identity applies.
pub fn initializer_constructors<B: DeviceBackend + 'static>(
    backend: &Arc<B>,
    config: &SuiteConfig,
) -> Result<()> {
    let (n, dtype, epsilon) = (config.rows, config.dtype, config.epsilon);
    let eye = Matrix::from_expr(Arc::clone(backend), dtype, identity::<B>(n))?;
    check_for_equality(&oracle::identity(n), &eye, epsilon).context("identity constructor")?;
    let three = Matrix::from_expr(Arc::clone(backend), dtype, scalar_fill::<B>(n, n, 3.0))?;
    check_for_equality(&oracle::filled(n, n, 3.0), &three, epsilon)
        .context("scalar constructor")?;
    let zeros = Matrix::from_expr(Arc::clone(backend), dtype, zero::<B>(n, n))?;
    check_for_equality(&oracle::zeros(n, n), &zeros, epsilon).context("zero constructor")?;

    let order = config.order_of(Role::C);
    let mut target = Matrix::with_order(Arc::clone(backend), dtype, n, n, order)?;
    target.assign(scalar_fill::<B>(n, n, 7.0))?;
    check_for_equality(&oracle::filled(n, n, 7.0), &target, epsilon).context("scalar fill")?;
    target.assign(identity::<B>(n))?;
    check_for_equality(&oracle::identity(n), &target, epsilon).context("identity assignment")?;
    target.assign(scalar_fill::<B>(n, n, 3.0))?;
    check_for_equality(&oracle::filled(n, n, 3.0), &target, epsilon)
        .context("scalar assignment")?;
    target.assign(zero::<B>(n, n))?;
    check_for_equality(&oracle::zeros(n, n), &target, epsilon).context("zero assignment")
}

/// Norms of C placed dense, as a range and as a slice, read back and kept on the device.
pub fn norms<B: DeviceBackend + 'static>(backend: &Arc<B>, config: &SuiteConfig) -> Result<()> {
    let host = oracle::round_to(
        &initial_values(Role::C, config.rows, config.cols),
        config.dtype,
    );
    for kind in [MatrixKind::Dense, MatrixKind::Range, MatrixKind::Slice] {
        let order = config.order_of(Role::C);
        let placed = Placed::new(backend, config.dtype, order, Role::C, kind, config.shape())?;
        let what = |norm: &str| format!("{norm} of a {}", kind.name());
        let c = &placed.matrix;

        check_scalar(
            &what("frobenius norm"),
            oracle::frobenius(&host),
            c.norm_frobenius()?,
            config.epsilon,
        )?;
        let on_device = linalg::norm_frobenius(c)?;
        check_scalar(
            &what("device frobenius norm"),
            oracle::frobenius(&host),
            on_device.to_host()?,
            config.epsilon,
        )?;
        check_scalar(&what("1-norm"), oracle::norm_1(&host), c.norm_1()?, config.epsilon)?;
        check_scalar(
            &what("inf-norm"),
            oracle::norm_inf(&host),
            c.norm_inf()?,
            config.epsilon,
        )?;

        // A device norm feeds straight back in as a scalar operand.
        let (rows, cols) = config.shape();
        let mut scaled = Matrix::with_order(Arc::clone(backend), config.dtype, rows, cols, order)?;
        scaled.assign(c / &on_device)?;
        let norm = config.dtype.round_trip(oracle::frobenius(&host));
        check_for_equality(
            &oracle::round_to(&over(&host, norm), config.dtype),
            &scaled,
            config.epsilon,
        )
        .with_context(|| what("normalisation by a device norm"))?;
    }
    Ok(())
}

/// `C = 3.1415 * A + 2.7182 * B` on random `f64` operands, within `1e-6`.
pub fn linear_combination<B: DeviceBackend + 'static>(
    backend: &Arc<B>,
    rng: &mut impl rand::Rng,
    rows: usize,
    cols: usize,
) -> Result<()> {
    let host_a = crate::fixtures::random_host(&mut *rng, rows, cols);
    let host_b = crate::fixtures::random_host(&mut *rng, rows, cols);
    let a = Matrix::from_host(Arc::clone(backend), &host_a)?;
    let b = Matrix::from_host(Arc::clone(backend), &host_b)?;
    let mut c = Matrix::zeros(Arc::clone(backend), DType::F64, rows, cols)?;
    c.assign(3.1415 * &a + 2.7182 * &b)?;
    let expected = plus(&times(&host_a, 3.1415), &times(&host_b, 2.7182));
    check_for_equality(&expected, &c, 1e-6).context("linear combination")
}

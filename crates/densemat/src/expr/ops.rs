//! Operator overloads and named elementwise functions building expression trees.
//!
//! Every builder has a fallible `try_*` form. Operator overloads and the plain functions call
//! the fallible form and panic with a descriptive message on error.

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use super::node::Expr;
use crate::backend::spec::{BinaryOp, DeviceBackend, UnaryOp};
use crate::error::Result;
use crate::matrix::{DeviceScalar, Matrix, ScalarOperand};

#[track_caller]
fn unwrap<T>(result: Result<T>, op: &str) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("matrix {op} failed: {err}"),
    }
}

impl<B: DeviceBackend + 'static> From<&Matrix<B>> for Expr<B> {
    fn from(matrix: &Matrix<B>) -> Self {
        matrix.expr()
    }
}

impl<B: DeviceBackend + 'static> From<&Expr<B>> for Expr<B> {
    fn from(expr: &Expr<B>) -> Self {
        expr.clone()
    }
}

impl<B: DeviceBackend + 'static> Expr<B> {
    pub fn try_add(&self, rhs: impl Into<Expr<B>>) -> Result<Self> {
        self.try_binary(BinaryOp::Add, &rhs.into())
    }

    pub fn try_sub(&self, rhs: impl Into<Expr<B>>) -> Result<Self> {
        self.try_binary(BinaryOp::Sub, &rhs.into())
    }

    pub fn try_element_prod(&self, rhs: impl Into<Expr<B>>) -> Result<Self> {
        self.try_binary(BinaryOp::Mul, &rhs.into())
    }

    pub fn try_element_div(&self, rhs: impl Into<Expr<B>>) -> Result<Self> {
        self.try_binary(BinaryOp::Div, &rhs.into())
    }

    pub fn try_element_pow(&self, exponent: impl Into<Expr<B>>) -> Result<Self> {
        self.try_binary(BinaryOp::Pow, &exponent.into())
    }

    /// `self[i][j] ^ alpha`
    pub fn try_element_pow_scalar(&self, alpha: impl Into<ScalarOperand<B>>) -> Result<Self> {
        let exponent = Expr::fill(self.rows(), self.cols(), alpha.into());
        self.try_binary(BinaryOp::Pow, &exponent)
    }
}

/// Lazy transpose of a matrix or expression.
pub fn trans<B: DeviceBackend + 'static>(x: impl Into<Expr<B>>) -> Expr<B> {
    x.into().transpose()
}

pub fn try_element_prod<B: DeviceBackend + 'static>(
    lhs: impl Into<Expr<B>>,
    rhs: impl Into<Expr<B>>,
) -> Result<Expr<B>> {
    lhs.into().try_element_prod(rhs)
}

pub fn element_prod<B: DeviceBackend + 'static>(
    lhs: impl Into<Expr<B>>,
    rhs: impl Into<Expr<B>>,
) -> Expr<B> {
    unwrap(try_element_prod(lhs, rhs), "element_prod")
}

pub fn try_element_div<B: DeviceBackend + 'static>(
    lhs: impl Into<Expr<B>>,
    rhs: impl Into<Expr<B>>,
) -> Result<Expr<B>> {
    lhs.into().try_element_div(rhs)
}

pub fn element_div<B: DeviceBackend + 'static>(
    lhs: impl Into<Expr<B>>,
    rhs: impl Into<Expr<B>>,
) -> Expr<B> {
    unwrap(try_element_div(lhs, rhs), "element_div")
}

pub fn try_element_pow<B: DeviceBackend + 'static>(
    base: impl Into<Expr<B>>,
    exponent: impl Into<Expr<B>>,
) -> Result<Expr<B>> {
    base.into().try_element_pow(exponent)
}

/// `base[i][j] ^ exponent[i][j]`
pub fn element_pow<B: DeviceBackend + 'static>(
    base: impl Into<Expr<B>>,
    exponent: impl Into<Expr<B>>,
) -> Expr<B> {
    unwrap(try_element_pow(base, exponent), "element_pow")
}

pub fn try_element_pow_scalar<B: DeviceBackend + 'static>(
    base: impl Into<Expr<B>>,
    alpha: impl Into<ScalarOperand<B>>,
) -> Result<Expr<B>> {
    base.into().try_element_pow_scalar(alpha)
}

/// `base[i][j] ^ alpha`
pub fn element_pow_scalar<B: DeviceBackend + 'static>(
    base: impl Into<Expr<B>>,
    alpha: impl Into<ScalarOperand<B>>,
) -> Expr<B> {
    unwrap(try_element_pow_scalar(base, alpha), "element_pow_scalar")
}

pub fn try_scalar_pow<B: DeviceBackend + 'static>(
    alpha: impl Into<ScalarOperand<B>>,
    exponent: impl Into<Expr<B>>,
) -> Result<Expr<B>> {
    let exponent = exponent.into();
    Expr::fill(exponent.rows(), exponent.cols(), alpha.into()).try_binary(BinaryOp::Pow, &exponent)
}

/// `alpha ^ exponent[i][j]`
pub fn scalar_pow<B: DeviceBackend + 'static>(
    alpha: impl Into<ScalarOperand<B>>,
    exponent: impl Into<Expr<B>>,
) -> Expr<B> {
    unwrap(try_scalar_pow(alpha, exponent), "scalar_pow")
}

/// Applies any [`UnaryOp`] lazily.
pub fn element_op<B: DeviceBackend + 'static>(op: UnaryOp, x: impl Into<Expr<B>>) -> Expr<B> {
    x.into().unary(op)
}

macro_rules! unary_functions {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            #[doc = concat!("Lazy elementwise `", stringify!($op), "`.")]
            pub fn $name<B: DeviceBackend + 'static>(x: impl Into<Expr<B>>) -> Expr<B> {
                x.into().unary(UnaryOp::$op)
            }
        )*
    };
}

unary_functions! {
    element_abs => Abs,
    element_acos => Acos,
    element_asin => Asin,
    element_atan => Atan,
    element_cos => Cos,
    element_cosh => Cosh,
    element_exp => Exp,
    element_exp2 => Exp2,
    element_exp10 => Exp10,
    element_floor => Floor,
    element_ceil => Ceil,
    element_log => Log,
    element_log2 => Log2,
    element_log10 => Log10,
    element_sin => Sin,
    element_sinh => Sinh,
    element_sqrt => Sqrt,
    element_rsqrt => Rsqrt,
    element_tan => Tan,
    element_tanh => Tanh,
    element_acosh => Acosh,
    element_asinh => Asinh,
    element_atanh => Atanh,
    element_erf => Erf,
    element_erfc => Erfc,
    element_round => Round,
    element_sign => Sign,
    element_trunc => Trunc,
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $try_method:ident, $label:literal) => {
        impl_binary_operator!(@impl $trait, $method, $try_method, $label, [Expr<B>] [Expr<B>]);
        impl_binary_operator!(@impl $trait, $method, $try_method, $label, [Expr<B>] [&'r Expr<B>]);
        impl_binary_operator!(@impl $trait, $method, $try_method, $label, [Expr<B>] [&'r Matrix<B>]);
        impl_binary_operator!(@impl $trait, $method, $try_method, $label, [&'l Expr<B>] [Expr<B>]);
        impl_binary_operator!(@impl $trait, $method, $try_method, $label, [&'l Expr<B>] [&'r Expr<B>]);
        impl_binary_operator!(@impl $trait, $method, $try_method, $label, [&'l Expr<B>] [&'r Matrix<B>]);
        impl_binary_operator!(@impl $trait, $method, $try_method, $label, [&'l Matrix<B>] [Expr<B>]);
        impl_binary_operator!(@impl $trait, $method, $try_method, $label, [&'l Matrix<B>] [&'r Expr<B>]);
        impl_binary_operator!(@impl $trait, $method, $try_method, $label, [&'l Matrix<B>] [&'r Matrix<B>]);
    };
    (@impl $trait:ident, $method:ident, $try_method:ident, $label:literal, [$($lhs:tt)+] [$($rhs:tt)+]) => {
        #[allow(clippy::extra_unused_lifetimes)]
        impl<'l, 'r, B: DeviceBackend + 'static> $trait<$($rhs)+> for $($lhs)+ {
            type Output = Expr<B>;

            #[track_caller]
            fn $method(self, rhs: $($rhs)+) -> Expr<B> {
                unwrap(Expr::from(self).$try_method(rhs), $label)
            }
        }
    };
}

impl_binary_operator!(Add, add, try_add, "add");
impl_binary_operator!(Sub, sub, try_sub, "sub");

macro_rules! impl_neg {
    ($([$($ty:tt)+]),* $(,)?) => {
        $(
            #[allow(clippy::extra_unused_lifetimes)]
            impl<'a, B: DeviceBackend + 'static> Neg for $($ty)+ {
                type Output = Expr<B>;

                fn neg(self) -> Expr<B> {
                    Expr::from(self).unary(UnaryOp::Neg)
                }
            }
        )*
    };
}

impl_neg!([Expr<B>], [&'a Expr<B>], [&'a Matrix<B>]);

// `operand * scalar` and `operand / scalar` for every scalar convertible to `ScalarOperand`.
macro_rules! impl_scalar_rhs {
    ($([$($ty:tt)+]),* $(,)?) => {
        $(
            #[allow(clippy::extra_unused_lifetimes)]
            impl<'a, B, S> Mul<S> for $($ty)+
            where
                B: DeviceBackend + 'static,
                S: Into<ScalarOperand<B>>,
            {
                type Output = Expr<B>;

                #[track_caller]
                fn mul(self, scalar: S) -> Expr<B> {
                    unwrap(Expr::from(self).try_scale(scalar), "scale")
                }
            }

            #[allow(clippy::extra_unused_lifetimes)]
            impl<'a, B, S> Div<S> for $($ty)+
            where
                B: DeviceBackend + 'static,
                S: Into<ScalarOperand<B>>,
            {
                type Output = Expr<B>;

                #[track_caller]
                fn div(self, scalar: S) -> Expr<B> {
                    unwrap(Expr::from(self).try_div_scalar(scalar), "divide")
                }
            }
        )*
    };
}

impl_scalar_rhs!([Expr<B>], [&'a Expr<B>], [&'a Matrix<B>]);

// `scalar * operand` for host scalars.
macro_rules! impl_scalar_lhs {
    ($($scalar:ty),* $(,)?) => {
        $(
            impl_scalar_lhs!(@impl $scalar, [Expr<B>]);
            impl_scalar_lhs!(@impl $scalar, [&'a Expr<B>]);
            impl_scalar_lhs!(@impl $scalar, [&'a Matrix<B>]);
        )*
    };
    (@impl $scalar:ty, [$($ty:tt)+]) => {
        #[allow(clippy::extra_unused_lifetimes)]
        impl<'a, B: DeviceBackend + 'static> Mul<$($ty)+> for $scalar {
            type Output = Expr<B>;

            #[track_caller]
            fn mul(self, operand: $($ty)+) -> Expr<B> {
                unwrap(Expr::from(operand).try_scale(self), "scale")
            }
        }
    };
}

impl_scalar_lhs!(f64, f32, i64, i32);

macro_rules! impl_device_scalar_lhs {
    ($([$($ty:tt)+]),* $(,)?) => {
        $(
            #[allow(clippy::extra_unused_lifetimes)]
            impl<'a, 's, B: DeviceBackend + 'static> Mul<$($ty)+> for &'s DeviceScalar<B> {
                type Output = Expr<B>;

                #[track_caller]
                fn mul(self, operand: $($ty)+) -> Expr<B> {
                    unwrap(Expr::from(operand).try_scale(self), "scale")
                }
            }
        )*
    };
}

impl_device_scalar_lhs!([Expr<B>], [&'a Expr<B>], [&'a Matrix<B>]);

impl<B, E> AddAssign<E> for Matrix<B>
where
    B: DeviceBackend + 'static,
    E: Into<Expr<B>>,
{
    #[track_caller]
    fn add_assign(&mut self, rhs: E) {
        unwrap(self.try_add_assign(rhs), "+=")
    }
}

impl<B, E> SubAssign<E> for Matrix<B>
where
    B: DeviceBackend + 'static,
    E: Into<Expr<B>>,
{
    #[track_caller]
    fn sub_assign(&mut self, rhs: E) {
        unwrap(self.try_sub_assign(rhs), "-=")
    }
}

impl<B, S> MulAssign<S> for Matrix<B>
where
    B: DeviceBackend + 'static,
    S: Into<ScalarOperand<B>>,
{
    #[track_caller]
    fn mul_assign(&mut self, scalar: S) {
        unwrap(self.try_mul_assign(scalar), "*=")
    }
}

impl<B, S> DivAssign<S> for Matrix<B>
where
    B: DeviceBackend + 'static,
    S: Into<ScalarOperand<B>>,
{
    #[track_caller]
    fn div_assign(&mut self, scalar: S) {
        unwrap(self.try_div_assign(scalar), "/=")
    }
}

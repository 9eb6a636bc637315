pub mod norm;

pub use norm::{norm_1, norm_frobenius, norm_inf, norm_of_expr, reduce};

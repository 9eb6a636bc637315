pub mod init;
pub(crate) mod node;
pub mod ops;

pub use init::{identity, scalar_fill, zero};
pub use node::{Expr, ScaleOp};
pub use ops::*;

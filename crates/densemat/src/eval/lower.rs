//! Lowering of expression trees to a single fused postfix program.

use crate::backend::spec::{
    Access, BackendError, BackendResult, BinaryOp, DeviceBackend, FusedProgram, FusedStep,
    Operand, Region,
};
use crate::expr::node::Node;
use crate::expr::{Expr, ScaleOp};

/// A lowered statement: the fused program plus the bounds of every region it reads.
pub(crate) struct Lowered {
    pub program: FusedProgram,
    /// `(access, buffer element count)` for every region operand.
    pub bounds: Vec<(Access, usize)>,
}

struct Lowerer {
    program: FusedProgram,
    bounds: Vec<(Access, usize)>,
}

impl Lowerer {
    fn load(&mut self, operand: Operand) {
        let idx = match self.program.operands.iter().position(|o| *o == operand) {
            Some(idx) => idx,
            None => {
                self.program.operands.push(operand);
                self.program.operands.len() - 1
            }
        };
        self.program.steps.push(FusedStep::Load(idx));
    }

    // Transposes are pushed down to the leaves: a transposed leaf reads with swapped steps,
    // every other node is elementwise and commutes with the transpose.
    fn visit<B: DeviceBackend + 'static>(&mut self, expr: &Expr<B>, transposed: bool) {
        match expr.node() {
            Node::Leaf(matrix) => {
                let access = if transposed {
                    matrix.access().transposed()
                } else {
                    matrix.access()
                };
                self.bounds
                    .push((access, matrix.buffer_spec().element_count()));
                self.load(Operand::Region(access));
            }
            Node::Fill(scalar) => self.load(scalar.operand()),
            Node::Identity => self.load(Operand::Identity),
            Node::Transpose(inner) => self.visit(inner, !transposed),
            Node::Unary(op, inner) => {
                self.visit(inner, transposed);
                self.program.steps.push(FusedStep::Unary(*op));
            }
            Node::Binary(op, lhs, rhs) => {
                self.visit(lhs, transposed);
                self.visit(rhs, transposed);
                self.program.steps.push(FusedStep::Binary(*op));
            }
            Node::Scaled {
                scalar,
                op,
                operand,
            } => {
                self.visit(operand, transposed);
                self.load(scalar.operand());
                let op = match op {
                    ScaleOp::Mul => BinaryOp::Mul,
                    ScaleOp::Div => BinaryOp::Div,
                };
                self.program.steps.push(FusedStep::Binary(op));
            }
        }
    }
}

pub(crate) fn lower<B: DeviceBackend + 'static>(expr: &Expr<B>) -> Lowered {
    let mut lowerer = Lowerer {
        program: FusedProgram::default(),
        bounds: Vec::new(),
    };
    lowerer.visit(expr, false);
    Lowered {
        program: lowerer.program,
        bounds: lowerer.bounds,
    }
}

/// Ensures every region read over a `rows x cols` walk stays inside its buffer.
pub(crate) fn check_bounds(bounds: &[(Access, usize)], target: &Region) -> BackendResult<()> {
    for (access, len) in bounds {
        if let Some((_, max_offset)) = access.span(target.rows, target.cols) {
            if max_offset >= *len {
                return Err(BackendError::RegionOutOfBounds {
                    buffer: access.buffer,
                    max_offset,
                    len: *len,
                });
            }
        }
    }
    Ok(())
}

//! Control-flow graph accessors.
//!
//! Spec §6 lists "cfg-predecessor-block access" among the operations
//! consumed from collaborators; in a full compiler this is a separate,
//! precomputed pass (`cranelift-codegen::flowgraph::ControlFlowGraph`).
//! Here it is a thin read-only view over [`crate::ir::Function`]'s own
//! `preds`/`succs` vectors, named and shaped the same way so the liveness
//! analyzer's code reads identically to the teacher's.

use crate::ir::{Block, Function};

/// A read-only view of a function's control-flow edges.
pub struct ControlFlowGraph<'f> {
    func: &'f Function,
}

impl<'f> ControlFlowGraph<'f> {
    /// Borrow the CFG implied by `func`'s block predecessor/successor
    /// lists.
    pub fn new(func: &'f Function) -> Self {
        Self { func }
    }

    /// Predecessor blocks of `block`, in the order phi arguments are
    /// aligned with.
    pub fn preds(&self, block: Block) -> &[Block] {
        &self.func.blocks[block].preds
    }

    /// Successor blocks of `block`.
    pub fn succs(&self, block: Block) -> &[Block] {
        &self.func.blocks[block].succs
    }

    /// The predecessor block at phi-operand position `pos` of `block`.
    pub fn pred_block(&self, block: Block, pos: usize) -> Block {
        self.func.blocks[block].preds[pos]
    }
}

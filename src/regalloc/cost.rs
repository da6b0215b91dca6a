//! Copy-cost functions (spec §4.C).
//!
//! Three selectable ways to weigh a potential copy between a root and one
//! of its OU members, all returning an integer `>= 1`: execution
//! frequency, loop depth, or a flat `1` (minimizes copy *count* instead of
//! weighted cost). Selected via [`crate::options::CostFn`].

use crate::cfg::ControlFlowGraph;
use crate::ir::{Block, Function, Value};
use crate::options::CostFn;
use cranelift_entity::SecondaryMap;

/// A cached, per-graph cost model.
///
/// Mirrors the way `cranelift-codegen`'s passes memoize per-block derived
/// quantities (e.g. `live_value_tracker`'s per-block snapshots) rather
/// than recomputing them per query: "Frequencies are computed once per
/// graph and cached until the graph changes" (spec §4.C).
pub struct CostModel {
    kind: CostFn,
    freq: SecondaryMap<Block, u32>,
}

impl CostModel {
    /// Build a cost model of the requested `kind`, caching whatever
    /// per-block quantity it needs from `func`.
    pub fn new(func: &Function, kind: CostFn) -> Self {
        let mut freq = SecondaryMap::new();
        if let CostFn::Freq = kind {
            for (b, data) in func.blocks.iter() {
                freq[b] = data.frequency;
            }
        }
        Self { kind, freq }
    }

    /// Which variant this model computes.
    pub fn kind(&self) -> CostFn {
        self.kind
    }

    /// The block a potential copy between `root` and its operand at phi
    /// position `pos` (or `-1` for a perm/two-address root) is charged
    /// against: the phi's incoming-edge predecessor block for phi roots,
    /// the root's own block otherwise (spec §4.C, #1 and #2 both key off
    /// "block-of-copy").
    pub fn block_of_copy(&self, func: &Function, cfg: &ControlFlowGraph, root: Value, pos: i32) -> Block {
        if pos >= 0 && func.is_phi(root) {
            cfg.pred_block(func.def_block(root), pos as usize)
        } else {
            func.def_block(root)
        }
    }

    /// The cost of a potential copy for `root` at phi operand position
    /// `pos` (`-1` for perm/two-address roots).
    pub fn cost(&self, func: &Function, cfg: &ControlFlowGraph, root: Value, pos: i32) -> u32 {
        let block = self.block_of_copy(func, cfg, root, pos);
        match self.kind {
            CostFn::Freq => self.freq[block].max(1),
            CostFn::Loop => {
                let depth = func.blocks[block].loop_depth;
                1 + depth * depth
            }
            CostFn::One => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Constraint, Def, RegClass};

    fn two_block_phi() -> (Function, Block, Block, Value) {
        let mut f = Function::new();
        f.classes.push(RegClass::new("GPR", 4));
        let entry = f.make_block();
        let header = f.make_block();
        f.add_edge(entry, header);
        f.blocks[entry].frequency = 7;
        f.blocks[header].loop_depth = 2;
        let a = f.make_value(
            Def::Normal {
                block: entry,
                args: vec![],
            },
            0,
            Constraint::normal(),
        );
        let phi = f.make_value(
            Def::Phi {
                block: header,
                args: vec![a],
            },
            0,
            Constraint::normal(),
        );
        f.recompute_uses();
        (f, entry, header, phi)
    }

    #[test]
    fn freq_cost_uses_predecessor_block_frequency() {
        let (f, _entry, _header, phi) = two_block_phi();
        let cfg = ControlFlowGraph::new(&f);
        let model = CostModel::new(&f, CostFn::Freq);
        assert_eq!(model.cost(&f, &cfg, phi, 0), 7);
    }

    #[test]
    fn loop_cost_squares_depth() {
        let (f, _entry, _header, phi) = two_block_phi();
        let cfg = ControlFlowGraph::new(&f);
        // entry (the pred block for phi operand 0) has loop_depth 0.
        let model = CostModel::new(&f, CostFn::Loop);
        assert_eq!(model.cost(&f, &cfg, phi, 0), 1);
    }

    #[test]
    fn one_cost_is_always_one() {
        let (f, _entry, _header, phi) = two_block_phi();
        let cfg = ControlFlowGraph::new(&f);
        let model = CostModel::new(&f, CostFn::One);
        assert_eq!(model.cost(&f, &cfg, phi, 0), 1);
    }
}

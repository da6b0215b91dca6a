//! Interblock liveness analysis (spec §4.L).
//!
//! Produces the three block-local predicates `is_live_in/out/end` and the
//! derived `interfere(u, v)` the rest of the engine is built on. The
//! storage shape — one sorted array per block of `{value, flags}`
//! records — is exactly spec §3's "Liveness set": `cranelift-codegen`'s
//! own liveness module keeps per-value live ranges in a B-forest
//! (`cranelift_bforest::Map`) rather than per-block flag arrays, because
//! it needs fine-grained program-point ranges for spilling; this engine
//! only ever asks block-granular in/out/end/interference questions, so
//! the simpler per-block sorted-`Vec` scheme spec §4.L spells out is used
//! instead (see DESIGN.md).

use crate::cfg::ControlFlowGraph;
use crate::dominator::DominatorTree;
use crate::ir::{Block, Function, Value};
use cranelift_entity::SecondaryMap;

/// Which liveness facts hold for a `(block, value)` pair.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LiveFlags(u8);

impl LiveFlags {
    /// Live at block entry.
    pub const IN: LiveFlags = LiveFlags(0b001);
    /// Live at block exit (flows into at least one successor).
    pub const OUT: LiveFlags = LiveFlags(0b010);
    /// Live through the block's terminator.
    pub const END: LiveFlags = LiveFlags(0b100);

    fn contains(self, other: LiveFlags) -> bool {
        self.0 & other.0 == other.0
    }

    fn union(self, other: LiveFlags) -> LiveFlags {
        LiveFlags(self.0 | other.0)
    }
}

impl core::ops::BitOr for LiveFlags {
    type Output = LiveFlags;
    fn bitor(self, rhs: LiveFlags) -> LiveFlags {
        self.union(rhs)
    }
}

#[derive(Copy, Clone, Debug)]
struct LiveRecord {
    value: Value,
    flags: LiveFlags,
}

/// Per-block, per-value liveness facts, plus the derived `interfere`
/// predicate.
///
/// Owned by the driver for the duration of a `(graph, class)` run (spec
/// §3 "Ownership": "Liveness sets are owned by a per-graph `liveness`
/// handle whose lifetime spans the driver invocation").
#[derive(Default)]
pub struct Liveness {
    sets: SecondaryMap<Block, Vec<LiveRecord>>,
    /// `(rpo block number, position within block)` for every value that
    /// has been introduced, used to order the two ends of an
    /// `interfere` query and to bound same-block interference by
    /// program position.
    order: SecondaryMap<Value, (u32, u32)>,
    rpo_number: SecondaryMap<Block, u32>,
}

fn insert_or_merge(set: &mut Vec<LiveRecord>, value: Value, flags: LiveFlags) -> bool {
    match set.binary_search_by_key(&value, |r| r.value) {
        Ok(i) => {
            set[i].flags = set[i].flags | flags;
            false
        }
        Err(i) => {
            set.insert(i, LiveRecord { value, flags });
            true
        }
    }
}

impl Liveness {
    /// An empty liveness analysis, not yet computed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard all computed sets, ready for `compute` to be called again.
    pub fn clear(&mut self) {
        for set in self.sets.values_mut() {
            set.clear();
        }
        self.order.clear();
    }

    /// Run the backwards dataflow of spec §4.L over every value in
    /// `func`, rooted at `entry`.
    pub fn compute(&mut self, func: &Function, entry: Block) {
        let _tt = crate::timing::liveness();
        self.clear();
        let domtree = DominatorTree::compute(func, entry);
        let cfg = ControlFlowGraph::new(func);
        for (i, &b) in domtree.rpo().iter().enumerate() {
            self.rpo_number[b] = i as u32;
            for (pos, &v) in func.blocks[b].defs.iter().enumerate() {
                self.order[v] = (i as u32, pos as u32);
            }
            let _ = &func.blocks[b].defs;
        }
        for (v, _) in func.values.iter() {
            self.introduce(func, &cfg, v);
        }
    }

    /// Per-value propagation step 1 of spec §4.L: push liveness out from
    /// every use of `v` back towards its definition.
    pub fn introduce(&mut self, func: &Function, cfg: &ControlFlowGraph, v: Value) {
        let d = func.def_block(v);
        for &(u, pos) in func.uses_of(v) {
            let user_block = func.def_block(u);
            if func.is_phi(u) {
                let p = cfg.pred_block(user_block, pos);
                self.live_end_at(cfg, v, p, LiveFlags::END, d);
            } else if user_block != d {
                insert_or_merge(&mut self.sets[user_block], v, LiveFlags::IN);
                for &pred in cfg.preds(user_block) {
                    self.live_end_at(cfg, v, pred, LiveFlags::END | LiveFlags::OUT, d);
                }
            }
        }
    }

    /// Remove `v` from every block's liveness set in the dominance
    /// subtree rooted at its definition (spec §4.L mutation hook
    /// `remove`).
    pub fn remove(&mut self, domtree: &DominatorTree, func: &Function, v: Value) {
        let d = func.def_block(v);
        let sets = &mut self.sets;
        domtree.walk_subtree(d, |b| {
            if let Ok(i) = sets[b].binary_search_by_key(&v, |r| r.value) {
                sets[b].remove(i);
            }
        });
    }

    /// `remove` followed by `introduce`: bring `v`'s liveness up to date
    /// after its use list has changed (spec §4.L mutation hook `update`).
    pub fn update(&mut self, domtree: &DominatorTree, func: &Function, cfg: &ControlFlowGraph, v: Value) {
        self.remove(domtree, func, v);
        self.introduce(func, cfg, v);
    }

    /// Propagation step 2 of spec §4.L: set `bits` at `(block, v)`; if the
    /// state there was previously empty and `block` isn't `v`'s
    /// definition block, mark it live-in there too and recurse into every
    /// predecessor with `END | OUT`. "Previously empty" makes this
    /// at-most-once per block.
    fn live_end_at(&mut self, cfg: &ControlFlowGraph, v: Value, block: Block, bits: LiveFlags, def_block: Block) {
        let was_new = insert_or_merge(&mut self.sets[block], v, bits);
        if was_new && block != def_block {
            insert_or_merge(&mut self.sets[block], v, LiveFlags::IN);
            for &pred in cfg.preds(block) {
                self.live_end_at(cfg, v, pred, LiveFlags::END | LiveFlags::OUT, def_block);
            }
        }
    }

    fn flags(&self, block: Block, v: Value) -> Option<LiveFlags> {
        self.sets[block]
            .binary_search_by_key(&v, |r| r.value)
            .ok()
            .map(|i| self.sets[block][i].flags)
    }

    /// Is `v` live at the entry of `block`?
    pub fn is_live_in(&self, block: Block, v: Value) -> bool {
        self.flags(block, v).map_or(false, |f| f.contains(LiveFlags::IN))
    }

    /// Is `v` live at the exit of `block` (flows into a successor)?
    pub fn is_live_out(&self, block: Block, v: Value) -> bool {
        self.flags(block, v).map_or(false, |f| f.contains(LiveFlags::OUT))
    }

    /// Is `v` live through `block`'s terminator?
    pub fn is_live_end(&self, block: Block, v: Value) -> bool {
        self.flags(block, v).map_or(false, |f| f.contains(LiveFlags::END))
    }

    /// Last position, within `block`'s program order, at which `v` is
    /// used. `None` if `v` has no use in `block`.
    fn last_use_position_in(&self, func: &Function, v: Value, block: Block) -> Option<u32> {
        func.uses_of(v)
            .iter()
            .filter_map(|&(user, _)| {
                if func.def_block(user) == block {
                    self.order.get(user).copied().map(|(_, pos)| pos)
                } else {
                    None
                }
            })
            .max()
    }

    /// Exact interference check (spec §4.L "Interference").
    ///
    /// Two SSA values interfere iff, taking whichever is defined first in
    /// program/dominance order as `early`, `early` is still live at the
    /// point `late` is defined: either `early` reaches into `late`'s
    /// block at all (is live-in there, or is defined there earlier in
    /// program order) and either flows all the way through the block
    /// (`OUT`/`END`) or has a use at or after `late`'s position.
    pub fn interfere(&self, func: &Function, u: Value, v: Value) -> bool {
        if u == v {
            return false;
        }
        let ou = self.order.get(u).copied().unwrap_or((0, 0));
        let ov = self.order.get(v).copied().unwrap_or((0, 0));
        let (early, late, early_pos) = if ou <= ov { (u, v, ou) } else { (v, u, ov) };
        let late_block = func.def_block(late);
        let (_, late_pos) = self.order.get(late).copied().unwrap_or((0, 0));

        let reaches = if func.def_block(early) == late_block {
            early_pos.1 < late_pos
        } else {
            self.is_live_in(late_block, early)
        };
        if !reaches {
            return false;
        }
        if self.is_live_out(late_block, early) || self.is_live_end(late_block, early) {
            return true;
        }
        match self.last_use_position_in(func, early, late_block) {
            Some(pos) => pos >= late_pos,
            None => false,
        }
    }

    /// Fast companion check (spec §4.L "a fast companion check (`lv_chk`)
    /// may be used interchangeably and must agree with the exact form").
    ///
    /// This variant skips the intra-block use-position refinement and
    /// only consults block-granular flags, at the cost of being
    /// conservative within the shared block (it may report interference
    /// where `interfere` would not, on the last use of a value feeding
    /// the instruction that re-defines it). It is cheap: no scan of
    /// `uses_of`, only two flag lookups.
    pub fn interfere_fast(&self, func: &Function, u: Value, v: Value) -> bool {
        if u == v {
            return false;
        }
        let ou = self.order.get(u).copied().unwrap_or((0, 0));
        let ov = self.order.get(v).copied().unwrap_or((0, 0));
        let (early, late, early_pos) = if ou <= ov { (u, v, ou) } else { (v, u, ov) };
        let late_block = func.def_block(late);
        if func.def_block(early) == late_block {
            let (_, late_pos) = self.order.get(late).copied().unwrap_or((0, 0));
            return early_pos.1 < late_pos;
        }
        self.is_live_in(late_block, early)
    }
}

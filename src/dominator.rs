//! Dominator tree.
//!
//! Spec §6 lists "dominator tree walk" among the operations consumed from
//! collaborators, used by the liveness analyzer's `remove(v)` mutation
//! hook (spec §4.L: "walk the dominance subtree rooted at `def-block(v)`
//! and delete `v` from every block's array"). A full compiler computes
//! this once per function and reuses it across passes
//! (`cranelift-codegen::dominator_tree::DominatorTree`); here it is
//! computed directly from the CFG with the standard iterative
//! Cooper/Harvey/Kennedy algorithm.

use crate::cfg::ControlFlowGraph;
use crate::ir::{Block, Function};
use cranelift_entity::SecondaryMap;

/// Immediate-dominator tree over a function's blocks, plus a
/// reverse-postorder numbering used to walk dominance subtrees.
pub struct DominatorTree {
    idom: SecondaryMap<Block, Option<Block>>,
    rpo: Vec<Block>,
    rpo_number: SecondaryMap<Block, u32>,
    children: SecondaryMap<Block, Vec<Block>>,
}

impl DominatorTree {
    /// Compute the dominator tree of `func` rooted at `entry`.
    pub fn compute(func: &Function, entry: Block) -> Self {
        let cfg = ControlFlowGraph::new(func);
        let rpo = reverse_postorder(func, entry);
        let mut rpo_number = SecondaryMap::new();
        for (i, &b) in rpo.iter().enumerate() {
            rpo_number[b] = i as u32;
        }

        let mut idom: SecondaryMap<Block, Option<Block>> = SecondaryMap::new();
        idom[entry] = Some(entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &b in rpo.iter().skip(1) {
                let mut new_idom = None;
                for &p in cfg.preds(b) {
                    if idom[p].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(cur) => intersect(&idom, &rpo_number, cur, p),
                    });
                }
                if new_idom.is_some() && idom[b] != new_idom {
                    idom[b] = new_idom;
                    changed = true;
                }
            }
        }
        idom[entry] = None;

        let mut children: SecondaryMap<Block, Vec<Block>> = SecondaryMap::new();
        for &b in &rpo {
            if let Some(id) = idom[b] {
                children[id].push(b);
            }
        }

        Self {
            idom,
            rpo,
            rpo_number,
            children,
        }
    }

    /// The immediate dominator of `block`, or `None` for the entry block
    /// (or an unreachable block).
    pub fn idom(&self, block: Block) -> Option<Block> {
        self.idom[block]
    }

    /// Does `a` dominate `b` (reflexively)?
    pub fn dominates(&self, a: Block, b: Block) -> bool {
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            match self.idom[cur] {
                Some(next) if next != cur => cur = next,
                _ => return cur == a,
            }
        }
    }

    /// Call `f` on every block in the dominance subtree rooted at `root`
    /// (including `root` itself), in preorder.
    pub fn walk_subtree(&self, root: Block, mut f: impl FnMut(Block)) {
        let mut stack = vec![root];
        while let Some(b) = stack.pop() {
            f(b);
            stack.extend(self.children[b].iter().copied());
        }
    }

    /// Blocks in reverse-postorder.
    pub fn rpo(&self) -> &[Block] {
        &self.rpo
    }
}

fn intersect(
    idom: &SecondaryMap<Block, Option<Block>>,
    rpo_number: &SecondaryMap<Block, u32>,
    mut a: Block,
    mut b: Block,
) -> Block {
    while a != b {
        while rpo_number[a] > rpo_number[b] {
            a = idom[a].expect("no idom during intersect");
        }
        while rpo_number[b] > rpo_number[a] {
            b = idom[b].expect("no idom during intersect");
        }
    }
    a
}

fn reverse_postorder(func: &Function, entry: Block) -> Vec<Block> {
    let cfg = ControlFlowGraph::new(func);
    let mut visited = SecondaryMap::new();
    let mut postorder = Vec::new();
    // (block, next successor index to visit)
    let mut stack: Vec<(Block, usize)> = vec![(entry, 0)];
    visited[entry] = true;
    while let Some(&mut (b, ref mut i)) = stack.last_mut() {
        let succs = cfg.succs(b);
        if *i < succs.len() {
            let s = succs[*i];
            *i += 1;
            if !visited[s] {
                visited[s] = true;
                stack.push((s, 0));
            }
        } else {
            postorder.push(b);
            stack.pop();
        }
    }
    postorder.reverse();
    postorder
}

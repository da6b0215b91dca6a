//! Statistics & dump (spec §4.S).
//!
//! Aggregates the before/after counters the driver reports, and is the
//! source of the four scalar quantities spec §6 exposes directly
//! (`max_copy_costs`, `copy_costs`, `inevitable_copy_costs`,
//! `lower_bound`). None of this mutates the coloring; it is pure
//! read-back over an OU list and (optionally) an affinity graph, the way
//! `cranelift-codegen`'s own passes report through `context::Context`
//! rather than through the pass structs themselves.

use crate::ir::Function;
use crate::regalloc::affinity_graph::AffinityGraph;
use crate::regalloc::liveness::Liveness;
use crate::regalloc::ou::Ou;

/// `all_nodes_costs` summed over every unit: the cost paid if nothing at
/// all were coalesced.
pub fn max_copy_costs(units: &[Ou]) -> u32 {
    units.iter().map(|u| u.all_nodes_costs).sum()
}

/// Cost of operands that interfere with their unit's root and can never
/// be coalesced, summed over every unit.
pub fn inevitable_copy_costs(units: &[Ou]) -> u32 {
    units.iter().map(|u| u.inevitable_costs).sum()
}

/// A computable lower bound on the achievable cost: inevitable cost plus
/// each unit's best case (spec §8 property #3: `copy_costs_after >=
/// lower_bound >= inevitable_copy_costs`).
pub fn lower_bound(units: &[Ou]) -> u32 {
    inevitable_copy_costs(units) + units.iter().map(|u| u.min_nodes_costs).sum::<u32>()
}

/// The cost actually unsatisfied by the current coloring: for every unit
/// member whose color differs from its root's, its cost is still owed.
pub fn copy_costs(func: &Function, units: &[Ou]) -> u32 {
    units
        .iter()
        .map(|u| {
            let root_color = func.color(u.root());
            (1..u.nodes.len())
                .filter(|&i| func.color(u.nodes[i]) != root_color)
                .map(|i| u.costs[i])
                .sum::<u32>()
        })
        .sum()
}

/// Number of unit members (across every unit) still mismatched with
/// their root.
pub fn unsatisfied_edges(func: &Function, units: &[Ou]) -> usize {
    units
        .iter()
        .map(|u| {
            let root_color = func.color(u.root());
            (1..u.nodes.len())
                .filter(|&i| func.color(u.nodes[i]) != root_color)
                .count()
        })
        .sum()
}

/// Number of affinity edges whose endpoints the *fast* companion
/// interference checker disagrees on with the exact one having reported
/// non-interference at construction time (spec §4.L "an inconsistency
/// between the exact and companion checkers is a diagnostic event
/// only"). Always `0` unless the two checkers have actually diverged.
pub fn aff_int(func: &Function, live: &Liveness, graph: &AffinityGraph) -> usize {
    let mut count = 0;
    for u in graph.nodes() {
        for edge in graph.neighbours(u) {
            if u < edge.other && live.interfere_fast(func, u, edge.other) {
                count += 1;
            }
        }
    }
    count
}

/// A snapshot of every counter spec §4.S names, taken at one point in the
/// driver's run (either "before" or "after" solving).
#[derive(Clone, Debug, Default)]
pub struct Stats {
    /// Distinct values participating in at least one affinity edge.
    pub affinity_nodes: usize,
    /// Distinct affinity edges.
    pub affinity_edges: usize,
    /// `max_copy_costs`.
    pub max_copy_costs: u32,
    /// `inevitable_copy_costs`.
    pub inevitable_copy_costs: u32,
    /// `copy_costs` at the time of the snapshot.
    pub copy_costs: u32,
    /// `lower_bound`.
    pub lower_bound: u32,
    /// `aff_int`.
    pub aff_int: usize,
    /// `unsatisfied_edges`.
    pub unsatisfied_edges: usize,
}

/// Take a full snapshot of `units`/`graph` against `func`'s current
/// coloring.
pub fn complete_stats(
    func: &Function,
    live: &Liveness,
    units: &[Ou],
    graph: &AffinityGraph,
) -> Stats {
    Stats {
        affinity_nodes: graph.node_count(),
        affinity_edges: graph.edge_count(),
        max_copy_costs: max_copy_costs(units),
        inevitable_copy_costs: inevitable_copy_costs(units),
        copy_costs: copy_costs(func, units),
        lower_bound: lower_bound(units),
        aff_int: aff_int(func, live, graph),
        unsatisfied_edges: unsatisfied_edges(func, units),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ControlFlowGraph;
    use crate::ir::{Constraint, Def, RegClass};
    use crate::options::CostFn;
    use crate::regalloc::cost::CostModel;
    use crate::regalloc::ou;

    #[test]
    fn lower_bound_never_exceeds_max_cost() {
        let mut f = Function::new();
        f.classes.push(RegClass::new("GPR", 4));
        let entry = f.make_block();
        f.blocks[entry].frequency = 6;
        let a = f.make_value(
            Def::Normal {
                block: entry,
                args: vec![],
            },
            0,
            Constraint::normal(),
        );
        let r = f.make_value(
            Def::Normal {
                block: entry,
                args: vec![a],
            },
            0,
            Constraint::should_be_same(0),
        );
        f.recompute_uses();
        let cfg = ControlFlowGraph::new(&f);
        let mut live = Liveness::new();
        live.compute(&f, entry);
        let cost = CostModel::new(&f, CostFn::Freq);
        let units = ou::build_all(&f, &cfg, &live, &cost, &crate::options::Options::default());
        assert!(lower_bound(&units) <= max_copy_costs(&units));
        assert!(inevitable_copy_costs(&units) <= lower_bound(&units));
        let _ = r;
    }
}

//! Affinity graph construction (spec §4.A).
//!
//! A dual, graph-shaped view of the same copy-related couplings the OU
//! builder produces: an undirected multigraph of non-interfering value
//! pairs, collapsed to one weighted edge per pair. Some coalescing
//! algorithms (an ILP or PBQP solver plugged in through
//! [`crate::options::AlgoEntry`]) want this view instead of, or in
//! addition to, the OU list; the heuristic solver in this crate does not
//! need it and builds it only when `Options::dump` or a future algorithm
//! asks for it (spec §2 driver step 2: "if the selected algorithm needs
//! the graph view").

use crate::ir::Value;
use crate::regalloc::ou::Ou;
use crate::HashMap;

/// One neighbour entry in an [`AffinityGraph`] adjacency list.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AffinityEdge {
    /// The neighbouring value.
    pub other: Value,
    /// Cumulative weight of all copies that want `other` to share a color
    /// with this node's value.
    pub cost: u32,
}

/// An undirected, weighted multigraph of copy-related, non-interfering
/// value pairs, collapsed so each unordered pair has exactly one edge.
///
/// Stored as `{value -> neighbours}` with both endpoints of every edge
/// carrying a symmetric entry (spec §3 "Affinity node/edge").
#[derive(Default)]
pub struct AffinityGraph {
    adjacency: HashMap<Value, Vec<AffinityEdge>>,
}

impl AffinityGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or add weight to) the edge `(u, v)`.
    pub fn add_edge(&mut self, u: Value, v: Value, cost: u32) {
        if cost == 0 || u == v {
            return;
        }
        insert_or_add(&mut self.adjacency, u, v, cost);
        insert_or_add(&mut self.adjacency, v, u, cost);
    }

    /// Build the graph from an already-constructed OU list: each OU's
    /// root-to-member pairs are exactly the eligible, non-interfering
    /// pairs spec §4.A enumerates, with costs already merged the same way
    /// repeated insertions on the OU side are (spec §4.O and §4.A use the
    /// identical candidate-pair rule).
    pub fn from_ous(units: &[Ou]) -> Self {
        let mut g = Self::new();
        for ou in units {
            let root = ou.root();
            for i in 1..ou.nodes.len() {
                g.add_edge(root, ou.nodes[i], ou.costs[i]);
            }
        }
        g
    }

    /// Number of distinct values that participate in at least one edge.
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of distinct unordered edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(|n| n.len()).sum::<usize>() / 2
    }

    /// Sum of every edge's weight (each edge counted once).
    pub fn total_weight(&self) -> u64 {
        self.adjacency
            .values()
            .flat_map(|n| n.iter())
            .map(|e| u64::from(e.cost))
            .sum::<u64>()
            / 2
    }

    /// Neighbours of `v`, empty if `v` has no affinity edges.
    pub fn neighbours(&self, v: Value) -> &[AffinityEdge] {
        self.adjacency.get(&v).map_or(&[], |n| n.as_slice())
    }

    /// Iterate every value with at least one affinity edge.
    pub fn nodes(&self) -> impl Iterator<Item = Value> + '_ {
        self.adjacency.keys().copied()
    }
}

fn insert_or_add(adjacency: &mut HashMap<Value, Vec<AffinityEdge>>, from: Value, to: Value, cost: u32) {
    let entries = adjacency.entry(from).or_insert_with(Vec::new);
    if let Some(e) = entries.iter_mut().find(|e| e.other == to) {
        e.cost += cost;
    } else {
        entries.push(AffinityEdge { other: to, cost });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Constraint, Def, Function, RegClass};
    use crate::regalloc::cost::CostModel;
    use crate::regalloc::liveness::Liveness;
    use crate::regalloc::ou;
    use cranelift_entity::EntityRef;

    #[test]
    fn repeated_pair_weights_merge() {
        let mut g = AffinityGraph::new();
        let a = Value::new(0);
        let b = Value::new(1);
        g.add_edge(a, b, 3);
        g.add_edge(a, b, 4);
        assert_eq!(g.neighbours(a), &[AffinityEdge { other: b, cost: 7 }]);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.total_weight(), 7);
    }

    #[test]
    fn built_from_phi_ou() {
        let mut f = Function::new();
        f.classes.push(RegClass::new("GPR", 4));
        let entry = f.make_block();
        let header = f.make_block();
        f.add_edge(entry, header);
        let a = f.make_value(
            Def::Normal {
                block: entry,
                args: vec![],
            },
            0,
            Constraint::normal(),
        );
        let r = f.make_value(
            Def::Phi {
                block: header,
                args: vec![a],
            },
            0,
            Constraint::normal(),
        );
        f.recompute_uses();
        let cfg = crate::cfg::ControlFlowGraph::new(&f);
        let mut live = Liveness::new();
        live.compute(&f, entry);
        let cost = CostModel::new(&f, crate::options::CostFn::One);
        let units = vec![ou::build_ou(&f, &cfg, &live, &cost, r).unwrap().unwrap()];
        let g = AffinityGraph::from_ous(&units);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.neighbours(r), &[AffinityEdge { other: a, cost: 1 }]);
    }
}

//! The Appel/George register-coalescing contest text format (spec §6).
//!
//! `N K\n` header (`N` total nodes including the `K` pre-colored register
//! nodes `0..K`), followed by `a b w\n` edge lines: `w = -1` for an
//! interference edge, `w > 0` for an affinity edge carrying that weight.
//! Every edge satisfies `a < b`; one interference edge is also emitted
//! from each register a value cannot take to that value's node.

use crate::ir::{Function, Value};
use crate::regalloc::affinity_graph::AffinityGraph;
use crate::regalloc::liveness::Liveness;
use crate::HashMap;
use core::fmt::Write as _;

/// Render the interference + affinity graph of `class_idx` in the
/// Appel/George contest format.
pub fn export(
    func: &Function,
    class_idx: usize,
    live: &Liveness,
    graph: &AffinityGraph,
) -> String {
    let class = &func.classes[class_idx];
    let k = class.n_regs as usize;

    let mut values = func.values_in_class(class_idx);
    values.sort();
    let n = k + values.len();

    let mut node_id: HashMap<Value, usize> = HashMap::with_capacity(values.len());
    for (i, &v) in values.iter().enumerate() {
        node_id.insert(v, k + i);
    }

    let mut out = String::new();
    let _ = writeln!(out, "{} {}", n, k);

    for i in 0..values.len() {
        for j in (i + 1)..values.len() {
            let (a, b) = (values[i], values[j]);
            if live.interfere(func, a, b) {
                let _ = writeln!(out, "{} {} -1", node_id[&a], node_id[&b]);
            }
        }
    }

    for u in graph.nodes() {
        for edge in graph.neighbours(u) {
            if u < edge.other {
                let _ = writeln!(out, "{} {} {}", node_id[&u], node_id[&edge.other], edge.cost);
            }
        }
    }

    for &v in &values {
        let nv = node_id[&v];
        let constraint = func.constraint(v);
        for r in 0..class.n_regs {
            let admissible =
                class.allocatable.contains(r) && constraint.limited.map_or(true, |l| l.contains(r));
            if !admissible {
                let _ = writeln!(out, "{} {} -1", r as usize, nv);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Constraint, Def, RegClass};
    use crate::regalloc::affinity_graph::AffinityGraph;

    #[test]
    fn header_and_edges_are_well_formed() {
        let mut f = Function::new();
        f.classes.push(RegClass::new("GPR", 2));
        let entry = f.make_block();
        let a = f.make_value(
            Def::Normal {
                block: entry,
                args: vec![],
            },
            0,
            Constraint::normal(),
        );
        let b = f.make_value(
            Def::Normal {
                block: entry,
                args: vec![a],
            },
            0,
            Constraint::normal(),
        );
        f.recompute_uses();
        let mut live = Liveness::new();
        live.compute(&f, entry);
        let graph = AffinityGraph::new();
        let text = export(&f, 0, &live, &graph);
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        let mut parts = header.split_whitespace();
        let total: usize = parts.next().unwrap().parse().unwrap();
        let k: usize = parts.next().unwrap().parse().unwrap();
        assert_eq!(k, 2);
        assert_eq!(total, 2 + 2);
        for line in lines {
            let mut p = line.split_whitespace();
            let na: usize = p.next().unwrap().parse().unwrap();
            let nb: usize = p.next().unwrap().parse().unwrap();
            assert!(na < nb);
            assert!(nb < total);
        }
        let _ = (a, b);
    }
}

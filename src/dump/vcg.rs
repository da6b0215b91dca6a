//! An internal VCG ("Visualization of Compiler Graphs") dump.
//!
//! Produced when `Options::dump` carries `BEFORE`/`AFTER` (spec §6 "An
//! internal VCG dump is produced when `dump.before` / `dump.after` flags
//! are set"). Bit-exact compatibility with any particular VCG consumer is
//! explicitly not required (spec §6); this is a readable debugging aid,
//! one node per value and one edge per affinity pair, annotated with the
//! value's current color.

use crate::ir::Function;
use crate::regalloc::affinity_graph::AffinityGraph;
use core::fmt::Write as _;

/// Render the affinity graph of `class_idx` as a VCG graph, with each
/// node labeled by its current color (or `-` if unallocated).
pub fn export(func: &Function, class_idx: usize, graph: &AffinityGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "graph: {{");
    let _ = writeln!(out, "title: \"copy_opt class {}\"", func.classes[class_idx].name);
    let _ = writeln!(out, "layoutalgorithm: minbackward");

    let mut values = func.values_in_class(class_idx);
    values.sort();
    for &v in &values {
        let color = func
            .color(v)
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "node: {{ title: \"{}\" label: \"{} (color {})\" }}",
            v, v, color
        );
    }

    for u in graph.nodes() {
        for edge in graph.neighbours(u) {
            if u < edge.other {
                let _ = writeln!(
                    out,
                    "edge: {{ sourcename: \"{}\" targetname: \"{}\" label: \"{}\" }}",
                    u, edge.other, edge.cost
                );
            }
        }
    }

    let _ = writeln!(out, "}}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Constraint, Def, RegClass};

    #[test]
    fn emits_one_node_per_value_in_class() {
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
        f.set_color(a, 0);
        let graph = AffinityGraph::new();
        let text = export(&f, 0, &graph);
        assert!(text.contains("graph: {"));
        assert!(text.contains(&format!("title: \"{}\"", a)));
        assert!(text.contains("color 0"));
    }
}

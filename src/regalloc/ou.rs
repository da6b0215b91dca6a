//! Optimization-unit construction (spec §4.O).
//!
//! Groups a "root" value — a phi, a `Perm` projection, or a two-address
//! instruction result — together with the copy-related operands that
//! could be recolored to match it, the way `cranelift-codegen`'s own
//! `virtregs.rs` groups CSSA-related values; here the grouping additionally
//! carries the per-member copy cost and the cheap lower-bound quantities
//! the solver and the driver both consult (`sort_key`, `all_nodes_costs`,
//! `min_nodes_costs`).

use crate::cfg::ControlFlowGraph;
use crate::context_error::CopyOptError;
use crate::ir::{Constraint, Def, Function, Value};
use crate::options::{Options, OuOrder};
use crate::regalloc::cost::CostModel;
use crate::regalloc::liveness::Liveness;
use crate::regalloc::mis;

/// A root value together with its copy-related operands.
///
/// Per spec §3: `nodes[0]` is the root, `nodes[1..]` are operands not
/// interfering with it; `costs[i]` is the cost paid if `nodes[i]` ends up
/// a different color than the root (`costs[0]` is unused filler).
///
/// The solver's per-trial "queue of qnodes" (spec §3) is not stored here:
/// it is created, drained and discarded entirely within one call to
/// [`crate::regalloc::coalescing::run_heuristic`] for this unit, so it is
/// represented as a local `Vec` in that function rather than a
/// persisted field, matching the "created on entry ... discarded on
/// exit" lifecycle spec §3 already ascribes to `pinned_global`.
#[derive(Clone, Debug)]
pub struct Ou {
    /// `nodes[0]` is the root; `nodes[1..]` are copy-related operands.
    pub nodes: Vec<Value>,
    /// Per-member copy cost, aligned by index with `nodes` (`costs[0]`
    /// unused).
    pub costs: Vec<u32>,
    /// Sum of costs of root operands that interfere with the root and so
    /// can never be coalesced.
    pub inevitable_costs: u32,
    /// `max(costs[1..])`, used to order units so the highest-value
    /// coalescing opportunities are attempted first.
    pub sort_key: u32,
    /// `sum(costs[1..])`: the cost paid if nothing in this unit gets
    /// coalesced.
    pub all_nodes_costs: u32,
    /// `all_nodes_costs` minus the best case reachable if the solver could
    /// pick an optimal conflict-free subset of members to match the root.
    pub min_nodes_costs: u32,
}

impl Ou {
    /// Number of members, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// The root value.
    pub fn root(&self) -> Value {
        self.nodes[0]
    }
}

/// Is `v` eligible to be an OU root (spec §4.O "Eligibility of a root")?
pub fn is_ou_root(func: &Function, v: Value) -> bool {
    let c = func.constraint(v);
    if c.ignore {
        return false;
    }
    func.is_phi(v) || func.is_perm_projection(v) || c.should_be_same.is_some()
}

/// Build the OU rooted at `r`, or `None` if it would have fewer than two
/// members (nothing to coalesce).
///
/// Returns `Err` if any member's constraint requires `width > 1`: width-
/// aware coalescing is out of scope (spec §9).
pub fn build_ou(
    func: &Function,
    cfg: &ControlFlowGraph,
    live: &Liveness,
    cost: &CostModel,
    r: Value,
) -> Result<Option<Ou>, CopyOptError> {
    debug_assert!(is_ou_root(func, r), "{:?} is not a valid OU root", r);

    let mut nodes = vec![r];
    let mut costs = vec![0u32];
    let mut inevitable_costs = 0u32;

    match &func.values[r].def {
        Def::Phi { args, .. } => {
            for (i, &a) in args.iter().enumerate() {
                if a == r {
                    continue;
                }
                let c = cost.cost(func, cfg, r, i as i32);
                if live.interfere(func, r, a) {
                    inevitable_costs += c;
                } else if func.constraint(a).ignore {
                    continue;
                } else if let Some(k) = nodes.iter().position(|&n| n == a) {
                    costs[k] += c;
                } else {
                    nodes.push(a);
                    costs.push(c);
                }
            }
        }
        Def::PermProjection { source, .. } => {
            let s = *source;
            assert!(
                !live.interfere(func, r, s),
                "Perm source {:?} interferes with its own projection {:?}",
                s,
                r
            );
            nodes.push(s);
            costs.push(cost.cost(func, cfg, r, -1));
        }
        Def::Normal { args, .. } => {
            let mask = func
                .constraint(r)
                .should_be_same
                .expect("two-address OU root must carry should_be_same");
            for i in 0..32 {
                if mask & (1 << i) == 0 {
                    continue;
                }
                let o = match args.get(i) {
                    Some(&o) => o,
                    None => continue,
                };
                if func.constraint(o).ignore || live.interfere(func, r, o) {
                    continue;
                }
                if let Some(k) = nodes.iter().position(|&n| n == o) {
                    costs[k] += cost.cost(func, cfg, r, -1);
                } else {
                    nodes.push(o);
                    costs.push(cost.cost(func, cfg, r, -1));
                }
            }
        }
    }

    if nodes.len() < 2 {
        return Ok(None);
    }

    let class = func.values[r].class;
    for &n in &nodes {
        debug_assert_eq!(func.values[n].class, class, "OU member in the wrong class");
        let w = func.constraint(n).width;
        if w > 1 {
            return Err(CopyOptError::UnsupportedWidth { value: n, width: w });
        }
    }

    let sort_key = costs[1..].iter().copied().max().unwrap_or(0);
    let all_nodes_costs: u32 = costs[1..].iter().sum();

    let unsafe_members: Vec<usize> = (1..nodes.len())
        .filter(|&i| {
            (1..nodes.len()).any(|j| j != i && live.interfere(func, nodes[i], nodes[j]))
        })
        .collect();
    let safe_costs: u32 = (1..nodes.len())
        .filter(|i| !unsafe_members.contains(i))
        .map(|i| costs[i])
        .sum();
    let mis = mis::max_weight_independent_set(
        &unsafe_members,
        |i| costs[i],
        |i, j| live.interfere(func, nodes[i], nodes[j]),
    );
    let mis_costs: u32 = safe_costs + mis.iter().map(|&i| costs[i]).sum::<u32>();
    let min_nodes_costs = all_nodes_costs.saturating_sub(mis_costs);

    Ok(Some(Ou {
        nodes,
        costs,
        inevitable_costs,
        sort_key,
        all_nodes_costs,
        min_nodes_costs,
    }))
}

/// Enumerate and build every OU in `func`, sorted per `options.ou_order`.
///
/// A unit whose construction fails (currently only
/// [`CopyOptError::UnsupportedWidth`]) is rejected individually rather
/// than aborting the whole build: spec §9 calls width>1 coalescing
/// "passed through but not specially handled ... reject with an explicit
/// error", which this crate reads as "drop that one unit", not "fail the
/// pass". The rejection is logged at `warn` level.
pub fn build_all(
    func: &Function,
    cfg: &ControlFlowGraph,
    live: &Liveness,
    cost: &CostModel,
    options: &Options,
) -> Vec<Ou> {
    let _tt = crate::timing::ou_build();
    let mut units = Vec::new();
    for (v, _) in func.values.iter() {
        if !is_ou_root(func, v) {
            continue;
        }
        match build_ou(func, cfg, live, cost, v) {
            Ok(Some(ou)) => units.push(ou),
            Ok(None) => {}
            Err(e) => log::warn!("rejecting OU rooted at {}: {}", v, e),
        }
    }
    match options.ou_order {
        OuOrder::SortKeyOnly => {
            units.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));
        }
        OuOrder::LimitedFirst => {
            units.sort_by(|a, b| {
                let la = is_limited(func, a);
                let lb = is_limited(func, b);
                lb.cmp(&la).then_with(|| b.sort_key.cmp(&a.sort_key))
            });
        }
    }
    units
}

fn is_limited(func: &Function, ou: &Ou) -> bool {
    ou.nodes.iter().any(|&n| matches!(
        func.constraint(n),
        Constraint { limited: Some(_), .. }
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::RegClass;

    fn single_block_two_addr() -> (Function, Value, Value) {
        let mut f = Function::new();
        f.classes.push(RegClass::new("GPR", 4));
        let entry = f.make_block();
        f.blocks[entry].frequency = 10;
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
        (f, a, r)
    }

    #[test]
    fn two_address_unit_has_single_operand() {
        let (f, a, r) = single_block_two_addr();
        let cfg = ControlFlowGraph::new(&f);
        let mut live = Liveness::new();
        live.compute(&f, f.def_block(r) /* entry */);
        let cost = CostModel::new(&f, crate::options::CostFn::One);
        let ou = build_ou(&f, &cfg, &live, &cost, r).unwrap().unwrap();
        assert_eq!(ou.nodes, vec![r, a]);
        assert_eq!(ou.costs[1], 1);
        assert_eq!(ou.inevitable_costs, 0);
    }

    #[test]
    fn width_above_one_is_rejected() {
        let mut f = Function::new();
        f.classes.push(RegClass::new("GPR", 4));
        let entry = f.make_block();
        let a = f.make_value(
            Def::Normal {
                block: entry,
                args: vec![],
            },
            0,
            Constraint {
                width: 2,
                ..Constraint::normal()
            },
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
        let cost = CostModel::new(&f, crate::options::CostFn::One);
        let err = build_ou(&f, &cfg, &live, &cost, r).unwrap_err();
        assert_eq!(
            err,
            CopyOptError::UnsupportedWidth { value: a, width: 2 }
        );
    }

    #[test]
    fn perm_projection_unit_pairs_projection_with_its_source() {
        let mut f = Function::new();
        f.classes.push(RegClass::new("GPR", 4));
        let proj_block = f.make_block();
        let source_block = f.make_block();
        f.add_edge(proj_block, source_block);
        // Placeholder def, rewritten below once `s` exists (as
        // `phi_self_argument_is_dropped` does for its back-edge).
        let r = f.make_value(
            Def::Normal {
                block: proj_block,
                args: vec![],
            },
            0,
            Constraint::normal(),
        );
        let s = f.make_value(
            Def::Normal {
                block: source_block,
                args: vec![],
            },
            0,
            Constraint::normal(),
        );
        f.values[r].def = Def::PermProjection {
            block: proj_block,
            source: s,
        };
        f.recompute_uses();
        let cfg = ControlFlowGraph::new(&f);
        let mut live = Liveness::new();
        live.compute(&f, proj_block);
        assert!(!live.interfere(&f, r, s));

        let cost = CostModel::new(&f, crate::options::CostFn::One);
        let ou = build_ou(&f, &cfg, &live, &cost, r).unwrap().unwrap();
        assert_eq!(ou.nodes, vec![r, s]);
        assert_eq!(ou.costs[1], 1);
        assert_eq!(ou.inevitable_costs, 0);
    }

    #[test]
    fn phi_self_argument_is_dropped() {
        let mut f = Function::new();
        f.classes.push(RegClass::new("GPR", 4));
        let entry = f.make_block();
        let header = f.make_block();
        f.add_edge(entry, header);
        f.add_edge(header, header);
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
                args: vec![a, a],
            },
            0,
            Constraint::normal(),
        );
        // Rewrite second operand to be the phi itself (back-edge
        // self-argument), as spec's "Phi with self-argument" scenario.
        f.values[r].def = Def::Phi {
            block: header,
            args: vec![a, r],
        };
        f.recompute_uses();
        let cfg = ControlFlowGraph::new(&f);
        let mut live = Liveness::new();
        live.compute(&f, entry);
        let cost = CostModel::new(&f, crate::options::CostFn::One);
        let ou = build_ou(&f, &cfg, &live, &cost, r).unwrap().unwrap();
        assert_eq!(ou.nodes, vec![r, a]);
        assert_eq!(ou.inevitable_costs, 0);
    }
}

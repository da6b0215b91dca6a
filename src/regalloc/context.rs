//! The driver (spec §4.D): orchestrates liveness → OU/affinity → solver →
//! statistics for one `(function, register class)` pair, the way
//! `cranelift-codegen::regalloc::Context` chains its own sub-passes
//! through a single persistent struct reused across functions to avoid
//! repeated allocation.

use crate::cfg::ControlFlowGraph;
use crate::context_error::{CopyOptError, CopyOptResult};
use crate::ir::{Function, Value};
use crate::options::{self, DumpFlags, Options};
use crate::regalloc::affinity_graph::AffinityGraph;
use crate::regalloc::cost::CostModel;
use crate::regalloc::liveness::Liveness;
use crate::regalloc::ou::{self, Ou};
use crate::regalloc::stats::{self, Stats};

/// Persistent memory for one copy-optimization run, reusable across
/// functions the way the teacher's `regalloc::Context` is: liveness, the
/// OU list and the affinity graph are all owned here and released by
/// [`Context::clear`] rather than reallocated per call. Corresponds to
/// spec §6's `new_copy_opt(chordal_env, cost_fn) -> ctx`.
pub struct Context {
    liveness: Liveness,
    units: Vec<Ou>,
    graph: Option<AffinityGraph>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A fresh, empty context.
    pub fn new() -> Self {
        Self {
            liveness: Liveness::new(),
            units: Vec::new(),
            graph: None,
        }
    }

    /// Release every owned structure, ready for reuse on the next
    /// function.
    pub fn clear(&mut self) {
        self.liveness.clear();
        self.free_graph_structure();
        self.free_ou_structure();
    }

    /// The liveness analysis computed by the most recent
    /// [`Context::build_ou_structure`] call.
    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// The OUs built by the most recent [`Context::build_ou_structure`]
    /// call.
    pub fn units(&self) -> &[Ou] {
        &self.units
    }

    /// The affinity graph, if [`Context::build_graph_structure`] has been
    /// called since the last teardown.
    pub fn graph(&self) -> Option<&AffinityGraph> {
        self.graph.as_ref()
    }

    /// Recompute liveness for `func` and build every OU whose root
    /// belongs to `class_idx` (spec §4.D steps 1-2).
    pub fn build_ou_structure(&mut self, func: &Function, class_idx: usize, options: &Options) {
        let entry = func
            .entry_block()
            .expect("build_ou_structure requires a function with at least one block");
        self.liveness.compute(func, entry);
        let cfg = ControlFlowGraph::new(func);
        let cost = CostModel::new(func, options.cost);
        self.units = ou::build_all(func, &cfg, &self.liveness, &cost, options)
            .into_iter()
            .filter(|u| func.values[u.root()].class == class_idx)
            .collect();
    }

    /// Discard the OU list.
    pub fn free_ou_structure(&mut self) {
        self.units.clear();
    }

    /// Build the affinity-graph dual view of the current OU list (spec
    /// §4.A): only needed by algorithms that consult the graph view
    /// rather than the OU list directly, or by dumps/statistics.
    pub fn build_graph_structure(&mut self) {
        let _tt = crate::timing::affinity_build();
        self.graph = Some(AffinityGraph::from_ous(&self.units));
    }

    /// Discard the affinity graph.
    pub fn free_graph_structure(&mut self) {
        self.graph = None;
    }

    /// `all_nodes_costs` summed over every unit.
    pub fn max_copy_costs(&self) -> u32 {
        stats::max_copy_costs(&self.units)
    }

    /// Cost still unsatisfied by `func`'s current coloring.
    pub fn copy_costs(&self, func: &Function) -> u32 {
        stats::copy_costs(func, &self.units)
    }

    /// Cost that can never be coalesced, summed over every unit.
    pub fn inevitable_copy_costs(&self) -> u32 {
        stats::inevitable_copy_costs(&self.units)
    }

    /// The computable lower bound on achievable cost.
    pub fn lower_bound(&self) -> u32 {
        stats::lower_bound(&self.units)
    }

    /// A full statistics snapshot; `None` until [`Context::build_graph_structure`]
    /// has been called.
    pub fn complete_stats(&self, func: &Function) -> Option<Stats> {
        self.graph
            .as_ref()
            .map(|g| stats::complete_stats(func, &self.liveness, &self.units, g))
    }

    /// Run the heuristic solver over the current OU list (spec §4.H),
    /// mutating `func`'s colors in place. Consumes the `liveness`/`units`
    /// already built by [`Context::build_ou_structure`] rather than
    /// recomputing them, unlike the free function [`crate::regalloc::run_heuristic`]
    /// (which has no `Context` to draw them from and so builds its own).
    pub fn solve_heuristic(&mut self, func: &mut Function, class_idx: usize, options: &Options) -> SolveResult {
        let optimal = crate::regalloc::solve_units(func, &self.liveness, class_idx, &self.units, options);
        SolveResult { optimal }
    }
}

/// Outcome of [`Context::solve_heuristic`] (spec §6 `solve_heuristic(ctx)
/// -> {optimal: bool}`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SolveResult {
    /// Whether the driver can certify the result as optimal. The
    /// heuristic solver itself never can (spec §9 Non-goals); this is
    /// `true` only in the trivial case of an empty OU list.
    pub optimal: bool,
}

/// One class's before/after/optimal report from a [`driver`] run.
#[derive(Clone, Debug)]
pub struct DriverReport {
    /// Which register class this report covers.
    pub class_idx: usize,
    /// Statistics taken before the solver ran.
    pub before: Stats,
    /// Statistics taken after the solver ran.
    pub after: Stats,
    /// Whether the algorithm reported its result as optimal.
    pub optimal: bool,
}

/// Run the full spec §4.D pipeline — liveness, OU/affinity construction,
/// the selected algorithm, statistics, dumps and teardown — for every
/// register class of `func`.
///
/// `func` stands in for the spec's "chordal_env": the already-legally-
/// colored SSA function this crate's IR module represents (spec §1 lists
/// chordal allocation itself as an external collaborator).
pub fn driver(func: &mut Function, options: &Options) -> CopyOptResult<Vec<DriverReport>> {
    let mut reports = Vec::with_capacity(func.classes.len());
    let entry = options::lookup_algo(options.algo.name()).ok_or(CopyOptError::UnknownAlgo {
        name: options.algo.name(),
    })?;

    for class_idx in 0..func.classes.len() {
        let mut ctx = Context::new();
        ctx.build_ou_structure(func, class_idx, options);
        ctx.build_graph_structure();

        let before = ctx.complete_stats(func).unwrap_or_default();
        if options.dump.contains(DumpFlags::BEFORE) {
            log::info!("copy_opt before (class {}): {:?}", class_idx, before);
        }

        if options.improve && entry.can_improve_existing {
            crate::regalloc::run_heuristic(func, class_idx, options);
        }
        let optimal = (entry.run)(func, class_idx, options);

        if options.enable_verifier {
            if let Err(errors) = verify_coloring(func, class_idx, ctx.liveness()) {
                panic!("copy_opt produced an illegal coloring: {:?}", errors);
            }
        }

        let after = ctx.complete_stats(func).unwrap_or_default();
        if options.dump.contains(DumpFlags::AFTER) {
            log::info!("copy_opt after (class {}): {:?}", class_idx, after);
        }
        if options.dump.contains(DumpFlags::APPEL) {
            let text = crate::dump::appel::export(func, class_idx, ctx.liveness(), ctx.graph().unwrap());
            log::debug!("appel dump (class {}):\n{}", class_idx, text);
        }

        reports.push(DriverReport {
            class_idx,
            before,
            after,
            optimal,
        });

        ctx.clear();
    }

    Ok(reports)
}

/// A post-solve legality violation (spec §8 testable properties #1/#2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifyError {
    /// Two interfering values ended up with the same color.
    ColorClash {
        /// The first value.
        a: Value,
        /// The second value.
        b: Value,
        /// The color they share.
        color: u16,
    },
    /// A value in the class went through the pass without ever being
    /// colored.
    Unallocated {
        /// The offending value.
        value: Value,
    },
    /// A value's color is outside `allocatable ∩ limited`.
    IllegalColor {
        /// The offending value.
        value: Value,
        /// Its (illegal) color.
        color: u16,
    },
}

/// Walk every value of `class_idx` and confirm class closure and
/// pairwise legality hold (spec §8 properties #1-#2). Modeled on
/// `cranelift-codegen::verifier`'s pattern of collecting every violation
/// before reporting, rather than panicking on the first one found, for a
/// better diagnostic; per spec §7 these are still contract violations and
/// the caller is expected to treat a non-empty result as fatal.
pub fn verify_coloring(func: &Function, class_idx: usize, live: &Liveness) -> Result<(), Vec<VerifyError>> {
    let mut errors = Vec::new();
    let values = func.values_in_class(class_idx);
    let class = &func.classes[class_idx];

    for &v in &values {
        match func.color(v) {
            None => errors.push(VerifyError::Unallocated { value: v }),
            Some(c) => {
                let limited_ok = func.constraint(v).limited.map_or(true, |l| l.contains(c));
                if !class.allocatable.contains(c) || !limited_ok {
                    errors.push(VerifyError::IllegalColor { value: v, color: c });
                }
            }
        }
    }

    for i in 0..values.len() {
        for j in (i + 1)..values.len() {
            let (a, b) = (values[i], values[j]);
            if !live.interfere(func, a, b) {
                continue;
            }
            if let (Some(ca), Some(cb)) = (func.color(a), func.color(b)) {
                if ca == cb {
                    errors.push(VerifyError::ColorClash { a, b, color: ca });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

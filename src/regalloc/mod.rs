//! Copy-minimizing register coalescing.
//!
//! This module contains data structures and algorithms used for the
//! copy-coalescing pass: liveness, optimization-unit construction, the
//! affinity graph, the cost model, the heuristic solver, statistics, and
//! the driver that chains them together. Grouped the way
//! `cranelift-codegen::regalloc` groups its own sub-passes under one
//! `regalloc` module.

pub mod affinity_graph;
pub mod context;
pub mod cost;
pub mod liveness;
pub mod mis;
pub mod ou;
pub mod stats;

mod coalescing;

pub(crate) use self::coalescing::solve_units;
pub use self::coalescing::run_heuristic;
pub use self::context::{verify_coloring, Context, VerifyError};

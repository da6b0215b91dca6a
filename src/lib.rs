//! Copy-minimizing register coalescing.
//!
//! This crate implements a post-pass that sits downstream of an already
//! legal register coloring (for example one produced by a chordal or
//! graph-coloring allocator): it re-colors small groups of values ("OUs")
//! that are related by copies — phi operands, parallel-copy
//! (`Perm`) endpoints, two-address operand pairs — so that as many of
//! them as possible end up sharing a color, minimizing the weighted cost
//! of the copy instructions that SSA destruction and two-address fix-up
//! would otherwise have to emit.
//!
//! The crate is organized as a small pipeline of sub-passes, mirroring
//! the way `cranelift-codegen`'s `regalloc` module chains liveness,
//! coalescing and coloring through a persistent [`Context`]:
//!
//! - [`regalloc::liveness`] — interblock liveness and the `interfere`
//!   predicate.
//! - [`regalloc::ou`] — optimization-unit construction.
//! - [`regalloc::affinity_graph`] — the dual weighted-graph view of the
//!   same couplings.
//! - [`regalloc::cost`] — pluggable copy-cost functions.
//! - [`regalloc::coalescing`] — the heuristic solver.
//! - [`regalloc::stats`] — before/after statistics.
//! - [`regalloc::context`] — the driver, [`Context`].
#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
#[macro_use]
extern crate alloc as std;
#[cfg(feature = "std")]
#[macro_use]
extern crate std;

#[cfg(not(feature = "std"))]
pub(crate) use hashmap_core::{map as hash_map, HashMap, HashSet};
#[cfg(feature = "std")]
pub(crate) use std::collections::{hash_map, HashMap, HashSet};

#[macro_use]
extern crate failure_derive;

pub use crate::context_error::{CopyOptError, CopyOptResult};
pub use crate::ir::{
    Block, Constraint, Function, RegClass, Value, ValueLoc, MAX_REGS_PER_CLASS,
};
pub use crate::options::{Algo, CostFn, DumpFlags, Options};
pub use crate::regalloc::context::Context;

pub mod cfg;
pub mod dominator;
mod context_error;
pub mod dump;
pub mod ir;
pub mod options;
pub mod regalloc;
pub mod timing;

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! The CLI / option surface spec §6 names
//! (`be.ra.chordal.co.{algo,cost,dump,style,stats}`, `improve`).
//!
//! Shaped after `cranelift-codegen`'s `settings.rs` builder pattern (a
//! plain struct of typed fields with `Default` and small setters) rather
//! than copied from it: `settings.rs` was not present in the retrieved
//! slice of the teacher crate (see DESIGN.md), so this is hand-written in
//! the same spirit — no macro-generated schema, just POD plus builder
//! methods.

use crate::ir::Function;

/// Minimal hand-rolled bitflags, avoiding a dependency the teacher's
/// `Cargo.toml` doesn't carry: `register_set.rs`-style word-array bitsets
/// are used everywhere else in this crate for larger sets, but a 4-flag
/// dump mask is small enough to spell out directly.
macro_rules! bitflags_lite {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $flag:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
        pub struct $name($ty);

        impl $name {
            $(
                #[allow(missing_docs)]
                pub const $flag: $name = $name($value);
            )*

            /// The empty set of flags.
            pub fn empty() -> Self {
                $name(0)
            }

            /// Does this set contain every bit of `other`?
            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                $name(self.0 | rhs.0)
            }
        }
    };
}

/// Which cost function weighs potential copies (spec §4.C).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CostFn {
    /// `cost = max(1, intfreq(block))`.
    Freq,
    /// `cost = 1 + depth(loop(block))^2`.
    Loop,
    /// `cost = 1` always; minimizes copy *count* rather than weighted
    /// cost.
    One,
}

impl Default for CostFn {
    fn default() -> Self {
        CostFn::Freq
    }
}

bitflags_lite! {
    /// Which before/after/format dumps to emit (`be.ra.chordal.co.dump`).
    pub struct DumpFlags: u8 {
        const BEFORE = 0b0001;
        const AFTER  = 0b0010;
        const APPEL  = 0b0100;
        const ALL    = 0b0111;
    }
}

/// One entry in the algorithm registry (spec §9 "Polymorphic
/// algorithms"): a name, the solver function itself, and whether it can
/// be seeded from an existing (possibly suboptimal) coloring rather than
/// starting from scratch.
pub struct AlgoEntry {
    /// Name selected via `be.ra.chordal.co.algo`.
    pub name: &'static str,
    /// Whether a prior coloring can be handed to this algorithm to
    /// improve rather than replace (spec §4.D step 4).
    pub can_improve_existing: bool,
    /// Run the algorithm. Returns whether the result is provably optimal.
    pub run: fn(&mut Function, usize, &Options) -> bool,
}

/// Registered copy-coalescing algorithms. Populated once, frozen
/// thereafter (spec §9: "treat the module registry as initialized once at
/// program start and frozen").
pub static ALGO_REGISTRY: &[AlgoEntry] = &[
    AlgoEntry {
        name: "none",
        can_improve_existing: false,
        run: |_func, _class, _opts| true,
    },
    AlgoEntry {
        name: "heur1",
        can_improve_existing: true,
        run: crate::regalloc::run_heuristic,
    },
];

/// Look up an algorithm by name.
pub fn lookup_algo(name: &str) -> Option<&'static AlgoEntry> {
    ALGO_REGISTRY.iter().find(|e| e.name == name)
}

/// Which concrete algorithm [`lookup_algo`] should resolve by default.
pub const DEFAULT_ALGO: &str = "heur1";

/// A named choice of coalescing algorithm, kept distinct from the string
/// the CLI surface accepts so callers building `Options` programmatically
/// get compile-time checking.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Algo {
    /// No coalescing; leave the incoming coloring untouched.
    None,
    /// The heuristic solver of spec §4.H.
    Heur1,
}

impl Algo {
    /// The registry name this variant resolves to.
    pub fn name(self) -> &'static str {
        match self {
            Algo::None => "none",
            Algo::Heur1 => "heur1",
        }
    }
}

impl Default for Algo {
    fn default() -> Self {
        Algo::Heur1
    }
}

/// Whether OUs are ordered purely by `sort_key` (the default) or with
/// `limited`-constrained units prioritized first (spec §4.O "Sort key and
/// bounds": "optionally further prioritized ... implementers should
/// expose it as a flag and document that the default is by `sort_key`
/// alone").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OuOrder {
    /// Sort strictly by descending `sort_key`.
    SortKeyOnly,
    /// `limited`-constrained units are moved to the front, then sorted by
    /// `sort_key` within each group.
    LimitedFirst,
}

impl Default for OuOrder {
    fn default() -> Self {
        OuOrder::SortKeyOnly
    }
}

/// The full option surface, gathering spec §6's CLI surface into one
/// struct the driver is constructed with.
#[derive(Clone, Debug)]
pub struct Options {
    /// `be.ra.chordal.co.algo`
    pub algo: Algo,
    /// `be.ra.chordal.co.cost`
    pub cost: CostFn,
    /// `be.ra.chordal.co.dump`
    pub dump: DumpFlags,
    /// `be.ra.chordal.co.stats`
    pub stats: bool,
    /// `improve`: seed the chosen algorithm from the existing coloring
    /// when it supports doing so.
    pub improve: bool,
    /// Ordering alternative for the OU list (spec §9 ambiguity note).
    pub ou_order: OuOrder,
    /// Run [`crate::regalloc::context::verify_coloring`] after solving.
    pub enable_verifier: bool,
    /// Let `color_irn` try [`crate::regalloc::coalescing`]'s free-color
    /// pick before falling back to recursive displacement (spec §4.H step
    /// 4: "optional but strongly beneficial and must be implementable
    /// behind a feature flag"). Disabling it forces every recolor through
    /// the displacement chain, which is useful for isolating that code
    /// path in tests.
    pub reuse_free_colors: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            algo: Algo::default(),
            cost: CostFn::default(),
            dump: DumpFlags::empty(),
            stats: false,
            improve: false,
            ou_order: OuOrder::default(),
            enable_verifier: cfg!(debug_assertions),
            reuse_free_colors: true,
        }
    }
}

impl Options {
    /// Builder-style setter for `algo`.
    pub fn with_algo(mut self, algo: Algo) -> Self {
        self.algo = algo;
        self
    }

    /// Builder-style setter for `cost`.
    pub fn with_cost(mut self, cost: CostFn) -> Self {
        self.cost = cost;
        self
    }

    /// Builder-style setter for `dump`.
    pub fn with_dump(mut self, dump: DumpFlags) -> Self {
        self.dump = dump;
        self
    }

    /// Builder-style setter for `stats`.
    pub fn with_stats(mut self, stats: bool) -> Self {
        self.stats = stats;
        self
    }

    /// Builder-style setter for `improve`.
    pub fn with_improve(mut self, improve: bool) -> Self {
        self.improve = improve;
        self
    }

    /// Builder-style setter for `reuse_free_colors`.
    pub fn with_reuse_free_colors(mut self, reuse_free_colors: bool) -> Self {
        self.reuse_free_colors = reuse_free_colors;
        self
    }
}

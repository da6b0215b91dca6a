//! The minimal SSA IR surface this crate consumes.
//!
//! Instruction selection, scheduling, ABI lowering and the rest of a real
//! middle/back-end are out of scope (spec §1); this module is the named
//! collaborator interface spec §6 calls "operations consumed from
//! collaborators (IR)". It is deliberately small: just enough typed
//! structure — values, blocks, register classes, constraints — to drive
//! liveness, OU construction and coalescing, and to let callers plug a
//! real compiler's IR in behind the same shape.

use core::fmt;
use core::u16;
use cranelift_entity::{entity_impl, PrimaryMap, SecondaryMap};
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// An SSA value (a single static-assignment definition).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Value(u32);
entity_impl!(Value);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A basic block.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Block(u32);
entity_impl!(Block);

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "block{}", self.0)
    }
}

/// Upper bound on the number of registers a single [`RegClass`] may admit.
///
/// Colors are stored as a fixed-size bit vector, the same trick
/// `cranelift-codegen::regalloc::register_set::RegisterSet` uses for
/// register units; four 32-bit words comfortably covers every real
/// register file (x86-64 GPRs: 16, AArch64 GPRs: 31, any SIMD file: <=32).
pub const MAX_REGS_PER_CLASS: usize = 128;

const WORDS: usize = MAX_REGS_PER_CLASS / 32;

/// A set of colors (register indices in `[0, n_regs)`), represented as a
/// small fixed bit vector.
///
/// Adapted from `cranelift-codegen::regalloc::register_set::RegisterSet`:
/// same word-array-of-`u32` representation and the same
/// `is_avail`/`take`/`free`/`iter` API, simplified because this crate's
/// colors are opaque indices rather than aliasing register *units*.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorSet {
    bits: [u32; WORDS],
}

impl ColorSet {
    /// The empty set.
    pub fn empty() -> Self {
        Self { bits: [0; WORDS] }
    }

    /// The set `{0, 1, ..., n-1}`.
    pub fn all(n: u16) -> Self {
        let mut s = Self::empty();
        for c in 0..n {
            s.insert(c);
        }
        s
    }

    /// Insert `color` into the set.
    pub fn insert(&mut self, color: u16) {
        let (w, b) = Self::split(color);
        self.bits[w] |= b;
    }

    /// Remove `color` from the set.
    pub fn remove(&mut self, color: u16) {
        let (w, b) = Self::split(color);
        self.bits[w] &= !b;
    }

    /// Is `color` a member?
    pub fn contains(&self, color: u16) -> bool {
        let (w, b) = Self::split(color);
        self.bits[w] & b != 0
    }

    /// Is the set empty?
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    /// Intersect in place.
    pub fn intersect_with(&mut self, other: &Self) {
        for (a, b) in self.bits.iter_mut().zip(&other.bits) {
            *a &= b;
        }
    }

    /// Return the intersection of `self` and `other`.
    pub fn intersection(&self, other: &Self) -> Self {
        let mut r = *self;
        r.intersect_with(other);
        r
    }

    /// Remove every member of `other` from `self`.
    pub fn remove_all(&mut self, other: &Self) {
        for (a, b) in self.bits.iter_mut().zip(&other.bits) {
            *a &= !b;
        }
    }

    /// Iterate over the member colors in ascending order.
    pub fn iter(&self) -> ColorSetIter {
        ColorSetIter {
            bits: self.bits,
            word: 0,
        }
    }

    fn split(color: u16) -> (usize, u32) {
        let color = color as usize;
        (color / 32, 1u32 << (color % 32))
    }
}

impl fmt::Debug for ColorSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Iterator over the members of a [`ColorSet`].
pub struct ColorSetIter {
    bits: [u32; WORDS],
    word: usize,
}

impl Iterator for ColorSetIter {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        while self.word < WORDS {
            let w = self.bits[self.word];
            if w != 0 {
                let bit = w.trailing_zeros();
                self.bits[self.word] &= w - 1;
                return Some((self.word * 32) as u16 + bit as u16);
            }
            self.word += 1;
        }
        None
    }
}

/// A register class: an immutable description of a bank of
/// interchangeable physical registers.
///
/// Per spec §3: "Immutable record: name, number of registers `n_regs`,
/// per-architecture allocatability bitset supplied by the driver, and the
/// natural register width. A value belongs to exactly one class."
#[derive(Clone, Debug)]
pub struct RegClass {
    /// Human-readable class name (`"GPR"`, `"FPR"`, ...), used in logs and
    /// in the contest dump.
    pub name: &'static str,
    /// Number of registers in the class. Colors are `0..n_regs`.
    pub n_regs: u16,
    /// Which of the `n_regs` colors are actually allocatable on the
    /// current target (some may be reserved for the frame pointer, stack
    /// pointer, etc).
    pub allocatable: ColorSet,
    /// Natural width, in consecutive register indices, of one value of
    /// this class.
    pub width: u16,
}

impl RegClass {
    /// A register class where every register is allocatable.
    pub fn new(name: &'static str, n_regs: u16) -> Self {
        assert!((n_regs as usize) <= MAX_REGS_PER_CLASS);
        Self {
            name,
            n_regs,
            allocatable: ColorSet::all(n_regs),
            width: 1,
        }
    }

    /// Restrict the allocatable set, e.g. to reserve a frame-pointer
    /// register.
    pub fn with_allocatable(mut self, allocatable: ColorSet) -> Self {
        self.allocatable = allocatable;
        self
    }
}

impl fmt::Display for RegClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Constraint record attached to a value or an operand position.
///
/// Per spec §3, this is a tagged set of flags and fields rather than a
/// single enum: several flags can be set simultaneously (e.g. a
/// two-address output can also be `aligned`).
#[derive(Clone, Debug, Default)]
pub struct Constraint {
    /// Not allocated by this engine at all; skip entirely.
    pub ignore: bool,
    /// Only the listed colors are admissible.
    pub limited: Option<ColorSet>,
    /// Bitmask over operand positions: this value prefers to share a color
    /// with whichever operand's position is set (the two-address hint).
    pub should_be_same: Option<u32>,
    /// Must not share a color with some other specific value (pass-through
    /// for downstream; not interpreted by the coalescer itself beyond
    /// widening the effective interference it must respect).
    pub must_be_different: bool,
    /// Alignment requirement, pass-through for downstream.
    pub aligned: bool,
    /// This value produces the stack pointer, pass-through for downstream.
    pub produces_sp: bool,
    /// Number of consecutive register indices required.
    pub width: u16,
}

impl Constraint {
    /// The ordinary, unconstrained case.
    pub fn normal() -> Self {
        Self {
            width: 1,
            ..Default::default()
        }
    }

    /// A value not allocated by this engine.
    pub fn ignore() -> Self {
        Self {
            ignore: true,
            width: 1,
            ..Default::default()
        }
    }

    /// Restricted to a fixed set of colors.
    pub fn limited(colors: ColorSet) -> Self {
        Self {
            limited: Some(colors),
            width: 1,
            ..Default::default()
        }
    }

    /// A two-address hint: prefer sharing a color with the operand at the
    /// single position `pos`.
    pub fn should_be_same(pos: u32) -> Self {
        Self {
            should_be_same: Some(1 << pos),
            width: 1,
            ..Default::default()
        }
    }
}

/// How a value is defined, insofar as the OU builder and cost model need
/// to know.
#[derive(Clone, Debug)]
pub enum Def {
    /// An ordinary instruction result. `args` holds the operands visible
    /// to the `should_be_same` two-address mask (position `i` in the
    /// constraint refers to `args[i]`).
    Normal {
        /// Defining block.
        block: Block,
        /// Operands, in instruction operand order.
        args: Vec<Value>,
    },
    /// A block-header phi. `args[i]` is the incoming value from
    /// `cfg.preds(block)[i]`.
    Phi {
        /// Defining (header) block.
        block: Block,
        /// One argument per control-flow predecessor, aligned with
        /// `cfg::ControlFlowGraph::preds`.
        args: Vec<Value>,
    },
    /// A projection out of a parallel-copy (`Perm`) pseudo-instruction.
    PermProjection {
        /// Defining block.
        block: Block,
        /// The single `Perm` input this projection equals after the
        /// shuffle.
        source: Value,
    },
}

impl Def {
    /// The block this value is defined in.
    pub fn block(&self) -> Block {
        match self {
            Def::Normal { block, .. } => *block,
            Def::Phi { block, .. } => *block,
            Def::PermProjection { block, .. } => *block,
        }
    }
}

/// Per-value data stored in a [`Function`].
#[derive(Clone, Debug)]
pub struct ValueData {
    /// Definition site and kind.
    pub def: Def,
    /// Register-class index into `Function::classes`.
    pub class: usize,
    /// Allocation constraint.
    pub constraint: Constraint,
    /// The value's current color, if any. Coalescing mutates this field;
    /// on entry it holds the legal coloring produced by an upstream
    /// allocator.
    pub color: Option<u16>,
}

/// A location a value currently lives in, pass-through for downstream
/// consumers that need to distinguish "in a register" from "on the
/// stack" (spec §6 lists `ValueLoc` among IR accessors used by sibling
/// passes; copy coalescing itself only ever deals with the `Reg` case,
/// `Unallocated`/`Stack` values are filtered out via `Constraint::ignore`
/// upstream).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueLoc {
    /// Not yet allocated.
    Unallocated,
    /// A color within the value's register class.
    Reg(u16),
    /// A stack slot index.
    Stack(u32),
}

/// Per-block data.
#[derive(Clone, Debug, Default)]
pub struct BlockData {
    /// Control-flow predecessor blocks, in a stable order that phi
    /// argument lists are aligned with.
    pub preds: Vec<Block>,
    /// Control-flow successor blocks.
    pub succs: Vec<Block>,
    /// Values defined in this block, in program order (phis first).
    pub defs: Vec<Value>,
    /// Estimated execution frequency, supplied by the driver (e.g. from
    /// block profiling or a static loop-depth heuristic). Used by the
    /// "freq" cost function.
    pub frequency: u32,
    /// Loop nesting depth, 0 if outside any loop. Used by the "loop" cost
    /// function.
    pub loop_depth: u32,
}

/// A minimal SSA function: values, blocks and register classes, with side
/// tables built once and kept in sync by the mutation hooks liveness and
/// the solver use (`Function::uses_of`).
///
/// This is the crate's stand-in for "an SSA IR of typed values in basic
/// blocks" (spec §1) — a real compiler plugs its own IR in behind the
/// same field shapes.
#[derive(Clone, Debug, Default)]
pub struct Function {
    /// Dense value table.
    pub values: PrimaryMap<Value, ValueData>,
    /// Dense block table.
    pub blocks: PrimaryMap<Block, BlockData>,
    /// Register classes referenced by `ValueData::class`.
    pub classes: Vec<RegClass>,
    uses: SecondaryMap<Value, Vec<(Value, usize)>>,
}

impl Function {
    /// An empty function.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new, empty block.
    pub fn make_block(&mut self) -> Block {
        self.blocks.push(BlockData::default())
    }

    /// Wire `from -> to` as a control-flow edge.
    pub fn add_edge(&mut self, from: Block, to: Block) {
        self.blocks[from].succs.push(to);
        self.blocks[to].preds.push(from);
    }

    /// Register a new value and return its handle. `class` indexes
    /// `self.classes`.
    pub fn make_value(&mut self, def: Def, class: usize, constraint: Constraint) -> Value {
        let block = def.block();
        let v = self.values.push(ValueData {
            def,
            class,
            constraint,
            color: None,
        });
        self.blocks[block].defs.push(v);
        v
    }

    /// Assign an initial (pre-coalescing) color, as an upstream chordal
    /// allocator would have.
    pub fn set_color(&mut self, v: Value, color: u16) {
        self.values[v].color = Some(color);
    }

    /// Rebuild the `uses_of` side table from scratch. Must be called
    /// (once) before liveness analysis, and again after any structural
    /// edit (spec §4.L mutation hooks rely on it being current).
    pub fn recompute_uses(&mut self) {
        for uses in self.uses.values_mut() {
            uses.clear();
        }
        let defs: Vec<(Value, Def)> = self
            .values
            .iter()
            .map(|(v, data)| (v, data.def.clone()))
            .collect();
        for (user, def) in defs {
            match def {
                Def::Normal { args, .. } => {
                    for (pos, a) in args.into_iter().enumerate() {
                        self.uses[a].push((user, pos));
                    }
                }
                Def::Phi { args, .. } => {
                    for (pos, a) in args.into_iter().enumerate() {
                        self.uses[a].push((user, pos));
                    }
                }
                Def::PermProjection { source, .. } => {
                    self.uses[source].push((user, 0));
                }
            }
        }
    }

    /// Every `(user, operand_position)` pair where `v` is used.
    pub fn uses_of(&self, v: Value) -> &[(Value, usize)] {
        &self.uses[v]
    }

    /// The block a value is defined in.
    pub fn def_block(&self, v: Value) -> Block {
        self.values[v].def.block()
    }

    /// Is `v` a phi?
    pub fn is_phi(&self, v: Value) -> bool {
        matches!(self.values[v].def, Def::Phi { .. })
    }

    /// Is `v` a `Perm` projection?
    pub fn is_perm_projection(&self, v: Value) -> bool {
        matches!(self.values[v].def, Def::PermProjection { .. })
    }

    /// The register class of a value.
    pub fn class(&self, v: Value) -> &RegClass {
        &self.classes[self.values[v].class]
    }

    /// The allocation constraint of a value.
    pub fn constraint(&self, v: Value) -> &Constraint {
        &self.values[v].constraint
    }

    /// Current color, if assigned.
    pub fn color(&self, v: Value) -> Option<u16> {
        self.values[v].color
    }

    /// The function's entry block: the unique block with no predecessors,
    /// or the first declared block if none qualifies (e.g. a
    /// single-block function). `None` for an empty function.
    pub fn entry_block(&self) -> Option<Block> {
        self.blocks
            .iter()
            .find(|(_, data)| data.preds.is_empty())
            .or_else(|| self.blocks.iter().next())
            .map(|(b, _)| b)
    }

    /// Every value assigned to register class `class_idx` whose
    /// constraint is not `ignore`.
    pub fn values_in_class(&self, class_idx: usize) -> Vec<Value> {
        self.values
            .iter()
            .filter(|(_, data)| data.class == class_idx && !data.constraint.ignore)
            .map(|(v, _)| v)
            .collect()
    }
}

//! Error type for the handful of conditions this crate reports instead of
//! asserting on (see spec §7: most "unexpected" conditions are contract
//! violations and panic; only width>1 coalescing and malformed dump
//! requests are reported to the caller).

use failure::Fail;

/// Failure modes the copy-optimization driver reports to its caller.
///
/// Everything else described in the design (interference-graph
/// inconsistencies, a non-optimizable node reaching the OU builder, a
/// `Perm` source that interferes with its own projection, ...) is a
/// contract violation from an upstream pass and is reported as a panic
/// via `debug_assert!`/`assert!`, never through this type.
#[derive(Fail, Debug, Clone, PartialEq, Eq)]
pub enum CopyOptError {
    /// A unit contained a member whose constraint requires more than one
    /// consecutive register (`width > 1`). Width-aware coalescing is
    /// explicitly out of scope (spec §9); such units are rejected rather
    /// than silently mishandled.
    #[fail(
        display = "value {:?} has width {} but copy coalescing only supports width 1",
        value, width
    )]
    UnsupportedWidth {
        /// The offending value.
        value: crate::ir::Value,
        /// Its constraint's `width` field.
        width: u16,
    },

    /// The caller asked for an unknown algorithm name in the registry.
    #[fail(display = "no copy-coalescing algorithm registered under {:?}", name)]
    UnknownAlgo {
        /// The requested name.
        name: &'static str,
    },
}

/// Convenience alias for results produced by this crate's public entry
/// points, named after the teacher's `CodegenResult`.
pub type CopyOptResult<T> = Result<T, CopyOptError>;

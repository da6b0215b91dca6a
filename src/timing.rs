//! Per-pass wall-clock timing scopes.
//!
//! Grounded in `cranelift-codegen::regalloc::context::Context::run`'s
//! `let _tt = timing::regalloc();` idiom: entering a pass creates a guard
//! whose `Drop` impl accumulates elapsed time into a thread-local
//! counter, with (almost) no overhead when nobody reads the counters
//! back. The statistics module (spec §4.S, "Emit `copy_opt` timing")
//! reads these out after a driver run.
//!
//! Timing needs a clock, which `core` doesn't have; on `no_std` builds
//! (feature `core`) the scopes become no-ops and `snapshot()` always
//! reports zero.

use core::time::Duration;

/// The set of passes this crate times.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Liveness analysis (module L).
    Liveness,
    /// OU construction (module O).
    OuBuild,
    /// Affinity graph construction (module A).
    AffinityBuild,
    /// The heuristic solver (module H).
    CopyOpt,
}

const PASS_COUNT: usize = 4;

fn index(p: Pass) -> usize {
    match p {
        Pass::Liveness => 0,
        Pass::OuBuild => 1,
        Pass::AffinityBuild => 2,
        Pass::CopyOpt => 3,
    }
}

/// RAII guard returned by [`scope`]; accumulates elapsed time into the
/// pass's running total when dropped.
pub struct TimingGuard {
    #[cfg(feature = "std")]
    pass: Pass,
    #[cfg(feature = "std")]
    start: std::time::Instant,
    #[cfg(not(feature = "std"))]
    _unused: core::marker::PhantomData<Pass>,
}

#[cfg(feature = "std")]
impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        TOTALS.with(|t| t.borrow_mut()[index(self.pass)] += elapsed);
    }
}

#[cfg(feature = "std")]
std::thread_local! {
    static TOTALS: std::cell::RefCell<[Duration; PASS_COUNT]> =
        std::cell::RefCell::new([Duration::new(0, 0); PASS_COUNT]);
}

/// Enter a timed pass. Keep the returned guard alive for the duration of
/// the pass.
#[cfg(feature = "std")]
pub fn scope(pass: Pass) -> TimingGuard {
    TimingGuard {
        pass,
        start: std::time::Instant::now(),
    }
}

/// Enter a timed pass (no-op on `no_std` builds).
#[cfg(not(feature = "std"))]
pub fn scope(_pass: Pass) -> TimingGuard {
    TimingGuard {
        _unused: core::marker::PhantomData,
    }
}

/// Shorthand for `scope(Pass::Liveness)`.
pub fn liveness() -> TimingGuard {
    scope(Pass::Liveness)
}

/// Shorthand for `scope(Pass::OuBuild)`.
pub fn ou_build() -> TimingGuard {
    scope(Pass::OuBuild)
}

/// Shorthand for `scope(Pass::AffinityBuild)`.
pub fn affinity_build() -> TimingGuard {
    scope(Pass::AffinityBuild)
}

/// Shorthand for `scope(Pass::CopyOpt)`.
pub fn copy_opt() -> TimingGuard {
    scope(Pass::CopyOpt)
}

/// Snapshot the accumulated time for every pass, in declaration order.
/// Always zero on `no_std` builds.
#[cfg(feature = "std")]
pub fn snapshot() -> [Duration; PASS_COUNT] {
    TOTALS.with(|t| *t.borrow())
}

/// Snapshot the accumulated time for every pass (no-op fallback).
#[cfg(not(feature = "std"))]
pub fn snapshot() -> [Duration; PASS_COUNT] {
    [Duration::new(0, 0); PASS_COUNT]
}

/// Reset all counters to zero. Intended for test isolation.
#[cfg(feature = "std")]
pub fn reset() {
    TOTALS.with(|t| *t.borrow_mut() = [Duration::new(0, 0); PASS_COUNT]);
}

/// Reset all counters to zero (no-op fallback).
#[cfg(not(feature = "std"))]
pub fn reset() {}
